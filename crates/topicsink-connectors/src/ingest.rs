//! Batch ingestion.
//!
//! Turns one poll result into a [`Batch`]:
//!
//! 1. keep only records whose key equals the configured filter key;
//! 2. take the offset range from the first and last kept record, before any
//!    decoding happens;
//! 3. decode each kept record and project it into an attribute map, skipping
//!    records that fail to decode.
//!
//! Records with other keys are ordinary traffic on a shared topic and are not
//! reported. A poll whose kept records span more than one topic-partition, or
//! whose offsets go backwards, is rejected as a whole with
//! [`ConnectorError::MalformedBatch`].

use topicsink_core::{Batch, Record, ToAttributes};

use crate::error::{ConnectorError, Result};
use crate::traits::MessageDecoder;

pub struct BatchIngestor<D> {
    filter_key: String,
    decoder: D,
}

impl<D: MessageDecoder> BatchIngestor<D> {
    pub fn new(filter_key: impl Into<String>, decoder: D) -> Self {
        Self {
            filter_key: filter_key.into(),
            decoder,
        }
    }

    pub fn filter_key(&self) -> &str {
        &self.filter_key
    }

    pub fn ingest(&self, records: &[Record]) -> Result<Batch> {
        let matching: Vec<&Record> = records
            .iter()
            .filter(|r| r.has_key(&self.filter_key))
            .collect();

        tracing::trace!(
            polled = records.len(),
            matching = matching.len(),
            key = %self.filter_key,
            "filtered poll by key"
        );

        let (first, last) = match (matching.first(), matching.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Ok(Batch::empty()),
        };

        check_single_partition(&matching)?;

        tracing::info!(
            topic = %first.topic,
            partition = first.partition,
            offset = first.offset,
            "processing will start"
        );
        tracing::info!(
            topic = %last.topic,
            partition = last.partition,
            offset = last.offset,
            "processing will end"
        );

        let mut items = Vec::with_capacity(matching.len());
        for record in &matching {
            match self.decoder.decode(&record.value) {
                Ok(message) => items.push(message.to_attributes()),
                Err(e) => {
                    tracing::warn!(
                        topic = %record.topic,
                        partition = record.partition,
                        offset = record.offset,
                        error = %e,
                        "skipping record that failed to decode"
                    );
                }
            }
        }

        Ok(Batch {
            items,
            initial_offset: first.offset,
            final_offset: last.offset,
            topic: Some(first.topic.clone()),
            partition: first.partition,
        })
    }
}

fn check_single_partition(records: &[&Record]) -> Result<()> {
    for pair in records.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        if !prev.same_partition(next) {
            return Err(ConnectorError::MalformedBatch(format!(
                "records from {}[{}] and {}[{}] in one batch",
                prev.topic, prev.partition, next.topic, next.partition
            )));
        }
        if next.offset < prev.offset {
            return Err(ConnectorError::MalformedBatch(format!(
                "offset {} follows offset {} in {}[{}]",
                next.offset, prev.offset, prev.topic, prev.partition
            )));
        }
    }
    Ok(())
}
