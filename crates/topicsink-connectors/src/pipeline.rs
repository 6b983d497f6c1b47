//! Ingest-and-write pipeline for one connector.
//!
//! [`SinkPipeline::process`] is the boundary the runtime calls once per
//! topic-partition of a poll. It never lets a failure escape into the
//! consumption loop: every outcome is logged here with the batch's topic,
//! partition and offset range, and handed back as a value so callers and
//! tests can inspect it.

use std::sync::Arc;

use topicsink_core::Record;

use crate::config::PipelineConfig;
use crate::decode::FieldListDecoder;
use crate::error::Result;
use crate::ingest::BatchIngestor;
use crate::traits::{BatchSink, MessageDecoder};
use crate::writer::{BatchWriter, WriteOutcome};

pub struct SinkPipeline<D> {
    name: String,
    ingestor: BatchIngestor<D>,
    writer: BatchWriter,
}

impl<D: MessageDecoder> SinkPipeline<D> {
    pub fn new(name: &str, ingestor: BatchIngestor<D>, writer: BatchWriter) -> Self {
        Self {
            name: name.to_string(),
            ingestor,
            writer,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ingest one poll result and write it.
    ///
    /// A malformed poll is dropped whole; a zero-rows item is reported. Both
    /// come back as `Err` after being logged.
    pub async fn process(&self, records: &[Record]) -> Result<WriteOutcome> {
        let batch = match self.ingestor.ingest(records) {
            Ok(batch) => batch,
            Err(e) => {
                tracing::error!(
                    connector = %self.name,
                    error = %e,
                    records = records.len(),
                    "dropping batch that could not be ingested"
                );
                return Err(e);
            }
        };

        match self.writer.write(&batch).await {
            Ok(outcome) => {
                tracing::debug!(
                    connector = %self.name,
                    outcome = outcome.label(),
                    topic = %batch.topic_name(),
                    partition = batch.partition,
                    initial_offset = batch.initial_offset,
                    final_offset = batch.final_offset,
                    items = batch.len(),
                    "batch written"
                );
                Ok(outcome)
            }
            Err(e) => {
                tracing::error!(
                    connector = %self.name,
                    error = %e,
                    topic = %batch.topic_name(),
                    partition = batch.partition,
                    initial_offset = batch.initial_offset,
                    final_offset = batch.final_offset,
                    "batch write failed update assertion"
                );
                Err(e)
            }
        }
    }
}

impl SinkPipeline<FieldListDecoder> {
    /// Build a pipeline that projects JSON payloads onto `message.fields`.
    pub fn from_config(
        name: &str,
        config: PipelineConfig,
        sink: Arc<dyn BatchSink>,
    ) -> Result<Self> {
        let decoder = FieldListDecoder::new(config.message_fields)?;
        let ingestor = BatchIngestor::new(config.filter_key, decoder);
        let writer = BatchWriter::new(sink, config.writer);
        Ok(Self::new(name, ingestor, writer))
    }
}

/// Group a poll by topic-partition.
///
/// Groups come out in order of each partition's first record; records keep
/// their poll order within a group.
pub fn group_by_partition(records: Vec<Record>) -> Vec<Vec<Record>> {
    let mut groups: Vec<Vec<Record>> = Vec::new();
    for record in records {
        match groups.iter_mut().find(|g| g[0].same_partition(&record)) {
            Some(group) => group.push(record),
            None => groups.push(vec![record]),
        }
    }
    groups
}
