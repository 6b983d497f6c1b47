//! Record Data Structure
//!
//! A `Record` is one keyed event read from a partitioned log: the unit the
//! ingestor filters, decodes and turns into a row.
//!
//! ## Structure
//! - **key**: routing key; only records carrying the configured key are written
//! - **value**: the raw payload, decoded by a `MessageDecoder`
//! - **topic** / **partition**: where the record was read from
//! - **offset**: position within the partition, monotonically increasing
//!
//! Records are immutable once read. Offsets are `i64` to match the log's own
//! offset type, which reserves negative values for "no offset".

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A single record read from the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Record key, absent for unkeyed records
    pub key: Option<String>,

    /// Value (payload)
    pub value: Bytes,

    /// Topic the record was read from
    pub topic: String,

    /// Partition within the topic
    pub partition: i32,

    /// Offset of this record in the partition
    pub offset: i64,
}

impl Record {
    pub fn new(
        topic: impl Into<String>,
        partition: i32,
        offset: i64,
        key: Option<String>,
        value: Bytes,
    ) -> Self {
        Self {
            key,
            value,
            topic: topic.into(),
            partition,
            offset,
        }
    }

    /// Whether this record's key equals `key`. Unkeyed records never match.
    pub fn has_key(&self, key: &str) -> bool {
        self.key.as_deref() == Some(key)
    }

    /// Whether both records were read from the same topic-partition.
    pub fn same_partition(&self, other: &Record) -> bool {
        self.partition == other.partition && self.topic == other.topic
    }
}
