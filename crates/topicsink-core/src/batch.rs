//! Batches
//!
//! A `Batch` is what one poll cycle hands to the writer: the attribute maps
//! that decoded successfully, plus the identity and offset range of the
//! records they were derived from.
//!
//! The offset range describes what was *read*, not what was *written*. It is
//! taken from the key-matching records before decoding, so a record that
//! fails to decode shrinks `items` without moving either bound.

use std::fmt;

use crate::attributes::AttributeMap;

/// Offset and partition sentinel for a batch with no key-matching records.
pub const NO_OFFSET: i64 = -1;

#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Rows to persist, in record order
    pub items: Vec<AttributeMap>,

    /// Offset of the first key-matching record
    pub initial_offset: i64,

    /// Offset of the last key-matching record
    pub final_offset: i64,

    /// Topic the records were read from, `None` for an empty batch
    pub topic: Option<String>,

    /// Partition the records were read from
    pub partition: i32,
}

impl Batch {
    /// A batch with no items and sentinel offsets.
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            initial_offset: NO_OFFSET,
            final_offset: NO_OFFSET,
            topic: None,
            partition: NO_OFFSET as i32,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Topic name for diagnostics, empty when the batch carries no records.
    pub fn topic_name(&self) -> &str {
        self.topic.as_deref().unwrap_or("")
    }

    /// `[initial_offset, final_offset]`
    pub fn offset_range(&self) -> (i64, i64) {
        (self.initial_offset, self.final_offset)
    }
}

impl Default for Batch {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] offsets {}..={} ({} items)",
            self.topic_name(),
            self.partition,
            self.initial_offset,
            self.final_offset,
            self.items.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_batch_uses_sentinels() {
        let batch = Batch::empty();
        assert!(batch.is_empty());
        assert_eq!(batch.offset_range(), (NO_OFFSET, NO_OFFSET));
        assert_eq!(batch.partition, -1);
        assert!(batch.topic.is_none());
        assert_eq!(batch.topic_name(), "");
        assert_eq!(Batch::default(), batch);
    }

    #[test]
    fn test_display() {
        let batch = Batch {
            items: vec![AttributeMap::new().with("id", 1i64)],
            initial_offset: 10,
            final_offset: 12,
            topic: Some("orders".to_string()),
            partition: 2,
        };
        assert_eq!(batch.to_string(), "orders[2] offsets 10..=12 (1 items)");
        assert_eq!(batch.len(), 1);
    }
}
