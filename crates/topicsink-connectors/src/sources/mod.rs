//! Log source implementations.
//!
//! - `MemoryLogSource` - replays pre-built polls; used by tests and demos.
//! - `KafkaLogSource` - consumes from Kafka via `rdkafka` (feature `kafka`).

pub mod memory;

#[cfg(feature = "kafka")]
pub mod kafka;

pub use memory::MemoryLogSource;

#[cfg(feature = "kafka")]
pub use kafka::{KafkaLogSource, KafkaSourceConfig};
