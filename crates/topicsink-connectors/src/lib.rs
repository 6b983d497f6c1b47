//! Topicsink Connectors
//!
//! Consumes keyed records from a partitioned log, decodes the ones whose key
//! matches a configured filter key, and writes each poll to a relational
//! database as one batch of a named-parameter SQL statement. When a batch is
//! rejected the writer can fall back to writing its items one at a time.
//!
//! ## Architecture
//!
//! - **Traits**: `LogSource`, `MessageDecoder` and `BatchSink` are the seams.
//! - **Ingest**: `BatchIngestor` filters, decodes and validates a poll into a `Batch`.
//! - **Writer**: `BatchWriter` applies the batch-then-fallback write policy.
//! - **Pipeline**: `SinkPipeline` joins the two and logs every outcome.
//! - **Runtime**: `ConnectorRuntime` drives pipelines as background tasks.
//! - **Sinks**: `SqlxSink` (SQLite) and `PostgresSink` execute statements through `sqlx` pools.
//! - **Sources**: `MemoryLogSource`, and `KafkaLogSource` behind a feature.
//!
//! ## Feature Flags
//!
//! - `kafka` - Enables the Kafka log source (requires `rdkafka`).
//! - `postgres` - Enables `PostgresSink` (requires `sqlx/postgres`).

pub mod config;
pub mod decode;
pub mod error;
pub mod ingest;
pub mod pipeline;
pub mod runtime;
pub mod sinks;
pub mod sources;
pub mod statement;
pub mod traits;
pub mod writer;

#[cfg(test)]
mod test_util;

pub use config::{ConnectorConfig, ConnectorState, PipelineConfig};
pub use decode::{FieldListDecoder, FieldListMessage, JsonDecoder};
pub use error::{ConnectorError, Result};
pub use ingest::BatchIngestor;
pub use pipeline::{group_by_partition, SinkPipeline};
pub use runtime::ConnectorRuntime;
pub use sinks::{is_postgres_url, SqlxSink};
pub use sources::MemoryLogSource;
pub use statement::NamedStatement;
pub use traits::{BatchSink, LogSource, MessageDecoder};
pub use writer::{BatchWriter, RescueFailure, WriteOutcome, WriterConfig};

#[cfg(feature = "kafka")]
pub use sources::{KafkaLogSource, KafkaSourceConfig};

#[cfg(feature = "postgres")]
pub use sinks::PostgresSink;
