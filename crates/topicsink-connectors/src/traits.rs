//! Collaborator traits for the topicsink pipeline.
//!
//! The pipeline itself only filters, decodes and writes. Reading the log,
//! decoding payloads and executing SQL are delegated to implementations of
//! the traits here:
//!
//! - [`LogSource`]: delivers polls of records and commits them afterwards.
//! - [`MessageDecoder`]: turns a record value into a typed message.
//! - [`BatchSink`]: executes one named-parameter statement for a set of rows.

use async_trait::async_trait;
use topicsink_core::{AttributeMap, Record, ToAttributes};

use crate::error::Result;
use crate::statement::NamedStatement;

/// A partitioned log the runtime polls for records.
///
/// Commits are the source's concern: the runtime calls [`commit`] once a poll
/// has been handed to the pipeline, whatever the write outcome was.
///
/// [`commit`]: LogSource::commit
#[async_trait]
pub trait LogSource: Send {
    /// Connect and subscribe.
    async fn start(&mut self) -> Result<()>;

    /// Poll for the next records.
    ///
    /// Returns an empty vec when nothing is available. Records of one
    /// topic-partition appear in offset order.
    async fn poll(&mut self) -> Result<Vec<Record>>;

    /// Mark the given records as consumed.
    async fn commit(&mut self, records: &[Record]) -> Result<()>;

    /// Gracefully shut down the source.
    async fn stop(&mut self) -> Result<()>;

    /// Return the unique name of this source instance.
    fn name(&self) -> &str;
}

/// Decodes a raw record value into a message.
pub trait MessageDecoder: Send + Sync {
    type Message: ToAttributes;

    fn decode(&self, value: &[u8]) -> Result<Self::Message>;
}

/// A relational sink that executes one statement against many parameter sets.
#[async_trait]
pub trait BatchSink: Send + Sync {
    /// Execute `statement` once per item as one atomic unit.
    ///
    /// Either every item is applied and one affected-row count per item is
    /// returned, in item order, or the whole batch is rejected with an error.
    /// Implementations are free to send the items in one round trip or one
    /// per item; only the all-or-nothing outcome is required.
    async fn execute_batch(
        &self,
        statement: &NamedStatement,
        items: &[AttributeMap],
    ) -> Result<Vec<u64>>;

    /// Return the name of this sink, used in diagnostics.
    fn name(&self) -> &str;

    /// Release connections. Called once at shutdown.
    async fn close(&self) {}
}
