//! Batch Writer
//!
//! Persists a [`Batch`] with one named-parameter statement, batch first and
//! record by record only if the batch is rejected.
//!
//! ## Write path
//!
//! ```text
//! Received ──► BatchAttempted ──┬─► Succeeded          (sink accepted the batch)
//!                               ├─► PartiallyRescued   (rejected, retried per item)
//!                               └─► Dropped            (rejected, retry disabled)
//! ```
//!
//! - An empty batch never reaches the sink.
//! - Exactly one batch execution is attempted first: one statement, one
//!   parameter set per item, one sink call.
//! - If the sink rejects the batch and `retry_on_error_in_batch_writing` is
//!   set, each item is written on its own, in order. A failing item is logged
//!   and recorded; it never stops the items after it.
//! - If the sink accepts the batch and `assert_updates` is set, the first
//!   item that affected zero rows is returned as
//!   [`ConnectorError::NoRowsAffected`].
//!
//! ## Configuration
//!
//! | Key                               | Description                          | Default  |
//! |-----------------------------------|--------------------------------------|----------|
//! | `sql`                             | Statement with `:name` parameters    | required |
//! | `assert.updates`                  | Fail items that update no rows       | `true`   |
//! | `retry.on.error.in.batch.writing` | Retry a rejected batch item by item  | `false`  |
//! | `sink.timeout.ms`                 | Deadline for each sink call          | (none)   |

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use topicsink_core::{AttributeMap, Batch};

use crate::config::{optional_bool, optional_u64, required};
use crate::error::{ConnectorError, Result};
use crate::statement::NamedStatement;
use crate::traits::BatchSink;

/// Parsed configuration for the batch writer.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    pub statement: NamedStatement,
    pub assert_updates: bool,
    pub retry_on_error_in_batch_writing: bool,
    /// Deadline for each sink call. `None` waits for as long as the sink takes.
    pub sink_timeout: Option<Duration>,
}

impl WriterConfig {
    pub fn new(sql: &str) -> Result<Self> {
        Ok(Self {
            statement: NamedStatement::parse(sql)?,
            assert_updates: true,
            retry_on_error_in_batch_writing: false,
            sink_timeout: None,
        })
    }

    /// Parse a `WriterConfig` from a string key-value map.
    pub fn from_config_map(config: &HashMap<String, String>) -> Result<Self> {
        let sql = required(config, "sql")?;
        let mut parsed = Self::new(sql)?;

        if let Some(v) = optional_bool(config, "assert.updates")? {
            parsed.assert_updates = v;
        }
        if let Some(v) = optional_bool(config, "retry.on.error.in.batch.writing")? {
            parsed.retry_on_error_in_batch_writing = v;
        }
        parsed.sink_timeout = optional_u64(config, "sink.timeout.ms")?.map(Duration::from_millis);

        Ok(parsed)
    }

    pub fn with_assert_updates(mut self, assert_updates: bool) -> Self {
        self.assert_updates = assert_updates;
        self
    }

    pub fn with_retry_on_error(mut self, retry: bool) -> Self {
        self.retry_on_error_in_batch_writing = retry;
        self
    }

    pub fn with_sink_timeout(mut self, timeout: Duration) -> Self {
        self.sink_timeout = Some(timeout);
        self
    }
}

/// One item that could not be rescued after its batch was rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct RescueFailure {
    /// Position of the item within its batch
    pub index: usize,
    pub item: AttributeMap,
    pub reason: String,
}

/// Terminal state of one batch write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// The batch had no items; the sink was not called.
    Skipped,
    /// The sink accepted the whole batch.
    Succeeded { rows: u64 },
    /// The batch was rejected and its items were retried one by one.
    PartiallyRescued {
        written: usize,
        failures: Vec<RescueFailure>,
    },
    /// The batch was rejected and nothing was written.
    Dropped { reason: String },
}

impl WriteOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            WriteOutcome::Skipped => "skipped",
            WriteOutcome::Succeeded { .. } => "succeeded",
            WriteOutcome::PartiallyRescued { .. } => "partially_rescued",
            WriteOutcome::Dropped { .. } => "dropped",
        }
    }
}

pub struct BatchWriter {
    sink: Arc<dyn BatchSink>,
    config: WriterConfig,
}

impl BatchWriter {
    pub fn new(sink: Arc<dyn BatchSink>, config: WriterConfig) -> Self {
        Self { sink, config }
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Write one batch.
    ///
    /// Sink failures are reported through the returned [`WriteOutcome`]; the
    /// only error is a zero-rows item in an accepted batch.
    pub async fn write(&self, batch: &Batch) -> Result<WriteOutcome> {
        if batch.is_empty() {
            return Ok(WriteOutcome::Skipped);
        }

        let counts = match self.execute(&batch.items).await {
            Ok(counts) => counts,
            Err(e) if self.config.retry_on_error_in_batch_writing => {
                tracing::error!(
                    sink = %self.sink.name(),
                    error = %e,
                    items = batch.len(),
                    "error writing batch, retrying records individually"
                );
                return Ok(self.rescue(batch).await);
            }
            Err(e) => {
                tracing::error!(
                    sink = %self.sink.name(),
                    error = %e,
                    initial_offset = batch.initial_offset,
                    final_offset = batch.final_offset,
                    topic = %batch.topic_name(),
                    partition = batch.partition,
                    "error writing records, batch dropped"
                );
                return Ok(WriteOutcome::Dropped {
                    reason: e.to_string(),
                });
            }
        };

        if self.config.assert_updates {
            check_update_counts(&counts, &batch.items)?;
        }

        Ok(WriteOutcome::Succeeded {
            rows: counts.iter().sum(),
        })
    }

    async fn rescue(&self, batch: &Batch) -> WriteOutcome {
        let mut written = 0;
        let mut failures = Vec::new();

        for (index, item) in batch.items.iter().enumerate() {
            match self.write_individual(item).await {
                Ok(()) => written += 1,
                Err(e) => {
                    tracing::error!(
                        sink = %self.sink.name(),
                        error = %e,
                        index,
                        record = %item,
                        initial_offset = batch.initial_offset,
                        final_offset = batch.final_offset,
                        topic = %batch.topic_name(),
                        partition = batch.partition,
                        "error writing record individually"
                    );
                    failures.push(RescueFailure {
                        index,
                        item: item.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        WriteOutcome::PartiallyRescued { written, failures }
    }

    async fn write_individual(&self, item: &AttributeMap) -> Result<()> {
        let items = std::slice::from_ref(item);
        let counts = self.execute(items).await?;
        if self.config.assert_updates {
            check_update_counts(&counts, items)?;
        }
        Ok(())
    }

    async fn execute(&self, items: &[AttributeMap]) -> Result<Vec<u64>> {
        let call = self.sink.execute_batch(&self.config.statement, items);
        let counts = match self.config.sink_timeout {
            Some(deadline) => tokio::time::timeout(deadline, call)
                .await
                .map_err(|_| ConnectorError::Timeout(deadline))??,
            None => call.await?,
        };

        if counts.len() != items.len() {
            return Err(ConnectorError::SinkError(format!(
                "sink reported {} update counts for {} items",
                counts.len(),
                items.len()
            )));
        }
        Ok(counts)
    }
}

/// Fail on the first item whose statement affected no rows.
fn check_update_counts(counts: &[u64], items: &[AttributeMap]) -> Result<()> {
    match counts.iter().position(|&c| c == 0) {
        Some(index) => Err(ConnectorError::NoRowsAffected {
            index,
            total: counts.len(),
            item: items[index].to_string(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::TracingCapture;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tracing::Level;

    /// What the scripted sink does on one call.
    enum Step {
        Counts(Vec<u64>),
        Fail(&'static str),
        Hang,
    }

    /// A sink that replays scripted responses and records every call.
    struct ScriptedSink {
        steps: Mutex<VecDeque<Step>>,
        calls: Arc<Mutex<Vec<Vec<AttributeMap>>>>,
    }

    impl ScriptedSink {
        fn new(steps: Vec<Step>) -> (Arc<Self>, Arc<Mutex<Vec<Vec<AttributeMap>>>>) {
            let calls = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::new(Self {
                steps: Mutex::new(steps.into()),
                calls: calls.clone(),
            });
            (sink, calls)
        }
    }

    #[async_trait]
    impl BatchSink for ScriptedSink {
        async fn execute_batch(
            &self,
            _statement: &NamedStatement,
            items: &[AttributeMap],
        ) -> Result<Vec<u64>> {
            self.calls.lock().unwrap().push(items.to_vec());
            let step = self.steps.lock().unwrap().pop_front();
            match step {
                Some(Step::Counts(c)) => Ok(c),
                Some(Step::Fail(msg)) => Err(ConnectorError::SinkError(msg.to_string())),
                Some(Step::Hang) => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(vec![])
                }
                None => Ok(vec![1; items.len()]),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn item(id: i64) -> AttributeMap {
        AttributeMap::new().with("id", id)
    }

    fn batch(ids: &[i64]) -> Batch {
        Batch {
            items: ids.iter().map(|&id| item(id)).collect(),
            initial_offset: 100,
            final_offset: 100 + ids.len() as i64 - 1,
            topic: Some("orders".to_string()),
            partition: 3,
        }
    }

    fn writer(sink: Arc<ScriptedSink>, retry: bool, assert_updates: bool) -> BatchWriter {
        let config = WriterConfig::new("UPDATE orders SET seen = 1 WHERE id = :id")
            .unwrap()
            .with_retry_on_error(retry)
            .with_assert_updates(assert_updates);
        BatchWriter::new(sink, config)
    }

    // ---------------------------------------------------------------
    // Batch path
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn test_empty_batch_never_calls_sink() {
        let (sink, calls) = ScriptedSink::new(vec![]);
        let w = writer(sink, true, true);
        assert_eq!(w.write(&Batch::empty()).await.unwrap(), WriteOutcome::Skipped);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_single_batch_call_for_all_items() {
        let (sink, calls) = ScriptedSink::new(vec![Step::Counts(vec![1, 2, 1])]);
        let w = writer(sink, false, true);
        let outcome = w.write(&batch(&[1, 2, 3])).await.unwrap();
        assert_eq!(outcome, WriteOutcome::Succeeded { rows: 4 });

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].len(), 3);
    }

    #[tokio::test]
    async fn test_zero_rows_reports_first_offending_item() {
        let (sink, _) = ScriptedSink::new(vec![Step::Counts(vec![1, 0, 1])]);
        let w = writer(sink, false, true);
        let err = w.write(&batch(&[1, 2, 3])).await.unwrap_err();
        match err {
            ConnectorError::NoRowsAffected { index, total, item } => {
                assert_eq!(index, 1);
                assert_eq!(total, 3);
                assert_eq!(item, "{id=2}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_zero_rows_first_of_many() {
        let (sink, _) = ScriptedSink::new(vec![Step::Counts(vec![1, 1, 0, 0])]);
        let w = writer(sink, false, true);
        let err = w.write(&batch(&[1, 2, 3, 4])).await.unwrap_err();
        assert!(matches!(err, ConnectorError::NoRowsAffected { index: 2, .. }));
    }

    #[tokio::test]
    async fn test_zero_rows_allowed_without_assert() {
        let (sink, _) = ScriptedSink::new(vec![Step::Counts(vec![1, 0, 1])]);
        let w = writer(sink, false, false);
        let outcome = w.write(&batch(&[1, 2, 3])).await.unwrap();
        assert_eq!(outcome, WriteOutcome::Succeeded { rows: 2 });
    }

    #[tokio::test]
    async fn test_zero_rows_does_not_trigger_rescue() {
        let (sink, calls) = ScriptedSink::new(vec![Step::Counts(vec![0, 1])]);
        let w = writer(sink, true, true);
        assert!(w.write(&batch(&[1, 2])).await.is_err());
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    // ---------------------------------------------------------------
    // Failure without retry
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn test_failure_without_retry_drops_batch() {
        let (sink, calls) = ScriptedSink::new(vec![Step::Fail("constraint violation")]);
        let w = writer(sink, false, true);
        let outcome = w.write(&batch(&[1, 2, 3])).await.unwrap();
        match outcome {
            WriteOutcome::Dropped { reason } => assert!(reason.contains("constraint violation")),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    // ---------------------------------------------------------------
    // Rescue path
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn test_rescue_attempts_every_item_in_order() {
        let (sink, calls) = ScriptedSink::new(vec![
            Step::Fail("bad row"),
            Step::Counts(vec![1]),
            Step::Fail("bad row"),
            Step::Counts(vec![1]),
        ]);
        let w = writer(sink, true, true);
        let outcome = w.write(&batch(&[1, 2, 3])).await.unwrap();

        match outcome {
            WriteOutcome::PartiallyRescued { written, failures } => {
                assert_eq!(written, 2);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].index, 1);
                assert_eq!(failures[0].item, item(2));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[1], vec![item(1)]);
        assert_eq!(calls[2], vec![item(2)]);
        assert_eq!(calls[3], vec![item(3)]);
    }

    #[tokio::test]
    async fn test_rescue_first_fails_second_succeeds() {
        let (sink, calls) = ScriptedSink::new(vec![
            Step::Fail("batch rejected"),
            Step::Fail("bad row"),
            Step::Counts(vec![1]),
        ]);
        let w = writer(sink, true, true);
        let outcome = w.write(&batch(&[1, 2])).await.unwrap();

        match outcome {
            WriteOutcome::PartiallyRescued { written, failures } => {
                assert_eq!(written, 1);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].index, 0);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_rescue_swallows_zero_rows() {
        let (sink, calls) = ScriptedSink::new(vec![
            Step::Fail("batch rejected"),
            Step::Counts(vec![0]),
            Step::Counts(vec![1]),
        ]);
        let w = writer(sink, true, true);
        let outcome = w.write(&batch(&[1, 2])).await.unwrap();

        match outcome {
            WriteOutcome::PartiallyRescued { written, failures } => {
                assert_eq!(written, 1);
                assert_eq!(failures[0].index, 0);
                assert!(failures[0].reason.contains("did not update any rows"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_rescue_all_items_fail() {
        let (sink, calls) = ScriptedSink::new(vec![
            Step::Fail("down"),
            Step::Fail("down"),
            Step::Fail("down"),
        ]);
        let w = writer(sink, true, true);
        let outcome = w.write(&batch(&[1, 2])).await.unwrap();
        match outcome {
            WriteOutcome::PartiallyRescued { written, failures } => {
                assert_eq!(written, 0);
                assert_eq!(
                    failures.iter().map(|f| f.index).collect::<Vec<_>>(),
                    vec![0, 1]
                );
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_count_length_mismatch_is_batch_failure() {
        let (sink, calls) = ScriptedSink::new(vec![Step::Counts(vec![1])]);
        let w = writer(sink, false, true);
        let outcome = w.write(&batch(&[1, 2])).await.unwrap();
        assert_eq!(outcome.label(), "dropped");
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    // ---------------------------------------------------------------
    // Log output
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn test_drop_logs_one_error_with_offset_range() {
        let capture = TracingCapture::new();
        let (sink, _) = ScriptedSink::new(vec![Step::Fail("constraint violation")]);
        let w = writer(sink, false, true);
        w.write(&batch(&[1, 2, 3])).await.unwrap();

        let errors = capture.at(Level::ERROR);
        assert_eq!(errors.len(), 1, "{errors:?}");
        let event = &errors[0];
        assert_eq!(event.field("initial_offset"), Some("100"));
        assert_eq!(event.field("final_offset"), Some("102"));
        assert_eq!(event.field("topic"), Some("orders"));
        assert_eq!(event.field("partition"), Some("3"));
        assert!(event.field("error").unwrap().contains("constraint violation"));
        assert!(capture.at(Level::WARN).is_empty());
    }

    #[tokio::test]
    async fn test_rescue_logs_each_failed_item() {
        let capture = TracingCapture::new();
        let (sink, _) = ScriptedSink::new(vec![
            Step::Fail("batch rejected"),
            Step::Fail("bad row"),
            Step::Counts(vec![1]),
            Step::Counts(vec![0]),
        ]);
        let w = writer(sink, true, true);
        w.write(&batch(&[1, 2, 3])).await.unwrap();

        let item_failures: Vec<_> = capture
            .at(Level::ERROR)
            .into_iter()
            .filter(|e| e.message() == "error writing record individually")
            .collect();
        assert_eq!(item_failures.len(), 2);
        assert_eq!(item_failures[0].field("index"), Some("0"));
        assert_eq!(item_failures[0].field("record"), Some("{id=1}"));
        assert_eq!(item_failures[1].field("index"), Some("2"));
        assert_eq!(item_failures[1].field("record"), Some("{id=3}"));
        for event in &item_failures {
            assert_eq!(event.field("initial_offset"), Some("100"));
            assert_eq!(event.field("final_offset"), Some("102"));
        }

        // One batch-level event, then one per failed item.
        assert_eq!(capture.at(Level::ERROR).len(), 3);
    }

    #[tokio::test]
    async fn test_successful_batch_logs_no_problems() {
        let capture = TracingCapture::new();
        let (sink, _) = ScriptedSink::new(vec![Step::Counts(vec![1, 1])]);
        let w = writer(sink, true, true);
        w.write(&batch(&[1, 2])).await.unwrap();
        assert!(capture.problems().is_empty());
    }

    // ---------------------------------------------------------------
    // Deadlines
    // ---------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_sink_timeout_is_batch_failure() {
        let (sink, _) = ScriptedSink::new(vec![Step::Hang]);
        let config = WriterConfig::new("UPDATE t SET a = 1 WHERE id = :id")
            .unwrap()
            .with_sink_timeout(Duration::from_millis(50));
        let w = BatchWriter::new(sink, config);

        let outcome = w.write(&batch(&[1])).await.unwrap();
        match outcome {
            WriteOutcome::Dropped { reason } => assert!(reason.contains("timed out")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sink_timeout_rescues_remaining_items() {
        let (sink, _) = ScriptedSink::new(vec![Step::Hang, Step::Hang, Step::Counts(vec![1])]);
        let config = WriterConfig::new("UPDATE t SET a = 1 WHERE id = :id")
            .unwrap()
            .with_retry_on_error(true)
            .with_sink_timeout(Duration::from_millis(50));
        let w = BatchWriter::new(sink, config);

        let outcome = w.write(&batch(&[1, 2])).await.unwrap();
        assert!(matches!(
            outcome,
            WriteOutcome::PartiallyRescued { written: 1, .. }
        ));
    }

    // ---------------------------------------------------------------
    // Config parsing
    // ---------------------------------------------------------------

    fn base_config_map() -> HashMap<String, String> {
        let mut m = HashMap::new();
        m.insert("sql".to_string(), "UPDATE t SET v = :v WHERE id = :id".to_string());
        m
    }

    #[test]
    fn test_config_defaults() {
        let config = WriterConfig::from_config_map(&base_config_map()).unwrap();
        assert!(config.assert_updates);
        assert!(!config.retry_on_error_in_batch_writing);
        assert!(config.sink_timeout.is_none());
        assert_eq!(config.statement.sql(), "UPDATE t SET v = $1 WHERE id = $2");
    }

    #[test]
    fn test_config_all_options() {
        let mut m = base_config_map();
        m.insert("assert.updates".to_string(), "false".to_string());
        m.insert("retry.on.error.in.batch.writing".to_string(), "TRUE".to_string());
        m.insert("sink.timeout.ms".to_string(), "1500".to_string());

        let config = WriterConfig::from_config_map(&m).unwrap();
        assert!(!config.assert_updates);
        assert!(config.retry_on_error_in_batch_writing);
        assert_eq!(config.sink_timeout, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_config_missing_sql() {
        let err = WriterConfig::from_config_map(&HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("sql"));
    }

    #[test]
    fn test_config_invalid_bool() {
        let mut m = base_config_map();
        m.insert("assert.updates".to_string(), "maybe".to_string());
        assert!(WriterConfig::from_config_map(&m).is_err());
    }
}
