//! In-memory log source.
//!
//! Each pushed poll is returned by one call to `poll()`, in push order.
//! Committed offsets are tracked per topic-partition and can be read through
//! a shared handle while the source is owned by a running connector.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use topicsink_core::Record;

use crate::config::ConnectorState;
use crate::error::{ConnectorError, Result};
use crate::traits::LogSource;

/// Next offset to read, per `(topic, partition)`.
pub type CommittedOffsets = Arc<Mutex<BTreeMap<(String, i32), i64>>>;

pub struct MemoryLogSource {
    name: String,
    state: ConnectorState,
    polls: Arc<Mutex<VecDeque<Vec<Record>>>>,
    committed: CommittedOffsets,
}

impl MemoryLogSource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: ConnectorState::Stopped,
            polls: Arc::new(Mutex::new(VecDeque::new())),
            committed: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Queue records to be returned by a future `poll()`.
    pub fn push_poll(&self, records: Vec<Record>) {
        self.polls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(records);
    }

    /// Handle for queueing polls after the source has been handed off.
    pub fn poll_queue(&self) -> Arc<Mutex<VecDeque<Vec<Record>>>> {
        Arc::clone(&self.polls)
    }

    /// Handle to the committed offsets.
    pub fn committed(&self) -> CommittedOffsets {
        Arc::clone(&self.committed)
    }

    pub fn connector_state(&self) -> ConnectorState {
        self.state
    }
}

#[async_trait]
impl LogSource for MemoryLogSource {
    async fn start(&mut self) -> Result<()> {
        if self.state == ConnectorState::Running {
            return Err(ConnectorError::SourceError(
                "source is already running".to_string(),
            ));
        }
        self.state = ConnectorState::Running;
        Ok(())
    }

    async fn poll(&mut self) -> Result<Vec<Record>> {
        if self.state != ConnectorState::Running {
            return Err(ConnectorError::SourceError(
                "source is not running".to_string(),
            ));
        }
        let next = self
            .polls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        Ok(next.unwrap_or_default())
    }

    async fn commit(&mut self, records: &[Record]) -> Result<()> {
        let mut committed = self.committed.lock().unwrap_or_else(|e| e.into_inner());
        for record in records {
            let next = committed
                .entry((record.topic.clone(), record.partition))
                .or_insert(0);
            *next = (*next).max(record.offset + 1);
        }
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.state = ConnectorState::Stopped;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
