//! Connector runtime for managing the lifecycle of connector instances.
//!
//! The `ConnectorRuntime` spawns each connector as a background tokio task
//! that polls a [`LogSource`], hands every topic-partition of the poll to a
//! [`SinkPipeline`] and then commits the poll back to the source. Write
//! outcomes never stop the loop; they are logged by the pipeline and the
//! records are committed regardless. Connectors can be paused, resumed and
//! stopped through control signals.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::{ConnectorConfig, ConnectorState};
use crate::error::{ConnectorError, Result};
use crate::pipeline::{group_by_partition, SinkPipeline};
use crate::traits::{LogSource, MessageDecoder};

const IDLE_BACKOFF: Duration = Duration::from_millis(100);
const POLL_ERROR_BACKOFF: Duration = Duration::from_millis(1000);

/// Control signals sent from the runtime to a running connector task.
#[derive(Debug)]
enum ControlSignal {
    Pause,
    Resume,
    Stop,
}

struct ConnectorHandle {
    join_handle: JoinHandle<()>,
    control_tx: mpsc::Sender<ControlSignal>,
    state: ConnectorState,
}

/// Runtime that manages the lifecycle of connector instances.
///
/// # Example
///
/// ```ignore
/// use topicsink_connectors::runtime::ConnectorRuntime;
///
/// let mut runtime = ConnectorRuntime::new();
/// runtime.start_connector(config, source, pipeline).await?;
/// runtime.pause("orders-to-db")?;
/// runtime.resume("orders-to-db")?;
/// runtime.stop("orders-to-db").await?;
/// ```
pub struct ConnectorRuntime {
    connectors: HashMap<String, ConnectorHandle>,
}

impl ConnectorRuntime {
    pub fn new() -> Self {
        Self {
            connectors: HashMap::new(),
        }
    }

    /// Start the source and spawn the consumption loop for one connector.
    pub async fn start_connector<D>(
        &mut self,
        config: ConnectorConfig,
        mut source: Box<dyn LogSource>,
        pipeline: SinkPipeline<D>,
    ) -> Result<()>
    where
        D: MessageDecoder + 'static,
    {
        let name = config.name.clone();

        if self.connectors.contains_key(&name) {
            return Err(ConnectorError::RuntimeError(format!(
                "connector '{}' is already running",
                name
            )));
        }

        source.start().await?;
        tracing::info!(
            connector = %name,
            source = %source.name(),
            topics = ?config.topics,
            "connector started"
        );

        let (control_tx, control_rx) = mpsc::channel::<ControlSignal>(16);
        let join_handle = tokio::spawn(run_loop(name.clone(), source, pipeline, control_rx));

        self.connectors.insert(
            name,
            ConnectorHandle {
                join_handle,
                control_tx,
                state: ConnectorState::Running,
            },
        );

        Ok(())
    }

    /// Send a pause signal to a running connector.
    pub fn pause(&mut self, name: &str) -> Result<()> {
        let handle = self.handle_mut(name)?;

        if handle.state != ConnectorState::Running {
            return Err(ConnectorError::RuntimeError(format!(
                "connector '{}' is not running (state: {})",
                name, handle.state
            )));
        }

        handle
            .control_tx
            .try_send(ControlSignal::Pause)
            .map_err(|e| ConnectorError::RuntimeError(format!("failed to send pause: {}", e)))?;

        handle.state = ConnectorState::Paused;
        Ok(())
    }

    /// Send a resume signal to a paused connector.
    pub fn resume(&mut self, name: &str) -> Result<()> {
        let handle = self.handle_mut(name)?;

        if handle.state != ConnectorState::Paused {
            return Err(ConnectorError::RuntimeError(format!(
                "connector '{}' is not paused (state: {})",
                name, handle.state
            )));
        }

        handle
            .control_tx
            .try_send(ControlSignal::Resume)
            .map_err(|e| ConnectorError::RuntimeError(format!("failed to send resume: {}", e)))?;

        handle.state = ConnectorState::Running;
        Ok(())
    }

    /// Stop a connector and wait for its task to finish.
    pub async fn stop(&mut self, name: &str) -> Result<()> {
        let handle = self
            .connectors
            .remove(name)
            .ok_or_else(|| not_found(name))?;

        let _ = handle.control_tx.send(ControlSignal::Stop).await;
        handle
            .join_handle
            .await
            .map_err(|e| {
                ConnectorError::RuntimeError(format!("connector '{}' task failed: {}", name, e))
            })?;

        Ok(())
    }

    /// Stop every managed connector.
    pub async fn stop_all(&mut self) -> Result<()> {
        let names: Vec<String> = self.connectors.keys().cloned().collect();
        for name in names {
            self.stop(&name).await?;
        }
        Ok(())
    }

    pub fn state(&self, name: &str) -> Option<ConnectorState> {
        self.connectors.get(name).map(|h| h.state)
    }

    pub fn connector_names(&self) -> Vec<&str> {
        self.connectors.keys().map(|s| s.as_str()).collect()
    }

    fn handle_mut(&mut self, name: &str) -> Result<&mut ConnectorHandle> {
        self.connectors.get_mut(name).ok_or_else(|| not_found(name))
    }
}

impl Default for ConnectorRuntime {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(name: &str) -> ConnectorError {
    ConnectorError::RuntimeError(format!("connector '{}' not found", name))
}

async fn run_loop<D: MessageDecoder>(
    name: String,
    mut source: Box<dyn LogSource>,
    pipeline: SinkPipeline<D>,
    mut control_rx: mpsc::Receiver<ControlSignal>,
) {
    let mut paused = false;

    loop {
        match control_rx.try_recv() {
            Ok(ControlSignal::Stop) => {
                tracing::info!(connector = %name, "stopping connector");
                if let Err(e) = source.stop().await {
                    tracing::error!(connector = %name, error = %e, "error stopping source");
                }
                break;
            }
            Ok(ControlSignal::Pause) => {
                tracing::info!(connector = %name, "pausing connector");
                paused = true;
            }
            Ok(ControlSignal::Resume) => {
                tracing::info!(connector = %name, "resuming connector");
                paused = false;
            }
            Err(mpsc::error::TryRecvError::Empty) => {}
            Err(mpsc::error::TryRecvError::Disconnected) => {
                tracing::warn!(connector = %name, "control channel closed, stopping");
                let _ = source.stop().await;
                break;
            }
        }

        if paused {
            tokio::time::sleep(IDLE_BACKOFF).await;
            continue;
        }

        let records = match source.poll().await {
            Ok(records) if records.is_empty() => {
                tokio::time::sleep(IDLE_BACKOFF).await;
                continue;
            }
            Ok(records) => records,
            Err(e) => {
                tracing::error!(connector = %name, error = %e, "error polling log source");
                tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                continue;
            }
        };

        let groups = group_by_partition(records);
        for group in &groups {
            // Outcomes are logged by the pipeline.
            let _ = pipeline.process(group).await;
        }

        let consumed: Vec<_> = groups.into_iter().flatten().collect();
        if let Err(e) = source.commit(&consumed).await {
            tracing::error!(
                connector = %name,
                error = %e,
                records = consumed.len(),
                "error committing records"
            );
        }
    }
}
