//! Configuration types for topicsink connectors.
//!
//! A connector is declared by a [`ConnectorConfig`]: a name, the topics it
//! reads, and a flat string map that the pipeline, writer and source each
//! parse their own keys from.
//!
//! ## Pipeline keys
//!
//! | Key              | Description                                   | Default  |
//! |------------------|-----------------------------------------------|----------|
//! | `topic.key`      | Only records with this key are written        | required |
//! | `message.fields` | Comma-separated fields projected from JSON    | (none)   |
//!
//! Writer keys are documented in [`crate::writer`], Kafka keys in the Kafka
//! source module.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{ConnectorError, Result};
use crate::writer::WriterConfig;

/// Top-level configuration for a connector instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Unique name identifying this connector instance.
    pub name: String,

    /// Topics this connector reads from.
    pub topics: Vec<String>,

    /// Key-value configuration for the pipeline, writer and source.
    #[serde(default)]
    pub config: HashMap<String, String>,
}

/// Runtime state of a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectorState {
    Running,
    Paused,
    Stopped,
}

impl std::fmt::Display for ConnectorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectorState::Running => write!(f, "RUNNING"),
            ConnectorState::Paused => write!(f, "PAUSED"),
            ConnectorState::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// Parsed configuration for one ingest-and-write pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub filter_key: String,
    /// Fields to project when no compiled message type is used.
    pub message_fields: Vec<String>,
    pub writer: WriterConfig,
}

impl PipelineConfig {
    /// Parse a `PipelineConfig` from a string key-value map.
    ///
    /// Required keys: `topic.key`, `sql`.
    pub fn from_config_map(config: &HashMap<String, String>) -> Result<Self> {
        let filter_key = required(config, "topic.key")?.to_string();
        let message_fields = optional_list(config, "message.fields");
        let writer = WriterConfig::from_config_map(config)?;

        Ok(PipelineConfig {
            filter_key,
            message_fields,
            writer,
        })
    }
}

/// Fetch a key that must be present and non-blank.
pub(crate) fn required<'a>(config: &'a HashMap<String, String>, key: &str) -> Result<&'a str> {
    let value = config
        .get(key)
        .ok_or_else(|| ConnectorError::ConfigError(format!("missing required '{}'", key)))?;

    if value.trim().is_empty() {
        return Err(ConnectorError::ConfigError(format!(
            "'{}' must not be empty",
            key
        )));
    }
    Ok(value)
}

pub(crate) fn optional_bool(config: &HashMap<String, String>, key: &str) -> Result<Option<bool>> {
    config
        .get(key)
        .map(|s| match s.trim().to_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(ConnectorError::ConfigError(format!(
                "invalid {} '{}': must be 'true' or 'false'",
                key, other
            ))),
        })
        .transpose()
}

pub(crate) fn optional_u64(config: &HashMap<String, String>, key: &str) -> Result<Option<u64>> {
    config
        .get(key)
        .map(|s| {
            s.trim()
                .parse::<u64>()
                .map_err(|e| ConnectorError::ConfigError(format!("invalid {}: {}", key, e)))
        })
        .transpose()
}

/// Split a comma-separated value, dropping blank entries.
pub(crate) fn optional_list(config: &HashMap<String, String>, key: &str) -> Vec<String> {
    config
        .get(key)
        .map(|s| {
            s.split(',')
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty())
                .collect()
        })
        .unwrap_or_default()
}
