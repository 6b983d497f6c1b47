//! Topicsink Agent
//!
//! Environment-driven configuration for the standalone `topicsink-agent`
//! process, which runs a single Kafka-to-SQL connector.

pub mod error;

use std::collections::HashMap;

use topicsink_connectors::{ConnectorConfig, PipelineConfig};

pub use error::{AgentError, Result};

/// Environment variables copied verbatim into the connector config map.
const PASSTHROUGH: &[(&str, &str)] = &[
    ("KAFKA_BOOTSTRAP_SERVERS", "bootstrap.servers"),
    ("KAFKA_TOPICS", "topics"),
    ("KAFKA_GROUP_ID", "group.id"),
    ("KAFKA_AUTO_OFFSET_RESET", "auto.offset.reset"),
    ("KAFKA_MAX_POLL_RECORDS", "max.poll.records"),
    ("KAFKA_POLL_TIMEOUT_MS", "poll.timeout.ms"),
    ("KAFKA_SECURITY_PROTOCOL", "security.protocol"),
    ("KAFKA_SASL_MECHANISM", "sasl.mechanism"),
    ("KAFKA_SASL_USERNAME", "sasl.username"),
    ("KAFKA_SASL_PASSWORD", "sasl.password"),
    ("TOPICSINK_TOPIC_KEY", "topic.key"),
    ("TOPICSINK_SQL", "sql"),
    ("TOPICSINK_MESSAGE_FIELDS", "message.fields"),
    ("TOPICSINK_ASSERT_UPDATES", "assert.updates"),
    ("TOPICSINK_RETRY_ON_ERROR", "retry.on.error.in.batch.writing"),
    ("TOPICSINK_SINK_TIMEOUT_MS", "sink.timeout.ms"),
];

const DEFAULT_CONNECTOR_NAME: &str = "topicsink";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Everything the agent binary needs to start one connector.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub connector: ConnectorConfig,
    pub pipeline: PipelineConfig,
    pub database_url: String,
    pub max_connections: u32,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from any variable lookup.
    ///
    /// `TOPICSINK_MESSAGE_FIELDS` is required here: the agent has no typed
    /// message to decode into, so payloads are projected onto those fields.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = HashMap::new();
        for (var, key) in PASSTHROUGH {
            if let Some(value) = lookup(var) {
                config.insert(key.to_string(), value);
            }
        }

        if !config.contains_key("message.fields") {
            return Err(AgentError::MissingVariable("TOPICSINK_MESSAGE_FIELDS"));
        }
        let pipeline = PipelineConfig::from_config_map(&config)?;

        let database_url =
            lookup("DATABASE_URL").ok_or(AgentError::MissingVariable("DATABASE_URL"))?;

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| AgentError::InvalidVariable {
                    name: "DATABASE_MAX_CONNECTIONS",
                    reason: format!("'{}' is not a positive integer", raw),
                })?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let topics = config
            .get("topics")
            .map(|t| {
                t.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let name = lookup("TOPICSINK_CONNECTOR_NAME")
            .unwrap_or_else(|| DEFAULT_CONNECTOR_NAME.to_string());

        Ok(Self {
            connector: ConnectorConfig {
                name,
                topics,
                config,
            },
            pipeline,
            database_url,
            max_connections,
        })
    }
}
