//! Kafka log source.
//!
//! Consumes records from an Apache Kafka cluster through an `rdkafka`
//! `StreamConsumer`. Auto-commit is disabled; offsets are committed
//! explicitly by the runtime once a poll has been processed.
//!
//! ## Configuration
//!
//! | Key                   | Description                                    | Default     |
//! |-----------------------|------------------------------------------------|-------------|
//! | `bootstrap.servers`   | Kafka broker addresses                         | required    |
//! | `topics`              | Comma-separated list of topics to subscribe to | required    |
//! | `group.id`            | Consumer group ID                              | required    |
//! | `auto.offset.reset`   | Where to start consuming: `earliest`/`latest`  | `earliest`  |
//! | `max.poll.records`    | Maximum records returned per poll              | `500`       |
//! | `poll.timeout.ms`     | Poll timeout in milliseconds                   | `1000`      |
//! | `security.protocol`   | Security protocol: `PLAINTEXT`, `SASL_SSL`, etc | `PLAINTEXT` |
//! | `sasl.mechanism`      | SASL mechanism (e.g. `PLAIN`, `SCRAM-SHA-256`) | (none)      |
//! | `sasl.username`       | SASL username                                  | (none)      |
//! | `sasl.password`       | SASL password                                  | (none)      |

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rdkafka::{
    consumer::{CommitMode, Consumer, StreamConsumer},
    message::BorrowedMessage,
    ClientConfig, Message, Offset, TopicPartitionList,
};
use topicsink_core::Record;

use crate::config::{optional_u64, required, ConnectorState};
use crate::error::{ConnectorError, Result};
use crate::traits::LogSource;

/// Parsed configuration for the Kafka log source.
#[derive(Debug, Clone)]
pub struct KafkaSourceConfig {
    pub bootstrap_servers: String,
    pub topics: Vec<String>,
    pub group_id: String,
    /// `"earliest"` or `"latest"`.
    pub auto_offset_reset: String,
    pub max_poll_records: usize,
    pub poll_timeout_ms: u64,
    pub security_protocol: String,
    pub sasl_mechanism: Option<String>,
    pub sasl_username: Option<String>,
    pub sasl_password: Option<String>,
}

impl KafkaSourceConfig {
    /// Required keys: `bootstrap.servers`, `topics`, `group.id`.
    pub fn from_config_map(config: &HashMap<String, String>) -> Result<Self> {
        let bootstrap_servers = required(config, "bootstrap.servers")?.to_string();

        let topics: Vec<String> = required(config, "topics")?
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if topics.is_empty() {
            return Err(ConnectorError::ConfigError(
                "'topics' must contain at least one topic".to_string(),
            ));
        }

        let group_id = required(config, "group.id")?.to_string();

        let auto_offset_reset = config
            .get("auto.offset.reset")
            .cloned()
            .unwrap_or_else(|| "earliest".to_string());
        match auto_offset_reset.as_str() {
            "earliest" | "latest" => {}
            other => {
                return Err(ConnectorError::ConfigError(format!(
                    "invalid auto.offset.reset '{}': must be 'earliest' or 'latest'",
                    other
                )));
            }
        }

        let max_poll_records = optional_u64(config, "max.poll.records")?.unwrap_or(500) as usize;
        if max_poll_records == 0 {
            return Err(ConnectorError::ConfigError(
                "'max.poll.records' must be greater than zero".to_string(),
            ));
        }
        let poll_timeout_ms = optional_u64(config, "poll.timeout.ms")?.unwrap_or(1000);

        Ok(Self {
            bootstrap_servers,
            topics,
            group_id,
            auto_offset_reset,
            max_poll_records,
            poll_timeout_ms,
            security_protocol: config
                .get("security.protocol")
                .cloned()
                .unwrap_or_else(|| "PLAINTEXT".to_string()),
            sasl_mechanism: config.get("sasl.mechanism").cloned(),
            sasl_username: config.get("sasl.username").cloned(),
            sasl_password: config.get("sasl.password").cloned(),
        })
    }

    /// Build the `rdkafka` client configuration for a manually committed consumer.
    pub fn client_config(&self) -> ClientConfig {
        let mut cfg = ClientConfig::new();
        cfg.set("bootstrap.servers", &self.bootstrap_servers);
        cfg.set("group.id", &self.group_id);
        cfg.set("enable.auto.commit", "false");
        cfg.set("auto.offset.reset", &self.auto_offset_reset);
        cfg.set("session.timeout.ms", "6000");
        cfg.set("security.protocol", &self.security_protocol);
        if let Some(mechanism) = &self.sasl_mechanism {
            cfg.set("sasl.mechanism", mechanism);
        }
        if let Some(username) = &self.sasl_username {
            cfg.set("sasl.username", username);
        }
        if let Some(password) = &self.sasl_password {
            cfg.set("sasl.password", password);
        }
        cfg
    }
}

pub struct KafkaLogSource {
    name: String,
    config: KafkaSourceConfig,
    consumer: Option<StreamConsumer>,
}

// StreamConsumer doesn't impl Debug
impl std::fmt::Debug for KafkaLogSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaLogSource")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("connected", &self.consumer.is_some())
            .finish()
    }
}

impl KafkaLogSource {
    pub fn new(name: &str, config_map: &HashMap<String, String>) -> Result<Self> {
        let config = KafkaSourceConfig::from_config_map(config_map)?;
        Ok(Self::with_config(name, config))
    }

    pub fn with_config(name: &str, config: KafkaSourceConfig) -> Self {
        Self {
            name: name.to_string(),
            config,
            consumer: None,
        }
    }

    pub fn config(&self) -> &KafkaSourceConfig {
        &self.config
    }

    pub fn connector_state(&self) -> ConnectorState {
        if self.consumer.is_some() {
            ConnectorState::Running
        } else {
            ConnectorState::Stopped
        }
    }

    fn consumer(&self) -> Result<&StreamConsumer> {
        self.consumer
            .as_ref()
            .ok_or_else(|| ConnectorError::SourceError("source is not running".to_string()))
    }
}

fn to_record(message: &BorrowedMessage<'_>) -> Record {
    Record::new(
        message.topic(),
        message.partition(),
        message.offset(),
        message.key().map(|k| String::from_utf8_lossy(k).into_owned()),
        message
            .payload()
            .map(Bytes::copy_from_slice)
            .unwrap_or_default(),
    )
}

/// Offsets to commit: one past the highest offset seen per topic-partition.
fn commit_offsets(records: &[Record]) -> BTreeMap<(&str, i32), i64> {
    let mut next = BTreeMap::new();
    for record in records {
        let entry = next
            .entry((record.topic.as_str(), record.partition))
            .or_insert(0);
        *entry = (*entry).max(record.offset + 1);
    }
    next
}

#[async_trait]
impl LogSource for KafkaLogSource {
    async fn start(&mut self) -> Result<()> {
        if self.consumer.is_some() {
            return Err(ConnectorError::SourceError(
                "source is already running".to_string(),
            ));
        }

        let consumer: StreamConsumer = self
            .config
            .client_config()
            .create()
            .map_err(|e| ConnectorError::ConnectionError(format!("kafka consumer: {}", e)))?;

        let topics: Vec<&str> = self.config.topics.iter().map(String::as_str).collect();
        consumer
            .subscribe(&topics)
            .map_err(|e| ConnectorError::ConnectionError(format!("kafka subscribe: {}", e)))?;

        tracing::info!(
            connector = %self.name,
            bootstrap_servers = %self.config.bootstrap_servers,
            topics = ?self.config.topics,
            group_id = %self.config.group_id,
            "Kafka log source started"
        );

        self.consumer = Some(consumer);
        Ok(())
    }

    async fn poll(&mut self) -> Result<Vec<Record>> {
        let consumer = self.consumer()?;
        let deadline =
            tokio::time::Instant::now() + Duration::from_millis(self.config.poll_timeout_ms);
        let mut records = Vec::new();

        while records.len() < self.config.max_poll_records {
            let received = match tokio::time::timeout_at(deadline, consumer.recv()).await {
                Ok(received) => received,
                Err(_) => break,
            };
            match received {
                Ok(message) => records.push(to_record(&message)),
                Err(e) if records.is_empty() => {
                    return Err(ConnectorError::SourceError(format!("kafka receive: {}", e)));
                }
                Err(e) => {
                    tracing::warn!(
                        connector = %self.name,
                        error = %e,
                        "Kafka receive failed mid-poll"
                    );
                    break;
                }
            }
        }

        Ok(records)
    }

    async fn commit(&mut self, records: &[Record]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let consumer = self.consumer()?;

        let mut list = TopicPartitionList::new();
        for ((topic, partition), offset) in commit_offsets(records) {
            list.add_partition_offset(topic, partition, Offset::Offset(offset))
                .map_err(|e| ConnectorError::SourceError(format!("kafka offset: {}", e)))?;
        }
        consumer
            .commit(&list, CommitMode::Async)
            .map_err(|e| ConnectorError::SourceError(format!("kafka commit: {}", e)))?;
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if self.consumer.take().is_none() {
            return Err(ConnectorError::SourceError(
                "source is already stopped".to_string(),
            ));
        }
        tracing::info!(connector = %self.name, "Kafka log source stopped");
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
