//! Topicsink Agent Binary
//!
//! Consumes a Kafka topic and writes every poll of matching records to a SQL
//! database as one batch.
//!
//! # Environment Variables
//!
//! - `TOPICSINK_CONNECTOR_NAME`: Connector name (default: topicsink)
//! - `TOPICSINK_TOPIC_KEY`: Only records with this key are written (required)
//! - `TOPICSINK_SQL`: Statement with `:name` parameters (required)
//! - `TOPICSINK_MESSAGE_FIELDS`: Comma-separated JSON fields to bind (required)
//! - `TOPICSINK_ASSERT_UPDATES`: Fail items that update no rows (default: true)
//! - `TOPICSINK_RETRY_ON_ERROR`: Retry items one by one after a batch error (default: false)
//! - `TOPICSINK_SINK_TIMEOUT_MS`: Deadline for each database call (optional)
//! - `KAFKA_BOOTSTRAP_SERVERS`, `KAFKA_TOPICS`, `KAFKA_GROUP_ID`: Consumer settings (required)
//! - `KAFKA_AUTO_OFFSET_RESET`, `KAFKA_MAX_POLL_RECORDS`, `KAFKA_POLL_TIMEOUT_MS`: Consumer tuning
//! - `KAFKA_SECURITY_PROTOCOL`, `KAFKA_SASL_*`: Broker authentication
//! - `DATABASE_URL`: SQLite path or PostgreSQL URL (required)
//! - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 5)
//!
//! # Example
//!
//! ```bash
//! export KAFKA_BOOTSTRAP_SERVERS=localhost:9092
//! export KAFKA_TOPICS=orders
//! export KAFKA_GROUP_ID=orders-to-db
//! export TOPICSINK_TOPIC_KEY=order
//! export TOPICSINK_MESSAGE_FIELDS=id,status
//! export TOPICSINK_SQL="UPDATE orders SET status = :status WHERE id = :id"
//! export DATABASE_URL=postgres://localhost/shop
//! cargo run --bin topicsink-agent
//! ```

use std::sync::Arc;

use topicsink_agent::AgentConfig;
use topicsink_connectors::{is_postgres_url, BatchSink, ConnectorRuntime, SinkPipeline, SqlxSink};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let log_level = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info".to_string())
        .parse()
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("topicsink agent starting");

    let config = AgentConfig::from_env()?;
    let name = config.connector.name.clone();

    info!(
        connector = %name,
        topics = ?config.connector.topics,
        key = %config.pipeline.filter_key,
        assert_updates = config.pipeline.writer.assert_updates,
        retry_on_error = config.pipeline.writer.retry_on_error_in_batch_writing,
        "configuration loaded"
    );

    let sink: Arc<dyn BatchSink> = if is_postgres_url(&config.database_url) {
        postgres_sink(&name, &config.database_url, config.max_connections).await?
    } else {
        Arc::new(SqlxSink::connect(&name, &config.database_url, config.max_connections).await?)
    };
    let pipeline = SinkPipeline::from_config(&name, config.pipeline.clone(), sink.clone())?;

    #[cfg(feature = "kafka")]
    let source = Box::new(topicsink_connectors::KafkaLogSource::new(
        &name,
        &config.connector.config,
    )?);
    #[cfg(not(feature = "kafka"))]
    let source: Box<dyn topicsink_connectors::LogSource> = {
        error!("kafka feature not enabled, no log source available");
        return Err("kafka feature not enabled".into());
    };

    let mut runtime = ConnectorRuntime::new();
    runtime
        .start_connector(config.connector.clone(), source, pipeline)
        .await?;
    info!(connector = %name, "agent running");

    tokio::signal::ctrl_c().await?;
    info!("received shutdown signal, stopping connector");
    if let Err(e) = runtime.stop_all().await {
        error!("error during shutdown: {}", e);
    }
    sink.close().await;

    Ok(())
}

#[cfg(feature = "postgres")]
async fn postgres_sink(
    name: &str,
    url: &str,
    max_connections: u32,
) -> Result<Arc<dyn BatchSink>, Box<dyn std::error::Error>> {
    let sink = topicsink_connectors::PostgresSink::connect(name, url, max_connections).await?;
    Ok(Arc::new(sink))
}

#[cfg(not(feature = "postgres"))]
async fn postgres_sink(
    _name: &str,
    _url: &str,
    _max_connections: u32,
) -> Result<Arc<dyn BatchSink>, Box<dyn std::error::Error>> {
    error!("PostgreSQL URL provided but postgres feature not enabled");
    error!("Rebuild with: cargo build --features postgres");
    Err("postgres feature not enabled".into())
}
