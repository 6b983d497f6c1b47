//! SQL sink backed by `sqlx`'s `Any` driver.
//!
//! A batch runs inside one transaction on one connection: the statement is
//! executed once per item, reusing the connection's prepared statement, and
//! the per-item `rows_affected` counts are collected. That is one round trip
//! per item, not one per batch. Any failure rolls the transaction back, so
//! the sink either applies the whole batch or none of it.
//!
//! PostgreSQL URLs are refused here: the `Any` driver binds strings and
//! NULLs as `TEXT`, which PostgreSQL will not assign to other column types.
//! Use [`PostgresSink`](super::PostgresSink) for them.

use async_trait::async_trait;
use sqlx::any::{AnyArguments, AnyPoolOptions};
use sqlx::query::Query;
use sqlx::{Any, AnyPool};
use topicsink_core::{AttrValue, AttributeMap};

use super::is_postgres_url;
use crate::error::{ConnectorError, Result};
use crate::statement::NamedStatement;
use crate::traits::BatchSink;

pub struct SqlxSink {
    name: String,
    pool: AnyPool,
}

impl SqlxSink {
    /// Connect a pool for `url`.
    pub async fn connect(name: &str, url: &str, max_connections: u32) -> Result<Self> {
        if is_postgres_url(url) {
            return Err(ConnectorError::ConfigError(
                "PostgreSQL URLs need the PostgreSQL sink".to_string(),
            ));
        }
        sqlx::any::install_default_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| {
                ConnectorError::ConnectionError(format!("failed to connect to sink: {}", e))
            })?;

        tracing::info!(sink = %name, max_connections, "SQL sink connected");
        Ok(Self::from_pool(name, pool))
    }

    /// Wrap an already-connected pool.
    pub fn from_pool(name: &str, pool: AnyPool) -> Self {
        Self {
            name: name.to_string(),
            pool,
        }
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }
}

#[async_trait]
impl BatchSink for SqlxSink {
    async fn execute_batch(
        &self,
        statement: &NamedStatement,
        items: &[AttributeMap],
    ) -> Result<Vec<u64>> {
        let mut tx = self.pool.begin().await?;
        let mut counts = Vec::with_capacity(items.len());

        for item in items {
            let mut query = sqlx::query(statement.sql());
            for name in statement.parameters() {
                let value = item
                    .get(name)
                    .ok_or_else(|| ConnectorError::MissingParameter(name.clone()))?;
                query = bind_value(query, value);
            }
            let result = query.execute(&mut *tx).await?;
            counts.push(result.rows_affected());
        }

        tx.commit().await?;

        tracing::debug!(sink = %self.name, items = items.len(), "executed batch");
        Ok(counts)
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::info!(sink = %self.name, "SQL sink closed");
    }
}

fn bind_value<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    value: &AttrValue,
) -> Query<'q, Any, AnyArguments<'q>> {
    match value {
        AttrValue::Null => query.bind(None::<String>),
        AttrValue::Bool(b) => query.bind(*b),
        AttrValue::Int(i) => query.bind(*i),
        AttrValue::Float(f) => query.bind(*f),
        AttrValue::Text(s) => query.bind(s.clone()),
    }
}
