//! PostgreSQL sink.
//!
//! Values are bound with the type of the Rust value: strings and NULLs go out
//! as `TEXT`, integers as `INT8`, floats as `FLOAT8`, booleans as `BOOL`.
//! PostgreSQL refuses to assign a `TEXT` parameter to a column of another
//! type, so the first time a statement is seen it is prepared without values
//! to learn the type the server infers for each placeholder, and every `$n`
//! is rewritten to `CAST($n AS <type>)`. An explicit cast turns text into any
//! type with a text input form (timestamps, numerics, uuids, enums) and turns
//! a NULL of any type into a NULL of the target type.
//!
//! If the server cannot infer the placeholder types the statement runs as
//! written.
//!
//! Like `SqlxSink`, a batch is one transaction with one execution per item.
//!
//! This module is only available when the `postgres` feature is enabled.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, Postgres};
use sqlx::query::Query;
use sqlx::{Either, Executor, Statement, TypeInfo};
use tokio::sync::Mutex;
use topicsink_core::{AttrValue, AttributeMap};

use crate::error::{ConnectorError, Result};
use crate::statement::NamedStatement;
use crate::traits::BatchSink;

pub struct PostgresSink {
    name: String,
    pool: PgPool,
    /// Positional SQL -> SQL with typed placeholders.
    typed: Mutex<HashMap<String, Arc<str>>>,
}

impl PostgresSink {
    pub async fn connect(name: &str, url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| {
                ConnectorError::ConnectionError(format!("failed to connect to sink: {}", e))
            })?;

        tracing::info!(sink = %name, max_connections, "PostgreSQL sink connected");
        Ok(Self::from_pool(name, pool))
    }

    pub fn from_pool(name: &str, pool: PgPool) -> Self {
        Self {
            name: name.to_string(),
            pool,
            typed: Mutex::new(HashMap::new()),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// The statement with each placeholder cast to its server-side type.
    async fn typed_sql(&self, statement: &NamedStatement) -> Arc<str> {
        let mut typed = self.typed.lock().await;
        if let Some(sql) = typed.get(statement.sql()) {
            return Arc::clone(sql);
        }

        let types: Vec<String> = match self.pool.prepare(statement.sql()).await {
            Ok(prepared) => match prepared.parameters() {
                Some(Either::Left(types)) => types.iter().map(|t| t.name().to_string()).collect(),
                _ => Vec::new(),
            },
            Err(e) => {
                // Not cached: the failure may be a dropped connection.
                tracing::warn!(
                    sink = %self.name,
                    error = %e,
                    "could not infer parameter types, binding without casts"
                );
                return Arc::from(statement.sql());
            }
        };

        let sql: Arc<str> = Arc::from(cast_placeholders(statement, &types));
        tracing::debug!(sink = %self.name, sql = %sql, "prepared typed statement");
        typed.insert(statement.sql().to_string(), Arc::clone(&sql));
        sql
    }
}

/// Render `statement` with `$n` wrapped in a cast to `types[n - 1]`.
///
/// Positions without a usable type keep a bare placeholder.
fn cast_placeholders(statement: &NamedStatement, types: &[String]) -> String {
    statement.render(|position| match types.get(position - 1) {
        Some(ty) if !ty.is_empty() && ty != "UNKNOWN" && ty != "VOID" => {
            format!("CAST(${} AS {})", position, ty)
        }
        _ => format!("${}", position),
    })
}

#[async_trait]
impl BatchSink for PostgresSink {
    async fn execute_batch(
        &self,
        statement: &NamedStatement,
        items: &[AttributeMap],
    ) -> Result<Vec<u64>> {
        let sql = self.typed_sql(statement).await;
        let mut tx = self.pool.begin().await?;
        let mut counts = Vec::with_capacity(items.len());

        for item in items {
            let mut query = sqlx::query(&sql);
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
        tracing::info!(sink = %self.name, "PostgreSQL sink closed");
    }
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &AttrValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        AttrValue::Null => query.bind(None::<String>),
        AttrValue::Bool(b) => query.bind(*b),
        AttrValue::Int(i) => query.bind(*i),
        AttrValue::Float(f) => query.bind(*f),
        AttrValue::Text(s) => query.bind(s.clone()),
    }
}
