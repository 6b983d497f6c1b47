//! Sink implementations.
//!
//! - `SqlxSink` - executes named-parameter statements through `sqlx`'s `Any`
//!   driver. Used for SQLite.
//! - `PostgresSink` - a PostgreSQL pool that casts every parameter to the
//!   type the server expects. Needs the `postgres` feature.

#[cfg(feature = "postgres")]
pub mod postgres;
pub mod sql;

#[cfg(feature = "postgres")]
pub use postgres::PostgresSink;
pub use sql::SqlxSink;

/// Whether `url` names a PostgreSQL server.
pub fn is_postgres_url(url: &str) -> bool {
    url.starts_with("postgres://") || url.starts_with("postgresql://")
}
