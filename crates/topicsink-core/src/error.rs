//! Error Types for topicsink records and attribute maps
//!
//! These errors cover the data-level conversions that happen before anything
//! reaches a sink:
//!
//! - `UnsupportedValue`: a decoded field cannot be represented as a scalar
//!   attribute. Nested objects and arrays have no column to land in, and
//!   integers beyond `i64` cannot be stored without losing precision.
//!
//! Connector-level failures (sink, source, configuration) live in
//! `topicsink_connectors::ConnectorError`, which wraps this type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unsupported attribute value for field '{field}': {kind}")]
    UnsupportedValue { field: String, kind: String },
}

pub type Result<T> = std::result::Result<T, Error>;
