//! Error types for the topicsink agent

use thiserror::Error;
use topicsink_connectors::ConnectorError;

pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("{0} environment variable required")]
    MissingVariable(&'static str),

    #[error("invalid {name}: {reason}")]
    InvalidVariable { name: &'static str, reason: String },

    #[error("Connector error: {0}")]
    Connector(#[from] ConnectorError),
}
