//! Error types shared across the engine

use crate::comment::CommentId;

/// Errors from loading or validating engine configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unable to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid value for configuration key: {0}")]
    InvalidValue(String),
}

/// Errors reported by a comment store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("comment {0} not found")]
    NotFound(CommentId),
    #[error("comment {0} cannot be replied to")]
    InvalidParent(CommentId),
    #[error("invalid pagination cursor: {0}")]
    InvalidCursor(String),
    #[error("request rejected: {0}")]
    Rejected(String),
}
