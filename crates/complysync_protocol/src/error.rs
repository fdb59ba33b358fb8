//! Error types for protocol values.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while building or parsing protocol values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Collection name does not follow the naming rules.
    #[error("invalid collection name {0:?}: expected 1-64 chars of [a-z0-9_-] starting with a letter")]
    InvalidCollection(String),

    /// Entity id is not a UUID.
    #[error("invalid entity id: {0}")]
    InvalidEntityId(String),
}
