//! Error types for the engine.

use crate::config::ConfigError;
use crate::remote::{RemoteError, RemoteErrorKind};
use complysync_core::CoreError;
use complysync_protocol::{Collection, EntityId};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Coarse classification of every failure the engine can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No usable remote configuration; the engine runs in demo mode.
    ConfigurationMissing,
    /// The remote store could not be reached.
    NetworkUnreachable,
    /// The remote store refused the request.
    RemoteRejected,
    /// The local store could not load or persist data.
    StorageFailure,
    /// A local write lost against a newer remote copy.
    Conflict,
    /// The entity does not exist.
    NotFound,
    /// Anything else, including remote server faults.
    Unknown,
}

impl ErrorKind {
    /// Returns the snake_case label of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConfigurationMissing => "configuration_missing",
            ErrorKind::NetworkUnreachable => "network_unreachable",
            ErrorKind::RemoteRejected => "remote_rejected",
            ErrorKind::StorageFailure => "storage_failure",
            ErrorKind::Conflict => "conflict",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<RemoteErrorKind> for ErrorKind {
    fn from(kind: RemoteErrorKind) -> Self {
        match kind {
            RemoteErrorKind::Network => ErrorKind::NetworkUnreachable,
            RemoteErrorKind::Rejected => ErrorKind::RemoteRejected,
            RemoteErrorKind::NotFound => ErrorKind::NotFound,
            RemoteErrorKind::Unknown => ErrorKind::Unknown,
        }
    }
}

/// Errors surfaced by the repository and the sync coordinator.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration could not be loaded or is malformed.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The remote store failed in a way that is not recovered locally.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// The local store failed.
    #[error("local store error: {0}")]
    Local(#[from] CoreError),

    /// The storage backend could not be opened.
    #[error("storage error: {0}")]
    Storage(#[from] complysync_storage::StorageError),

    /// The entity is unknown to both stores.
    #[error("entity {id} not found in {collection}")]
    NotFound {
        /// The collection searched.
        collection: Collection,
        /// The missing id.
        id: EntityId,
    },
}

impl EngineError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Config(_) => ErrorKind::ConfigurationMissing,
            EngineError::Remote(e) => e.kind().into(),
            EngineError::Local(CoreError::NotFound { .. }) => ErrorKind::NotFound,
            EngineError::Local(_) | EngineError::Storage(_) => ErrorKind::StorageFailure,
            EngineError::NotFound { .. } => ErrorKind::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(
            EngineError::from(RemoteError::Rejected("bad field".into())).kind(),
            ErrorKind::RemoteRejected
        );
        assert_eq!(
            EngineError::from(RemoteError::Network("refused".into())).kind(),
            ErrorKind::NetworkUnreachable
        );
        assert_eq!(
            EngineError::from(complysync_storage::StorageError::Locked).kind(),
            ErrorKind::StorageFailure
        );
        assert_eq!(
            EngineError::NotFound {
                collection: Collection::profiles(),
                id: EntityId::from_bytes([1; 16]),
            }
            .kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn labels() {
        assert_eq!(ErrorKind::ConfigurationMissing.to_string(), "configuration_missing");
        assert_eq!(
            serde_json::to_string(&ErrorKind::StorageFailure).unwrap(),
            "\"storage_failure\""
        );
    }
}
