//! Error types for the local store.

use complysync_protocol::{Collection, EntityId};
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in local store operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] complysync_storage::StorageError),

    /// A collection could not be encoded or decoded.
    #[error("codec error in collection {collection}: {message}")]
    Codec {
        /// The collection being encoded or decoded.
        collection: Collection,
        /// Description of the failure.
        message: String,
    },

    /// Persisting the collection would exceed the configured quota.
    #[error("storage quota exceeded for {collection}: {size} bytes > {quota} bytes")]
    QuotaExceeded {
        /// The collection being written.
        collection: Collection,
        /// Encoded size of the collection after the write.
        size: u64,
        /// Configured quota.
        quota: u64,
    },

    /// An append reused an id already present in the collection.
    #[error("entity {id} already exists in {collection}")]
    DuplicateId {
        /// The collection written to.
        collection: Collection,
        /// The duplicate id.
        id: EntityId,
    },

    /// No record with that id exists in the collection.
    #[error("entity {id} not found in {collection}")]
    NotFound {
        /// The collection searched.
        collection: Collection,
        /// The id that was not found.
        id: EntityId,
    },
}

impl CoreError {
    /// Returns true if the error means the local store could not persist or
    /// load data (as opposed to a caller mistake such as an unknown id).
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            CoreError::Storage(_) | CoreError::Codec { .. } | CoreError::QuotaExceeded { .. }
        )
    }
}
