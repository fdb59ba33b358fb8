//! The remote store abstraction.
//!
//! A [`RemoteStore`] maps entity operations one-to-one onto calls against
//! the hosted backend: one attempt per call, no retries, no buffering.
//! Fallback and reconciliation live above this layer.

mod http;
mod memory;

pub use http::HttpRemoteStore;
pub use memory::MemoryRemoteStore;

use async_trait::async_trait;
use complysync_protocol::{Collection, Entity, EntityId, Fields, Query, UpsertOutcome};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Result type for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Classification of a remote failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteErrorKind {
    /// Transport failure or timeout.
    Network,
    /// The backend refused the request (validation, permissions).
    Rejected,
    /// The entity does not exist remotely.
    NotFound,
    /// Server fault or an unintelligible response.
    Unknown,
}

/// A failed remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Transport failure or timeout.
    #[error("remote store unreachable: {0}")]
    Network(String),
    /// The backend refused the request.
    #[error("rejected by remote store: {0}")]
    Rejected(String),
    /// The entity does not exist remotely.
    #[error("not found on remote store: {0}")]
    NotFound(String),
    /// Server fault or an unintelligible response.
    #[error("remote store failure: {0}")]
    Unknown(String),
}

impl RemoteError {
    /// Returns the classification.
    pub fn kind(&self) -> RemoteErrorKind {
        match self {
            RemoteError::Network(_) => RemoteErrorKind::Network,
            RemoteError::Rejected(_) => RemoteErrorKind::Rejected,
            RemoteError::NotFound(_) => RemoteErrorKind::NotFound,
            RemoteError::Unknown(_) => RemoteErrorKind::Unknown,
        }
    }

    /// True if the caller should fall back to the local store.
    ///
    /// Unreachable backends and server faults are recovered locally;
    /// rejections are the caller's problem.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RemoteError::Network(_) | RemoteError::Unknown(_))
    }
}

/// Entity operations against the hosted backend.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Creates an entity; the backend assigns id and timestamps.
    async fn create(&self, collection: &Collection, fields: Fields) -> RemoteResult<Entity>;

    /// Reads one entity.
    async fn read(&self, collection: &Collection, id: EntityId) -> RemoteResult<Entity>;

    /// Lists entities matching `query`.
    async fn list(&self, collection: &Collection, query: &Query) -> RemoteResult<Vec<Entity>>;

    /// Merges `patch` into an existing entity.
    async fn update(
        &self,
        collection: &Collection,
        id: EntityId,
        patch: Fields,
    ) -> RemoteResult<Entity>;

    /// Offers a locally written entity under last-write-wins.
    async fn upsert(&self, collection: &Collection, entity: &Entity) -> RemoteResult<UpsertOutcome>;

    /// Deletes an entity.
    async fn delete(&self, collection: &Collection, id: EntityId) -> RemoteResult<()>;
}

/// Runs a remote call under `timeout`; running out of time is a network failure.
pub async fn with_timeout<T, F>(timeout: Duration, call: F) -> RemoteResult<T>
where
    F: Future<Output = RemoteResult<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(RemoteError::Network(format!(
            "timed out after {}ms",
            timeout.as_millis()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_errors() {
        assert!(RemoteError::Network("refused".into()).is_recoverable());
        assert!(RemoteError::Unknown("502".into()).is_recoverable());
        assert!(!RemoteError::Rejected("invalid email".into()).is_recoverable());
        assert!(!RemoteError::NotFound("profiles/1".into()).is_recoverable());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_a_network_failure() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, RemoteError>(())
        };
        let err = with_timeout(Duration::from_secs(5), slow).await.unwrap_err();
        assert_eq!(err.kind(), RemoteErrorKind::Network);
    }
}
