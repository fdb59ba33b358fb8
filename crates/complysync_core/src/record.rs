//! Local bookkeeping around entities.

use complysync_protocol::{Entity, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reconciliation state of a locally held entity.
///
/// Never sent to the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// The local copy matches what the remote store accepted.
    Synced,
    /// Written locally, waiting for the next reconciliation pass.
    Pending,
    /// The remote copy was newer during reconciliation; the local write was
    /// discarded and the record now holds the remote value.
    Conflict,
}

impl SyncState {
    /// Returns true if the record waits for reconciliation.
    pub fn is_pending(&self) -> bool {
        matches!(self, SyncState::Pending)
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncState::Synced => "synced",
            SyncState::Pending => "pending",
            SyncState::Conflict => "conflict",
        })
    }
}

/// An entity as held by the local store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalRecord {
    /// The entity.
    pub entity: Entity,
    /// Its reconciliation state.
    pub sync_state: SyncState,
}

impl LocalRecord {
    /// A record written locally and waiting for reconciliation.
    pub fn pending(entity: Entity) -> Self {
        Self {
            entity,
            sync_state: SyncState::Pending,
        }
    }

    /// A cached copy of what the remote store holds.
    pub fn synced(entity: Entity) -> Self {
        Self {
            entity,
            sync_state: SyncState::Synced,
        }
    }

    /// True if this is still the pending version stamped `updated_at`.
    ///
    /// A reconciliation pass works from a snapshot; it only settles a record
    /// that nobody rewrote since the snapshot was taken.
    pub fn is_pending_version(&self, updated_at: Timestamp) -> bool {
        self.sync_state.is_pending() && self.entity.updated_at == updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use complysync_protocol::{EntityId, Fields};

    #[test]
    fn pending_version_check() {
        let entity = Entity::new(EntityId::new(), Fields::new(), Timestamp::from_millis(7));
        let record = LocalRecord::pending(entity.clone());
        assert!(record.is_pending_version(Timestamp::from_millis(7)));
        assert!(!record.is_pending_version(Timestamp::from_millis(8)));
        assert!(!LocalRecord::synced(entity).is_pending_version(Timestamp::from_millis(7)));
    }

    #[test]
    fn display() {
        assert_eq!(SyncState::Conflict.to_string(), "conflict");
    }
}
