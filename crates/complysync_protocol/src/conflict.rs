//! Conflict detection and resolution.
//!
//! The only policy is last-write-wins on `updated_at`, with the remote copy
//! canonical on ties. The rule is evaluated by whoever owns the remote copy
//! (the backend during an upsert); clients use it to interpret outcomes.

use crate::entity::Entity;

/// Resolution for an incoming write against the stored copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResolution {
    /// The incoming (local) copy becomes the stored value.
    KeepLocal,
    /// The stored (remote) copy is kept; the incoming write is discarded.
    AcceptRemote,
}

impl ConflictResolution {
    /// Returns true if the incoming write is applied.
    pub fn applies(&self) -> bool {
        matches!(self, ConflictResolution::KeepLocal)
    }
}

/// Decides between an incoming copy and the stored remote copy.
///
/// - No remote copy: the incoming copy wins.
/// - Identical version (same `updated_at` and payload): the incoming copy
///   "wins", so re-delivering an already-applied write is idempotent.
/// - Otherwise the strictly newer `updated_at` wins; on a tie the remote copy
///   is kept.
pub fn resolve_last_write_wins(incoming: &Entity, remote: Option<&Entity>) -> ConflictResolution {
    match remote {
        None => ConflictResolution::KeepLocal,
        Some(remote) if remote.same_version(incoming) => ConflictResolution::KeepLocal,
        Some(remote) if incoming.updated_at > remote.updated_at => ConflictResolution::KeepLocal,
        Some(_) => ConflictResolution::AcceptRemote,
    }
}
