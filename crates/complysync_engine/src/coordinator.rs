//! Reconciliation of pending local writes.
//!
//! A pass walks every collection in name order. For each one it takes the
//! collection's pass lock, snapshots the pending records, and upserts them
//! one by one in append order:
//!
//! - `Applied(e)`: the local record becomes `e`, state `synced`
//! - `Superseded(remote)`: the local record becomes `remote`, state
//!   `conflict`; the local write is discarded and never reapplied
//! - failure: the record stays `pending`, the pass moves on
//!
//! Results are applied only to a record that still carries the snapshot's
//! version and is still pending. A write that lands during the pass is left
//! for the next one.

use crate::error::{EngineError, EngineResult, ErrorKind};
use crate::remote::{with_timeout, RemoteStore};
use complysync_core::{Clock, CoreError, LocalStore, SyncState};
use complysync_protocol::{Collection, Entity, EntityId, Timestamp, UpsertOutcome};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Cancels a running pass between two entities.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Creates an unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clears the flag.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// What happened to one pending entity.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// The remote store accepted the local copy.
    Synced,
    /// The remote copy was newer; it replaced the local one.
    Conflict {
        /// The winning remote copy.
        remote: Entity,
    },
    /// The upsert failed; the entity stays pending.
    Failed {
        /// Classification of the failure.
        kind: ErrorKind,
        /// Failure text.
        error: String,
    },
}

/// Outcome for one entity of a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySyncOutcome {
    /// The collection.
    pub collection: Collection,
    /// The entity.
    pub id: EntityId,
    /// What happened.
    pub outcome: SyncOutcome,
}

/// Result of a sync pass.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    /// One entry per entity attempted, in processing order.
    pub outcomes: Vec<EntitySyncOutcome>,
    /// True if the pass stopped early on request.
    pub cancelled: bool,
    /// Start of the pass.
    pub started_at: Timestamp,
    /// End of the pass.
    pub finished_at: Timestamp,
}

impl SyncReport {
    /// A pass that had nothing to do.
    pub fn empty(at: Timestamp) -> Self {
        Self {
            outcomes: Vec::new(),
            cancelled: false,
            started_at: at,
            finished_at: at,
        }
    }

    /// Number of entities the remote store accepted.
    pub fn synced_count(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::Synced))
    }

    /// Number of entities that lost to a newer remote copy.
    pub fn conflict_count(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::Conflict { .. }))
    }

    /// Number of entities left pending by a failure.
    pub fn failed_count(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::Failed { .. }))
    }

    /// Entities that are no longer pending because of this pass.
    pub fn settled_count(&self) -> usize {
        self.synced_count() + self.conflict_count()
    }

    /// Outcome for a given entity.
    pub fn outcome_of(&self, id: EntityId) -> Option<&SyncOutcome> {
        self.outcomes.iter().find(|o| o.id == id).map(|o| &o.outcome)
    }

    fn count(&self, f: impl Fn(&SyncOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| f(&o.outcome)).count()
    }
}

/// Running totals over every pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Passes completed, cancelled ones included.
    pub passes: u64,
    /// Entities synced.
    pub synced: u64,
    /// Entities resolved as conflicts.
    pub conflicts: u64,
    /// Failed upsert attempts.
    pub failures: u64,
    /// Text of the most recent failure.
    pub last_error: Option<String>,
}

/// Drains pending local writes into the remote store.
pub struct SyncCoordinator {
    local: Arc<LocalStore>,
    remote: Arc<dyn RemoteStore>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
    stats: RwLock<SyncStats>,
    cancel: CancellationFlag,
}

impl SyncCoordinator {
    /// Creates a coordinator; every upsert is bounded by `timeout`.
    pub fn new(
        local: Arc<LocalStore>,
        remote: Arc<dyn RemoteStore>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> Self {
        Self {
            local,
            remote,
            clock,
            timeout,
            stats: RwLock::new(SyncStats::default()),
            cancel: CancellationFlag::new(),
        }
    }

    /// Running totals.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Stops the running pass after its current entity.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A handle to the cancellation flag.
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// Runs one pass over every collection.
    ///
    /// Conflicts and per-entity failures are reported, not raised. Only a
    /// local store failure aborts the pass.
    pub async fn sync_all(&self) -> EngineResult<SyncReport> {
        self.cancel.reset();
        let mut report = SyncReport::empty(self.clock.now());
        tracing::info!("sync pass started");

        let result = self.run(&mut report).await;
        report.finished_at = self.clock.now();
        self.record(&report, result.as_ref().err());
        result?;

        tracing::info!(
            synced = report.synced_count(),
            conflicts = report.conflict_count(),
            failed = report.failed_count(),
            cancelled = report.cancelled,
            "sync pass finished"
        );
        Ok(report)
    }

    async fn run(&self, report: &mut SyncReport) -> EngineResult<()> {
        for collection in self.local.collections()? {
            self.sync_collection(&collection, report).await?;
            if report.cancelled {
                tracing::info!("sync pass cancelled");
                break;
            }
        }
        Ok(())
    }

    async fn sync_collection(&self, collection: &Collection, report: &mut SyncReport) -> EngineResult<()> {
        let lock = self.local.pass_lock(collection);
        let _pass = lock.lock().await;

        let snapshot = self.local.pending(collection)?;
        if snapshot.is_empty() {
            return Ok(());
        }
        tracing::debug!(%collection, pending = snapshot.len(), "reconciling collection");

        for record in snapshot {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                return Ok(());
            }

            let id = record.entity.id;
            let outcome = self.reconcile(collection, record.entity).await?;
            report.outcomes.push(EntitySyncOutcome {
                collection: collection.clone(),
                id,
                outcome,
            });
        }
        Ok(())
    }

    /// Pushes one pending entity outside a pass.
    ///
    /// Waits for a running pass on the collection. Returns `None` if the
    /// entity is no longer pending by then.
    pub async fn push(&self, collection: &Collection, id: EntityId) -> EngineResult<Option<SyncOutcome>> {
        let lock = self.local.pass_lock(collection);
        let _pass = lock.lock().await;

        match self.local.find_by_id(collection, id)? {
            Some(record) if record.sync_state.is_pending() => {
                Ok(Some(self.reconcile(collection, record.entity).await?))
            }
            _ => Ok(None),
        }
    }

    async fn reconcile(&self, collection: &Collection, entity: Entity) -> EngineResult<SyncOutcome> {
        let outcome = match with_timeout(self.timeout, self.remote.upsert(collection, &entity)).await {
            Ok(UpsertOutcome::Applied(accepted)) => {
                self.settle(collection, &entity, accepted, SyncState::Synced)?;
                SyncOutcome::Synced
            }
            Ok(UpsertOutcome::Superseded(remote)) => {
                tracing::info!(%collection, id = %entity.id, "remote copy is newer; local write discarded");
                self.settle(collection, &entity, remote.clone(), SyncState::Conflict)?;
                SyncOutcome::Conflict { remote }
            }
            Err(e) => {
                tracing::warn!(%collection, id = %entity.id, error = %e, "upsert failed; entity stays pending");
                SyncOutcome::Failed {
                    kind: e.kind().into(),
                    error: e.to_string(),
                }
            }
        };
        Ok(outcome)
    }

    /// Stores the remote result, unless the record moved on since the snapshot.
    fn settle(
        &self,
        collection: &Collection,
        snapshot: &Entity,
        value: Entity,
        state: SyncState,
    ) -> EngineResult<()> {
        let version = snapshot.updated_at;
        let result = self.local.update_by_id(collection, snapshot.id, |record| {
            if record.is_pending_version(version) {
                record.entity = value;
                record.sync_state = state;
            }
        });
        match result {
            Ok(record) if record.sync_state.is_pending() => {
                tracing::debug!(%collection, id = %snapshot.id, "rewritten during the pass; left pending");
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(CoreError::NotFound { .. }) => {
                tracing::debug!(%collection, id = %snapshot.id, "deleted during the pass");
                Ok(())
            }
            Err(e) => Err(EngineError::from(e)),
        }
    }

    fn record(&self, report: &SyncReport, error: Option<&EngineError>) {
        let mut stats = self.stats.write();
        stats.passes += 1;
        stats.synced += report.synced_count() as u64;
        stats.conflicts += report.conflict_count() as u64;
        stats.failures += report.failed_count() as u64;
        let last_failure = report.outcomes.iter().rev().find_map(|o| match &o.outcome {
            SyncOutcome::Failed { error, .. } => Some(error.clone()),
            _ => None,
        });
        if let Some(e) = error {
            stats.last_error = Some(e.to_string());
        } else if last_failure.is_some() {
            stats.last_error = last_failure;
        }
    }
}

impl std::fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("timeout", &self.timeout)
            .field("stats", &*self.stats.read())
            .finish()
    }
}
