//! The repository facade.
//!
//! [`Repository`] is the only type UI code talks to. It routes every call to
//! the remote store while connected and to the local store otherwise, so a
//! caller never has to know which one answered. Writes accepted offline are
//! queued as `pending` and drained by the [`SyncCoordinator`].

use crate::config::EngineConfig;
use crate::coordinator::{SyncCoordinator, SyncOutcome, SyncReport, SyncStats};
use crate::error::{EngineError, EngineResult};
use crate::mode::{ConnectionStatus, ModeClassifier, Transition};
use crate::remote::{with_timeout, HttpRemoteStore, RemoteError, RemoteStore};
use complysync_core::{Clock, CoreError, LocalRecord, LocalStore, SyncState, SystemClock};
use complysync_protocol::{Collection, Entity, EntityId, Fields, Query};
use complysync_storage::{EncryptedBackend, FileBackend, StorageBackend};
use std::sync::Arc;
use std::time::Duration;

/// Result of [`Repository::refresh_status`].
#[derive(Debug, Clone)]
pub struct StatusRefresh {
    /// The new classification.
    pub status: ConnectionStatus,
    /// How reachability changed.
    pub transition: Transition,
    /// The sync pass run because the remote store became reachable.
    pub sync: Option<SyncReport>,
}

/// Connection-aware access to entities.
///
/// Construct once and share through an `Arc`.
pub struct Repository {
    local: Arc<LocalStore>,
    remote: Option<Arc<dyn RemoteStore>>,
    classifier: ModeClassifier,
    coordinator: Option<SyncCoordinator>,
    clock: Arc<dyn Clock>,
    request_timeout: Duration,
    poll_interval: Duration,
}

impl Repository {
    /// Opens the local store under `config.data_dir` and, if remote settings
    /// are valid, an HTTP client for the remote store.
    ///
    /// Missing or malformed remote settings select demo mode. No probe is
    /// run; call [`Repository::refresh_status`] to classify.
    pub fn open(config: &EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let local = Arc::new(Self::open_local(config)?);

        let remote: Option<Arc<dyn RemoteStore>> = match config.remote().validate() {
            Ok(endpoint) => {
                tracing::info!(url = %endpoint.url, "remote store configured");
                Some(Arc::new(HttpRemoteStore::new(
                    &endpoint,
                    config.request_timeout(),
                )?))
            }
            Err(e) => {
                tracing::info!(reason = %e, "running in demo mode");
                None
            }
        };

        Self::with_parts(config, local, remote, Arc::new(SystemClock::new()))
    }

    /// Opens the local store under `config.data_dir`, encrypted at rest when
    /// an encryption key is configured.
    pub fn open_local(config: &EngineConfig) -> EngineResult<LocalStore> {
        let file = FileBackend::open(&config.data_dir)?;
        let backend: Arc<dyn StorageBackend> = match config.encryption_key()? {
            Some(key) => {
                tracing::debug!(dir = %config.data_dir.display(), "local store encrypted at rest");
                Arc::new(EncryptedBackend::new(Box::new(file), key))
            }
            None => Arc::new(file),
        };
        Ok(LocalStore::with_config(backend, config.local_store()))
    }

    /// Assembles a repository from explicit parts.
    ///
    /// `remote = None` means demo mode.
    pub fn with_parts(
        config: &EngineConfig,
        local: Arc<LocalStore>,
        remote: Option<Arc<dyn RemoteStore>>,
        clock: Arc<dyn Clock>,
    ) -> EngineResult<Self> {
        let classifier = ModeClassifier::new(
            remote.clone(),
            config.probe_collection()?,
            config.probe_timeout(),
        );
        let coordinator = remote.as_ref().map(|remote| {
            SyncCoordinator::new(
                local.clone(),
                remote.clone(),
                clock.clone(),
                config.request_timeout(),
            )
        });
        Ok(Self {
            local,
            remote,
            classifier,
            coordinator,
            clock,
            request_timeout: config.request_timeout(),
            poll_interval: config.poll_interval(),
        })
    }

    /// The local store.
    pub fn local(&self) -> &LocalStore {
        &self.local
    }

    /// Interval at which a [`StatusMonitor`](crate::StatusMonitor) re-probes.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// The remote store, if configured.
    pub fn remote(&self) -> Option<&Arc<dyn RemoteStore>> {
        self.remote.as_ref()
    }

    /// Creates an entity.
    ///
    /// Connected: created remotely and cached locally as `synced`. Otherwise,
    /// or if the remote store cannot be reached, queued locally as `pending`
    /// under a client-generated id.
    pub async fn write(&self, collection: &Collection, fields: Fields) -> EngineResult<Entity> {
        if let Some(remote) = self.connected_remote() {
            match with_timeout(self.request_timeout, remote.create(collection, fields.clone())).await {
                Ok(entity) => {
                    self.local
                        .cache_remote(collection, std::slice::from_ref(&entity))?;
                    return Ok(entity);
                }
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(%collection, error = %e, "remote create failed; queueing locally");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let entity = Entity::new(EntityId::new(), fields, self.clock.now());
        self.local
            .append(collection, LocalRecord::pending(entity.clone()))?;
        tracing::debug!(%collection, id = %entity.id, "write queued");
        Ok(entity)
    }

    /// Reads entities matching `query`.
    ///
    /// Connected: the remote result, cached locally, with pending local
    /// writes laid over it. Otherwise, or if the remote read fails, the
    /// local copy.
    pub async fn read(&self, collection: &Collection, query: &Query) -> EngineResult<Vec<Entity>> {
        if let Some(remote) = self.connected_remote() {
            match with_timeout(self.request_timeout, remote.list(collection, query)).await {
                Ok(entities) => {
                    self.local.cache_remote(collection, &entities)?;
                    return self.overlay_pending(collection, query, entities);
                }
                Err(e) => {
                    tracing::warn!(%collection, error = %e, "remote read failed; serving local copy");
                }
            }
        }

        let records = self.local.list(collection)?;
        Ok(query.apply(records.into_iter().map(|r| r.entity)))
    }

    /// Reads one entity.
    pub async fn get(&self, collection: &Collection, id: EntityId) -> EngineResult<Option<Entity>> {
        Ok(self
            .read(collection, &Query::by_id(id))
            .await?
            .into_iter()
            .next())
    }

    /// Merges `patch` into an entity.
    ///
    /// Connected: updated remotely and cached as `synced`. If the remote
    /// store is unreachable, does not know the id, or the engine is offline,
    /// the local copy is patched and marked `pending`.
    ///
    /// A record that still has queued edits is patched locally and then
    /// pushed whole, so the remote store never applies this edit ahead of
    /// the earlier ones.
    pub async fn update(
        &self,
        collection: &Collection,
        id: EntityId,
        patch: Fields,
    ) -> EngineResult<Entity> {
        if let Some(remote) = self.connected_remote() {
            let queued = self
                .local
                .find_by_id(collection, id)?
                .is_some_and(|record| record.sync_state.is_pending());
            if queued {
                return self.update_queued(collection, id, &patch).await;
            }

            match with_timeout(self.request_timeout, remote.update(collection, id, patch.clone())).await {
                Ok(entity) => {
                    self.local
                        .cache_remote(collection, std::slice::from_ref(&entity))?;
                    return Ok(entity);
                }
                Err(RemoteError::NotFound(_)) => {
                    tracing::debug!(%collection, %id, "unknown remotely; trying local copy");
                }
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(%collection, %id, error = %e, "remote update failed; queueing locally");
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.patch_locally(collection, id, &patch)
    }

    async fn update_queued(
        &self,
        collection: &Collection,
        id: EntityId,
        patch: &Fields,
    ) -> EngineResult<Entity> {
        let patched = self.patch_locally(collection, id, patch)?;
        let Some(coordinator) = &self.coordinator else {
            return Ok(patched);
        };
        match coordinator.push(collection, id).await? {
            Some(SyncOutcome::Conflict { remote }) => Ok(remote),
            Some(SyncOutcome::Failed { error, .. }) => {
                tracing::warn!(%collection, %id, %error, "queued edit not pushed; left pending");
                Ok(patched)
            }
            // Settled or moved on; hand back what a read would return now.
            _ => Ok(self
                .local
                .find_by_id(collection, id)?
                .map_or(patched, |record| record.entity)),
        }
    }

    fn patch_locally(&self, collection: &Collection, id: EntityId, patch: &Fields) -> EngineResult<Entity> {
        let now = self.clock.now();
        let result = self.local.update_by_id(collection, id, |record| {
            let at = now.max(record.entity.updated_at.next());
            record.entity.patch(patch, at);
            record.sync_state = SyncState::Pending;
        });
        match result {
            Ok(record) => Ok(record.entity),
            Err(CoreError::NotFound { .. }) => Err(EngineError::NotFound {
                collection: collection.clone(),
                id,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes an entity.
    ///
    /// Connected: deleted remotely, then evicted locally. Otherwise only the
    /// local copy is evicted.
    pub async fn delete(&self, collection: &Collection, id: EntityId) -> EngineResult<()> {
        let mut deleted_remotely = false;
        if let Some(remote) = self.connected_remote() {
            match with_timeout(self.request_timeout, remote.delete(collection, id)).await {
                Ok(()) => deleted_remotely = true,
                Err(RemoteError::NotFound(_)) => {}
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(%collection, %id, error = %e, "remote delete failed; evicting local copy only");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let evicted = self.local.remove_by_id(collection, id)?;
        if evicted.is_none() && !deleted_remotely {
            return Err(EngineError::NotFound {
                collection: collection.clone(),
                id,
            });
        }
        Ok(())
    }

    /// The last classification. Never probes.
    pub fn status(&self) -> ConnectionStatus {
        self.classifier.current()
    }

    /// Re-probes the remote store without reacting to the result.
    pub async fn probe(&self) -> ConnectionStatus {
        self.classifier.classify().await.0
    }

    /// Re-probes the remote store; runs a sync pass when it became reachable.
    pub async fn refresh_status(&self) -> EngineResult<StatusRefresh> {
        let (_, transition) = self.classifier.classify().await;
        let sync = if transition == Transition::BecameReachable {
            Some(self.request_sync().await?)
        } else {
            None
        };
        // Read back: a pass may have moved last_sync.
        Ok(StatusRefresh {
            status: self.status(),
            transition,
            sync,
        })
    }

    /// Runs a sync pass now.
    ///
    /// In demo mode there is nothing to sync and an empty report is returned.
    pub async fn request_sync(&self) -> EngineResult<SyncReport> {
        let Some(coordinator) = &self.coordinator else {
            return Ok(SyncReport::empty(self.clock.now()));
        };
        let report = coordinator.sync_all().await?;
        if report.settled_count() > 0 {
            self.classifier.record_sync(report.finished_at);
        }
        Ok(report)
    }

    /// Stops a running sync pass after its current entity.
    pub fn cancel_sync(&self) {
        if let Some(coordinator) = &self.coordinator {
            coordinator.cancel();
        }
    }

    /// Running sync totals.
    pub fn sync_stats(&self) -> SyncStats {
        self.coordinator
            .as_ref()
            .map(SyncCoordinator::stats)
            .unwrap_or_default()
    }

    /// Number of writes waiting for a sync pass, over every collection.
    pub fn pending_count(&self) -> EngineResult<usize> {
        Ok(self.local.pending_count()?)
    }

    fn connected_remote(&self) -> Option<&Arc<dyn RemoteStore>> {
        self.remote
            .as_ref()
            .filter(|_| self.classifier.current().is_connected)
    }

    fn overlay_pending(
        &self,
        collection: &Collection,
        query: &Query,
        mut entities: Vec<Entity>,
    ) -> EngineResult<Vec<Entity>> {
        for record in self.local.pending(collection)? {
            match entities.iter_mut().find(|e| e.id == record.entity.id) {
                Some(slot) => *slot = record.entity,
                None => entities.push(record.entity),
            }
        }
        Ok(query.apply(entities))
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("status", &self.status())
            .field("local", &self.local)
            .finish()
    }
}
