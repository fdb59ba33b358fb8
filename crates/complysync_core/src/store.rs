//! The local fallback store.
//!
//! Each collection is held in memory as an ordered `Vec<LocalRecord>` and
//! persisted as one CBOR blob through a [`StorageBackend`]. A mutation works
//! on a copy of the list, persists the copy, and only then swaps it in, so a
//! failed write leaves both the blob and the in-memory view untouched.

use crate::config::LocalStoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::record::LocalRecord;
use complysync_protocol::{Collection, Entity, EntityId};
use complysync_storage::StorageBackend;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Serializes reconciliation passes over one collection.
pub type PassLock = Arc<tokio::sync::Mutex<()>>;

/// On-disk format version of a collection blob.
const FORMAT_VERSION: u16 = 1;

#[derive(Serialize, Deserialize)]
struct CollectionBlob {
    version: u16,
    records: Vec<LocalRecord>,
}

/// State of one collection.
#[derive(Default)]
struct Slot {
    /// `None` until first access.
    records: Mutex<Option<Vec<LocalRecord>>>,
    pass_lock: PassLock,
}

/// Durable per-collection record lists.
///
/// All operations are synchronous and atomic per collection: concurrent
/// callers on the same collection are serialized, callers on different
/// collections never block each other.
pub struct LocalStore {
    backend: Arc<dyn StorageBackend>,
    config: LocalStoreConfig,
    slots: RwLock<BTreeMap<Collection, Arc<Slot>>>,
}

impl LocalStore {
    /// Creates a store with the default configuration.
    ///
    /// No I/O happens until a collection is first touched.
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self::with_config(backend, LocalStoreConfig::default())
    }

    /// Creates a store with an explicit configuration.
    pub fn with_config(backend: Arc<dyn StorageBackend>, config: LocalStoreConfig) -> Self {
        Self {
            backend,
            config,
            slots: RwLock::new(BTreeMap::new()),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &LocalStoreConfig {
        &self.config
    }

    /// Appends a record.
    ///
    /// Fails with [`CoreError::DuplicateId`] if the id is already present.
    pub fn append(&self, collection: &Collection, record: LocalRecord) -> CoreResult<()> {
        self.mutate(collection, |records| {
            if records.iter().any(|r| r.entity.id == record.entity.id) {
                return Err(CoreError::DuplicateId {
                    collection: collection.clone(),
                    id: record.entity.id,
                });
            }
            records.push(record);
            Ok(((), true))
        })
    }

    /// Returns every record of the collection in insertion order.
    pub fn list(&self, collection: &Collection) -> CoreResult<Vec<LocalRecord>> {
        self.read(collection, |records| records.to_vec())
    }

    /// Returns the record with `id`, if any.
    pub fn find_by_id(&self, collection: &Collection, id: EntityId) -> CoreResult<Option<LocalRecord>> {
        self.read(collection, |records| {
            records.iter().find(|r| r.entity.id == id).cloned()
        })
    }

    /// Applies `f` to the record with `id` and persists the result.
    ///
    /// Returns the record as it is after `f`. If `f` leaves the record
    /// unchanged nothing is written. Fails with [`CoreError::NotFound`] if no
    /// such record exists; a record is never created here.
    pub fn update_by_id<F>(&self, collection: &Collection, id: EntityId, f: F) -> CoreResult<LocalRecord>
    where
        F: FnOnce(&mut LocalRecord),
    {
        self.mutate(collection, |records| {
            let record = records
                .iter_mut()
                .find(|r| r.entity.id == id)
                .ok_or_else(|| CoreError::NotFound {
                    collection: collection.clone(),
                    id,
                })?;
            let before = record.clone();
            f(record);
            let changed = *record != before;
            Ok((record.clone(), changed))
        })
    }

    /// Removes the record with `id` and returns it.
    ///
    /// Removing an absent id is a no-op returning `None`.
    pub fn remove_by_id(&self, collection: &Collection, id: EntityId) -> CoreResult<Option<LocalRecord>> {
        self.mutate(collection, |records| {
            match records.iter().position(|r| r.entity.id == id) {
                Some(index) => Ok((Some(records.remove(index)), true)),
                None => Ok((None, false)),
            }
        })
    }

    /// Stores copies of remote entities as synced records, in one write.
    ///
    /// Pending records are left alone: they carry a local write the remote
    /// store has not seen yet. Conflict records take the newer remote value
    /// but stay flagged until a local write supersedes them.
    pub fn cache_remote(&self, collection: &Collection, entities: &[Entity]) -> CoreResult<()> {
        if entities.is_empty() {
            return Ok(());
        }
        self.mutate(collection, |records| {
            let mut changed = false;
            for entity in entities {
                match records.iter_mut().find(|r| r.entity.id == entity.id) {
                    Some(record) if record.sync_state.is_pending() => {}
                    Some(record) => {
                        if record.entity != *entity {
                            record.entity = entity.clone();
                            changed = true;
                        }
                    }
                    None => {
                        records.push(LocalRecord::synced(entity.clone()));
                        changed = true;
                    }
                }
            }
            Ok(((), changed))
        })
    }

    /// Returns the pending records of the collection in insertion order.
    pub fn pending(&self, collection: &Collection) -> CoreResult<Vec<LocalRecord>> {
        self.read(collection, |records| {
            records
                .iter()
                .filter(|r| r.sync_state.is_pending())
                .cloned()
                .collect()
        })
    }

    /// Counts pending records across every collection.
    pub fn pending_count(&self) -> CoreResult<usize> {
        let mut total = 0;
        for collection in self.collections()? {
            total += self.read(&collection, |records| {
                records.iter().filter(|r| r.sync_state.is_pending()).count()
            })?;
        }
        Ok(total)
    }

    /// Returns every known collection, sorted by name.
    ///
    /// This is the union of collections persisted by the backend and
    /// collections touched in this process.
    pub fn collections(&self) -> CoreResult<Vec<Collection>> {
        let mut names: Vec<Collection> = self
            .backend
            .names()?
            .into_iter()
            .filter_map(|name| match Collection::new(name) {
                Ok(collection) => Some(collection),
                Err(e) => {
                    tracing::debug!(error = %e, "ignoring blob with a non-collection name");
                    None
                }
            })
            .collect();
        for name in self.slots.read().keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Returns the reconciliation lock of a collection.
    pub fn pass_lock(&self, collection: &Collection) -> PassLock {
        Arc::clone(&self.slot(collection).pass_lock)
    }

    fn slot(&self, collection: &Collection) -> Arc<Slot> {
        if let Some(slot) = self.slots.read().get(collection) {
            return Arc::clone(slot);
        }
        Arc::clone(self.slots.write().entry(collection.clone()).or_default())
    }

    fn read<T>(&self, collection: &Collection, f: impl FnOnce(&[LocalRecord]) -> T) -> CoreResult<T> {
        let slot = self.slot(collection);
        let mut guard = slot.records.lock();
        let records = self.loaded(collection, &mut guard)?;
        Ok(f(records))
    }

    /// Runs `f` on a working copy and persists it if `f` reports a change.
    fn mutate<T>(
        &self,
        collection: &Collection,
        f: impl FnOnce(&mut Vec<LocalRecord>) -> CoreResult<(T, bool)>,
    ) -> CoreResult<T> {
        let slot = self.slot(collection);
        let mut guard = slot.records.lock();
        let current = self.loaded(collection, &mut guard)?;

        let mut working = current.clone();
        let (value, changed) = f(&mut working)?;
        if changed {
            self.persist(collection, &working)?;
            *guard = Some(working);
        }
        Ok(value)
    }

    fn loaded<'a>(
        &self,
        collection: &Collection,
        slot: &'a mut Option<Vec<LocalRecord>>,
    ) -> CoreResult<&'a mut Vec<LocalRecord>> {
        if slot.is_none() {
            let records = self.load(collection)?;
            tracing::debug!(%collection, records = records.len(), "loaded collection");
            *slot = Some(records);
        }
        Ok(slot.get_or_insert_with(Vec::new))
    }

    fn load(&self, collection: &Collection) -> CoreResult<Vec<LocalRecord>> {
        let Some(bytes) = self.backend.read(collection.as_str())? else {
            return Ok(Vec::new());
        };
        let blob: CollectionBlob =
            ciborium::from_reader(bytes.as_slice()).map_err(|e| CoreError::Codec {
                collection: collection.clone(),
                message: e.to_string(),
            })?;
        if blob.version != FORMAT_VERSION {
            return Err(CoreError::Codec {
                collection: collection.clone(),
                message: format!("unsupported format version {}", blob.version),
            });
        }
        Ok(blob.records)
    }

    fn persist(&self, collection: &Collection, records: &[LocalRecord]) -> CoreResult<()> {
        let blob = CollectionBlob {
            version: FORMAT_VERSION,
            records: records.to_vec(),
        };
        let mut bytes = Vec::new();
        ciborium::into_writer(&blob, &mut bytes).map_err(|e| CoreError::Codec {
            collection: collection.clone(),
            message: e.to_string(),
        })?;

        if let Some(quota) = self.config.quota_bytes {
            let size = bytes.len() as u64;
            if size > quota {
                tracing::warn!(%collection, size, quota, "local store quota exceeded");
                return Err(CoreError::QuotaExceeded {
                    collection: collection.clone(),
                    size,
                    quota,
                });
            }
        }

        self.backend
            .write(collection.as_str(), &bytes)
            .map_err(|e| {
                tracing::warn!(%collection, error = %e, "failed to persist collection");
                CoreError::from(e)
            })
    }
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore")
            .field("config", &self.config)
            .field("loaded_collections", &self.slots.read().len())
            .finish()
    }
}
