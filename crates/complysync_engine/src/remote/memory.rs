//! In-process remote store.

use super::{RemoteError, RemoteResult, RemoteStore};
use async_trait::async_trait;
use complysync_core::{Clock, SystemClock};
use complysync_protocol::{
    resolve_last_write_wins, Collection, ConflictResolution, Entity, EntityId, Fields, Query,
    UpsertOutcome,
};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A [`RemoteStore`] held in memory.
///
/// Implements the same contract as the hosted backend, including the
/// last-write-wins upsert, and adds knobs for tests and demos: a
/// reachability switch, per-id failure injection and artificial latency.
pub struct MemoryRemoteStore {
    collections: RwLock<BTreeMap<Collection, Vec<Entity>>>,
    clock: Arc<dyn Clock>,
    reachable: AtomicBool,
    failures: Mutex<HashMap<EntityId, RemoteError>>,
    latency: Mutex<Option<Duration>>,
    upserts: AtomicU64,
}

impl MemoryRemoteStore {
    /// Creates an empty, reachable store stamping times from the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    /// Creates an empty, reachable store stamping times from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            collections: RwLock::new(BTreeMap::new()),
            clock,
            reachable: AtomicBool::new(true),
            failures: Mutex::new(HashMap::new()),
            latency: Mutex::new(None),
            upserts: AtomicU64::new(0),
        }
    }

    /// Makes every call fail with a network error while `false`.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Returns the reachability switch.
    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    /// Makes every call touching `id` fail with `error`.
    pub fn fail_id(&self, id: EntityId, error: RemoteError) {
        self.failures.lock().insert(id, error);
    }

    /// Removes an injected failure.
    pub fn clear_failure(&self, id: EntityId) {
        self.failures.lock().remove(&id);
    }

    /// Delays every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    /// Stores an entity as-is, bypassing the conflict rule.
    pub fn insert(&self, collection: &Collection, entity: Entity) {
        let mut collections = self.collections.write();
        let entities = collections.entry(collection.clone()).or_default();
        match entities.iter_mut().find(|e| e.id == entity.id) {
            Some(existing) => *existing = entity,
            None => entities.push(entity),
        }
    }

    /// Returns the stored copy of an entity.
    pub fn get(&self, collection: &Collection, id: EntityId) -> Option<Entity> {
        self.collections
            .read()
            .get(collection)
            .and_then(|entities| entities.iter().find(|e| e.id == id).cloned())
    }

    /// Returns every stored entity of a collection.
    pub fn entities(&self, collection: &Collection) -> Vec<Entity> {
        self.collections
            .read()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of upserts received, including failed ones.
    pub fn upsert_count(&self) -> u64 {
        self.upserts.load(Ordering::SeqCst)
    }

    async fn gate(&self, id: Option<EntityId>) -> RemoteResult<()> {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if !self.is_reachable() {
            return Err(RemoteError::Network("connection refused".into()));
        }
        if let Some(id) = id {
            if let Some(error) = self.failures.lock().get(&id) {
                return Err(error.clone());
            }
        }
        Ok(())
    }

    fn not_found(collection: &Collection, id: EntityId) -> RemoteError {
        RemoteError::NotFound(format!("{collection}/{id}"))
    }
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryRemoteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRemoteStore")
            .field("reachable", &self.is_reachable())
            .field("collections", &self.collections.read().len())
            .finish()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn create(&self, collection: &Collection, fields: Fields) -> RemoteResult<Entity> {
        self.gate(None).await?;
        let entity = Entity::new(EntityId::new(), fields, self.clock.now());
        self.insert(collection, entity.clone());
        Ok(entity)
    }

    async fn read(&self, collection: &Collection, id: EntityId) -> RemoteResult<Entity> {
        self.gate(Some(id)).await?;
        self.get(collection, id)
            .ok_or_else(|| Self::not_found(collection, id))
    }

    async fn list(&self, collection: &Collection, query: &Query) -> RemoteResult<Vec<Entity>> {
        self.gate(query.id()).await?;
        Ok(query.apply(self.entities(collection)))
    }

    async fn update(
        &self,
        collection: &Collection,
        id: EntityId,
        patch: Fields,
    ) -> RemoteResult<Entity> {
        self.gate(Some(id)).await?;
        let now = self.clock.now();
        let mut collections = self.collections.write();
        let entity = collections
            .get_mut(collection)
            .and_then(|entities| entities.iter_mut().find(|e| e.id == id))
            .ok_or_else(|| Self::not_found(collection, id))?;
        entity.patch(&patch, now.max(entity.updated_at.next()));
        Ok(entity.clone())
    }

    async fn upsert(&self, collection: &Collection, entity: &Entity) -> RemoteResult<UpsertOutcome> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.gate(Some(entity.id)).await?;

        let mut collections = self.collections.write();
        let entities = collections.entry(collection.clone()).or_default();
        let position = entities.iter().position(|e| e.id == entity.id);
        let resolution = resolve_last_write_wins(entity, position.map(|i| &entities[i]));
        match (resolution, position) {
            (ConflictResolution::KeepLocal, Some(i)) => {
                entities[i] = entity.clone();
                Ok(UpsertOutcome::Applied(entity.clone()))
            }
            (ConflictResolution::KeepLocal, None) => {
                entities.push(entity.clone());
                Ok(UpsertOutcome::Applied(entity.clone()))
            }
            (ConflictResolution::AcceptRemote, Some(i)) => {
                Ok(UpsertOutcome::Superseded(entities[i].clone()))
            }
            (ConflictResolution::AcceptRemote, None) => Err(RemoteError::Unknown(
                "conflict reported without a stored copy".into(),
            )),
        }
    }

    async fn delete(&self, collection: &Collection, id: EntityId) -> RemoteResult<()> {
        self.gate(Some(id)).await?;
        let mut collections = self.collections.write();
        let entities = collections
            .get_mut(collection)
            .ok_or_else(|| Self::not_found(collection, id))?;
        let index = entities
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| Self::not_found(collection, id))?;
        entities.remove(index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use complysync_core::ManualClock;
    use complysync_protocol::Timestamp;
    use serde_json::json;

    fn fields(v: i64) -> Fields {
        let mut f = Fields::new();
        f.insert("v".into(), json!(v));
        f
    }

    fn store() -> MemoryRemoteStore {
        MemoryRemoteStore::with_clock(Arc::new(ManualClock::new(1_000)))
    }

    #[tokio::test]
    async fn create_then_read() {
        let remote = store();
        let c = Collection::profiles();
        let created = remote.create(&c, fields(1)).await.unwrap();
        assert_eq!(created.created_at, Timestamp::from_millis(1_000));
        assert_eq!(remote.read(&c, created.id).await.unwrap(), created);
    }

    #[tokio::test]
    async fn upsert_last_write_wins() {
        let remote = store();
        let c = Collection::profiles();
        let id = EntityId::new();
        remote.insert(&c, Entity::new(id, fields(1), Timestamp::from_millis(50)));

        let older = Entity::new(id, fields(2), Timestamp::from_millis(40));
        let outcome = remote.upsert(&c, &older).await.unwrap();
        assert!(!outcome.is_applied());
        assert_eq!(outcome.entity().updated_at, Timestamp::from_millis(50));

        let tie = Entity::new(id, fields(3), Timestamp::from_millis(50));
        assert!(!remote.upsert(&c, &tie).await.unwrap().is_applied());

        let newer = Entity::new(id, fields(4), Timestamp::from_millis(60));
        assert!(remote.upsert(&c, &newer).await.unwrap().is_applied());
        assert_eq!(remote.get(&c, id), Some(newer.clone()));

        // Re-delivering the accepted copy is still applied.
        assert!(remote.upsert(&c, &newer).await.unwrap().is_applied());
        assert_eq!(remote.upsert_count(), 4);
    }

    #[tokio::test]
    async fn unreachable_and_injected_failures() {
        let remote = store();
        let c = Collection::profiles();
        let entity = Entity::new(EntityId::new(), fields(1), Timestamp::from_millis(5));

        remote.set_reachable(false);
        let err = remote.upsert(&c, &entity).await.unwrap_err();
        assert!(matches!(err, RemoteError::Network(_)));

        remote.set_reachable(true);
        remote.fail_id(entity.id, RemoteError::Rejected("locked".into()));
        assert!(matches!(
            remote.upsert(&c, &entity).await,
            Err(RemoteError::Rejected(_))
        ));

        remote.clear_failure(entity.id);
        assert!(remote.upsert(&c, &entity).await.unwrap().is_applied());
    }

    #[tokio::test]
    async fn update_and_delete_missing() {
        let remote = store();
        let c = Collection::profiles();
        let id = EntityId::new();
        assert!(matches!(
            remote.update(&c, id, fields(1)).await,
            Err(RemoteError::NotFound(_))
        ));
        assert!(matches!(remote.delete(&c, id).await, Err(RemoteError::NotFound(_))));
    }

    #[tokio::test]
    async fn update_bumps_version() {
        let remote = store();
        let c = Collection::profiles();
        let created = remote.create(&c, fields(1)).await.unwrap();
        let updated = remote.update(&c, created.id, fields(2)).await.unwrap();
        assert!(updated.updated_at > created.updated_at);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.get("v"), Some(&json!(2)));
    }
}
