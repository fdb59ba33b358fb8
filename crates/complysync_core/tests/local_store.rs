//! Local store behaviour on top of real backends.

use complysync_core::{LocalRecord, LocalStore, SyncState};
use complysync_protocol::{Collection, Entity, EntityId, Fields, Timestamp};
use complysync_storage::{EncryptedBackend, EncryptionKey, FileBackend};
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;
use tempfile::tempdir;

fn entity(n: i64) -> Entity {
    let mut fields = Fields::new();
    fields.insert("n".into(), json!(n));
    Entity::new(EntityId::new(), fields, Timestamp::from_millis(n))
}

#[test]
fn records_survive_restart_on_disk() {
    let dir = tempdir().unwrap();
    let c = Collection::data_subject_requests();
    let a = entity(1);
    let b = entity(2);

    {
        let store = LocalStore::new(Arc::new(FileBackend::open(dir.path()).unwrap()));
        store.append(&c, LocalRecord::pending(a.clone())).unwrap();
        store.append(&c, LocalRecord::pending(b.clone())).unwrap();
        store
            .update_by_id(&c, a.id, |r| r.sync_state = SyncState::Synced)
            .unwrap();
    }

    let store = LocalStore::new(Arc::new(FileBackend::open(dir.path()).unwrap()));
    assert_eq!(
        store.list(&c).unwrap(),
        vec![LocalRecord::synced(a), LocalRecord::pending(b.clone())]
    );
    assert_eq!(store.pending(&c).unwrap(), vec![LocalRecord::pending(b)]);
    assert_eq!(store.collections().unwrap(), vec![c]);
}

#[test]
fn encrypted_records_survive_restart() {
    let dir = tempdir().unwrap();
    let key = EncryptionKey::generate();
    let c = Collection::profiles();
    let a = entity(7);

    {
        let file = FileBackend::open(dir.path()).unwrap();
        let store = LocalStore::new(Arc::new(EncryptedBackend::new(Box::new(file), key.clone())));
        store.append(&c, LocalRecord::pending(a.clone())).unwrap();
    }

    let raw = std::fs::read(dir.path().join("profiles.dat")).unwrap();
    let id = a.id.to_string();
    assert!(!raw.windows(id.len()).any(|w| w == id.as_bytes()));

    let file = FileBackend::open(dir.path()).unwrap();
    let store = LocalStore::new(Arc::new(EncryptedBackend::new(Box::new(file), key)));
    assert_eq!(store.find_by_id(&c, a.id).unwrap(), Some(LocalRecord::pending(a)));
}

#[test]
fn concurrent_appends_are_all_kept() {
    let dir = tempdir().unwrap();
    let store = Arc::new(LocalStore::new(Arc::new(FileBackend::open(dir.path()).unwrap())));
    let c = Collection::profiles();

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let store = Arc::clone(&store);
            let c = c.clone();
            std::thread::spawn(move || {
                for i in 0..10 {
                    store
                        .append(&c, LocalRecord::pending(entity(t * 100 + i)))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.list(&c).unwrap().len(), 80);
    assert_eq!(store.pending_count().unwrap(), 80);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn pending_is_exactly_the_unsettled_records(states in prop::collection::vec(0u8..3, 0..20)) {
        let store = LocalStore::new(Arc::new(complysync_storage::InMemoryBackend::new()));
        let c = Collection::profiles();
        let mut expected = Vec::new();

        for (i, state) in states.iter().enumerate() {
            let e = entity(i as i64);
            let record = LocalRecord::pending(e.clone());
            store.append(&c, record).unwrap();
            let sync_state = match state {
                0 => SyncState::Pending,
                1 => SyncState::Synced,
                _ => SyncState::Conflict,
            };
            store.update_by_id(&c, e.id, |r| r.sync_state = sync_state).unwrap();
            if sync_state == SyncState::Pending {
                expected.push(e.id);
            }
        }

        let pending: Vec<_> = store.pending(&c).unwrap().into_iter().map(|r| r.entity.id).collect();
        prop_assert_eq!(pending, expected);
    }
}
