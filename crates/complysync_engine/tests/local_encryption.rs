//! Local store encryption selected through configuration.

use complysync_engine::{EngineConfig, ErrorKind, Repository};
use complysync_protocol::{Collection, Fields, Query};
use complysync_storage::EncryptionKey;
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn subject(email: &str) -> Fields {
    let mut fields = Fields::new();
    fields.insert("email".into(), json!(email));
    fields
}

fn raw_contents(dir: &Path) -> Vec<u8> {
    let mut bytes = Vec::new();
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_file() {
            bytes.extend(fs::read(path).unwrap());
        }
    }
    bytes
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[tokio::test]
async fn configured_key_encrypts_the_queue_at_rest() {
    let dir = tempdir().unwrap();
    let key = EncryptionKey::generate();
    let config = EngineConfig::new()
        .with_data_dir(dir.path())
        .with_encryption_key(&key);

    let written = {
        let repository = Repository::open(&config).unwrap();
        repository
            .write(&Collection::profiles(), subject("alice@example.com"))
            .await
            .unwrap()
    };
    assert!(!contains(&raw_contents(dir.path()), b"alice@example.com"));

    let repository = Repository::open(&config).unwrap();
    let read = repository
        .read(&Collection::profiles(), &Query::all())
        .await
        .unwrap();
    assert_eq!(read, vec![written]);
    assert_eq!(repository.pending_count().unwrap(), 1);
}

#[tokio::test]
async fn wrong_key_is_a_storage_failure() {
    let dir = tempdir().unwrap();
    let config = EngineConfig::new().with_data_dir(dir.path());

    {
        let repository = Repository::open(&config.clone().with_encryption_key(&EncryptionKey::generate())).unwrap();
        repository
            .write(&Collection::profiles(), subject("bob@example.com"))
            .await
            .unwrap();
    }

    let repository = Repository::open(&config.with_encryption_key(&EncryptionKey::generate())).unwrap();
    let err = repository
        .read(&Collection::profiles(), &Query::all())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StorageFailure);
}

#[tokio::test]
async fn without_a_key_the_store_is_plain() {
    let dir = tempdir().unwrap();
    let config = EngineConfig::new().with_data_dir(dir.path());
    let repository = Repository::open(&config).unwrap();
    repository
        .write(&Collection::profiles(), subject("carol@example.com"))
        .await
        .unwrap();
    drop(repository);

    // CBOR keeps text strings verbatim.
    assert!(contains(&raw_contents(dir.path()), b"carol@example.com"));
}
