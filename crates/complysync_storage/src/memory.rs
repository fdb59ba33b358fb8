//! In-memory storage backend for testing.

use crate::backend::{validate_name, StorageBackend};
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// An in-memory storage backend.
///
/// This backend keeps all blobs in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Demo sessions that should not leave anything on disk
///
/// Writes can be made to fail with [`InMemoryBackend::set_fail_writes`] to
/// exercise storage-failure paths.
///
/// # Example
///
/// ```rust
/// use complysync_storage::{StorageBackend, InMemoryBackend};
///
/// let backend = InMemoryBackend::new();
/// backend.write("profiles", b"test data").unwrap();
/// assert_eq!(backend.names().unwrap(), vec!["profiles".to_string()]);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
    fail_writes: AtomicBool,
    writes: AtomicU64,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following `write` and `remove` fail until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_writable(&self) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(StorageError::Unavailable("writes disabled".into()))
        } else {
            Ok(())
        }
    }
}

impl StorageBackend for InMemoryBackend {
    fn read(&self, name: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_name(name)?;
        Ok(self.blobs.read().get(name).cloned())
    }

    fn write(&self, name: &str, data: &[u8]) -> StorageResult<()> {
        validate_name(name)?;
        self.check_writable()?;
        self.blobs.write().insert(name.to_string(), data.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&self, name: &str) -> StorageResult<()> {
        validate_name(name)?;
        self.check_writable()?;
        self.blobs.write().remove(name);
        Ok(())
    }

    fn names(&self) -> StorageResult<Vec<String>> {
        Ok(self.blobs.read().keys().cloned().collect())
    }
}
