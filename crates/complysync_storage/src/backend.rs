//! Storage backend trait definition.

use crate::error::{StorageError, StorageResult};

/// Maximum length of a blob name.
const MAX_NAME_LEN: usize = 64;

/// A durable blob store keyed by collection name.
///
/// Backends are **opaque byte stores**. The local fallback store encodes a
/// whole collection into one blob and hands it to the backend; the backend
/// never looks inside.
///
/// # Invariants
///
/// - `read` returns exactly the bytes of the last successful `write`
/// - `write` is durable when it returns: the blob survives process termination
/// - a failed `write` leaves the previous blob intact
/// - Backends must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileBackend`] - For persistent storage
/// - [`super::EncryptedBackend`] - Encryption wrapper around another backend
pub trait StorageBackend: Send + Sync {
    /// Reads the blob stored under `name`.
    ///
    /// Returns `None` if nothing has been written under that name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or an I/O error occurs.
    fn read(&self, name: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Replaces the blob stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the data could not be made
    /// durable.
    fn write(&self, name: &str, data: &[u8]) -> StorageResult<()>;

    /// Removes the blob stored under `name`. Removing a missing blob is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or an I/O error occurs.
    fn remove(&self, name: &str) -> StorageResult<()>;

    /// Lists the names of all stored blobs, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing cannot be produced.
    fn names(&self) -> StorageResult<Vec<String>>;
}

/// Checks that a blob name is safe to use as a file stem.
///
/// Names are 1-64 characters of ASCII letters, digits, `_` or `-`.
///
/// # Errors
///
/// Returns [`StorageError::InvalidName`] otherwise.
pub fn validate_name(name: &str) -> StorageResult<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');

    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidName(name.to_string()))
    }
}
