//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The blob name cannot be used as a storage key.
    #[error("invalid blob name: {0:?}")]
    InvalidName(String),

    /// Another process holds the data directory.
    #[error("data directory locked: another process has exclusive access")]
    Locked,

    /// The stored data is corrupted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// Encryption or decryption failed.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// The backend refused the write (injected in tests, or a full medium).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}
