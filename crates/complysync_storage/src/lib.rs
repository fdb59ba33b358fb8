//! # ComplySync Storage
//!
//! Durable blob storage backends for the ComplySync local fallback store.
//!
//! Backends are **opaque blob stores** keyed by collection name. They do not
//! interpret the bytes they hold; the record layout belongs to
//! `complysync_core`.
//!
//! ## Design Principles
//!
//! - One blob per collection, replaced wholesale on every write
//! - A write is durable before `write` returns (no flush window)
//! - Must be `Send + Sync` so one store can be shared by the repository and
//!   the sync coordinator
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For tests and demo sessions
//! - [`FileBackend`] - One file per collection inside a locked data directory
//! - [`EncryptedBackend`] - Wrapper that adds AES-256-GCM encryption at rest
//!
//! ## Example
//!
//! ```rust
//! use complysync_storage::{StorageBackend, InMemoryBackend};
//!
//! let backend = InMemoryBackend::new();
//! backend.write("profiles", b"hello world").unwrap();
//! assert_eq!(backend.read("profiles").unwrap().unwrap(), b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod backend;
mod encrypted;
mod error;
mod file;
mod memory;

pub use backend::{validate_name, StorageBackend};
pub use encrypted::{EncryptedBackend, EncryptionKey, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
