//! # ComplySync Engine
//!
//! Connection-aware synchronization for ComplySync.
//!
//! This crate provides:
//! - [`ModeClassifier`]: demo / production / offline detection
//! - [`RemoteStore`]: the hosted backend behind a trait, with an HTTP client
//!   and an in-memory implementation
//! - [`SyncCoordinator`]: last-write-wins reconciliation of queued writes
//! - [`Repository`]: the facade UI code uses, which falls back to the local
//!   store whenever the remote one is not available
//! - [`StatusMonitor`]: periodic re-probing with automatic sync on reconnect
//!
//! ## Architecture
//!
//! Writes go to the remote store while it is reachable. Otherwise they are
//! accepted into the local store as `pending` and drained in append order by
//! the next sync pass. The remote copy is canonical: a local write that is
//! not strictly newer loses and is recorded as a conflict.
//!
//! ## Key Invariants
//!
//! - No accepted write is lost across connectivity changes
//! - Sync passes are idempotent
//! - Ties in `updated_at` go to the remote copy
//! - No operation fails only because the network is down

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod coordinator;
mod error;
mod mode;
mod monitor;
pub mod remote;
mod repository;

pub use config::{ConfigError, EngineConfig, RemoteEndpoint, RemoteSettings, Secret, ENV_PREFIX};
pub use coordinator::{
    CancellationFlag, EntitySyncOutcome, SyncCoordinator, SyncOutcome, SyncReport, SyncStats,
};
pub use error::{EngineError, EngineResult, ErrorKind};
pub use mode::{ConnectionStatus, DisplayMode, Mode, ModeClassifier, ProbeResult, Transition};
pub use monitor::StatusMonitor;
pub use remote::{HttpRemoteStore, MemoryRemoteStore, RemoteError, RemoteErrorKind, RemoteStore};
pub use repository::{Repository, StatusRefresh};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
