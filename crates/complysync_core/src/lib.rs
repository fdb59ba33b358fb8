//! # ComplySync Core
//!
//! The durable local fallback store of ComplySync.
//!
//! The [`LocalStore`] keeps, per collection, an ordered list of
//! [`LocalRecord`]s: entities plus their [`SyncState`] bookkeeping. It serves
//! three roles at once:
//!
//! - the write queue while the remote store is unreachable (`pending` records)
//! - the demo dataset when no remote store is configured
//! - a cache of remote records, so reads keep working after a disconnect
//!
//! ## Key Invariants
//!
//! - Every mutation is persisted before it returns (no flush window)
//! - At most one record per id per collection
//! - Readers never observe a half-applied mutation
//! - `update_by_id` never creates a record
//!
//! ## Example
//!
//! ```rust
//! use complysync_core::{LocalRecord, LocalStore};
//! use complysync_protocol::{Collection, Entity, EntityId, Fields, Timestamp};
//! use complysync_storage::InMemoryBackend;
//! use std::sync::Arc;
//!
//! let store = LocalStore::new(Arc::new(InMemoryBackend::new()));
//! let entity = Entity::new(EntityId::new(), Fields::new(), Timestamp::now());
//! store.append(&Collection::profiles(), LocalRecord::pending(entity)).unwrap();
//! assert_eq!(store.pending(&Collection::profiles()).unwrap().len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod clock;
mod config;
mod error;
mod record;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LocalStoreConfig;
pub use error::{CoreError, CoreResult};
pub use record::{LocalRecord, SyncState};
pub use store::{LocalStore, PassLock};
