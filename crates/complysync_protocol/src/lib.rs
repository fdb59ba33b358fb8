//! # ComplySync Protocol
//!
//! Entity model and remote wire protocol types for ComplySync.
//!
//! This crate provides:
//! - [`Entity`] with its identity and timestamps
//! - [`Collection`] names and [`Query`] filters
//! - Request/response bodies exchanged with the remote store
//! - The last-write-wins conflict rule shared by client and server
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod collection;
mod conflict;
mod entity;
mod error;
mod id;
mod messages;
mod query;

pub use collection::Collection;
pub use conflict::{resolve_last_write_wins, ConflictResolution};
pub use entity::{apply_patch, Entity, Fields, Timestamp};
pub use error::{ProtocolError, ProtocolResult};
pub use id::EntityId;
pub use messages::{
    CreateRequest, ErrorBody, UpdateRequest, UpsertOutcome, UpsertResponse, UpsertStatus,
};
pub use query::Query;
