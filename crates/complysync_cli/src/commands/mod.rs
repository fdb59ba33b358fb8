//! CLI command implementations.

pub mod inspect;
pub mod status;
pub mod sync;
pub mod watch;
