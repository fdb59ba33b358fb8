//! Local store configuration.

/// Configuration for a [`crate::LocalStore`].
#[derive(Debug, Clone, Default)]
pub struct LocalStoreConfig {
    /// Maximum encoded size of a single collection, in bytes. `None` means
    /// unbounded.
    pub quota_bytes: Option<u64>,
}

impl LocalStoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-collection quota.
    #[must_use]
    pub const fn quota_bytes(mut self, quota: u64) -> Self {
        self.quota_bytes = Some(quota);
        self
    }
}
