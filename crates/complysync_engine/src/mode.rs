//! Connection mode classification.
//!
//! The classifier decides whether the engine runs against the remote store
//! (`production`) or only against the local store (`demo`), and whether the
//! remote store is currently reachable. The decision is cached until the
//! next probe; reading it never touches the network.

use crate::remote::{with_timeout, RemoteStore};
use complysync_protocol::{Collection, Query, Timestamp};
use parking_lot::RwLock;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Which store is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// A remote store is configured.
    Production,
    /// No usable remote configuration; everything stays local.
    Demo,
}

/// The label shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// Production and connected.
    Production,
    /// Demo mode.
    Demo,
    /// Production but unreachable.
    Offline,
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DisplayMode::Production => "production",
            DisplayMode::Demo => "demo",
            DisplayMode::Offline => "offline",
        })
    }
}

/// What a probe found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    /// No remote configuration; no probe was attempted.
    NotConfigured,
    /// The probe succeeded.
    Reachable,
    /// The probe failed, with the failure text.
    Unreachable(String),
}

/// A classification. Always replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    /// Which store is authoritative.
    pub mode: Mode,
    /// Whether the remote store answered the last probe.
    pub is_connected: bool,
    /// End of the last sync pass that settled at least one entity.
    pub last_sync: Option<Timestamp>,
    /// Why the last probe failed.
    pub error: Option<String>,
}

impl ConnectionStatus {
    /// The status of an engine without remote configuration.
    pub fn demo() -> Self {
        Self {
            mode: Mode::Demo,
            is_connected: false,
            last_sync: None,
            error: None,
        }
    }

    /// The status of a configured engine before its first probe.
    pub fn unprobed() -> Self {
        Self {
            mode: Mode::Production,
            is_connected: false,
            last_sync: None,
            error: None,
        }
    }

    /// Classifies a probe result. `last_sync` is carried over: a probe is not
    /// a sync.
    pub fn from_probe(probe: ProbeResult, last_sync: Option<Timestamp>) -> Self {
        match probe {
            ProbeResult::NotConfigured => Self {
                last_sync,
                ..Self::demo()
            },
            ProbeResult::Reachable => Self {
                mode: Mode::Production,
                is_connected: true,
                last_sync,
                error: None,
            },
            ProbeResult::Unreachable(error) => Self {
                mode: Mode::Production,
                is_connected: false,
                last_sync,
                error: Some(error),
            },
        }
    }

    /// `offline` when production is unreachable, the mode otherwise.
    pub fn display_mode(&self) -> DisplayMode {
        match (self.mode, self.is_connected) {
            (Mode::Demo, _) => DisplayMode::Demo,
            (Mode::Production, true) => DisplayMode::Production,
            (Mode::Production, false) => DisplayMode::Offline,
        }
    }
}

/// Change in reachability between two classifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Disconnected before, connected now.
    BecameReachable,
    /// Connected before, disconnected now.
    BecameUnreachable,
    /// No change in reachability.
    Unchanged,
}

impl Transition {
    /// Compares two classifications.
    pub fn between(previous: &ConnectionStatus, next: &ConnectionStatus) -> Self {
        match (previous.is_connected, next.is_connected) {
            (false, true) => Transition::BecameReachable,
            (true, false) => Transition::BecameUnreachable,
            _ => Transition::Unchanged,
        }
    }
}

/// Probes the remote store and caches the resulting [`ConnectionStatus`].
pub struct ModeClassifier {
    remote: Option<Arc<dyn RemoteStore>>,
    probe_collection: Collection,
    probe_timeout: Duration,
    current: RwLock<ConnectionStatus>,
}

impl ModeClassifier {
    /// Creates a classifier. `remote` is `None` when configuration is
    /// missing, which pins the classifier to demo mode.
    pub fn new(
        remote: Option<Arc<dyn RemoteStore>>,
        probe_collection: Collection,
        probe_timeout: Duration,
    ) -> Self {
        let initial = if remote.is_some() {
            ConnectionStatus::unprobed()
        } else {
            ConnectionStatus::demo()
        };
        Self {
            remote,
            probe_collection,
            probe_timeout,
            current: RwLock::new(initial),
        }
    }

    /// The cached classification.
    pub fn current(&self) -> ConnectionStatus {
        self.current.read().clone()
    }

    /// Probes the remote store and replaces the cached classification.
    ///
    /// Never fails; probe errors become `is_connected = false`.
    pub async fn classify(&self) -> (ConnectionStatus, Transition) {
        let probe = self.probe().await;
        let mut current = self.current.write();
        let next = ConnectionStatus::from_probe(probe, current.last_sync);
        let transition = Transition::between(&current, &next);
        match transition {
            Transition::BecameReachable => tracing::info!("remote store reachable"),
            Transition::BecameUnreachable => tracing::warn!(
                error = next.error.as_deref().unwrap_or_default(),
                "remote store unreachable; queueing writes locally"
            ),
            Transition::Unchanged => {
                tracing::debug!(mode = %next.display_mode(), "connection status unchanged")
            }
        }
        *current = next.clone();
        (next, transition)
    }

    /// Records the end of a sync pass.
    pub fn record_sync(&self, at: Timestamp) {
        let mut current = self.current.write();
        *current = ConnectionStatus {
            last_sync: Some(at),
            ..current.clone()
        };
    }

    async fn probe(&self) -> ProbeResult {
        let Some(remote) = &self.remote else {
            return ProbeResult::NotConfigured;
        };
        let query = Query::all().limit(1);
        match with_timeout(self.probe_timeout, remote.list(&self.probe_collection, &query)).await {
            Ok(_) => ProbeResult::Reachable,
            Err(e) => ProbeResult::Unreachable(e.to_string()),
        }
    }
}

impl fmt::Debug for ModeClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModeClassifier")
            .field("configured", &self.remote.is_some())
            .field("probe_collection", &self.probe_collection)
            .field("current", &*self.current.read())
            .finish()
    }
}
