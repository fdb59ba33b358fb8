//! Engine configuration.
//!
//! Values are layered with figment, highest priority last:
//!
//! 1. Built-in defaults
//! 2. `COMPLYSYNC_*` environment variables (`COMPLYSYNC_REMOTE_URL` maps to
//!    `remote_url`, and so on)
//!
//! A missing or malformed remote URL or key is not a load error: it selects
//! demo mode. [`RemoteSettings::validate`] explains why. Zero timeouts or poll
//! intervals and malformed encryption keys are load errors.

use complysync_core::LocalStoreConfig;
use complysync_protocol::Collection;
use complysync_storage::{EncryptionKey, KEY_SIZE};
use figment::providers::{Env, Serialized};
use figment::Figment;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "COMPLYSYNC_";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Figment extraction error.
    #[error("failed to load configuration: {0}")]
    Figment(#[from] Box<figment::Error>),

    /// A required remote setting is absent.
    #[error("remote {field} is not configured")]
    Missing {
        /// The absent setting.
        field: &'static str,
    },

    /// A setting has an unusable value.
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// The offending setting.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

/// A credential that never shows up in logs.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wraps a credential.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the credential.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base URL of the remote store.
    pub remote_url: Option<String>,
    /// Access key of the remote store.
    pub remote_key: Option<Secret>,
    /// Directory holding the local store.
    pub data_dir: PathBuf,
    /// Timeout for each remote call, in milliseconds.
    pub request_timeout_ms: u64,
    /// Timeout for the reachability probe, in milliseconds.
    pub probe_timeout_ms: u64,
    /// Interval between status re-probes, in milliseconds.
    pub poll_interval_ms: u64,
    /// Collection listed by the reachability probe.
    pub probe_collection: String,
    /// Per-collection local storage quota, in bytes.
    pub quota_bytes: Option<u64>,
    /// Hex-encoded AES-256 key; when set the local store is encrypted at rest.
    pub encryption_key: Option<Secret>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            remote_url: None,
            remote_key: None,
            data_dir: PathBuf::from(".complysync"),
            request_timeout_ms: 5_000,
            probe_timeout_ms: 5_000,
            poll_interval_ms: 5_000,
            probe_collection: Collection::profiles().to_string(),
            quota_bytes: None,
            encryption_key: None,
        }
    }
}

impl EngineConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads defaults overlaid with `COMPLYSYNC_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Self::figment()
            .extract()
            .map_err(|e| ConfigError::Figment(Box::new(e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the engine cannot run with.
    ///
    /// Remote settings are not checked here; see [`RemoteSettings::validate`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("request_timeout_ms", self.request_timeout_ms),
            ("probe_timeout_ms", self.probe_timeout_ms),
            ("poll_interval_ms", self.poll_interval_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".into(),
                });
            }
        }
        self.probe_collection()?;
        self.encryption_key()?;
        Ok(())
    }

    /// Like [`EngineConfig::load`], after reading a `.env` file if present.
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "ignoring unreadable .env file");
            }
        }
        Self::load()
    }

    /// The provider chain behind [`EngineConfig::load`].
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default())).merge(Env::prefixed(ENV_PREFIX))
    }

    /// Sets the remote endpoint and key.
    pub fn with_remote(mut self, url: impl Into<String>, key: impl Into<String>) -> Self {
        self.remote_url = Some(url.into());
        self.remote_key = Some(Secret::new(key));
        self
    }

    /// Sets the data directory.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Sets the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = duration_ms(timeout);
        self
    }

    /// Sets the probe timeout.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout_ms = duration_ms(timeout);
        self
    }

    /// Sets the status poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = duration_ms(interval);
        self
    }

    /// Sets the probe collection.
    pub fn with_probe_collection(mut self, collection: &Collection) -> Self {
        self.probe_collection = collection.to_string();
        self
    }

    /// Encrypts the local store at rest with `key`.
    pub fn with_encryption_key(mut self, key: &EncryptionKey) -> Self {
        self.encryption_key = Some(Secret::new(hex::encode(key.as_bytes())));
        self
    }

    /// Sets the per-collection quota.
    pub fn with_quota_bytes(mut self, quota: u64) -> Self {
        self.quota_bytes = Some(quota);
        self
    }

    /// Per-request timeout. Never zero.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.max(1))
    }

    /// Probe timeout. Never zero.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms.max(1))
    }

    /// Status poll interval. Never zero.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// The decoded local encryption key, if one is configured.
    pub fn encryption_key(&self) -> Result<Option<EncryptionKey>, ConfigError> {
        let Some(secret) = &self.encryption_key else {
            return Ok(None);
        };
        let invalid = |reason: String| ConfigError::Invalid {
            field: "encryption_key",
            reason,
        };
        let bytes = hex::decode(secret.expose().trim()).map_err(|e| invalid(e.to_string()))?;
        if bytes.len() != KEY_SIZE {
            return Err(invalid(format!(
                "expected {KEY_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        EncryptionKey::from_bytes(&bytes)
            .map(Some)
            .map_err(|e| invalid(e.to_string()))
    }

    /// The validated probe collection.
    pub fn probe_collection(&self) -> Result<Collection, ConfigError> {
        Collection::new(self.probe_collection.clone()).map_err(|e| ConfigError::Invalid {
            field: "probe_collection",
            reason: e.to_string(),
        })
    }

    /// Remote settings, unvalidated.
    pub fn remote(&self) -> RemoteSettings {
        RemoteSettings {
            url: self.remote_url.clone(),
            key: self.remote_key.clone(),
        }
    }

    /// Local store settings.
    pub fn local_store(&self) -> LocalStoreConfig {
        LocalStoreConfig {
            quota_bytes: self.quota_bytes,
        }
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Remote endpoint settings as configured.
#[derive(Debug, Clone, Default)]
pub struct RemoteSettings {
    /// Base URL.
    pub url: Option<String>,
    /// Access key.
    pub key: Option<Secret>,
}

/// A remote endpoint that passed validation.
#[derive(Debug, Clone)]
pub struct RemoteEndpoint {
    /// Base URL, `http` or `https`.
    pub url: Url,
    /// Access key, non-empty.
    pub key: Secret,
}

impl RemoteSettings {
    /// Checks that both settings are present and well-formed.
    pub fn validate(&self) -> Result<RemoteEndpoint, ConfigError> {
        let raw_url = self
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(ConfigError::Missing { field: "url" })?;
        let key = self
            .key
            .as_ref()
            .map(|k| k.expose().trim())
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::Missing { field: "key" })?;

        let url = Url::parse(raw_url).map_err(|e| ConfigError::Invalid {
            field: "url",
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                field: "url",
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        if url.cannot_be_a_base() || url.host_str().is_none() {
            return Err(ConfigError::Invalid {
                field: "url",
                reason: "missing host".into(),
            });
        }

        Ok(RemoteEndpoint {
            url,
            key: Secret::new(key),
        })
    }

    /// Returns true if [`RemoteSettings::validate`] succeeds.
    pub fn is_configured(&self) -> bool {
        self.validate().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.probe_timeout(), Duration::from_secs(5));
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.probe_collection().unwrap(), Collection::profiles());
        assert!(!config.remote().is_configured());
    }

    #[test]
    fn builder() {
        let config = EngineConfig::new()
            .with_remote("https://api.example.com", "k3y")
            .with_data_dir("/tmp/complysync")
            .with_request_timeout(Duration::from_millis(250))
            .with_quota_bytes(4096);

        assert_eq!(config.request_timeout_ms, 250);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/complysync"));
        assert_eq!(config.local_store().quota_bytes, Some(4096));
        assert!(config.remote().is_configured());
    }

    #[test]
    fn validation_reasons() {
        let missing_key = RemoteSettings {
            url: Some("https://api.example.com".into()),
            key: None,
        };
        assert!(matches!(
            missing_key.validate(),
            Err(ConfigError::Missing { field: "key" })
        ));

        let blank_url = RemoteSettings {
            url: Some("   ".into()),
            key: Some(Secret::new("k")),
        };
        assert!(matches!(
            blank_url.validate(),
            Err(ConfigError::Missing { field: "url" })
        ));

        let ftp = RemoteSettings {
            url: Some("ftp://files.example.com".into()),
            key: Some(Secret::new("k")),
        };
        assert!(matches!(
            ftp.validate(),
            Err(ConfigError::Invalid { field: "url", .. })
        ));

        let garbage = RemoteSettings {
            url: Some("not a url".into()),
            key: Some(Secret::new("k")),
        };
        assert!(garbage.validate().is_err());
    }

    #[test]
    fn zero_durations_are_rejected() {
        let config = EngineConfig::new().with_poll_interval(Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "poll_interval_ms",
                ..
            })
        ));
        assert_eq!(config.poll_interval(), Duration::from_millis(1));

        let config = EngineConfig::new().with_request_timeout(Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "request_timeout_ms",
                ..
            })
        ));
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn encryption_key_round_trips_through_hex() {
        let key = EncryptionKey::generate();
        let config = EngineConfig::new().with_encryption_key(&key);
        let decoded = config.encryption_key().unwrap().unwrap();
        assert_eq!(decoded.as_bytes(), key.as_bytes());
        assert!(!format!("{config:?}").contains(&hex::encode(key.as_bytes())));

        let short = EngineConfig {
            encryption_key: Some(Secret::new("abcd")),
            ..EngineConfig::default()
        };
        assert!(matches!(
            short.validate(),
            Err(ConfigError::Invalid {
                field: "encryption_key",
                ..
            })
        ));

        let garbage = EngineConfig {
            encryption_key: Some(Secret::new("not hex at all")),
            ..EngineConfig::default()
        };
        assert!(garbage.encryption_key().is_err());
    }

    #[test]
    fn secrets_are_redacted() {
        let config = EngineConfig::new().with_remote("https://api.example.com", "hunter2");
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
