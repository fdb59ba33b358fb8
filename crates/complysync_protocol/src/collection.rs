//! Collection names.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use std::fmt;

const MAX_LEN: usize = 64;

/// A validated collection name.
///
/// Names are 1-64 characters of `[a-z0-9_-]` and start with a letter, so the
/// same name is safe as a URL path segment and as a file stem.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Collection(String);

impl Collection {
    /// Validates and wraps a collection name.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidCollection`] if the name breaks the rules.
    pub fn new(name: impl Into<String>) -> ProtocolResult<Self> {
        let name = name.into();
        let valid = name.len() <= MAX_LEN
            && name.bytes().next().is_some_and(|b| b.is_ascii_lowercase())
            && name
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-');

        if valid {
            Ok(Self(name))
        } else {
            Err(ProtocolError::InvalidCollection(name))
        }
    }

    /// Data-subject access/erasure/rectification requests.
    #[must_use]
    pub fn data_subject_requests() -> Self {
        Self("data_subject_requests".into())
    }

    /// User profiles.
    #[must_use]
    pub fn profiles() -> Self {
        Self("profiles".into())
    }

    /// The name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Collection {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Collection {
    type Error = ProtocolError;

    fn try_from(value: String) -> ProtocolResult<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Collection {
    type Error = ProtocolError;

    fn try_from(value: &str) -> ProtocolResult<Self> {
        Self::new(value)
    }
}

impl From<Collection> for String {
    fn from(value: Collection) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_names_are_valid() {
        assert!(Collection::new(Collection::data_subject_requests().as_str()).is_ok());
        assert!(Collection::new(Collection::profiles().as_str()).is_ok());
    }

    #[test]
    fn rules() {
        assert!(Collection::new("audit-log_2").is_ok());
        assert!(Collection::new("").is_err());
        assert!(Collection::new("2fa").is_err());
        assert!(Collection::new("Profiles").is_err());
        assert!(Collection::new("a/b").is_err());
        assert!(Collection::new("x".repeat(65)).is_err());
    }

    #[test]
    fn serde_validates() {
        let ok: Collection = serde_json::from_str("\"profiles\"").unwrap();
        assert_eq!(ok, Collection::profiles());
        assert!(serde_json::from_str::<Collection>("\"../x\"").is_err());
    }
}
