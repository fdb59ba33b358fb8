//! Entity records and timestamps.

use crate::id::EntityId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// The domain payload of an entity.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// Milliseconds since the Unix epoch.
///
/// `updated_at` timestamps are the only conflict-resolution signal, so the
/// ordering is total: plain integer comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// The Unix epoch.
    pub const EPOCH: Timestamp = Timestamp(0);

    /// Creates a timestamp from milliseconds since the epoch.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Milliseconds since the epoch.
    #[must_use]
    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    /// Reads the wall clock.
    #[must_use]
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default();
        Self(millis)
    }

    /// The next representable instant.
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// A domain record: a data-subject request, a user profile, ...
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Identity, assigned by the store that first persisted the record.
    pub id: EntityId,
    /// Creation time; never changes.
    pub created_at: Timestamp,
    /// Time of the last write, set by the store that wrote it.
    pub updated_at: Timestamp,
    /// Domain payload.
    #[serde(default)]
    pub fields: Fields,
}

impl Entity {
    /// Creates an entity whose creation and update times are both `at`.
    pub fn new(id: EntityId, fields: Fields, at: Timestamp) -> Self {
        Self {
            id,
            created_at: at,
            updated_at: at,
            fields,
        }
    }

    /// Returns a field value.
    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.fields.get(field)
    }

    /// Applies a patch and stamps the new update time.
    ///
    /// `created_at` and `id` are untouched.
    pub fn patch(&mut self, patch: &Fields, at: Timestamp) {
        apply_patch(&mut self.fields, patch);
        self.updated_at = at;
    }

    /// True if both copies carry the same version and payload.
    pub fn same_version(&self, other: &Entity) -> bool {
        self.id == other.id && self.updated_at == other.updated_at && self.fields == other.fields
    }
}

/// Shallow-merges `patch` into `fields`.
///
/// Each key in the patch replaces the key in `fields`; a JSON `null` removes it.
pub fn apply_patch(fields: &mut Fields, patch: &Fields) {
    for (key, value) in patch {
        if value.is_null() {
            fields.remove(key);
        } else {
            fields.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn patch_merges_and_removes() {
        let mut entity = Entity::new(
            EntityId::new(),
            fields(json!({"name": "Ada", "email": "ada@example.com", "age": 36})),
            Timestamp::from_millis(10),
        );

        entity.patch(
            &fields(json!({"email": "ada@lovelace.org", "age": null, "country": "UK"})),
            Timestamp::from_millis(20),
        );

        assert_eq!(
            entity.fields,
            fields(json!({"name": "Ada", "email": "ada@lovelace.org", "country": "UK"}))
        );
        assert_eq!(entity.created_at, Timestamp::from_millis(10));
        assert_eq!(entity.updated_at, Timestamp::from_millis(20));
    }

    #[test]
    fn same_version_compares_payload() {
        let a = Entity::new(EntityId::new(), fields(json!({"x": 1})), Timestamp::from_millis(5));
        let mut b = a.clone();
        assert!(a.same_version(&b));

        b.fields.insert("x".into(), json!(2));
        assert!(!a.same_version(&b));
    }

    #[test]
    fn json_shape() {
        let entity = Entity::new(
            EntityId::from_bytes([0; 16]),
            fields(json!({"name": "X"})),
            Timestamp::from_millis(1_700_000_000_000),
        );
        let value = serde_json::to_value(&entity).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "00000000-0000-0000-0000-000000000000",
                "created_at": 1_700_000_000_000i64,
                "updated_at": 1_700_000_000_000i64,
                "fields": {"name": "X"}
            })
        );
    }

    #[test]
    fn timestamp_order_and_next() {
        let t = Timestamp::from_millis(41);
        assert!(t < t.next());
        assert_eq!(t.next().as_millis(), 42);
        assert!(Timestamp::now() > Timestamp::EPOCH);
    }
}
