//! Read queries.

use crate::entity::Entity;
use crate::id::EntityId;
use serde_json::Value;

/// A read query against one collection.
///
/// Queries are evaluated the same way by the remote store and by the local
/// fallback store, so switching stores never changes what a read returns.
///
/// ```
/// use complysync_protocol::Query;
/// use serde_json::json;
///
/// let open_requests = Query::all().where_eq("status", json!("open")).limit(20);
/// assert_eq!(open_requests.max_results(), Some(20));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    id: Option<EntityId>,
    filters: Vec<(String, Value)>,
    limit: Option<usize>,
}

impl Query {
    /// Every entity in the collection.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// The entity with the given id, if any.
    #[must_use]
    pub fn by_id(id: EntityId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Adds an equality filter on a top-level field.
    #[must_use]
    pub fn where_eq(mut self, field: impl Into<String>, value: Value) -> Self {
        self.filters.push((field.into(), value));
        self
    }

    /// Caps the number of results.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The id this query is restricted to.
    #[must_use]
    pub fn id(&self) -> Option<EntityId> {
        self.id
    }

    /// The equality filters.
    #[must_use]
    pub fn filters(&self) -> &[(String, Value)] {
        &self.filters
    }

    /// The result cap.
    #[must_use]
    pub fn max_results(&self) -> Option<usize> {
        self.limit
    }

    /// True if `entity` satisfies the id restriction and every filter.
    #[must_use]
    pub fn matches(&self, entity: &Entity) -> bool {
        if self.id.is_some_and(|id| id != entity.id) {
            return false;
        }
        self.filters
            .iter()
            .all(|(field, value)| entity.fields.get(field) == Some(value))
    }

    /// Filters and caps a sequence of entities, preserving order.
    pub fn apply<I>(&self, entities: I) -> Vec<Entity>
    where
        I: IntoIterator<Item = Entity>,
    {
        let matching = entities.into_iter().filter(|e| self.matches(e));
        match self.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Fields, Timestamp};
    use serde_json::json;

    fn entity(status: &str) -> Entity {
        let mut fields = Fields::new();
        fields.insert("status".into(), json!(status));
        Entity::new(EntityId::new(), fields, Timestamp::from_millis(1))
    }

    #[test]
    fn filters_and_limit() {
        let entities = vec![entity("open"), entity("closed"), entity("open"), entity("open")];

        let open = Query::all().where_eq("status", json!("open"));
        assert_eq!(open.apply(entities.clone()).len(), 3);
        assert_eq!(open.clone().limit(2).apply(entities.clone()).len(), 2);
        assert_eq!(Query::all().apply(entities).len(), 4);
    }

    #[test]
    fn by_id() {
        let a = entity("open");
        let b = entity("open");
        let result = Query::by_id(b.id).apply(vec![a, b.clone()]);
        assert_eq!(result, vec![b]);
    }

    #[test]
    fn missing_field_does_not_match() {
        let query = Query::all().where_eq("owner", json!("dpo"));
        assert!(!query.matches(&entity("open")));
    }
}
