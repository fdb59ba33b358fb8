//! Request and response bodies of the remote store protocol.
//!
//! The remote store speaks JSON over HTTP:
//!
//! | Verb | Path | Body | Response |
//! |---|---|---|---|
//! | `POST` | `/collections/{c}` | [`CreateRequest`] | `201` [`Entity`] |
//! | `GET` | `/collections/{c}/{id}` | - | `200` [`Entity`] |
//! | `GET` | `/collections/{c}?limit=&{field}=` | - | `200` `[Entity]` |
//! | `PATCH` | `/collections/{c}/{id}` | [`UpdateRequest`] | `200` [`Entity`] |
//! | `PUT` | `/collections/{c}/{id}` | [`Entity`] | `200` [`UpsertResponse`] |
//! | `DELETE` | `/collections/{c}/{id}` | - | `204` |
//!
//! Errors carry an [`ErrorBody`].

use crate::entity::{Entity, Fields};
use serde::{Deserialize, Serialize};

/// Body of a create call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRequest {
    /// Payload of the new entity.
    pub fields: Fields,
}

/// Body of an update call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRequest {
    /// Shallow patch; `null` removes a field.
    pub patch: Fields,
}

/// Whether an upsert replaced the remote copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertStatus {
    /// The incoming copy is now the remote value.
    Applied,
    /// The remote copy was newer (or tied) and was kept.
    Superseded,
}

/// Body of an upsert response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertResponse {
    /// What the backend did.
    pub outcome: UpsertStatus,
    /// The remote value after the call.
    pub entity: Entity,
}

/// Result of an upsert, as seen by the client.
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOutcome {
    /// The incoming copy became the remote value.
    Applied(Entity),
    /// The remote copy won last-write-wins; it is returned here.
    Superseded(Entity),
}

impl UpsertOutcome {
    /// The remote value after the call.
    pub fn entity(&self) -> &Entity {
        match self {
            UpsertOutcome::Applied(e) | UpsertOutcome::Superseded(e) => e,
        }
    }

    /// Returns true if the incoming copy was applied.
    pub fn is_applied(&self) -> bool {
        matches!(self, UpsertOutcome::Applied(_))
    }
}

impl From<UpsertResponse> for UpsertOutcome {
    fn from(response: UpsertResponse) -> Self {
        match response.outcome {
            UpsertStatus::Applied => UpsertOutcome::Applied(response.entity),
            UpsertStatus::Superseded => UpsertOutcome::Superseded(response.entity),
        }
    }
}

impl From<UpsertOutcome> for UpsertResponse {
    fn from(outcome: UpsertOutcome) -> Self {
        match outcome {
            UpsertOutcome::Applied(entity) => UpsertResponse {
                outcome: UpsertStatus::Applied,
                entity,
            },
            UpsertOutcome::Superseded(entity) => UpsertResponse {
                outcome: UpsertStatus::Superseded,
                entity,
            },
        }
    }
}

/// Structured error returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human readable message.
    pub message: String,
    /// Machine readable code, if the backend provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Timestamp;
    use crate::id::EntityId;
    use serde_json::json;

    #[test]
    fn upsert_response_wire_format() {
        let entity = Entity::new(
            EntityId::from_bytes([0; 16]),
            Fields::new(),
            Timestamp::from_millis(3),
        );
        let response = UpsertResponse::from(UpsertOutcome::Superseded(entity.clone()));

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["outcome"], json!("superseded"));

        let outcome: UpsertOutcome = response.into();
        assert!(!outcome.is_applied());
        assert_eq!(outcome.entity(), &entity);
    }

    #[test]
    fn error_body_code_optional() {
        let body: ErrorBody = serde_json::from_str(r#"{"message":"email is required"}"#).unwrap();
        assert_eq!(body.message, "email is required");
        assert!(body.code.is_none());
    }
}
