//! HTTP transport for the remote store.
//!
//! JSON over HTTP with reqwest. See `complysync_protocol::messages` for the
//! route table. Every request carries the access key twice, as a bearer
//! token and as an `apikey` header, which is what hosted backends of this
//! kind expect.

use super::{RemoteError, RemoteResult, RemoteStore};
use crate::config::RemoteEndpoint;
use async_trait::async_trait;
use complysync_protocol::{
    Collection, CreateRequest, Entity, EntityId, ErrorBody, Fields, Query, UpdateRequest,
    UpsertOutcome, UpsertResponse,
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// A [`RemoteStore`] talking to the hosted backend.
#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    client: Client,
    base_url: String,
    key: String,
}

impl HttpRemoteStore {
    /// Creates a client for `endpoint`; each request is bounded by `timeout`.
    pub fn new(endpoint: &RemoteEndpoint, timeout: Duration) -> RemoteResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Unknown(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: endpoint.url.as_str().trim_end_matches('/').to_string(),
            key: endpoint.key.expose().to_string(),
        })
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self, collection: &Collection) -> String {
        format!("{}/collections/{}", self.base_url, collection)
    }

    fn entity_url(&self, collection: &Collection, id: EntityId) -> String {
        format!("{}/collections/{}/{}", self.base_url, collection, id)
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.key)
            .header("apikey", &self.key)
    }

    async fn send(&self, request: RequestBuilder) -> RemoteResult<Response> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = error_message(response).await;
        tracing::debug!(%status, %message, "remote store returned an error");
        Err(match status {
            StatusCode::NOT_FOUND => RemoteError::NotFound(message),
            s if s.is_client_error() => RemoteError::Rejected(message),
            s => RemoteError::Unknown(format!("{s}: {message}")),
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> RemoteResult<T> {
        let response = self.send(request).await?;
        response.json::<T>().await.map_err(|e| {
            if e.is_timeout() {
                RemoteError::Network(e.to_string())
            } else {
                RemoteError::Unknown(format!("undecodable response: {e}"))
            }
        })
    }
}

fn transport_error(e: reqwest::Error) -> RemoteError {
    if e.is_decode() {
        RemoteError::Unknown(e.to_string())
    } else {
        RemoteError::Network(e.to_string())
    }
}

async fn error_message(response: Response) -> String {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    if let Ok(body) = serde_json::from_str::<ErrorBody>(&text) {
        return body.message;
    }
    if text.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("no error message")
            .to_string()
    } else {
        text
    }
}

/// Query parameter carrying the result cap. Field filters share the query
/// string, so no filter may use this name.
pub const LIMIT_PARAM: &str = "_limit";

fn query_params(query: &Query) -> RemoteResult<Vec<(String, String)>> {
    let mut params = Vec::with_capacity(query.filters().len() + 1);
    for (field, value) in query.filters() {
        if field == LIMIT_PARAM {
            return Err(RemoteError::Rejected(format!(
                "cannot filter on reserved field '{LIMIT_PARAM}'"
            )));
        }
        params.push((field.clone(), value.to_string()));
    }
    if let Some(limit) = query.max_results() {
        params.push((LIMIT_PARAM.to_string(), limit.to_string()));
    }
    Ok(params)
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn create(&self, collection: &Collection, fields: Fields) -> RemoteResult<Entity> {
        let request = self
            .request(Method::POST, self.collection_url(collection))
            .json(&CreateRequest { fields });
        self.send_json(request).await
    }

    async fn read(&self, collection: &Collection, id: EntityId) -> RemoteResult<Entity> {
        let request = self.request(Method::GET, self.entity_url(collection, id));
        self.send_json(request).await
    }

    async fn list(&self, collection: &Collection, query: &Query) -> RemoteResult<Vec<Entity>> {
        if let Some(id) = query.id() {
            return match self.read(collection, id).await {
                Ok(entity) => Ok(query.apply([entity])),
                Err(RemoteError::NotFound(_)) => Ok(Vec::new()),
                Err(e) => Err(e),
            };
        }
        let request = self
            .request(Method::GET, self.collection_url(collection))
            .query(&query_params(query)?);
        self.send_json(request).await
    }

    async fn update(
        &self,
        collection: &Collection,
        id: EntityId,
        patch: Fields,
    ) -> RemoteResult<Entity> {
        let request = self
            .request(Method::PATCH, self.entity_url(collection, id))
            .json(&UpdateRequest { patch });
        self.send_json(request).await
    }

    async fn upsert(&self, collection: &Collection, entity: &Entity) -> RemoteResult<UpsertOutcome> {
        let request = self
            .request(Method::PUT, self.entity_url(collection, entity.id))
            .json(entity);
        let response: UpsertResponse = self.send_json(request).await?;
        if response.entity.id != entity.id {
            return Err(RemoteError::Unknown(format!(
                "upsert of {} answered for {}",
                entity.id, response.entity.id
            )));
        }
        Ok(response.into())
    }

    async fn delete(&self, collection: &Collection, id: EntityId) -> RemoteResult<()> {
        let request = self.request(Method::DELETE, self.entity_url(collection, id));
        self.send(request).await.map(|_| ())
    }
}
