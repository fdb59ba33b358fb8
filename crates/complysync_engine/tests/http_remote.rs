//! HTTP remote store against a mock backend.

use complysync_engine::{
    EngineConfig, HttpRemoteStore, RemoteError, RemoteErrorKind, RemoteSettings, RemoteStore,
    Repository, Secret, Transition,
};
use complysync_protocol::{Collection, Entity, EntityId, Fields, Query, Timestamp, UpsertOutcome};
use serde_json::json;
use std::time::Duration;
use tempfile::tempdir;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY: &str = "service-key";

fn client(url: &str, timeout: Duration) -> HttpRemoteStore {
    let endpoint = RemoteSettings {
        url: Some(url.to_string()),
        key: Some(Secret::new(KEY)),
    }
    .validate()
    .unwrap();
    HttpRemoteStore::new(&endpoint, timeout).unwrap()
}

fn entity(at: i64) -> Entity {
    let mut fields = Fields::new();
    fields.insert("email".into(), json!("a@example.com"));
    Entity::new(EntityId::new(), fields, Timestamp::from_millis(at))
}

#[tokio::test]
async fn create_sends_credentials_and_fields() {
    let server = MockServer::start().await;
    let created = entity(10);

    Mock::given(method("POST"))
        .and(path("/collections/profiles"))
        .and(header("authorization", format!("Bearer {KEY}").as_str()))
        .and(header("apikey", KEY))
        .and(body_json(json!({ "fields": created.fields })))
        .respond_with(ResponseTemplate::new(201).set_body_json(&created))
        .expect(1)
        .mount(&server)
        .await;

    let remote = client(&server.uri(), Duration::from_secs(5));
    let result = remote
        .create(&Collection::profiles(), created.fields.clone())
        .await
        .unwrap();
    assert_eq!(result, created);
}

#[tokio::test]
async fn list_encodes_limit_and_filters() {
    let server = MockServer::start().await;
    let stored = entity(20);

    Mock::given(method("GET"))
        .and(path("/collections/data_subject_requests"))
        .and(query_param("_limit", "1"))
        .and(query_param("status", "\"open\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![&stored]))
        .mount(&server)
        .await;

    let remote = client(&server.uri(), Duration::from_secs(5));
    let query = Query::all().where_eq("status", json!("open")).limit(1);
    let listed = remote
        .list(&Collection::data_subject_requests(), &query)
        .await
        .unwrap();
    assert_eq!(listed, vec![stored]);
}

#[tokio::test]
async fn upsert_maps_both_outcomes() {
    let server = MockServer::start().await;
    let incoming = entity(30);
    let mut newer = incoming.clone();
    newer.updated_at = Timestamp::from_millis(40);

    Mock::given(method("PUT"))
        .and(path(format!("/collections/profiles/{}", incoming.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "outcome": "superseded",
            "entity": newer,
        })))
        .mount(&server)
        .await;

    let remote = client(&server.uri(), Duration::from_secs(5));
    let outcome = remote.upsert(&Collection::profiles(), &incoming).await.unwrap();
    assert_eq!(outcome, UpsertOutcome::Superseded(newer));

    let fresh = entity(50);
    Mock::given(method("PUT"))
        .and(path(format!("/collections/profiles/{}", fresh.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "outcome": "applied",
            "entity": fresh,
        })))
        .mount(&server)
        .await;
    let outcome = remote.upsert(&Collection::profiles(), &fresh).await.unwrap();
    assert_eq!(outcome, UpsertOutcome::Applied(fresh));
}

#[tokio::test]
async fn status_codes_are_classified() {
    let server = MockServer::start().await;
    let c = Collection::profiles();
    let missing = EntityId::new();
    let invalid = EntityId::new();
    let broken = EntityId::new();
    let garbled = EntityId::new();

    Mock::given(method("GET"))
        .and(path(format!("/collections/profiles/{missing}")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(format!("/collections/profiles/{invalid}")))
        .respond_with(
            ResponseTemplate::new(422)
                .set_body_json(json!({ "message": "email is not valid", "code": "invalid" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/collections/profiles/{broken}")))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/collections/profiles/{garbled}")))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let remote = client(&server.uri(), Duration::from_secs(5));

    let err = remote.read(&c, missing).await.unwrap_err();
    assert_eq!(err.kind(), RemoteErrorKind::NotFound);

    let err = remote.update(&c, invalid, Fields::new()).await.unwrap_err();
    assert_eq!(err, RemoteError::Rejected("email is not valid".into()));

    let err = remote.read(&c, broken).await.unwrap_err();
    assert_eq!(err.kind(), RemoteErrorKind::Unknown);
    assert!(err.to_string().contains("maintenance"));

    let err = remote.read(&c, garbled).await.unwrap_err();
    assert_eq!(err.kind(), RemoteErrorKind::Unknown);

    // A by-id list of a missing entity is empty, not an error.
    let listed = remote.list(&c, &Query::by_id(missing)).await.unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn delete_accepts_no_content() {
    let server = MockServer::start().await;
    let id = EntityId::new();
    Mock::given(method("DELETE"))
        .and(path(format!("/collections/profiles/{id}")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let remote = client(&server.uri(), Duration::from_secs(5));
    remote.delete(&Collection::profiles(), id).await.unwrap();
}

#[tokio::test]
async fn slow_backend_is_a_network_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/profiles"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let remote = client(&server.uri(), Duration::from_millis(200));
    let err = remote
        .list(&Collection::profiles(), &Query::all())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), RemoteErrorKind::Network);
}

#[tokio::test]
async fn refused_connection_is_a_network_failure() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let remote = client(&format!("http://127.0.0.1:{port}"), Duration::from_secs(1));
    let err = remote
        .list(&Collection::profiles(), &Query::all())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), RemoteErrorKind::Network);
}

#[tokio::test]
async fn repository_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/profiles"))
        .and(query_param("_limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = EngineConfig::new()
        .with_remote(server.uri(), KEY)
        .with_data_dir(dir.path());
    let repository = Repository::open(&config).unwrap();
    assert!(!repository.status().is_connected);

    let refresh = repository.refresh_status().await.unwrap();
    assert_eq!(refresh.transition, Transition::BecameReachable);
    assert!(refresh.status.is_connected);
    assert_eq!(refresh.sync.unwrap().outcomes.len(), 0);
}
