//! `RestBackend` against a mock HTTP server.

#![allow(clippy::unwrap_used)]

use attend_rsvp::{
    AttendanceStore, AuthChangeKind, AuthError, AuthTransport, BackendConfig, BackendError,
    EventId, EventStore, RestBackend, UserId,
};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const USER: &str = "7f1c2c9e-2d0b-4a36-9a57-3c1f5f0e8a11";

async fn backend(server: &MockServer) -> RestBackend {
    let config = BackendConfig::new(server.uri().parse().unwrap(), "anon-key");
    RestBackend::new(&config).unwrap()
}

fn token_body() -> serde_json::Value {
    json!({
        "access_token": "access-1",
        "refresh_token": "refresh-1",
        "expires_in": 3600,
        "user": { "id": USER, "email": "ada@example.com" }
    })
}

fn event_row(id: i64, datetime: &str) -> serde_json::Value {
    json!({
        "id": id,
        "title": format!("Event {id}"),
        "datetime": datetime,
        "location": "Main hall",
        "description": "",
        "image_uri": null
    })
}

#[tokio::test]
async fn sign_in_stores_session_and_notifies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .and(header("apikey", "anon-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .mount(&server)
        .await;

    let backend = backend(&server).await;
    let mut changes = backend.subscribe();

    let session = backend.sign_in("ada@example.com", "hunter22").await.unwrap();
    assert_eq!(session.user_id().map(|id| id.to_string()), Some(USER.to_string()));
    assert!(session.expires_at.is_some());

    let change = changes.next().await.unwrap();
    assert_eq!(change.kind, AuthChangeKind::SignedIn);
    assert_eq!(backend.get_current_session().await.unwrap(), Some(session));
}

#[tokio::test]
async fn sign_in_rejection_is_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid login credentials"
        })))
        .mount(&server)
        .await;

    let backend = backend(&server).await;
    let error = backend.sign_in("ada@example.com", "nope").await.unwrap_err();
    assert_eq!(error, AuthError::InvalidCredentials);
    assert!(backend.current_session().is_none());
}

#[tokio::test]
async fn sign_up_without_token_awaits_verification() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": USER,
            "email": "ada@example.com",
            "confirmation_sent_at": "2024-05-01T10:00:00Z"
        })))
        .mount(&server)
        .await;

    let backend = backend(&server).await;
    assert_eq!(backend.sign_up("ada@example.com", "hunter22").await.unwrap(), None);
    assert!(backend.current_session().is_none());
}

#[tokio::test]
async fn sign_up_for_taken_address() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!({ "msg": "User already registered" })),
        )
        .mount(&server)
        .await;

    let backend = backend(&server).await;
    assert_eq!(
        backend.sign_up("ada@example.com", "hunter22").await,
        Err(AuthError::AlreadyRegistered)
    );
}

#[tokio::test]
async fn list_events_decodes_rows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/events"))
        .and(query_param("order", "datetime.asc"))
        .and(header("authorization", "Bearer anon-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            event_row(1, "2024-06-01T18:00:00Z"),
            event_row(2, "2024-07-01T18:00:00+00:00"),
        ])))
        .mount(&server)
        .await;

    let events = backend(&server).await.list_events().await.unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].id, EventId::new("1"));
    assert_eq!(events[1].title, "Event 2");
}

#[tokio::test]
async fn missing_event_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/events"))
        .and(query_param("id", "eq.99"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let result = backend(&server).await.get_event(&EventId::new("99")).await;
    assert_eq!(result, Err(BackendError::NotFound));
}

#[tokio::test]
async fn unique_violation_maps_to_duplicate() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/attendance"))
        .and(header("prefer", "return=representation"))
        .and(body_json(json!([{ "user_id": USER, "event_id": "42" }])))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint"
        })))
        .mount(&server)
        .await;

    let user = UserId(USER.parse().unwrap());
    let result = backend(&server)
        .await
        .create_attendance(user, &EventId::new("42"))
        .await;
    assert_eq!(result, Err(BackendError::Duplicate));
}

#[tokio::test]
async fn attendance_lookup_uses_session_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/attendance"))
        .and(query_param("user_id", format!("eq.{USER}")))
        .and(query_param("event_id", "eq.42"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "user_id": USER,
            "event_id": 42,
            "created_at": "2024-05-01T10:00:00Z"
        }])))
        .mount(&server)
        .await;

    let backend = backend(&server).await;
    let session = backend.sign_in("ada@example.com", "hunter22").await.unwrap();
    let user = session.user_id().unwrap();

    let record = backend
        .get_attendance(user, &EventId::new("42"))
        .await
        .unwrap()
        .unwrap();
    assert!(record.matches(user, &EventId::new("42")));
}

#[tokio::test]
async fn rejected_refresh_expires_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "refresh_token"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "error_description": "Invalid Refresh Token" })),
        )
        .mount(&server)
        .await;

    let backend = backend(&server).await;
    backend.sign_in("ada@example.com", "hunter22").await.unwrap();
    let mut changes = backend.subscribe();

    assert_eq!(backend.refresh_session().await, Err(BackendError::Unauthorized));
    assert_eq!(changes.next().await.unwrap().kind, AuthChangeKind::Expired);
    assert!(backend.current_session().is_none());
}
