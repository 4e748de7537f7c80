//! HTTP backend speaking a Supabase-compatible API.
//!
//! One [`RestBackend`] serves as the authentication transport, the event store
//! and the attendance store. Data calls carry the current session's access
//! token, falling back to the public key when signed out.
//!
//! | Concern | Endpoint |
//! |---|---|
//! | sign-in / refresh | `POST /auth/v1/token?grant_type=…` |
//! | sign-up | `POST /auth/v1/signup` |
//! | sign-out | `POST /auth/v1/logout` |
//! | events | `GET /rest/v1/events` |
//! | attendance | `GET` / `POST /rest/v1/attendance` |

use super::{AttendanceStore, AuthBroadcaster, AuthSubscription, AuthTransport, EventStore};
use crate::config::BackendConfig;
use crate::error::{AuthError, BackendError};
use crate::types::{AttendanceRecord, AuthChange, AuthChangeKind, Event, EventId, Session, User, UserId};
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Arc, RwLock};

/// Postgres unique-violation code, reported by the REST layer on conflicts.
const UNIQUE_VIOLATION: &str = "23505";

/// REST backend client.
///
/// Cheap to clone; clones share the HTTP connection pool and the session.
#[derive(Clone)]
pub struct RestBackend {
    inner: Arc<Inner>,
}

struct Inner {
    http: Client,
    base_url: String,
    anon_key: String,
    session: RwLock<Option<Session>>,
    changes: AuthBroadcaster,
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
struct NewAttendance<'a> {
    user_id: UserId,
    event_id: &'a EventId,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    user: Option<User>,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .or_else(|| {
                self.expires_in
                    .map(|secs| now + chrono::Duration::seconds(secs))
            });

        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

/// Error payloads differ between the auth and data APIs; take whichever
/// message field is present.
#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

impl ErrorBody {
    fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }

    fn message(self, fallback: &str) -> String {
        self.msg
            .or(self.message)
            .or(self.error_description)
            .or(self.error)
            .unwrap_or_else(|| fallback.to_string())
    }

    fn is_unique_violation(&self) -> bool {
        self.code
            .as_ref()
            .and_then(serde_json::Value::as_str)
            .is_some_and(|code| code == UNIQUE_VIOLATION)
    }
}

impl RestBackend {
    /// Create a backend client.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url: config.base_url().to_string(),
                anon_key: config.anon_key.clone(),
                session: RwLock::new(None),
                changes: AuthBroadcaster::new(),
            }),
        })
    }

    /// Restore a previously persisted session.
    ///
    /// Returned by the next `get_current_session` call; no notification is
    /// emitted.
    #[must_use]
    pub fn with_session(self, session: Session) -> Self {
        self.store_session(Some(session));
        self
    }

    /// Exchange the refresh token for a new session.
    ///
    /// Emits [`AuthChangeKind::TokenRefreshed`] on success. A rejected refresh
    /// token clears the session and emits [`AuthChangeKind::Expired`].
    ///
    /// # Errors
    ///
    /// - No session or no refresh token → [`BackendError::Unauthorized`]
    /// - Rejected refresh token → [`BackendError::Unauthorized`]
    /// - Request failure → [`BackendError::Transport`]
    #[tracing::instrument(skip(self), name = "rest_refresh_session")]
    pub async fn refresh_session(&self) -> Result<Session, BackendError> {
        let refresh_token = self
            .current_session()
            .and_then(|session| session.refresh_token)
            .ok_or(BackendError::Unauthorized)?;

        let response = self
            .inner
            .http
            .post(self.auth_url("token"))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.inner.anon_key)
            .json(&RefreshGrant {
                refresh_token: &refresh_token,
            })
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {
                let token: TokenResponse = response
                    .json()
                    .await
                    .map_err(|e| BackendError::Decode(e.to_string()))?;
                let session = token.into_session(Utc::now());
                self.store_session(Some(session.clone()));
                self.inner.changes.emit(AuthChange::new(
                    AuthChangeKind::TokenRefreshed,
                    Some(session.clone()),
                ));
                Ok(session)
            },
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                tracing::info!("Refresh token rejected, session expired");
                self.store_session(None);
                self.inner
                    .changes
                    .emit(AuthChange::new(AuthChangeKind::Expired, None));
                Err(BackendError::Unauthorized)
            },
            status => Err(BackendError::Status {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }

    /// The locally held session.
    #[must_use]
    pub fn current_session(&self) -> Option<Session> {
        match self.inner.session.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn store_session(&self, session: Option<Session>) {
        match self.inner.session.write() {
            Ok(mut guard) => *guard = session,
            Err(poisoned) => *poisoned.into_inner() = session,
        }
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.inner.base_url)
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.inner.base_url)
    }

    fn bearer(&self) -> String {
        self.current_session()
            .map_or_else(|| self.inner.anon_key.clone(), |session| session.access_token)
    }

    async fn resolve_session(&self) -> Result<Option<Session>, BackendError> {
        let Some(session) = self.current_session() else {
            return Ok(None);
        };

        if !session.is_expired_at(Utc::now()) {
            return Ok(Some(session));
        }

        if session.refresh_token.is_none() {
            self.store_session(None);
            return Ok(None);
        }

        match self.refresh_session().await {
            Ok(session) => Ok(Some(session)),
            Err(BackendError::Unauthorized) => Ok(None),
            Err(error) => Err(error),
        }
    }

    #[tracing::instrument(skip(self, password), name = "rest_sign_in")]
    async fn password_grant(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let response = self
            .inner
            .http
            .post(self.auth_url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.inner.anon_key)
            .json(&Credentials { email, password })
            .send()
            .await
            .map_err(|e| AuthError::Other(e.to_string()))?;

        if !response.status().is_success() {
            return Err(auth_failure(response, false).await);
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Other(e.to_string()))?;
        Ok(self.signed_in(token))
    }

    #[tracing::instrument(skip(self, password), name = "rest_sign_up")]
    async fn register(&self, email: &str, password: &str) -> Result<Option<Session>, AuthError> {
        let response = self
            .inner
            .http
            .post(self.auth_url("signup"))
            .header("apikey", &self.inner.anon_key)
            .json(&Credentials { email, password })
            .send()
            .await
            .map_err(|e| AuthError::Other(e.to_string()))?;

        if !response.status().is_success() {
            return Err(auth_failure(response, true).await);
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AuthError::Other(e.to_string()))?;

        // Without an access token the account awaits email verification
        if body.get("access_token").is_none() {
            tracing::info!("Sign-up accepted, verification pending");
            return Ok(None);
        }

        let token: TokenResponse =
            serde_json::from_value(body).map_err(|e| AuthError::Other(e.to_string()))?;
        Ok(Some(self.signed_in(token)))
    }

    fn signed_in(&self, token: TokenResponse) -> Session {
        let session = token.into_session(Utc::now());
        self.store_session(Some(session.clone()));
        self.inner.changes.emit(AuthChange::new(
            AuthChangeKind::SignedIn,
            Some(session.clone()),
        ));
        session
    }

    #[tracing::instrument(skip(self), name = "rest_sign_out")]
    async fn logout(&self) -> Result<(), BackendError> {
        let Some(session) = self.current_session() else {
            return Ok(());
        };

        let result = self
            .inner
            .http
            .post(self.auth_url("logout"))
            .header("apikey", &self.inner.anon_key)
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()));

        // The local session ends whether or not the backend heard about it
        self.store_session(None);
        self.inner
            .changes
            .emit(AuthChange::new(AuthChangeKind::SignedOut, None));

        check(result?).await.map(|_| ())
    }

    #[tracing::instrument(skip(self), name = "rest_list_events")]
    async fn fetch_events(&self) -> Result<Vec<Event>, BackendError> {
        let response = self
            .inner
            .http
            .get(self.rest_url("events"))
            .query(&[("select", "*"), ("order", "datetime.asc")])
            .header("apikey", &self.inner.anon_key)
            .bearer_auth(self.bearer())
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        check(response)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    #[tracing::instrument(skip(self), name = "rest_get_event")]
    async fn fetch_event(&self, id: &EventId) -> Result<Event, BackendError> {
        let filter = format!("eq.{id}");
        let response = self
            .inner
            .http
            .get(self.rest_url("events"))
            .query(&[("select", "*"), ("id", filter.as_str()), ("limit", "1")])
            .header("apikey", &self.inner.anon_key)
            .bearer_auth(self.bearer())
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let rows: Vec<Event> = check(response)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        rows.into_iter().next().ok_or(BackendError::NotFound)
    }

    #[tracing::instrument(skip(self), name = "rest_get_attendance")]
    async fn fetch_attendance(
        &self,
        user: UserId,
        event: &EventId,
    ) -> Result<Option<AttendanceRecord>, BackendError> {
        let user_filter = format!("eq.{user}");
        let event_filter = format!("eq.{event}");
        let response = self
            .inner
            .http
            .get(self.rest_url("attendance"))
            .query(&[
                ("select", "*"),
                ("user_id", user_filter.as_str()),
                ("event_id", event_filter.as_str()),
                ("limit", "1"),
            ])
            .header("apikey", &self.inner.anon_key)
            .bearer_auth(self.bearer())
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let rows: Vec<AttendanceRecord> = check(response)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        Ok(rows.into_iter().next())
    }

    #[tracing::instrument(skip(self), name = "rest_create_attendance")]
    async fn insert_attendance(
        &self,
        user: UserId,
        event: &EventId,
    ) -> Result<AttendanceRecord, BackendError> {
        let response = self
            .inner
            .http
            .post(self.rest_url("attendance"))
            .header("apikey", &self.inner.anon_key)
            .header("Prefer", "return=representation")
            .bearer_auth(self.bearer())
            .json(&[NewAttendance {
                user_id: user,
                event_id: event,
            }])
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let rows: Vec<AttendanceRecord> = check(response)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        rows.into_iter().next().ok_or_else(|| {
            BackendError::Decode("insert returned no representation".to_string())
        })
    }
}

impl std::fmt::Debug for RestBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestBackend")
            .field("base_url", &self.inner.base_url)
            .finish_non_exhaustive()
    }
}

/// Map a non-success data response to a [`BackendError`].
async fn check(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let error = ErrorBody::parse(&body);

    Err(match status {
        StatusCode::CONFLICT => BackendError::Duplicate,
        _ if error.is_unique_violation() => BackendError::Duplicate,
        StatusCode::NOT_FOUND => BackendError::NotFound,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Unauthorized,
        status => BackendError::Status {
            status: status.as_u16(),
            message: error.message(&body),
        },
    })
}

/// Map a non-success auth response to a classified [`AuthError`].
async fn auth_failure(response: Response, signing_up: bool) -> AuthError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = ErrorBody::parse(&body).message(status.canonical_reason().unwrap_or("error"));
    tracing::debug!(status = status.as_u16(), %message, "Authentication rejected");
    AuthError::classify(Some(status.as_u16()), &message, signing_up)
}

impl AuthTransport for RestBackend {
    fn get_current_session(
        &self,
    ) -> impl Future<Output = Result<Option<Session>, BackendError>> + Send {
        let this = self.clone();
        async move { this.resolve_session().await }
    }

    fn subscribe(&self) -> AuthSubscription {
        self.inner.changes.subscribe()
    }

    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Session, AuthError>> + Send {
        let this = self.clone();
        let email = email.to_string();
        let password = password.to_string();
        async move { this.password_grant(&email, &password).await }
    }

    fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Option<Session>, AuthError>> + Send {
        let this = self.clone();
        let email = email.to_string();
        let password = password.to_string();
        async move { this.register(&email, &password).await }
    }

    fn sign_out(&self) -> impl Future<Output = Result<(), BackendError>> + Send {
        let this = self.clone();
        async move { this.logout().await }
    }
}

impl EventStore for RestBackend {
    fn list_events(&self) -> impl Future<Output = Result<Vec<Event>, BackendError>> + Send {
        let this = self.clone();
        async move { this.fetch_events().await }
    }

    fn get_event(&self, id: &EventId) -> impl Future<Output = Result<Event, BackendError>> + Send {
        let this = self.clone();
        let id = id.clone();
        async move { this.fetch_event(&id).await }
    }
}

impl AttendanceStore for RestBackend {
    fn get_attendance(
        &self,
        user: UserId,
        event: &EventId,
    ) -> impl Future<Output = Result<Option<AttendanceRecord>, BackendError>> + Send {
        let this = self.clone();
        let event = event.clone();
        async move { this.fetch_attendance(user, &event).await }
    }

    fn create_attendance(
        &self,
        user: UserId,
        event: &EventId,
    ) -> impl Future<Output = Result<AttendanceRecord, BackendError>> + Send {
        let this = self.clone();
        let event = event.clone();
        async move { this.insert_attendance(user, &event).await }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_prefers_absolute_expiry() {
        let now = Utc::now();
        let token = TokenResponse {
            access_token: "a".to_string(),
            refresh_token: None,
            expires_in: Some(3600),
            expires_at: Some(1_700_000_000),
            user: None,
        };
        let session = token.into_session(now);
        assert_eq!(session.expires_at.map(|t| t.timestamp()), Some(1_700_000_000));
    }

    #[test]
    fn test_token_response_falls_back_to_relative_expiry() {
        let now = Utc::now();
        let token = TokenResponse {
            access_token: "a".to_string(),
            refresh_token: None,
            expires_in: Some(60),
            expires_at: None,
            user: None,
        };
        assert_eq!(
            token.into_session(now).expires_at,
            Some(now + chrono::Duration::seconds(60))
        );
    }

    #[test]
    fn test_error_body_message_precedence() {
        let body = ErrorBody::parse(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#);
        assert_eq!(body.message("fallback"), "Invalid login credentials");

        let body = ErrorBody::parse(r#"{"code":400,"msg":"Email not confirmed"}"#);
        assert_eq!(body.message("fallback"), "Email not confirmed");

        assert_eq!(ErrorBody::parse("not json").message("fallback"), "fallback");
    }

    #[test]
    fn test_unique_violation_detection() {
        let body = ErrorBody::parse(r#"{"code":"23505","message":"duplicate key value"}"#);
        assert!(body.is_unique_violation());
        assert!(!ErrorBody::parse(r#"{"code":400}"#).is_unique_violation());
    }
}
