//! Domain types shared by the session, feed and attendance components.
//!
//! All types are `Clone` to support the reducer architecture and `serde`-ready
//! because the REST backend exchanges them as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

// ═══════════════════════════════════════════════════════════════════════
// ID Types
// ═══════════════════════════════════════════════════════════════════════

/// Unique identifier for a user, issued by the authentication backend.
///
/// Only ever read from a [`Session`]; the client never generates one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub uuid::Uuid);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique identifier for an event.
///
/// Backends key events by text or by integer; both deserialize into the same
/// string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EventId(pub String);

impl EventId {
    /// Create an event id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl<'de> Deserialize<'de> for EventId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(text) => Self(text),
            RawId::Number(number) => Self(number.to_string()),
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Session
// ═══════════════════════════════════════════════════════════════════════

/// Authenticated user embedded in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable unique id.
    pub id: UserId,

    /// Email address, when the backend reports one.
    #[serde(default)]
    pub email: Option<String>,
}

/// Proof of an authenticated identity plus refresh metadata.
///
/// Token material is opaque to the client core and never logged.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token for backend calls.
    pub access_token: String,

    /// Token used by the transport to refresh the session.
    pub refresh_token: Option<String>,

    /// Access token expiry, if known.
    pub expires_at: Option<DateTime<Utc>>,

    /// The user this session belongs to.
    pub user: Option<User>,
}

impl Session {
    /// The identity carried by this session.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.user.as_ref().map(|user| user.id)
    }

    /// Returns `true` if the access token has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// Why the authentication transport emitted a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthChangeKind {
    /// The transport restored a persisted session.
    InitialSession,
    /// A sign-in or sign-up produced a session.
    SignedIn,
    /// The user signed out.
    SignedOut,
    /// The transport refreshed the access token.
    TokenRefreshed,
    /// The session expired and could not be refreshed.
    Expired,
}

/// Session-change notification delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChange {
    /// What happened.
    pub kind: AuthChangeKind,

    /// The session after the change (`None` once signed out or expired).
    pub session: Option<Session>,
}

impl AuthChange {
    /// Build a change notification.
    #[must_use]
    pub const fn new(kind: AuthChangeKind, session: Option<Session>) -> Self {
        Self { kind, session }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Events & Attendance
// ═══════════════════════════════════════════════════════════════════════

/// An event owned by the remote store. Read-only for the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique id.
    pub id: EventId,

    /// Title.
    pub title: String,

    /// Start time.
    #[serde(rename = "datetime")]
    pub starts_at: DateTime<Utc>,

    /// Human-readable location.
    #[serde(default)]
    pub location: String,

    /// Long description.
    #[serde(default)]
    pub description: String,

    /// Image reference (URL).
    #[serde(default, rename = "image_uri", alias = "image")]
    pub image: Option<String>,

    /// Number of attendees, when the backend aggregates it.
    #[serde(default)]
    pub attendee_count: Option<u32>,
}

/// "User U is registered for event E."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    /// Attending user.
    pub user_id: UserId,

    /// Event attended.
    pub event_id: EventId,

    /// Creation timestamp, set by the store.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl AttendanceRecord {
    /// Returns `true` if this record is for the given pair.
    #[must_use]
    pub fn matches(&self, user_id: UserId, event_id: &EventId) -> bool {
        self.user_id == user_id && &self.event_id == event_id
    }
}
