//! Collaborator traits.
//!
//! These traits abstract over the authentication transport and the remote data
//! stores so reducers stay pure and tests can inject in-memory doubles.
//!
//! # Providers
//!
//! - [`AuthTransport`]: session resolution, change notifications, sign-in/up/out
//! - [`EventStore`]: read-only event catalogue
//! - [`AttendanceStore`]: per-user attendance records
//!
//! [`rest::RestBackend`] implements all three over HTTP.

pub mod rest;

use crate::error::{AuthError, BackendError};
use crate::types::{AttendanceRecord, AuthChange, Event, EventId, Session, UserId};
use std::future::Future;
use tokio::sync::broadcast;

pub use rest::RestBackend;

/// Capacity of the change-notification channel.
const CHANGE_CAPACITY: usize = 32;

/// Authentication transport.
///
/// # Implementation Notes
///
/// - `subscribe()` must be called before the change it should observe
/// - a successful `sign_in` / `sign_up` / `sign_out` also emits a change
///   notification to every subscriber
pub trait AuthTransport: Send + Sync {
    /// Resolve the persisted session, if any.
    ///
    /// # Errors
    ///
    /// Returns error if the transport cannot read its session state.
    fn get_current_session(
        &self,
    ) -> impl Future<Output = Result<Option<Session>, BackendError>> + Send;

    /// Subscribe to session-change notifications.
    fn subscribe(&self) -> AuthSubscription;

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns a classified [`AuthError`].
    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Session, AuthError>> + Send;

    /// Create an account.
    ///
    /// # Returns
    ///
    /// `None` when the account must be verified before a session is issued.
    ///
    /// # Errors
    ///
    /// Returns a classified [`AuthError`].
    fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Option<Session>, AuthError>> + Send;

    /// End the current session.
    ///
    /// # Errors
    ///
    /// Returns error if the backend could not be reached. The local session is
    /// cleared regardless.
    fn sign_out(&self) -> impl Future<Output = Result<(), BackendError>> + Send;
}

/// Read-only event catalogue.
pub trait EventStore: Send + Sync {
    /// List all events ordered by start time ascending.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    fn list_events(&self) -> impl Future<Output = Result<Vec<Event>, BackendError>> + Send;

    /// Fetch a single event.
    ///
    /// # Errors
    ///
    /// - Unknown id → [`BackendError::NotFound`]
    /// - Request failure → other variants
    fn get_event(&self, id: &EventId) -> impl Future<Output = Result<Event, BackendError>> + Send;
}

/// Attendance records.
///
/// Implementations are NOT required to reject duplicates; callers guard
/// against them.
pub trait AttendanceStore: Send + Sync {
    /// Fetch the record for `(user, event)`.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    fn get_attendance(
        &self,
        user: UserId,
        event: &EventId,
    ) -> impl Future<Output = Result<Option<AttendanceRecord>, BackendError>> + Send;

    /// Insert a record for `(user, event)`.
    ///
    /// # Errors
    ///
    /// - Uniqueness violation → [`BackendError::Duplicate`]
    /// - Request failure → other variants
    fn create_attendance(
        &self,
        user: UserId,
        event: &EventId,
    ) -> impl Future<Output = Result<AttendanceRecord, BackendError>> + Send;
}

// ═══════════════════════════════════════════════════════════════════════
// Change notifications
// ═══════════════════════════════════════════════════════════════════════

/// Fan-out of session-change notifications, shared by transports.
#[derive(Debug, Clone)]
pub struct AuthBroadcaster {
    sender: broadcast::Sender<AuthChange>,
}

impl AuthBroadcaster {
    /// Create a broadcaster with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANGE_CAPACITY);
        Self { sender }
    }

    /// Deliver a change to every live subscription.
    pub fn emit(&self, change: AuthChange) {
        tracing::debug!(kind = ?change.kind, "Emitting session change");
        // No subscribers is fine
        let _ = self.sender.send(change);
    }

    /// Open a new subscription.
    #[must_use]
    pub fn subscribe(&self) -> AuthSubscription {
        AuthSubscription::new(self.sender.subscribe())
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for AuthBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Live subscription to session changes.
///
/// Dropping the subscription or calling [`AuthSubscription::unsubscribe`]
/// tears it down.
#[derive(Debug)]
pub struct AuthSubscription {
    receiver: Option<broadcast::Receiver<AuthChange>>,
}

impl AuthSubscription {
    /// Wrap a broadcast receiver.
    #[must_use]
    pub const fn new(receiver: broadcast::Receiver<AuthChange>) -> Self {
        Self {
            receiver: Some(receiver),
        }
    }

    /// Wait for the next change.
    ///
    /// Returns `None` once the subscription is torn down or the transport is
    /// gone. If the subscriber fell behind, skipped changes are dropped and the
    /// next retained one is returned; the latest change always arrives.
    pub async fn next(&mut self) -> Option<AuthChange> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.recv().await {
                Ok(change) => return Some(change),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Session change subscriber lagged");
                },
                Err(broadcast::error::RecvError::Closed) => {
                    self.receiver = None;
                    return None;
                },
            }
        }
    }

    /// Stop receiving changes.
    pub fn unsubscribe(&mut self) {
        self.receiver = None;
    }

    /// Whether the subscription is still live.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.receiver.is_some()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::AuthChangeKind;

    #[tokio::test]
    async fn test_subscription_receives_changes_in_order() {
        let changes = AuthBroadcaster::new();
        let mut subscription = changes.subscribe();

        changes.emit(AuthChange::new(AuthChangeKind::SignedOut, None));
        changes.emit(AuthChange::new(AuthChangeKind::Expired, None));

        assert_eq!(subscription.next().await.unwrap().kind, AuthChangeKind::SignedOut);
        assert_eq!(subscription.next().await.unwrap().kind, AuthChangeKind::Expired);
    }

    #[tokio::test]
    async fn test_unsubscribe_tears_down() {
        let changes = AuthBroadcaster::new();
        let mut subscription = changes.subscribe();
        assert_eq!(changes.subscriber_count(), 1);

        subscription.unsubscribe();
        assert!(!subscription.is_active());
        assert_eq!(changes.subscriber_count(), 0);
        assert!(subscription.next().await.is_none());
    }

    #[tokio::test]
    async fn test_drop_tears_down() {
        let changes = AuthBroadcaster::new();
        {
            let _subscription = changes.subscribe();
            assert_eq!(changes.subscriber_count(), 1);
        }
        assert_eq!(changes.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_closed_transport_ends_subscription() {
        let changes = AuthBroadcaster::new();
        let mut subscription = changes.subscribe();
        drop(changes);
        assert!(subscription.next().await.is_none());
        assert!(!subscription.is_active());
    }
}
