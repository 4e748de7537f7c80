//! Session store façade.

use super::{SessionAction, SessionReducer, SessionState};
use crate::environment::SessionEnvironment;
use crate::providers::AuthTransport;
use crate::types::{Session, UserId};
use attend_runtime::{Store, StoreError};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;

type Inner<T> = Store<SessionState, SessionAction, SessionEnvironment<T>, SessionReducer<T>>;

/// Owned, injectable holder of the current session.
///
/// Clones share the same state. Create one per process and hand clones to
/// the gate and controllers.
///
/// # Example
///
/// ```ignore
/// let session = SessionStore::new(transport);
/// session.start().await?;
/// session.wait_until_ready().await;
/// if session.is_authenticated().await { /* gated content */ }
/// ```
pub struct SessionStore<T>
where
    T: AuthTransport + Clone + 'static,
{
    store: Inner<T>,
    listener: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl<T> Clone for SessionStore<T>
where
    T: AuthTransport + Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            listener: Arc::clone(&self.listener),
        }
    }
}

impl<T> SessionStore<T>
where
    T: AuthTransport + Clone + 'static,
{
    /// Create an unstarted session store.
    #[must_use]
    pub fn new(auth: T) -> Self {
        Self {
            store: Store::new(
                SessionState::default(),
                SessionReducer::new(),
                SessionEnvironment::new(auth),
            ),
            listener: Arc::new(Mutex::new(None)),
        }
    }

    /// Subscribe to transport changes and issue the initial session fetch.
    ///
    /// The subscription is opened before the fetch, so no change can fall
    /// between the two. Calling `start` again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after [`SessionStore::shutdown`].
    pub async fn start(&self) -> Result<(), StoreError> {
        {
            let mut listener = self
                .listener
                .lock()
                .map_err(|_| StoreError::LockPoisoned)?;
            if listener.is_some() {
                return Ok(());
            }

            let mut subscription = self.store.environment().auth.subscribe();
            let store = self.store.clone();

            *listener = Some(tokio::spawn(async move {
                while let Some(change) = subscription.next().await {
                    if store
                        .send(SessionAction::SessionChanged { change })
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                tracing::debug!("Session change listener stopped");
            }));
        }

        self.store.send(SessionAction::Start).await?;
        Ok(())
    }

    /// The current session; `None` before ready or when signed out.
    pub async fn current_session(&self) -> Option<Session> {
        self.store.state(|s| s.current_session().cloned()).await
    }

    /// Whether any session resolution has completed.
    pub async fn is_ready(&self) -> bool {
        self.store.state(SessionState::is_ready).await
    }

    /// Whether a session with a user is present.
    pub async fn is_authenticated(&self) -> bool {
        self.store.state(SessionState::is_authenticated).await
    }

    /// Identity of the signed-in user.
    pub async fn user_id(&self) -> Option<UserId> {
        self.store.state(SessionState::user_id).await
    }

    /// Snapshot of the full session state.
    pub async fn snapshot(&self) -> SessionState {
        self.store.state(SessionState::clone).await
    }

    /// Wait until the session is resolved.
    ///
    /// Never returns if the store was not started and no change arrives.
    pub async fn wait_until_ready(&self) {
        self.wait_until(SessionState::is_ready).await;
    }

    /// Wait until `predicate` holds for the session state.
    pub async fn wait_until<F>(&self, predicate: F)
    where
        F: Fn(&SessionState) -> bool,
    {
        // Subscribe before the first check so no revision is missed
        let mut revisions = self.store.revisions();
        loop {
            if self.store.state(&predicate).await {
                return;
            }
            if revisions.changed().await.is_err() {
                return;
            }
        }
    }

    /// Observe state changes. Bumped after every session action.
    #[must_use]
    pub fn revisions(&self) -> watch::Receiver<u64> {
        self.store.revisions()
    }

    /// End the current session through the transport.
    ///
    /// The state changes when the transport's notification arrives.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after [`SessionStore::shutdown`].
    pub async fn sign_out(&self) -> Result<(), StoreError> {
        let mut handle = self.store.send(SessionAction::SignOut).await?;
        handle.wait().await;
        Ok(())
    }

    /// Tear down the change subscription and stop accepting actions.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownTimeout`] if in-flight effects outlive the
    /// configured shutdown timeout.
    pub async fn shutdown(&self) -> Result<(), StoreError> {
        // The handle stays in place so a later `start` remains a no-op
        if let Ok(listener) = self.listener.lock() {
            if let Some(listener) = listener.as_ref() {
                listener.abort();
            }
        }
        self.store.shutdown_default().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mocks::MockAuthTransport;
    use crate::types::{AuthChange, AuthChangeKind};
    use std::time::Duration;

    async fn ready(session: &SessionStore<MockAuthTransport>) {
        tokio::time::timeout(Duration::from_secs(1), session.wait_until_ready())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_not_ready_before_start() {
        let session = SessionStore::new(MockAuthTransport::new());
        assert!(!session.is_ready().await);
        assert_eq!(session.current_session().await, None);
    }

    #[tokio::test]
    async fn test_start_resolves_persisted_session() {
        let auth = MockAuthTransport::new();
        let persisted = auth.session_for(UserId(uuid::Uuid::new_v4()));
        let session = SessionStore::new(auth.with_persisted_session(persisted.clone()));

        session.start().await.unwrap();
        ready(&session).await;

        assert!(session.is_authenticated().await);
        assert_eq!(session.user_id().await, persisted.user_id());
    }

    #[tokio::test]
    async fn test_notifications_replace_session() {
        let auth = MockAuthTransport::new().with_user("ada@example.com", "hunter22");
        let session = SessionStore::new(auth.clone());
        session.start().await.unwrap();
        ready(&session).await;
        assert!(!session.is_authenticated().await);

        let signed_in = auth.sign_in("ada@example.com", "hunter22").await.unwrap();
        tokio::time::timeout(
            Duration::from_secs(1),
            session.wait_until(SessionState::is_authenticated),
        )
        .await
        .unwrap();
        assert_eq!(session.current_session().await, Some(signed_in));

        auth.emit(AuthChange::new(AuthChangeKind::Expired, None));
        tokio::time::timeout(Duration::from_secs(1), session.wait_until(|s| !s.is_authenticated()))
            .await
            .unwrap();
        assert!(session.is_ready().await);
    }

    #[tokio::test]
    async fn test_start_twice_keeps_one_subscription() {
        let auth = MockAuthTransport::new();
        let session = SessionStore::new(auth.clone());
        session.start().await.unwrap();
        session.start().await.unwrap();
        assert_eq!(auth.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_sign_out_goes_unauthenticated() {
        let auth = MockAuthTransport::new().with_user("ada@example.com", "hunter22");
        auth.sign_in("ada@example.com", "hunter22").await.unwrap();
        let session = SessionStore::new(auth);
        session.start().await.unwrap();
        tokio::time::timeout(
            Duration::from_secs(1),
            session.wait_until(SessionState::is_authenticated),
        )
        .await
        .unwrap();

        session.sign_out().await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), session.wait_until(|s| !s.is_authenticated()))
            .await
            .unwrap();
        assert!(session.is_ready().await);
    }

    #[tokio::test]
    async fn test_shutdown_tears_down_subscription() {
        let auth = MockAuthTransport::new();
        let session = SessionStore::new(auth.clone());
        session.start().await.unwrap();
        ready(&session).await;

        session.shutdown().await.unwrap();
        // Aborted task drops its subscription
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(auth.subscriber_count(), 0);
        assert_eq!(session.sign_out().await, Err(StoreError::ShutdownInProgress));
    }
}
