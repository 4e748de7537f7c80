//! Mock authentication transport.

use super::{FailureBudget, Holds, Release};
use crate::error::{AuthError, BackendError};
use crate::providers::{AuthBroadcaster, AuthSubscription, AuthTransport};
use crate::types::{AuthChange, AuthChangeKind, Session, User, UserId};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone)]
struct Account {
    id: UserId,
    password: String,
    confirmed: bool,
}

/// Mock authentication transport.
///
/// Keeps accounts in memory and behaves like the hosted backend: sign-in,
/// sign-up and sign-out emit change notifications to subscribers.
#[derive(Debug, Clone)]
pub struct MockAuthTransport {
    accounts: Arc<Mutex<HashMap<String, Account>>>,
    current: Arc<Mutex<Option<Session>>>,
    changes: AuthBroadcaster,
    initial_failures: FailureBudget,
    initial_hold: Holds<()>,
    require_confirmation: bool,
    issued: Arc<AtomicU64>,
}

impl MockAuthTransport {
    /// Create a transport with no accounts and no persisted session.
    #[must_use]
    pub fn new() -> Self {
        Self {
            accounts: Arc::new(Mutex::new(HashMap::new())),
            current: Arc::new(Mutex::new(None)),
            changes: AuthBroadcaster::new(),
            initial_failures: FailureBudget::default(),
            initial_hold: Holds::default(),
            require_confirmation: false,
            issued: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Register a confirmed account.
    #[must_use]
    pub fn with_user(self, email: &str, password: &str) -> Self {
        self.insert_account(email, password, true);
        self
    }

    /// Register an account whose email is not confirmed yet.
    #[must_use]
    pub fn with_unconfirmed_user(self, email: &str, password: &str) -> Self {
        self.insert_account(email, password, false);
        self
    }

    /// Start with a persisted session, as if restored from storage.
    #[must_use]
    pub fn with_persisted_session(self, session: Session) -> Self {
        self.set_current(Some(session));
        self
    }

    /// New sign-ups must verify their email before receiving a session.
    #[must_use]
    pub const fn requiring_confirmation(mut self) -> Self {
        self.require_confirmation = true;
        self
    }

    /// Fail the next `n` initial session fetches.
    pub fn fail_initial_fetches(&self, n: usize) {
        self.initial_failures.set(n);
    }

    /// Park the next initial session fetch until released.
    #[must_use]
    pub fn hold_initial_fetch(&self) -> Release {
        self.initial_hold.hold(())
    }

    /// Build a session for a fresh user, without registering anything.
    #[must_use]
    pub fn session_for(&self, user: UserId) -> Session {
        let n = self.issued.fetch_add(1, Ordering::SeqCst);
        Session {
            access_token: format!("mock-access-{n}"),
            refresh_token: Some(format!("mock-refresh-{n}")),
            expires_at: None,
            user: Some(User {
                id: user,
                email: None,
            }),
        }
    }

    /// Deliver an externally caused change (refresh, expiry, sign-out elsewhere).
    pub fn emit(&self, change: AuthChange) {
        self.set_current(change.session.clone());
        self.changes.emit(change);
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.changes.subscriber_count()
    }

    /// Id of a registered account.
    #[must_use]
    pub fn user_id(&self, email: &str) -> Option<UserId> {
        self.accounts
            .lock()
            .ok()
            .and_then(|accounts| accounts.get(email).map(|account| account.id))
    }

    fn insert_account(&self, email: &str, password: &str, confirmed: bool) -> UserId {
        let id = UserId(uuid::Uuid::new_v4());
        if let Ok(mut accounts) = self.accounts.lock() {
            accounts.insert(
                email.to_string(),
                Account {
                    id,
                    password: password.to_string(),
                    confirmed,
                },
            );
        }
        id
    }

    fn set_current(&self, session: Option<Session>) {
        if let Ok(mut current) = self.current.lock() {
            *current = session;
        }
    }

    fn issue(&self, id: UserId, email: &str) -> Session {
        let mut session = self.session_for(id);
        if let Some(user) = session.user.as_mut() {
            user.email = Some(email.to_string());
        }
        self.set_current(Some(session.clone()));
        self.changes.emit(AuthChange::new(
            AuthChangeKind::SignedIn,
            Some(session.clone()),
        ));
        session
    }
}

impl Default for MockAuthTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthTransport for MockAuthTransport {
    fn get_current_session(
        &self,
    ) -> impl Future<Output = Result<Option<Session>, BackendError>> + Send {
        let this = self.clone();

        async move {
            this.initial_hold.pass(&()).await;

            if this.initial_failures.take() {
                return Err(BackendError::Transport("injected failure".to_string()));
            }

            this.current
                .lock()
                .map(|current| current.clone())
                .map_err(|_| BackendError::Transport("Mutex lock failed".to_string()))
        }
    }

    fn subscribe(&self) -> AuthSubscription {
        self.changes.subscribe()
    }

    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Session, AuthError>> + Send {
        let this = self.clone();
        let email = email.to_string();
        let password = password.to_string();

        async move {
            let account = this
                .accounts
                .lock()
                .map_err(|_| AuthError::Other("Mutex lock failed".to_string()))?
                .get(&email)
                .cloned();

            match account {
                Some(account) if account.password != password => Err(AuthError::InvalidCredentials),
                Some(account) if !account.confirmed => Err(AuthError::EmailNotConfirmed),
                Some(account) => Ok(this.issue(account.id, &email)),
                None => Err(AuthError::InvalidCredentials),
            }
        }
    }

    fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Option<Session>, AuthError>> + Send {
        let this = self.clone();
        let email = email.to_string();
        let password = password.to_string();

        async move {
            if !email.contains('@') {
                return Err(AuthError::InvalidEmail);
            }
            if password.len() < MIN_PASSWORD_LEN {
                return Err(AuthError::WeakPassword(format!(
                    "Password should be at least {MIN_PASSWORD_LEN} characters"
                )));
            }
            if this.user_id(&email).is_some() {
                return Err(AuthError::AlreadyRegistered);
            }

            let confirmed = !this.require_confirmation;
            let id = this.insert_account(&email, &password, confirmed);

            Ok(confirmed.then(|| this.issue(id, &email)))
        }
    }

    fn sign_out(&self) -> impl Future<Output = Result<(), BackendError>> + Send {
        let this = self.clone();

        async move {
            this.set_current(None);
            this.changes
                .emit(AuthChange::new(AuthChangeKind::SignedOut, None));
            Ok(())
        }
    }
}
