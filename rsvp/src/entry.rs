//! Sign-in / sign-up flow.
//!
//! Holds the form fields, blocks double submission while a request is in
//! flight, and shows one notice at a time. Each notice is dismissed after the
//! configured lifetime unless a newer one replaced it first.
//!
//! The flow never writes the session: a successful sign-in reaches the
//! [`crate::session::SessionStore`] through the transport's change
//! notification.

use crate::environment::EntryEnvironment;
use crate::error::AuthError;
use crate::providers::AuthTransport;
use attend_core::{SmallVec, effect::Effect, reducer::Reducer, smallvec};
use attend_runtime::{Store, StoreError};
use std::marker::PhantomData;

/// Which request is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryRequest {
    /// Sign-in
    SignIn,
    /// Sign-up
    SignUp,
}

/// User-facing outcome of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Signed in.
    SignedIn,
    /// Account created and signed in.
    AccountCreated,
    /// Account created; confirm the email address before signing in.
    VerificationPending,
    /// Request rejected.
    Failed(AuthError),
}

impl Notice {
    /// Whether this notice reports a failure.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Entry flow state.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct EntryState {
    /// Email field.
    pub email: String,
    /// Password field.
    pub password: String,
    /// Request in flight; both submit actions are disabled meanwhile.
    pub busy: Option<EntryRequest>,
    /// Notice on display.
    pub notice: Option<Notice>,
    /// Incremented for every notice shown.
    pub notice_seq: u64,
}

impl std::fmt::Debug for EntryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryState")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("busy", &self.busy)
            .field("notice", &self.notice)
            .field("notice_seq", &self.notice_seq)
            .finish()
    }
}

impl EntryState {
    /// Whether submit actions are enabled.
    #[must_use]
    pub const fn can_submit(&self) -> bool {
        self.busy.is_none()
    }
}

/// Entry flow actions.
#[derive(Clone, PartialEq, Eq)]
pub enum EntryAction {
    /// Email field edited.
    SetEmail(String),
    /// Password field edited.
    SetPassword(String),
    /// Submit as sign-in.
    SignIn,
    /// Submit as sign-up.
    SignUp,
    /// Sign-in finished.
    SignInFinished(Result<(), AuthError>),
    /// Sign-up finished; `Ok(false)` means verification is pending.
    SignUpFinished(Result<bool, AuthError>),
    /// Hide notice `seq` if it is still the one on display.
    DismissNotice {
        /// Notice to hide
        seq: u64,
    },
}

impl std::fmt::Debug for EntryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SetEmail(email) => f.debug_tuple("SetEmail").field(email).finish(),
            Self::SetPassword(_) => f.debug_tuple("SetPassword").field(&"<redacted>").finish(),
            Self::SignIn => f.write_str("SignIn"),
            Self::SignUp => f.write_str("SignUp"),
            Self::SignInFinished(result) => {
                f.debug_tuple("SignInFinished").field(result).finish()
            },
            Self::SignUpFinished(result) => {
                f.debug_tuple("SignUpFinished").field(result).finish()
            },
            Self::DismissNotice { seq } => {
                f.debug_struct("DismissNotice").field("seq", seq).finish()
            },
        }
    }
}

/// Entry flow reducer.
#[derive(Debug)]
pub struct EntryReducer<T> {
    _transport: PhantomData<T>,
}

impl<T> EntryReducer<T> {
    /// Create an entry reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _transport: PhantomData,
        }
    }
}

impl<T> Default for EntryReducer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for EntryReducer<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> EntryReducer<T>
where
    T: AuthTransport + Clone + 'static,
{
    fn show(
        state: &mut EntryState,
        notice: Notice,
        env: &EntryEnvironment<T>,
    ) -> Effect<EntryAction> {
        state.busy = None;
        state.notice_seq += 1;
        state.notice = Some(notice);

        Effect::Delay {
            duration: env.notice_ttl,
            action: Box::new(EntryAction::DismissNotice {
                seq: state.notice_seq,
            }),
        }
    }
}

impl<T> Reducer for EntryReducer<T>
where
    T: AuthTransport + Clone + 'static,
{
    type State = EntryState;
    type Action = EntryAction;
    type Environment = EntryEnvironment<T>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            EntryAction::SetEmail(email) => {
                state.email = email;
                smallvec![Effect::None]
            },

            EntryAction::SetPassword(password) => {
                state.password = password;
                smallvec![Effect::None]
            },

            EntryAction::SignIn | EntryAction::SignUp if state.busy.is_some() => {
                tracing::debug!("Submit ignored, request in flight");
                smallvec![Effect::None]
            },

            EntryAction::SignIn => {
                state.busy = Some(EntryRequest::SignIn);
                state.notice = None;
                let auth = env.auth.clone();
                let email = state.email.trim().to_string();
                let password = state.password.clone();

                smallvec![Effect::future(async move {
                    let result = auth.sign_in(&email, &password).await.map(|_| ());
                    Some(EntryAction::SignInFinished(result))
                })]
            },

            EntryAction::SignUp => {
                state.busy = Some(EntryRequest::SignUp);
                state.notice = None;
                let auth = env.auth.clone();
                let email = state.email.trim().to_string();
                let password = state.password.clone();

                smallvec![Effect::future(async move {
                    let result = auth
                        .sign_up(&email, &password)
                        .await
                        .map(|session| session.is_some());
                    Some(EntryAction::SignUpFinished(result))
                })]
            },

            EntryAction::SignInFinished(result) => {
                let notice = match result {
                    Ok(()) => Notice::SignedIn,
                    Err(error) => {
                        tracing::info!(%error, "Sign-in rejected");
                        Notice::Failed(error)
                    },
                };
                smallvec![Self::show(state, notice, env)]
            },

            EntryAction::SignUpFinished(result) => {
                let notice = match result {
                    Ok(true) => Notice::AccountCreated,
                    Ok(false) => Notice::VerificationPending,
                    Err(error) => {
                        tracing::info!(%error, "Sign-up rejected");
                        Notice::Failed(error)
                    },
                };
                smallvec![Self::show(state, notice, env)]
            },

            EntryAction::DismissNotice { seq } => {
                if seq == state.notice_seq {
                    state.notice = None;
                }
                smallvec![Effect::None]
            },
        }
    }
}

type Inner<T> = Store<EntryState, EntryAction, EntryEnvironment<T>, EntryReducer<T>>;

/// Entry flow façade.
pub struct EntryFlow<T>
where
    T: AuthTransport + Clone + 'static,
{
    store: Inner<T>,
}

impl<T> EntryFlow<T>
where
    T: AuthTransport + Clone + 'static,
{
    /// Create an entry flow with empty fields.
    #[must_use]
    pub fn new(env: EntryEnvironment<T>) -> Self {
        Self {
            store: Store::new(EntryState::default(), EntryReducer::new(), env),
        }
    }

    /// Edit the email field.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after shutdown.
    pub async fn set_email(&self, email: impl Into<String>) -> Result<(), StoreError> {
        self.store.send(EntryAction::SetEmail(email.into())).await?;
        Ok(())
    }

    /// Edit the password field.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after shutdown.
    pub async fn set_password(&self, password: impl Into<String>) -> Result<(), StoreError> {
        self.store
            .send(EntryAction::SetPassword(password.into()))
            .await?;
        Ok(())
    }

    /// Submit as sign-in and wait for the notice.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after shutdown.
    pub async fn sign_in(&self) -> Result<EntryState, StoreError> {
        self.submit(EntryAction::SignIn).await
    }

    /// Submit as sign-up and wait for the notice.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after shutdown.
    pub async fn sign_up(&self) -> Result<EntryState, StoreError> {
        self.submit(EntryAction::SignUp).await
    }

    /// Snapshot of the flow.
    pub async fn view(&self) -> EntryState {
        self.store.state(EntryState::clone).await
    }

    async fn submit(&self, action: EntryAction) -> Result<EntryState, StoreError> {
        let mut handle = self.store.send(action).await?;
        handle.wait().await;
        Ok(self.view().await)
    }
}
