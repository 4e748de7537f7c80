//! Session reducer.

use super::{InitialFetch, SessionAction, SessionPhase, SessionState};
use crate::environment::SessionEnvironment;
use crate::providers::AuthTransport;
use attend_core::{SmallVec, effect::Effect, reducer::Reducer, smallvec};
use std::marker::PhantomData;

/// Session reducer.
///
/// Single writer of the session. The last applied change wins; an initial
/// fetch that completes after a change notification only flips readiness and
/// never overwrites the newer session.
#[derive(Debug)]
pub struct SessionReducer<T> {
    _transport: PhantomData<T>,
}

impl<T> SessionReducer<T> {
    /// Create a session reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _transport: PhantomData,
        }
    }
}

impl<T> Default for SessionReducer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for SessionReducer<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> SessionReducer<T> {
    fn resolve_initial(state: &mut SessionState, session: Option<crate::types::Session>) {
        state.initial_fetch = InitialFetch::Completed;

        if state.changes_applied > 0 {
            tracing::debug!("Initial session arrived after a change notification, keeping newer session");
            return;
        }

        tracing::info!(authenticated = session.is_some(), "Session resolved");
        state.phase = SessionPhase::Ready(session);
    }
}

impl<T> Reducer for SessionReducer<T>
where
    T: AuthTransport + Clone + 'static,
{
    type State = SessionState;
    type Action = SessionAction;
    type Environment = SessionEnvironment<T>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            SessionAction::Start => {
                if state.initial_fetch != InitialFetch::NotStarted {
                    tracing::debug!("Session already started");
                    return smallvec![Effect::None];
                }

                state.initial_fetch = InitialFetch::Pending;
                let auth = env.auth.clone();

                smallvec![Effect::future(async move {
                    Some(match auth.get_current_session().await {
                        Ok(session) => SessionAction::InitialSessionResolved { session },
                        Err(error) => SessionAction::InitialSessionFailed {
                            error: error.to_string(),
                        },
                    })
                })]
            },

            SessionAction::InitialSessionResolved { session } => {
                Self::resolve_initial(state, session);
                smallvec![Effect::None]
            },

            SessionAction::InitialSessionFailed { error } => {
                tracing::warn!(%error, "Initial session fetch failed, continuing signed out");
                metrics::counter!("session.initial_fetch.failed").increment(1);
                Self::resolve_initial(state, None);
                smallvec![Effect::None]
            },

            SessionAction::SessionChanged { change } => {
                tracing::info!(
                    kind = ?change.kind,
                    authenticated = change.session.as_ref().is_some_and(|s| s.user.is_some()),
                    "Session changed"
                );
                metrics::counter!("session.changes").increment(1);

                state.changes_applied += 1;
                state.phase = SessionPhase::Ready(change.session);
                smallvec![Effect::None]
            },

            SessionAction::SignOut => {
                if !state.is_authenticated() {
                    tracing::debug!("Sign-out ignored, no active session");
                    return smallvec![Effect::None];
                }

                state.last_error = None;
                let auth = env.auth.clone();

                smallvec![Effect::future(async move {
                    match auth.sign_out().await {
                        Ok(()) => None,
                        Err(error) => Some(SessionAction::SignOutFailed {
                            error: error.to_string(),
                        }),
                    }
                })]
            },

            SessionAction::SignOutFailed { error } => {
                tracing::warn!(%error, "Sign-out did not reach the backend");
                state.last_error = Some(error);
                smallvec![Effect::None]
            },
        }
    }
}
