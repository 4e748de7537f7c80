//! Process-wide authentication session.
//!
//! The session component resolves the persisted session once at start, then
//! follows transport change notifications for the rest of the process.
//!
//! # States
//!
//! ```text
//! Uninitialized ──initial fetch / first notification──▶ Ready(None | Some(session))
//! ```
//!
//! Readiness is monotonic: nothing moves the state back to `Uninitialized`.

pub mod reducer;
pub mod store;

pub use reducer::SessionReducer;
pub use store::SessionStore;

use crate::types::{AuthChange, Session, UserId};

/// Whether the session has been resolved yet.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// No resolution has completed. Gated content must not render.
    #[default]
    Uninitialized,

    /// Resolved. `None` means signed out.
    Ready(Option<Session>),
}

/// Progress of the one-shot initial fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitialFetch {
    /// `Start` has not been received.
    #[default]
    NotStarted,
    /// Fetch in flight.
    Pending,
    /// Fetch finished (successfully or not).
    Completed,
}

/// Session state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    /// Current phase.
    pub phase: SessionPhase,

    /// Initial fetch progress.
    pub initial_fetch: InitialFetch,

    /// Change notifications applied so far.
    pub changes_applied: u64,

    /// Last sign-out failure, if any.
    pub last_error: Option<String>,
}

impl SessionState {
    /// Whether any resolution has completed.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self.phase, SessionPhase::Ready(_))
    }

    /// The current session. Always `None` before ready.
    #[must_use]
    pub const fn current_session(&self) -> Option<&Session> {
        match &self.phase {
            SessionPhase::Ready(session) => session.as_ref(),
            SessionPhase::Uninitialized => None,
        }
    }

    /// Session present and carrying a user.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user_id().is_some()
    }

    /// Identity of the signed-in user.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.current_session().and_then(Session::user_id)
    }
}

/// Session actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Begin the one-shot initial session fetch.
    Start,

    /// Initial fetch finished.
    InitialSessionResolved {
        /// Persisted session, if any
        session: Option<Session>,
    },

    /// Initial fetch failed; treated as "no session".
    InitialSessionFailed {
        /// Failure description
        error: String,
    },

    /// The transport reported a change.
    SessionChanged {
        /// The change
        change: AuthChange,
    },

    /// Ask the transport to end the session.
    SignOut,

    /// The transport could not reach the backend while signing out.
    SignOutFailed {
        /// Failure description
        error: String,
    },
}
