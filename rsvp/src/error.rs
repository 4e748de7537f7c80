//! Error types for the session, collaborator and attendance layers.
//!
//! Collaborators speak [`AuthError`] (sign-in / sign-up boundary) and
//! [`BackendError`] (data calls). Controllers translate the latter into the
//! user-facing [`RsvpError`] taxonomy.

use crate::types::EventId;
use thiserror::Error;

/// Errors surfaced at the sign-in / sign-up boundary.
///
/// Never retried automatically.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Email and password do not match an account.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// The account exists but its email address is not verified yet.
    #[error("Email address has not been confirmed")]
    EmailNotConfirmed,

    /// Sign-up for an email that already has an account.
    #[error("An account with this email already exists")]
    AlreadyRegistered,

    /// Password rejected by the backend's strength rules.
    #[error("Password is too weak: {0}")]
    WeakPassword(String),

    /// Email address rejected as malformed.
    #[error("Email address is invalid")]
    InvalidEmail,

    /// Anything else, with the backend's message.
    #[error("Authentication failed: {0}")]
    Other(String),
}

impl AuthError {
    /// Classify a failed authentication response.
    ///
    /// `status` is the HTTP status when the failure came from the wire.
    /// `signing_up` distinguishes sign-up, where 422 means the address is taken.
    #[must_use]
    pub fn classify(status: Option<u16>, message: &str, signing_up: bool) -> Self {
        let lowered = message.to_ascii_lowercase();

        if lowered.contains("invalid login credentials") {
            Self::InvalidCredentials
        } else if lowered.contains("email not confirmed") {
            Self::EmailNotConfirmed
        } else if lowered.contains("already registered")
            || (signing_up && status == Some(422) && !lowered.contains("password"))
        {
            Self::AlreadyRegistered
        } else if lowered.contains("password should be at least") {
            Self::WeakPassword(message.to_string())
        } else if lowered.contains("unable to validate email address") {
            Self::InvalidEmail
        } else {
            Self::Other(message.to_string())
        }
    }
}

/// Errors returned by the event and attendance collaborators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The requested row does not exist.
    #[error("Not found")]
    NotFound,

    /// A uniqueness constraint rejected the insert.
    #[error("Duplicate record")]
    Duplicate,

    /// The backend refused the caller's credentials.
    #[error("Unauthorized")]
    Unauthorized,

    /// Network failure or timeout.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Unexpected HTTP status.
    #[error("Unexpected status {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// Response body could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Errors surfaced by the per-event attendance view.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RsvpError {
    /// The event id does not resolve. Terminal for the view.
    #[error("Event {event_id} not found")]
    NotFound {
        /// Requested event
        event_id: EventId,
    },

    /// Loading the event or the attendance record failed.
    #[error("Could not load event: {0}")]
    TransientFetch(String),

    /// Creating the attendance record failed.
    #[error("Could not join event: {0}")]
    TransientMutation(String),

    /// A newer load replaced this one before it completed.
    #[error("Load of event {event_id} was superseded")]
    Superseded {
        /// The load that lost
        event_id: EventId,
    },

    /// Retry requested before any load.
    #[error("No event has been requested")]
    NothingRequested,

    /// The view was shut down.
    #[error("View is closed")]
    Closed,
}

impl RsvpError {
    /// Translate a failed fetch.
    #[must_use]
    pub fn from_fetch(error: BackendError, event_id: &EventId) -> Self {
        match error {
            BackendError::NotFound => Self::NotFound {
                event_id: event_id.clone(),
            },
            other => Self::TransientFetch(other.to_string()),
        }
    }

    /// Translate a failed mutation.
    #[must_use]
    pub fn from_mutation(error: &BackendError) -> Self {
        Self::TransientMutation(error.to_string())
    }

    /// Whether an explicit user retry may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientFetch(_) | Self::TransientMutation(_))
    }
}

/// Errors loading [`crate::config::BackendConfig`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is absent or blank.
    #[error("Missing required configuration: {0}")]
    Missing(&'static str),

    /// A variable is present but unusable.
    #[error("Invalid value for {key}: {reason}")]
    Invalid {
        /// Variable name
        key: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_sign_in_messages() {
        assert_eq!(
            AuthError::classify(Some(400), "Invalid login credentials", false),
            AuthError::InvalidCredentials
        );
        assert_eq!(
            AuthError::classify(Some(400), "Email not confirmed", false),
            AuthError::EmailNotConfirmed
        );
        assert_eq!(
            AuthError::classify(None, "network down", false),
            AuthError::Other("network down".to_string())
        );
    }

    #[test]
    fn test_classify_sign_up_messages() {
        assert_eq!(
            AuthError::classify(Some(400), "User already registered", true),
            AuthError::AlreadyRegistered
        );
        assert_eq!(
            AuthError::classify(Some(422), "Signup rejected", true),
            AuthError::AlreadyRegistered
        );
        assert!(matches!(
            AuthError::classify(Some(422), "Password should be at least 6 characters", true),
            AuthError::WeakPassword(_)
        ));
        assert_eq!(
            AuthError::classify(Some(400), "Unable to validate email address: invalid format", true),
            AuthError::InvalidEmail
        );
    }

    #[test]
    fn test_422_outside_sign_up_is_not_a_duplicate_account() {
        assert_eq!(
            AuthError::classify(Some(422), "Unprocessable", false),
            AuthError::Other("Unprocessable".to_string())
        );
    }

    #[test]
    fn test_fetch_translation() {
        let id = EventId::new("e1");
        assert_eq!(
            RsvpError::from_fetch(BackendError::NotFound, &id),
            RsvpError::NotFound { event_id: id.clone() }
        );
        let transient = RsvpError::from_fetch(BackendError::Transport("timeout".into()), &id);
        assert!(transient.is_retryable());
        assert!(!RsvpError::NotFound { event_id: id }.is_retryable());
    }
}
