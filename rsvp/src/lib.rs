//! # Attend RSVP
//!
//! Session and attendance reconciliation for an event RSVP client.
//!
//! ## Components
//!
//! - **[`SessionStore`]**: owns the current session, resolves it once at start
//!   and follows the transport's change notifications
//! - **[`AttendanceGate`]**: routes callers to gated content or the entry flow
//! - **[`EventRsvpController`]**: per-event view with an optimistic, idempotent
//!   join and a stale-response guard
//! - **[`EntryFlow`]** / **[`EventFeed`]**: sign-in/sign-up and the event list
//!
//! Every component is a reducer run by an [`attend_runtime::Store`]:
//!
//! ```text
//! Action → Reducer → (State, Effects) → Effect Execution → More Actions
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use attend_rsvp::*;
//!
//! let backend = RestBackend::new(&BackendConfig::from_env()?)?;
//! let session = SessionStore::new(backend.clone());
//! session.start().await?;
//!
//! let gate = AttendanceGate::new(session.clone());
//! if gate.decision(Route::Gated).await.allows_gated() {
//!     let view = EventRsvpController::new(session, backend.clone(), backend);
//!     view.load(EventId::new("42")).await?;
//!     view.join().await?;
//! }
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod attendance;
pub mod config;
pub mod entry;
pub mod environment;
pub mod error;
pub mod feed;
pub mod gate;
pub mod providers;
pub mod session;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

pub use attendance::{AttendancePhase, AttendanceState, EventRsvpController, RsvpControl};
pub use config::BackendConfig;
pub use entry::{EntryFlow, EntryState, Notice};
pub use error::{AuthError, BackendError, ConfigError, RsvpError};
pub use feed::EventFeed;
pub use gate::{AttendanceGate, GateDecision, Route, decide};
pub use providers::{AttendanceStore, AuthTransport, EventStore, RestBackend};
pub use session::{SessionState, SessionStore};
pub use types::{AttendanceRecord, AuthChange, AuthChangeKind, Event, EventId, Session, User, UserId};
