//! Per-event attendance view.
//!
//! One view shows one event at a time and owns the caller's attendance state
//! for it. Joining is optimistic and idempotent:
//!
//! ```text
//! Unknown ──load──▶ NotJoined ──join──▶ OptimisticJoined ──ok──▶ Confirmed
//!    │                  ▲                      │
//!    └──load(record)────┼──────────────────────┼──────────────▶ Confirmed
//!                       └──────── RolledBack ◀─┘ error
//! ```
//!
//! Results are tagged with the load generation (fetches) or the user and
//! event (joins) so a response for an event no longer displayed is never
//! committed. A join that resolves during a reload of the same event outranks
//! the reload's attendance read, which may predate the insert.

pub mod controller;
pub mod reducer;

pub use controller::EventRsvpController;
pub use reducer::AttendanceReducer;

use crate::error::RsvpError;
use crate::types::{AttendanceRecord, Event, EventId, UserId};
use std::collections::{BTreeMap, BTreeSet};

/// Progress of the current load.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LoadStatus {
    /// Nothing requested yet.
    #[default]
    Idle,
    /// Fetch in flight.
    Loading,
    /// Event loaded.
    Loaded(Event),
    /// Fetch failed; see [`RsvpError::is_retryable`].
    Failed(RsvpError),
}

/// The caller's attendance for the displayed event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AttendancePhase {
    /// No authoritative answer yet (loading, or signed out).
    #[default]
    Unknown,
    /// Authoritatively not attending.
    NotJoined,
    /// Join in flight; shown as attending.
    OptimisticJoined,
    /// Record exists.
    Confirmed(AttendanceRecord),
    /// The last join failed and was undone.
    RolledBack(RsvpError),
}

/// What the view's attendance control shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsvpControl {
    /// Join not offered (signed out, or nothing loaded).
    Hidden,
    /// "Join"
    Join,
    /// "Going"
    Going,
}

/// Attendance view state.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttendanceState {
    /// User the view was loaded for.
    pub user_id: Option<UserId>,

    /// Most recently requested event.
    pub requested: Option<EventId>,

    /// Incremented on every load; results from older loads are dropped.
    pub generation: u64,

    /// Load progress.
    pub load: LoadStatus,

    /// Attendance for the requested event.
    pub phase: AttendancePhase,

    /// Joins in flight, per user and event.
    pub pending_joins: BTreeSet<(UserId, EventId)>,

    /// Joins that resolved while the current load was in flight. The load may
    /// have read attendance before the insert landed, so these outcomes take
    /// precedence over an empty read. Cleared when the next load starts.
    pub settled_joins: BTreeMap<(UserId, EventId), Result<AttendanceRecord, RsvpError>>,
}

impl AttendanceState {
    /// The loaded event.
    #[must_use]
    pub const fn event(&self) -> Option<&Event> {
        match &self.load {
            LoadStatus::Loaded(event) => Some(event),
            _ => None,
        }
    }

    /// The attendance record, once confirmed.
    #[must_use]
    pub const fn record(&self) -> Option<&AttendanceRecord> {
        match &self.phase {
            AttendancePhase::Confirmed(record) => Some(record),
            _ => None,
        }
    }

    /// "Going" when a record is present or a join is in flight.
    #[must_use]
    pub const fn control(&self) -> RsvpControl {
        if self.user_id.is_none() || self.event().is_none() {
            return RsvpControl::Hidden;
        }

        match self.phase {
            AttendancePhase::OptimisticJoined | AttendancePhase::Confirmed(_) => RsvpControl::Going,
            AttendancePhase::Unknown
            | AttendancePhase::NotJoined
            | AttendancePhase::RolledBack(_) => RsvpControl::Join,
        }
    }

    /// Whether the view is waiting on a fetch.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self.load, LoadStatus::Loading)
    }

    /// Whether the join control accepts input.
    #[must_use]
    pub fn can_join(&self) -> bool {
        self.control() == RsvpControl::Join
    }

    /// Whether a retry control is offered. Never for a missing event.
    #[must_use]
    pub const fn can_retry(&self) -> bool {
        matches!(&self.load, LoadStatus::Failed(error) if error.is_retryable())
    }

    /// Whether the requested event does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(&self.load, LoadStatus::Failed(RsvpError::NotFound { .. }))
    }

    fn is_showing(&self, (user, event_id): &(UserId, EventId)) -> bool {
        self.user_id == Some(*user) && self.requested.as_ref() == Some(event_id)
    }

    /// The failure to surface, from the load or the last join.
    #[must_use]
    pub const fn failure(&self) -> Option<&RsvpError> {
        match (&self.load, &self.phase) {
            (LoadStatus::Failed(error), _) | (_, AttendancePhase::RolledBack(error)) => Some(error),
            _ => None,
        }
    }
}

/// Attendance actions.
#[derive(Debug, Clone, PartialEq)]
pub enum AttendanceAction {
    /// Show `event_id` for `user_id` (`None` when signed out).
    Load {
        /// Event to show
        event_id: EventId,
        /// Caller identity
        user_id: Option<UserId>,
    },

    /// Repeat the last load after a transient failure.
    Retry,

    /// Fetch finished.
    Loaded {
        /// Load that produced this result
        generation: u64,
        /// The event
        event: Event,
        /// The caller's record, if any
        attendance: Option<AttendanceRecord>,
    },

    /// Fetch failed.
    LoadFailed {
        /// Load that produced this result
        generation: u64,
        /// Translated failure
        error: RsvpError,
    },

    /// Register the caller for the displayed event.
    Join {
        /// Identity of the current session; must match the loaded view
        user_id: Option<UserId>,
    },

    /// Join succeeded (or the record already existed).
    JoinConfirmed {
        /// Who joined
        user_id: UserId,
        /// The event joined
        event_id: EventId,
        /// The stored record
        record: AttendanceRecord,
    },

    /// Join failed.
    JoinFailed {
        /// Who tried to join
        user_id: UserId,
        /// The event
        event_id: EventId,
        /// Translated failure
        error: RsvpError,
    },
}
