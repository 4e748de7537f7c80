//! Reducer environments.
//!
//! Each component receives only the collaborators it uses.

use crate::providers::{AttendanceStore, AuthTransport, EventStore};
use std::time::Duration;

/// Default lifetime of an entry-flow notice.
pub const DEFAULT_NOTICE_TTL: Duration = Duration::from_secs(5);

/// Environment for the session reducer.
#[derive(Debug, Clone)]
pub struct SessionEnvironment<T>
where
    T: AuthTransport + Clone,
{
    /// Authentication transport.
    pub auth: T,
}

impl<T: AuthTransport + Clone> SessionEnvironment<T> {
    /// Create a session environment.
    #[must_use]
    pub const fn new(auth: T) -> Self {
        Self { auth }
    }
}

/// Environment for the per-event attendance reducer.
///
/// # Type Parameters
///
/// - `V`: Event store
/// - `A`: Attendance store
#[derive(Debug, Clone)]
pub struct AttendanceEnvironment<V, A>
where
    V: EventStore + Clone,
    A: AttendanceStore + Clone,
{
    /// Event store.
    pub events: V,

    /// Attendance store.
    pub attendance: A,
}

impl<V, A> AttendanceEnvironment<V, A>
where
    V: EventStore + Clone,
    A: AttendanceStore + Clone,
{
    /// Create an attendance environment.
    #[must_use]
    pub const fn new(events: V, attendance: A) -> Self {
        Self { events, attendance }
    }
}

/// Environment for the sign-in / sign-up reducer.
#[derive(Debug, Clone)]
pub struct EntryEnvironment<T>
where
    T: AuthTransport + Clone,
{
    /// Authentication transport.
    pub auth: T,

    /// How long a notice stays visible.
    pub notice_ttl: Duration,
}

impl<T: AuthTransport + Clone> EntryEnvironment<T> {
    /// Create an entry environment with the default notice lifetime.
    #[must_use]
    pub const fn new(auth: T) -> Self {
        Self {
            auth,
            notice_ttl: DEFAULT_NOTICE_TTL,
        }
    }

    /// Override the notice lifetime.
    #[must_use]
    pub const fn with_notice_ttl(mut self, ttl: Duration) -> Self {
        self.notice_ttl = ttl;
        self
    }
}

/// Environment for the event feed reducer.
#[derive(Debug, Clone)]
pub struct FeedEnvironment<V>
where
    V: EventStore + Clone,
{
    /// Event store.
    pub events: V,
}

impl<V: EventStore + Clone> FeedEnvironment<V> {
    /// Create a feed environment.
    #[must_use]
    pub const fn new(events: V) -> Self {
        Self { events }
    }
}
