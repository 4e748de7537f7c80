//! Event view controller.

use super::{AttendanceAction, AttendancePhase, AttendanceReducer, AttendanceState, LoadStatus};
use crate::environment::AttendanceEnvironment;
use crate::error::RsvpError;
use crate::providers::{AttendanceStore, AuthTransport, EventStore};
use crate::session::SessionStore;
use crate::types::{AttendanceRecord, Event, EventId};
use attend_runtime::{EffectHandle, Store};
use tokio::sync::watch;

type Inner<V, A> =
    Store<AttendanceState, AttendanceAction, AttendanceEnvironment<V, A>, AttendanceReducer<V, A>>;

/// Result of a successful load.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedEvent {
    /// The event.
    pub event: Event,
    /// The caller's record, if confirmed.
    pub attendance: Option<AttendanceRecord>,
}

/// Controller for one event view.
///
/// Single writer of the view's attendance state. Loads wait for the session
/// to resolve so every query is scoped to the right identity.
///
/// # Type Parameters
///
/// - `T`: Authentication transport (for the shared session)
/// - `V`: Event store
/// - `A`: Attendance store
pub struct EventRsvpController<T, V, A>
where
    T: AuthTransport + Clone + 'static,
    V: EventStore + Clone + 'static,
    A: AttendanceStore + Clone + 'static,
{
    session: SessionStore<T>,
    store: Inner<V, A>,
}

impl<T, V, A> EventRsvpController<T, V, A>
where
    T: AuthTransport + Clone + 'static,
    V: EventStore + Clone + 'static,
    A: AttendanceStore + Clone + 'static,
{
    /// Create a controller with an empty view.
    #[must_use]
    pub fn new(session: SessionStore<T>, events: V, attendance: A) -> Self {
        Self {
            session,
            store: Store::new(
                AttendanceState::default(),
                AttendanceReducer::new(),
                AttendanceEnvironment::new(events, attendance),
            ),
        }
    }

    /// Start loading `event_id` and return without waiting for the result.
    ///
    /// Waits for the session to resolve first. Any earlier load still in
    /// flight will not be committed.
    ///
    /// # Errors
    ///
    /// Returns [`RsvpError::Closed`] if the view was shut down.
    pub async fn begin_load(&self, event_id: EventId) -> Result<EffectHandle, RsvpError> {
        self.session.wait_until_ready().await;
        let user_id = self.session.user_id().await;

        self.store
            .send(AttendanceAction::Load { event_id, user_id })
            .await
            .map_err(|_| RsvpError::Closed)
    }

    /// Load the event and the caller's attendance.
    ///
    /// # Errors
    ///
    /// - Unknown id → [`RsvpError::NotFound`]
    /// - Transport failure → [`RsvpError::TransientFetch`]
    /// - A newer load for another event won → [`RsvpError::Superseded`]
    /// - View shut down → [`RsvpError::Closed`]
    pub async fn load(&self, event_id: EventId) -> Result<LoadedEvent, RsvpError> {
        let mut handle = self.begin_load(event_id.clone()).await?;
        handle.wait().await;
        self.outcome(event_id).await
    }

    /// Repeat the last load after a transient failure.
    ///
    /// Does nothing unless [`AttendanceState::can_retry`] holds; the current
    /// outcome is returned either way.
    ///
    /// # Errors
    ///
    /// As for [`EventRsvpController::load`], plus
    /// [`RsvpError::NothingRequested`] if no load was ever started.
    pub async fn retry(&self) -> Result<LoadedEvent, RsvpError> {
        let Some(event_id) = self.store.state(|s| s.requested.clone()).await else {
            return Err(RsvpError::NothingRequested);
        };

        let mut handle = self
            .store
            .send(AttendanceAction::Retry)
            .await
            .map_err(|_| RsvpError::Closed)?;
        handle.wait().await;
        self.outcome(event_id).await
    }

    /// Start joining the displayed event and return without waiting.
    ///
    /// Ignored if the session identity changed since the view was loaded.
    ///
    /// # Errors
    ///
    /// Returns [`RsvpError::Closed`] if the view was shut down.
    pub async fn begin_join(&self) -> Result<EffectHandle, RsvpError> {
        let user_id = self.session.user_id().await;

        self.store
            .send(AttendanceAction::Join { user_id })
            .await
            .map_err(|_| RsvpError::Closed)
    }

    /// Register the caller for the displayed event.
    ///
    /// Idempotent: joining an event already joined, or while a join is in
    /// flight, changes nothing. Not offered when signed out.
    ///
    /// # Errors
    ///
    /// - Remote failure → [`RsvpError::TransientMutation`]; the view has
    ///   rolled back to "Join"
    /// - View shut down → [`RsvpError::Closed`]
    pub async fn join(&self) -> Result<(), RsvpError> {
        let mut handle = self.begin_join().await?;
        handle.wait().await;

        self.store
            .state(|s| match &s.phase {
                AttendancePhase::RolledBack(error) => Err(error.clone()),
                _ => Ok(()),
            })
            .await
    }

    /// Snapshot of the view.
    pub async fn view(&self) -> AttendanceState {
        self.store.state(AttendanceState::clone).await
    }

    /// Observe view changes.
    #[must_use]
    pub fn revisions(&self) -> watch::Receiver<u64> {
        self.store.revisions()
    }

    /// Stop accepting actions, waiting briefly for in-flight effects.
    ///
    /// # Errors
    ///
    /// Returns [`RsvpError::Closed`] if effects were still running at the
    /// shutdown timeout.
    pub async fn shutdown(&self) -> Result<(), RsvpError> {
        self.store
            .shutdown_default()
            .await
            .map_err(|_| RsvpError::Closed)
    }

    async fn outcome(&self, event_id: EventId) -> Result<LoadedEvent, RsvpError> {
        self.store
            .state(move |s| match (&s.requested, &s.load) {
                (Some(requested), LoadStatus::Loaded(event)) if *requested == event_id => {
                    Ok(LoadedEvent {
                        event: event.clone(),
                        attendance: s.record().cloned(),
                    })
                },
                (Some(requested), LoadStatus::Failed(error)) if *requested == event_id => {
                    Err(error.clone())
                },
                _ => Err(RsvpError::Superseded { event_id }),
            })
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::attendance::RsvpControl;
    use crate::mocks::{MockAttendanceStore, MockAuthTransport, MockEventStore};
    use crate::types::UserId;
    use attend_core::environment::Clock;
    use attend_testing::test_clock;

    fn event(id: &str) -> Event {
        Event {
            id: EventId::new(id),
            title: format!("Event {id}"),
            starts_at: test_clock().now(),
            location: String::new(),
            description: String::new(),
            image: None,
            attendee_count: None,
        }
    }

    async fn signed_in() -> (SessionStore<MockAuthTransport>, UserId) {
        let auth = MockAuthTransport::new();
        let user = UserId(uuid::Uuid::new_v4());
        let session = SessionStore::new(auth.clone().with_persisted_session(auth.session_for(user)));
        session.start().await.unwrap();
        (session, user)
    }

    #[tokio::test]
    async fn test_load_then_join() {
        let (session, user) = signed_in().await;
        let attendance = MockAttendanceStore::new();
        let controller = EventRsvpController::new(
            session,
            MockEventStore::new().with_event(event("e1")),
            attendance.clone(),
        );

        let loaded = controller.load(EventId::new("e1")).await.unwrap();
        assert_eq!(loaded.event.id, EventId::new("e1"));
        assert_eq!(loaded.attendance, None);
        assert_eq!(controller.view().await.control(), RsvpControl::Join);

        controller.join().await.unwrap();
        assert_eq!(controller.view().await.control(), RsvpControl::Going);
        assert_eq!(attendance.count_for(user, &EventId::new("e1")), 1);
    }

    #[tokio::test]
    async fn test_retry_without_load() {
        let (session, _) = signed_in().await;
        let controller =
            EventRsvpController::new(session, MockEventStore::new(), MockAttendanceStore::new());
        assert_eq!(controller.retry().await, Err(RsvpError::NothingRequested));
    }

    #[tokio::test]
    async fn test_closed_view_rejects_actions() {
        let (session, _) = signed_in().await;
        let controller =
            EventRsvpController::new(session, MockEventStore::new(), MockAttendanceStore::new());
        controller.shutdown().await.unwrap();
        assert_eq!(controller.join().await, Err(RsvpError::Closed));
    }
}
