//! Attendance reducer.

use super::{AttendanceAction, AttendancePhase, AttendanceState, LoadStatus};
use crate::environment::AttendanceEnvironment;
use crate::error::{BackendError, RsvpError};
use crate::providers::{AttendanceStore, EventStore};
use crate::types::{AttendanceRecord, EventId, UserId};
use attend_core::{SmallVec, effect::Effect, reducer::Reducer, smallvec};
use std::marker::PhantomData;

/// Attendance reducer.
///
/// # Type Parameters
///
/// - `V`: Event store
/// - `A`: Attendance store
#[derive(Debug)]
pub struct AttendanceReducer<V, A> {
    _stores: PhantomData<(V, A)>,
}

impl<V, A> AttendanceReducer<V, A> {
    /// Create an attendance reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _stores: PhantomData,
        }
    }
}

impl<V, A> Default for AttendanceReducer<V, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, A> Clone for AttendanceReducer<V, A> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<V, A> AttendanceReducer<V, A>
where
    V: EventStore + Clone + 'static,
    A: AttendanceStore + Clone + 'static,
{
    fn begin_load(
        state: &mut AttendanceState,
        event_id: EventId,
        user_id: Option<UserId>,
        env: &AttendanceEnvironment<V, A>,
    ) -> Effect<AttendanceAction> {
        state.generation += 1;
        state.user_id = user_id;
        state.load = LoadStatus::Loading;
        state.settled_joins.clear();
        state.phase = match user_id {
            Some(user) if state.pending_joins.contains(&(user, event_id.clone())) => {
                AttendancePhase::OptimisticJoined
            },
            _ => AttendancePhase::Unknown,
        };
        state.requested = Some(event_id.clone());

        let generation = state.generation;
        let events = env.events.clone();
        let attendance = env.attendance.clone();

        tracing::debug!(%event_id, generation, "Loading event");

        Effect::future(async move {
            let (event, record) = tokio::join!(events.get_event(&event_id), async {
                match user_id {
                    Some(user) => attendance.get_attendance(user, &event_id).await,
                    None => Ok(None),
                }
            });

            Some(match (event, record) {
                (Ok(event), Ok(attendance)) => AttendanceAction::Loaded {
                    generation,
                    event,
                    attendance,
                },
                (Err(error), _) | (Ok(_), Err(error)) => AttendanceAction::LoadFailed {
                    generation,
                    error: RsvpError::from_fetch(error, &event_id),
                },
            })
        })
    }

    fn begin_join(
        user: UserId,
        event_id: EventId,
        env: &AttendanceEnvironment<V, A>,
    ) -> Effect<AttendanceAction> {
        let attendance = env.attendance.clone();

        Effect::future(async move {
            let outcome = join_once(&attendance, user, &event_id).await;
            Some(match outcome {
                Ok(record) => AttendanceAction::JoinConfirmed {
                    user_id: user,
                    event_id,
                    record,
                },
                Err(error) => AttendanceAction::JoinFailed {
                    user_id: user,
                    event_id,
                    error: RsvpError::from_mutation(&error),
                },
            })
        })
    }
}

/// Check before insert; a uniqueness failure means someone else won the race.
async fn join_once<A: AttendanceStore>(
    attendance: &A,
    user: UserId,
    event_id: &EventId,
) -> Result<AttendanceRecord, BackendError> {
    if let Some(existing) = attendance.get_attendance(user, event_id).await? {
        tracing::debug!(%event_id, "Attendance already recorded");
        return Ok(existing);
    }

    match attendance.create_attendance(user, event_id).await {
        Err(BackendError::Duplicate) => {
            tracing::debug!(%event_id, "Insert hit uniqueness constraint, treating as joined");
            metrics::counter!("rsvp.join.duplicate").increment(1);
            Ok(attendance
                .get_attendance(user, event_id)
                .await
                .ok()
                .flatten()
                .unwrap_or_else(|| AttendanceRecord {
                    user_id: user,
                    event_id: event_id.clone(),
                    created_at: None,
                }))
        },
        other => other,
    }
}

impl<V, A> Reducer for AttendanceReducer<V, A>
where
    V: EventStore + Clone + 'static,
    A: AttendanceStore + Clone + 'static,
{
    type State = AttendanceState;
    type Action = AttendanceAction;
    type Environment = AttendanceEnvironment<V, A>;

    #[allow(clippy::too_many_lines)] // One arm per action
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            AttendanceAction::Load { event_id, user_id } => {
                smallvec![Self::begin_load(state, event_id, user_id, env)]
            },

            AttendanceAction::Retry => {
                let Some(event_id) = state.requested.clone() else {
                    return smallvec![Effect::None];
                };
                if !state.can_retry() {
                    tracing::debug!(%event_id, "Retry not offered");
                    return smallvec![Effect::None];
                }

                let user_id = state.user_id;
                smallvec![Self::begin_load(state, event_id, user_id, env)]
            },

            AttendanceAction::Loaded {
                generation,
                event,
                attendance,
            } => {
                if generation != state.generation {
                    tracing::debug!(event_id = %event.id, generation, "Dropping stale load result");
                    metrics::counter!("rsvp.load.stale").increment(1);
                    return smallvec![Effect::None];
                }

                let key = state.user_id.map(|user| (user, event.id.clone()));
                let settled = key.as_ref().and_then(|key| state.settled_joins.remove(key));
                let pending = key.as_ref().is_some_and(|key| state.pending_joins.contains(key));

                // An authoritative record wins over any optimistic flag; an
                // empty read loses to a join that resolved after it was issued
                state.phase = match (attendance, settled) {
                    (Some(record), _) | (None, Some(Ok(record))) => {
                        AttendancePhase::Confirmed(record)
                    },
                    (None, Some(Err(error))) => AttendancePhase::RolledBack(error),
                    (None, None) if pending => AttendancePhase::OptimisticJoined,
                    (None, None) if state.user_id.is_some() => AttendancePhase::NotJoined,
                    (None, None) => AttendancePhase::Unknown,
                };
                state.load = LoadStatus::Loaded(event);
                smallvec![Effect::None]
            },

            AttendanceAction::LoadFailed { generation, error } => {
                if generation != state.generation {
                    tracing::debug!(generation, "Dropping stale load failure");
                    return smallvec![Effect::None];
                }

                tracing::warn!(%error, "Event load failed");
                state.load = LoadStatus::Failed(error);
                smallvec![Effect::None]
            },

            AttendanceAction::Join { user_id } => {
                let Some(user) = user_id else {
                    tracing::warn!("Join ignored, not signed in");
                    return smallvec![Effect::None];
                };
                if state.user_id != Some(user) {
                    tracing::info!("Join ignored, session changed since the view was loaded");
                    return smallvec![Effect::None];
                }
                let Some(event_id) = state.event().map(|event| event.id.clone()) else {
                    tracing::debug!("Join ignored, no event loaded");
                    return smallvec![Effect::None];
                };
                let key = (user, event_id.clone());
                if state.pending_joins.contains(&key)
                    || matches!(state.phase, AttendancePhase::Confirmed(_))
                {
                    tracing::debug!(%event_id, "Join ignored, already joined or in flight");
                    metrics::counter!("rsvp.join.deduplicated").increment(1);
                    return smallvec![Effect::None];
                }

                metrics::counter!("rsvp.join.attempted").increment(1);
                state.pending_joins.insert(key);
                state.phase = AttendancePhase::OptimisticJoined;

                smallvec![Self::begin_join(user, event_id, env)]
            },

            AttendanceAction::JoinConfirmed {
                user_id,
                event_id,
                record,
            } => {
                let key = (user_id, event_id);
                state.pending_joins.remove(&key);
                metrics::counter!("rsvp.join.confirmed").increment(1);

                if !state.is_showing(&key) {
                    return smallvec![Effect::None];
                }

                tracing::info!(event_id = %key.1, "Attendance confirmed");
                if state.is_loading() {
                    state.settled_joins.insert(key, Ok(record.clone()));
                }
                state.phase = AttendancePhase::Confirmed(record);
                smallvec![Effect::None]
            },

            AttendanceAction::JoinFailed {
                user_id,
                event_id,
                error,
            } => {
                let key = (user_id, event_id);
                state.pending_joins.remove(&key);
                metrics::counter!("rsvp.join.failed").increment(1);

                if !state.is_showing(&key) || state.phase != AttendancePhase::OptimisticJoined {
                    return smallvec![Effect::None];
                }

                tracing::warn!(event_id = %key.1, %error, "Join failed, rolling back");
                if state.is_loading() {
                    state.settled_joins.insert(key, Err(error.clone()));
                }
                state.phase = AttendancePhase::RolledBack(error);
                smallvec![Effect::None]
            },
        }
    }
}
