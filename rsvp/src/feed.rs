//! Event feed: every event, soonest first.

use crate::environment::FeedEnvironment;
use crate::error::RsvpError;
use crate::providers::EventStore;
use crate::types::Event;
use attend_core::{SmallVec, effect::Effect, reducer::Reducer, smallvec};
use attend_runtime::Store;
use std::marker::PhantomData;

/// Feed progress.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FeedStatus {
    /// Never refreshed.
    #[default]
    Idle,
    /// Refresh in flight.
    Loading,
    /// Events listed.
    Loaded,
    /// Last refresh failed; previously listed events are kept.
    Failed(RsvpError),
}

/// Feed state.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeedState {
    /// Progress.
    pub status: FeedStatus,
    /// Events ordered by start time ascending.
    pub events: Vec<Event>,
    /// Incremented per refresh.
    pub generation: u64,
}

/// Feed actions.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedAction {
    /// Reload the list.
    Refresh,
    /// List arrived.
    Listed {
        /// Refresh that produced this result
        generation: u64,
        /// Events in any order
        events: Vec<Event>,
    },
    /// Listing failed.
    ListFailed {
        /// Refresh that produced this result
        generation: u64,
        /// Translated failure
        error: RsvpError,
    },
}

/// Feed reducer.
#[derive(Debug)]
pub struct FeedReducer<V> {
    _store: PhantomData<V>,
}

impl<V> FeedReducer<V> {
    /// Create a feed reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _store: PhantomData,
        }
    }
}

impl<V> Default for FeedReducer<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for FeedReducer<V> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<V> Reducer for FeedReducer<V>
where
    V: EventStore + Clone + 'static,
{
    type State = FeedState;
    type Action = FeedAction;
    type Environment = FeedEnvironment<V>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            FeedAction::Refresh => {
                state.generation += 1;
                state.status = FeedStatus::Loading;
                let generation = state.generation;
                let events = env.events.clone();

                smallvec![Effect::future(async move {
                    Some(match events.list_events().await {
                        Ok(events) => FeedAction::Listed { generation, events },
                        Err(error) => FeedAction::ListFailed {
                            generation,
                            error: RsvpError::TransientFetch(error.to_string()),
                        },
                    })
                })]
            },

            FeedAction::Listed { generation, mut events } if generation == state.generation => {
                events.sort_by_key(|event| event.starts_at);
                state.events = events;
                state.status = FeedStatus::Loaded;
                smallvec![Effect::None]
            },

            FeedAction::ListFailed { generation, error } if generation == state.generation => {
                tracing::warn!(%error, "Event feed refresh failed");
                state.status = FeedStatus::Failed(error);
                smallvec![Effect::None]
            },

            FeedAction::Listed { .. } | FeedAction::ListFailed { .. } => {
                tracing::debug!("Dropping stale feed result");
                smallvec![Effect::None]
            },
        }
    }
}

/// Event feed façade.
pub struct EventFeed<V>
where
    V: EventStore + Clone + 'static,
{
    store: Store<FeedState, FeedAction, FeedEnvironment<V>, FeedReducer<V>>,
}

impl<V> EventFeed<V>
where
    V: EventStore + Clone + 'static,
{
    /// Create an empty feed.
    #[must_use]
    pub fn new(events: V) -> Self {
        Self {
            store: Store::new(
                FeedState::default(),
                FeedReducer::new(),
                FeedEnvironment::new(events),
            ),
        }
    }

    /// Reload the list and return it.
    ///
    /// # Errors
    ///
    /// - Transport failure → [`RsvpError::TransientFetch`]
    /// - Feed shut down → [`RsvpError::Closed`]
    pub async fn refresh(&self) -> Result<Vec<Event>, RsvpError> {
        let mut handle = self
            .store
            .send(FeedAction::Refresh)
            .await
            .map_err(|_| RsvpError::Closed)?;
        handle.wait().await;

        self.store
            .state(|s| match &s.status {
                FeedStatus::Failed(error) => Err(error.clone()),
                _ => Ok(s.events.clone()),
            })
            .await
    }

    /// Snapshot of the feed.
    pub async fn view(&self) -> FeedState {
        self.store.state(FeedState::clone).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mocks::MockEventStore;
    use crate::types::EventId;
    use attend_core::environment::Clock;
    use attend_testing::test_clock;

    fn event(id: &str, hours: i64) -> Event {
        Event {
            id: EventId::new(id),
            title: id.to_string(),
            starts_at: test_clock().now() + chrono::Duration::hours(hours),
            location: String::new(),
            description: String::new(),
            image: None,
            attendee_count: None,
        }
    }

    #[tokio::test]
    async fn test_refresh_orders_by_start() {
        let feed = EventFeed::new(
            MockEventStore::new()
                .with_event(event("late", 48))
                .with_event(event("soon", 1))
                .with_event(event("mid", 24)),
        );

        let ids: Vec<_> = feed
            .refresh()
            .await
            .unwrap()
            .into_iter()
            .map(|event| event.id.0)
            .collect();
        assert_eq!(ids, vec!["soon", "mid", "late"]);
        assert_eq!(feed.view().await.status, FeedStatus::Loaded);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_events() {
        let store = MockEventStore::new().with_event(event("e1", 1));
        let feed = EventFeed::new(store.clone());
        feed.refresh().await.unwrap();

        store.fail_next_fetches(1);
        let result = feed.refresh().await;
        assert!(matches!(result, Err(RsvpError::TransientFetch(_))));

        let view = feed.view().await;
        assert_eq!(view.events.len(), 1);
        assert!(matches!(view.status, FeedStatus::Failed(_)));

        assert_eq!(feed.refresh().await.unwrap().len(), 1);
    }
}
