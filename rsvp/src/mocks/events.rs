//! Mock event store.

use super::{FailureBudget, Holds, Release};
use crate::error::BackendError;
use crate::providers::EventStore;
use crate::types::{Event, EventId};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Mock event store.
///
/// Events are kept in insertion order and listed by start time.
#[derive(Debug, Clone)]
pub struct MockEventStore {
    events: Arc<Mutex<Vec<Event>>>,
    failures: FailureBudget,
    holds: Holds<EventId>,
    fetches: Arc<AtomicUsize>,
}

impl MockEventStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            failures: FailureBudget::default(),
            holds: Holds::default(),
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Add an event.
    #[must_use]
    pub fn with_event(self, event: Event) -> Self {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
        self
    }

    /// Fail the next `n` fetches (list or get) with a transport error.
    pub fn fail_next_fetches(&self, n: usize) {
        self.failures.set(n);
    }

    /// Park the next `get_event(id)` until released.
    #[must_use]
    pub fn hold(&self, id: &EventId) -> Release {
        self.holds.hold(id.clone())
    }

    /// Number of fetches served so far.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl Default for MockEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EventStore for MockEventStore {
    fn list_events(&self) -> impl Future<Output = Result<Vec<Event>, BackendError>> + Send {
        let this = self.clone();

        async move {
            this.fetches.fetch_add(1, Ordering::SeqCst);
            if this.failures.take() {
                return Err(BackendError::Transport("injected failure".to_string()));
            }

            let mut events = this
                .events
                .lock()
                .map_err(|_| BackendError::Transport("Mutex lock failed".to_string()))?
                .clone();
            events.sort_by_key(|event| event.starts_at);
            Ok(events)
        }
    }

    fn get_event(&self, id: &EventId) -> impl Future<Output = Result<Event, BackendError>> + Send {
        let this = self.clone();
        let id = id.clone();

        async move {
            this.holds.pass(&id).await;

            this.fetches.fetch_add(1, Ordering::SeqCst);
            if this.failures.take() {
                return Err(BackendError::Transport("injected failure".to_string()));
            }

            this.events
                .lock()
                .map_err(|_| BackendError::Transport("Mutex lock failed".to_string()))?
                .iter()
                .find(|event| event.id == id)
                .cloned()
                .ok_or(BackendError::NotFound)
        }
    }
}
