//! Mock collaborators for testing.
//!
//! In-memory implementations of the provider traits with failure injection,
//! call counting and hold/release latches for ordering tests.
//!
//! # Usage
//!
//! ```ignore
//! use attend_rsvp::mocks::{MockAttendanceStore, MockAuthTransport, MockEventStore};
//!
//! let auth = MockAuthTransport::new().with_user("ada@example.com", "hunter22");
//! let events = MockEventStore::new().with_event(event);
//! let attendance = MockAttendanceStore::new();
//! ```

pub mod attendance;
pub mod auth;
pub mod events;

pub use attendance::MockAttendanceStore;
pub use auth::MockAuthTransport;
pub use events::MockEventStore;

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Keyed latches that park a mock call until the test releases it.
#[derive(Debug)]
pub struct Holds<K> {
    latches: Arc<Mutex<HashMap<K, Arc<Notify>>>>,
}

impl<K> Clone for Holds<K> {
    fn clone(&self) -> Self {
        Self {
            latches: Arc::clone(&self.latches),
        }
    }
}

impl<K: Eq + Hash> Default for Holds<K> {
    fn default() -> Self {
        Self {
            latches: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K: Eq + Hash + Clone> Holds<K> {
    /// Park the next call for `key` until the returned [`Release`] fires.
    #[must_use]
    pub fn hold(&self, key: K) -> Release {
        let notify = Arc::new(Notify::new());
        if let Ok(mut latches) = self.latches.lock() {
            latches.insert(key, Arc::clone(&notify));
        }
        Release(notify)
    }

    /// Wait here if `key` is held; returns immediately otherwise.
    pub async fn pass(&self, key: &K) {
        let latch = self
            .latches
            .lock()
            .ok()
            .and_then(|mut latches| latches.remove(key));

        if let Some(notify) = latch {
            notify.notified().await;
        }
    }
}

/// Releases one held call.
#[derive(Debug)]
pub struct Release(Arc<Notify>);

impl Release {
    /// Let the held call proceed.
    pub fn release(self) {
        // Stores a permit if the call has not parked yet
        self.0.notify_one();
    }
}

/// Countdown of injected failures.
#[derive(Debug, Clone, Default)]
pub struct FailureBudget(Arc<AtomicUsize>);

impl FailureBudget {
    /// Fail the next `n` calls.
    pub fn set(&self, n: usize) {
        self.0.store(n, Ordering::SeqCst);
    }

    /// Consume one failure if any remain.
    #[must_use]
    pub fn take(&self) -> bool {
        self.0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}
