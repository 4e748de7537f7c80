//! Mock attendance store.

use super::{FailureBudget, Holds, Release};
use crate::error::BackendError;
use crate::providers::AttendanceStore;
use crate::types::{AttendanceRecord, EventId, UserId};
use attend_core::environment::{Clock, SystemClock};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Mock attendance store.
///
/// Does NOT enforce uniqueness unless asked to, so tests can observe whether
/// callers guard against duplicates themselves.
#[derive(Clone)]
pub struct MockAttendanceStore {
    records: Arc<Mutex<Vec<AttendanceRecord>>>,
    enforce_unique: bool,
    create_failures: FailureBudget,
    read_failures: FailureBudget,
    create_holds: Holds<EventId>,
    creates: Arc<AtomicUsize>,
    reads: Arc<AtomicUsize>,
    clock: Arc<dyn Clock>,
}

impl MockAttendanceStore {
    /// Create an empty store using the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            enforce_unique: false,
            create_failures: FailureBudget::default(),
            read_failures: FailureBudget::default(),
            create_holds: Holds::default(),
            creates: Arc::new(AtomicUsize::new(0)),
            reads: Arc::new(AtomicUsize::new(0)),
            clock: Arc::new(SystemClock),
        }
    }

    /// Stamp records with the given clock.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Seed an existing record.
    #[must_use]
    pub fn with_record(self, user: UserId, event: &EventId) -> Self {
        let record = AttendanceRecord {
            user_id: user,
            event_id: event.clone(),
            created_at: Some(self.clock.now()),
        };
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
        self
    }

    /// Reject inserts for an existing pair with [`BackendError::Duplicate`].
    #[must_use]
    pub const fn enforcing_uniqueness(mut self) -> Self {
        self.enforce_unique = true;
        self
    }

    /// Fail the next `n` inserts with a transport error.
    pub fn fail_next_creates(&self, n: usize) {
        self.create_failures.set(n);
    }

    /// Fail the next `n` reads with a transport error.
    pub fn fail_next_reads(&self, n: usize) {
        self.read_failures.set(n);
    }

    /// Park the next insert for `event` until released.
    #[must_use]
    pub fn hold_create(&self, event: &EventId) -> Release {
        self.create_holds.hold(event.clone())
    }

    /// Number of records stored for the pair.
    #[must_use]
    pub fn count_for(&self, user: UserId, event: &EventId) -> usize {
        self.records.lock().map_or(0, |records| {
            records.iter().filter(|r| r.matches(user, event)).count()
        })
    }

    /// Number of insert calls received, including failed ones.
    #[must_use]
    pub fn create_calls(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    /// Number of lookups received, including failed ones.
    #[must_use]
    pub fn read_calls(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl Default for MockAttendanceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockAttendanceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockAttendanceStore")
            .field("records", &self.records)
            .field("enforce_unique", &self.enforce_unique)
            .finish_non_exhaustive()
    }
}

impl AttendanceStore for MockAttendanceStore {
    fn get_attendance(
        &self,
        user: UserId,
        event: &EventId,
    ) -> impl Future<Output = Result<Option<AttendanceRecord>, BackendError>> + Send {
        let this = self.clone();
        let event = event.clone();

        async move {
            this.reads.fetch_add(1, Ordering::SeqCst);
            if this.read_failures.take() {
                return Err(BackendError::Transport("injected failure".to_string()));
            }

            Ok(this
                .records
                .lock()
                .map_err(|_| BackendError::Transport("Mutex lock failed".to_string()))?
                .iter()
                .find(|r| r.matches(user, &event))
                .cloned())
        }
    }

    fn create_attendance(
        &self,
        user: UserId,
        event: &EventId,
    ) -> impl Future<Output = Result<AttendanceRecord, BackendError>> + Send {
        let this = self.clone();
        let event = event.clone();

        async move {
            this.creates.fetch_add(1, Ordering::SeqCst);
            this.create_holds.pass(&event).await;

            if this.create_failures.take() {
                return Err(BackendError::Transport("injected failure".to_string()));
            }

            let mut records = this
                .records
                .lock()
                .map_err(|_| BackendError::Transport("Mutex lock failed".to_string()))?;

            if this.enforce_unique && records.iter().any(|r| r.matches(user, &event)) {
                return Err(BackendError::Duplicate);
            }

            let record = AttendanceRecord {
                user_id: user,
                event_id: event,
                created_at: Some(this.clock.now()),
            };
            records.push(record.clone());
            Ok(record)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn user() -> UserId {
        UserId(uuid::Uuid::new_v4())
    }

    #[tokio::test]
    async fn test_duplicates_accepted_by_default() {
        let store = MockAttendanceStore::new();
        let (user, event) = (user(), EventId::new("e1"));

        store.create_attendance(user, &event).await.unwrap();
        store.create_attendance(user, &event).await.unwrap();
        assert_eq!(store.count_for(user, &event), 2);
    }

    #[tokio::test]
    async fn test_enforced_uniqueness_reports_duplicate() {
        let store = MockAttendanceStore::new().enforcing_uniqueness();
        let (user, event) = (user(), EventId::new("e1"));

        store.create_attendance(user, &event).await.unwrap();
        assert_eq!(
            store.create_attendance(user, &event).await,
            Err(BackendError::Duplicate)
        );
        assert_eq!(store.count_for(user, &event), 1);
    }

    #[tokio::test]
    async fn test_injected_create_failure_is_counted() {
        let store = MockAttendanceStore::new();
        let (user, event) = (user(), EventId::new("e1"));
        store.fail_next_creates(1);

        assert!(store.create_attendance(user, &event).await.is_err());
        assert!(store.create_attendance(user, &event).await.is_ok());
        assert_eq!(store.create_calls(), 2);
        assert_eq!(store.count_for(user, &event), 1);
    }
}
