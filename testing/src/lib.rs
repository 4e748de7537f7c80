//! # Attend Testing
//!
//! Testing utilities and helpers for reducers and stores.
//!
//! This crate provides:
//! - [`ReducerTest`], a Given-When-Then harness for reducers
//! - Effect assertions and an effect resolver for driving I/O results by hand
//! - Deterministic clocks
//!
//! ## Example
//!
//! ```ignore
//! use attend_testing::{ReducerTest, assertions};
//!
//! ReducerTest::new(SessionReducer::new())
//!     .with_env(env)
//!     .given_state(SessionState::default())
//!     .when_action(SessionAction::SessionChanged { change })
//!     .then_state(|state| assert!(state.is_ready()))
//!     .then_effects(assertions::assert_no_effects)
//!     .run();
//! ```

use chrono::{DateTime, Utc};
use attend_core::environment::Clock;


pub use reducer_test::{ReducerTest, assertions};

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Arc, Mutex};

    /// Fixed clock for deterministic tests
    ///
    /// Returns the same time until advanced explicitly.
    ///
    /// # Example
    ///
    /// ```
    /// use attend_testing::mocks::FixedClock;
    /// use attend_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2);
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Move the clock forward
        pub fn advance(&self, by: chrono::Duration) {
            if let Ok(mut time) = self.time.lock() {
                *time += by;
            }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
                .lock()
                .map_or_else(|poisoned| *poisoned.into_inner(), |time| *time)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded timestamp fails to parse, which never happens.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Helpers for executing effect descriptions without a Store
pub mod helpers {
    use attend_core::effect::Effect;
    use std::future::Future;
    use std::pin::Pin;

    /// Execute effects in order and collect the actions they produce.
    ///
    /// Futures are awaited one by one, parallel groups are flattened and delays
    /// resolve immediately. This lets a test feed I/O results back into a reducer
    /// step by step.
    pub fn resolve_effects<A: Send + 'static>(
        effects: impl IntoIterator<Item = Effect<A>>,
    ) -> Pin<Box<dyn Future<Output = Vec<A>> + Send>> {
        let effects: Vec<Effect<A>> = effects.into_iter().collect();
        Box::pin(async move {
            let mut actions = Vec::new();
            for effect in effects {
                match effect {
                    Effect::None => {},
                    Effect::Future(fut) => actions.extend(fut.await),
                    Effect::Delay { action, .. } => actions.push(*action),
                    Effect::Parallel(inner) => actions.extend(resolve_effects(inner).await),
                }
            }
            actions
        })
    }
}

// Re-export commonly used items
pub use helpers::resolve_effects;
pub use mocks::{FixedClock, test_clock};
