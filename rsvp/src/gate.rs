//! Routing guard driven by the session store.
//!
//! The gate never commits to a branch while the session is unresolved, and
//! re-evaluates after every session change so an external sign-out inside
//! gated content redirects promptly.

use crate::providers::AuthTransport;
use crate::session::{SessionState, SessionStore};
use tokio::sync::watch;

/// Route groups the gate knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Content that requires an authenticated user.
    Gated,
    /// The sign-in / sign-up flow.
    Entry,
}

/// Outcome of evaluating a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Session unresolved; show a neutral placeholder.
    Pending,
    /// Render the requested route.
    Render(Route),
    /// Navigate elsewhere.
    Redirect(Route),
}

impl GateDecision {
    /// Whether gated content may be shown.
    #[must_use]
    pub const fn allows_gated(self) -> bool {
        matches!(self, Self::Render(Route::Gated))
    }
}

/// Decide what to do with a request for `route`.
#[must_use]
pub fn decide(route: Route, session: &SessionState) -> GateDecision {
    if !session.is_ready() {
        return GateDecision::Pending;
    }

    match (route, session.is_authenticated()) {
        (Route::Gated, true) | (Route::Entry, false) => GateDecision::Render(route),
        (Route::Gated, false) => GateDecision::Redirect(Route::Entry),
        (Route::Entry, true) => GateDecision::Redirect(Route::Gated),
    }
}

/// Gate over a shared [`SessionStore`].
pub struct AttendanceGate<T>
where
    T: AuthTransport + Clone + 'static,
{
    session: SessionStore<T>,
}

impl<T> Clone for AttendanceGate<T>
where
    T: AuthTransport + Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
        }
    }
}

impl<T> AttendanceGate<T>
where
    T: AuthTransport + Clone + 'static,
{
    /// Create a gate reading from `session`.
    #[must_use]
    pub const fn new(session: SessionStore<T>) -> Self {
        Self { session }
    }

    /// Current decision for `route`.
    pub async fn decision(&self, route: Route) -> GateDecision {
        decide(route, &self.session.snapshot().await)
    }

    /// Follow decisions for `route` as the session changes.
    pub async fn watch(&self, route: Route) -> GateWatch<T> {
        let revisions = self.session.revisions();
        let current = self.decision(route).await;
        GateWatch {
            route,
            session: self.session.clone(),
            revisions,
            current,
        }
    }
}

/// Stream of gate decisions for one route.
pub struct GateWatch<T>
where
    T: AuthTransport + Clone + 'static,
{
    route: Route,
    session: SessionStore<T>,
    revisions: watch::Receiver<u64>,
    current: GateDecision,
}

impl<T> GateWatch<T>
where
    T: AuthTransport + Clone + 'static,
{
    /// The last observed decision.
    #[must_use]
    pub const fn current(&self) -> GateDecision {
        self.current
    }

    /// Wait for the decision to change.
    ///
    /// Returns `None` if the revision channel closes.
    pub async fn changed(&mut self) -> Option<GateDecision> {
        loop {
            self.revisions.changed().await.ok()?;
            let next = decide(self.route, &self.session.snapshot().await);
            if next != self.current {
                tracing::debug!(route = ?self.route, decision = ?next, "Gate decision changed");
                self.current = next;
                return Some(next);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mocks::MockAuthTransport;
    use crate::session::SessionPhase;
    use crate::types::{AuthChange, AuthChangeKind, UserId};
    use std::time::Duration;

    fn state(phase: SessionPhase) -> SessionState {
        SessionState {
            phase,
            ..SessionState::default()
        }
    }

    #[test]
    fn test_decision_table() {
        let auth = MockAuthTransport::new();
        let signed_in = state(SessionPhase::Ready(Some(
            auth.session_for(UserId(uuid::Uuid::new_v4())),
        )));
        let signed_out = state(SessionPhase::Ready(None));
        let unresolved = state(SessionPhase::Uninitialized);

        assert_eq!(decide(Route::Gated, &unresolved), GateDecision::Pending);
        assert_eq!(decide(Route::Entry, &unresolved), GateDecision::Pending);
        assert_eq!(decide(Route::Gated, &signed_in), GateDecision::Render(Route::Gated));
        assert_eq!(decide(Route::Gated, &signed_out), GateDecision::Redirect(Route::Entry));
        assert_eq!(decide(Route::Entry, &signed_in), GateDecision::Redirect(Route::Gated));
        assert_eq!(decide(Route::Entry, &signed_out), GateDecision::Render(Route::Entry));
    }

    #[tokio::test]
    async fn test_watch_redirects_on_external_sign_out() {
        let auth = MockAuthTransport::new().with_user("ada@example.com", "hunter22");
        auth.sign_in("ada@example.com", "hunter22").await.unwrap();

        let session = SessionStore::new(auth.clone());
        let gate = AttendanceGate::new(session.clone());
        let mut watch = gate.watch(Route::Gated).await;
        assert_eq!(watch.current(), GateDecision::Pending);

        session.start().await.unwrap();
        let decision = tokio::time::timeout(Duration::from_secs(1), watch.changed())
            .await
            .unwrap();
        assert_eq!(decision, Some(GateDecision::Render(Route::Gated)));

        auth.emit(AuthChange::new(AuthChangeKind::SignedOut, None));
        let decision = tokio::time::timeout(Duration::from_secs(1), watch.changed())
            .await
            .unwrap();
        assert_eq!(decision, Some(GateDecision::Redirect(Route::Entry)));
    }
}
