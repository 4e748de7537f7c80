//! Property tests for session readiness and gate decisions.
//!
//! Arbitrary interleavings of initial-fetch outcomes and change notifications
//! are fed straight through the session reducer.

#![allow(clippy::unwrap_used)]

use attend_core::reducer::Reducer;
use attend_rsvp::environment::SessionEnvironment;
use attend_rsvp::mocks::MockAuthTransport;
use attend_rsvp::session::{SessionAction, SessionReducer};
use attend_rsvp::{
    AuthChange, AuthChangeKind, GateDecision, Route, Session, SessionState, User, UserId, decide,
};
use proptest::prelude::*;

fn session(n: u8) -> Session {
    Session {
        access_token: format!("token-{n}"),
        refresh_token: None,
        expires_at: None,
        user: Some(User {
            id: UserId(uuid::Uuid::from_u128(u128::from(n) + 1)),
            email: None,
        }),
    }
}

fn action() -> impl Strategy<Value = SessionAction> {
    prop_oneof![
        Just(SessionAction::Start),
        proptest::option::of(any::<u8>()).prop_map(|n| SessionAction::InitialSessionResolved {
            session: n.map(session),
        }),
        Just(SessionAction::InitialSessionFailed {
            error: "offline".to_string(),
        }),
        any::<u8>().prop_map(|n| SessionAction::SessionChanged {
            change: AuthChange::new(AuthChangeKind::SignedIn, Some(session(n))),
        }),
        any::<u8>().prop_map(|n| SessionAction::SessionChanged {
            change: AuthChange::new(AuthChangeKind::TokenRefreshed, Some(session(n))),
        }),
        Just(SessionAction::SessionChanged {
            change: AuthChange::new(AuthChangeKind::SignedOut, None),
        }),
        Just(SessionAction::SessionChanged {
            change: AuthChange::new(AuthChangeKind::Expired, None),
        }),
        Just(SessionAction::SignOut),
    ]
}

proptest! {
    #[test]
    fn readiness_never_reverts(actions in proptest::collection::vec(action(), 0..40)) {
        let reducer = SessionReducer::<MockAuthTransport>::new();
        let env = SessionEnvironment::new(MockAuthTransport::new());
        let mut state = SessionState::default();
        let mut was_ready = false;

        for action in actions {
            let _ = reducer.reduce(&mut state, action, &env);
            prop_assert!(!was_ready || state.is_ready());
            was_ready = state.is_ready();
        }
    }

    #[test]
    fn gate_waits_for_readiness(actions in proptest::collection::vec(action(), 0..40)) {
        let reducer = SessionReducer::<MockAuthTransport>::new();
        let env = SessionEnvironment::new(MockAuthTransport::new());
        let mut state = SessionState::default();

        for action in actions {
            let _ = reducer.reduce(&mut state, action, &env);

            let gated = decide(Route::Gated, &state);
            let entry = decide(Route::Entry, &state);
            if state.is_ready() {
                prop_assert_ne!(gated, GateDecision::Pending);
                prop_assert_eq!(gated.allows_gated(), state.is_authenticated());
                prop_assert_eq!(
                    entry,
                    if state.is_authenticated() {
                        GateDecision::Redirect(Route::Gated)
                    } else {
                        GateDecision::Render(Route::Entry)
                    }
                );
            } else {
                prop_assert_eq!(gated, GateDecision::Pending);
                prop_assert_eq!(entry, GateDecision::Pending);
            }
        }
    }

    #[test]
    fn latest_notification_wins(
        actions in proptest::collection::vec(action(), 1..40),
        last in any::<u8>(),
    ) {
        let reducer = SessionReducer::<MockAuthTransport>::new();
        let env = SessionEnvironment::new(MockAuthTransport::new());
        let mut state = SessionState::default();

        for action in actions {
            let _ = reducer.reduce(&mut state, action, &env);
        }
        let _ = reducer.reduce(
            &mut state,
            SessionAction::SessionChanged {
                change: AuthChange::new(AuthChangeKind::SignedIn, Some(session(last))),
            },
            &env,
        );
        // A late initial fetch must not undo the notification
        let _ = reducer.reduce(
            &mut state,
            SessionAction::InitialSessionResolved { session: None },
            &env,
        );

        prop_assert_eq!(state.current_session().cloned(), Some(session(last)));
    }
}
