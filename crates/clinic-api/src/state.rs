//! Dispatch state machine
//!
//! Pure state machine: receives events, returns (new_state, action). The
//! dispatcher executes the I/O implied by each action and feeds the outcome
//! back as the next event.
//!
//! ```text
//! Initial ──Begin──▶ Sent ──401 (credentialed)──▶ Refreshing ──token──▶ Retried
//!                     │                               │                   │
//!                     ├─2xx──▶ Succeeded              └─no token──▶ Failed
//!                     └─other──▶ Failed               Retried ─2xx──▶ Succeeded
//!                                                     Retried ─any other──▶ Failed
//! ```
//!
//! `Refreshing` is only reachable from `Sent`, and `Retried` only from
//! `Refreshing`, so a request is sent at most twice and refreshed at most once.

use common::Secret;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Initial,
    /// First attempt is in flight. `credentialed` records whether it carried a token.
    Sent { credentialed: bool },
    /// The first attempt got a 401 and the refresh protocol is running.
    Refreshing,
    /// The replay after a successful refresh is in flight.
    Retried,
    Succeeded,
    Failed,
}

impl DispatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DispatchState::Succeeded | DispatchState::Failed)
    }
}

#[derive(Debug)]
pub enum DispatchEvent {
    /// Start of dispatch with the access token read from the store.
    Begin { access: Option<Secret<String>> },
    /// The remote answered.
    Responded { status: u16 },
    /// Refresh protocol finished. `access` is the token re-read from the store,
    /// `None` when the refresh failed or the store is empty afterwards.
    RefreshFinished { access: Option<Secret<String>> },
    /// No response at all.
    TransportFailed,
}

/// Actions the dispatcher executes after a transition
#[derive(Debug)]
pub enum DispatchAction {
    /// Send the descriptor, attaching `access` as bearer when present.
    Send { access: Option<Secret<String>> },
    /// Run the refresh protocol.
    Refresh,
    /// Decode the 2xx response body.
    ReadPayload,
    /// Normalize the non-2xx response.
    ReadFailure,
    /// 401 without a token: fail as no-credential, nothing else.
    RejectUnauthenticated,
    /// Clear credentials, signal the UI, fail as authentication-expired.
    ExpireSession,
    /// Surface the transport failure.
    Abort,
    /// Invalid transition; state unchanged.
    None,
}

const UNAUTHORIZED: u16 = 401;

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Handle a state transition. Pure function: no I/O.
pub fn handle_event(state: DispatchState, event: DispatchEvent) -> (DispatchState, DispatchAction) {
    match (state, event) {
        // --- Initial ---
        (DispatchState::Initial, DispatchEvent::Begin { access }) => (
            DispatchState::Sent {
                credentialed: access.is_some(),
            },
            DispatchAction::Send { access },
        ),

        // --- Sent ---
        (DispatchState::Sent { credentialed: true }, DispatchEvent::Responded { status })
            if status == UNAUTHORIZED =>
        {
            (DispatchState::Refreshing, DispatchAction::Refresh)
        }

        (DispatchState::Sent { credentialed: false }, DispatchEvent::Responded { status })
            if status == UNAUTHORIZED =>
        {
            (DispatchState::Failed, DispatchAction::RejectUnauthenticated)
        }

        // --- Refreshing ---
        (
            DispatchState::Refreshing,
            DispatchEvent::RefreshFinished {
                access: Some(access),
            },
        ) => (
            DispatchState::Retried,
            DispatchAction::Send {
                access: Some(access),
            },
        ),

        (DispatchState::Refreshing, DispatchEvent::RefreshFinished { access: None }) => {
            (DispatchState::Failed, DispatchAction::ExpireSession)
        }

        // --- Retried ---
        (DispatchState::Retried, DispatchEvent::Responded { status }) if status == UNAUTHORIZED => {
            (DispatchState::Failed, DispatchAction::ExpireSession)
        }

        // --- Sent or Retried, settled by the response status ---
        (DispatchState::Sent { .. } | DispatchState::Retried, DispatchEvent::Responded { status })
            if is_success(status) =>
        {
            (DispatchState::Succeeded, DispatchAction::ReadPayload)
        }

        (DispatchState::Sent { .. } | DispatchState::Retried, DispatchEvent::Responded { .. }) => {
            (DispatchState::Failed, DispatchAction::ReadFailure)
        }

        (DispatchState::Sent { .. } | DispatchState::Retried, DispatchEvent::TransportFailed) => {
            (DispatchState::Failed, DispatchAction::Abort)
        }

        // --- Invalid/unhandled transition: stay in current state ---
        (state, _event) => (state, DispatchAction::None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(value: &str) -> Option<Secret<String>> {
        Some(Secret::from(value))
    }

    fn sent(credentialed: bool) -> DispatchState {
        DispatchState::Sent { credentialed }
    }

    #[test]
    fn begin_with_token_sends_credentialed() {
        let (state, action) = handle_event(
            DispatchState::Initial,
            DispatchEvent::Begin {
                access: token("at"),
            },
        );
        assert_eq!(state, sent(true));
        assert!(matches!(action, DispatchAction::Send { access: Some(_) }));
    }

    #[test]
    fn begin_without_token_sends_anonymous() {
        let (state, action) =
            handle_event(DispatchState::Initial, DispatchEvent::Begin { access: None });
        assert_eq!(state, sent(false));
        assert!(matches!(action, DispatchAction::Send { access: None }));
    }

    #[test]
    fn success_on_first_attempt() {
        let (state, action) = handle_event(sent(true), DispatchEvent::Responded { status: 204 });
        assert_eq!(state, DispatchState::Succeeded);
        assert!(matches!(action, DispatchAction::ReadPayload));
    }

    #[test]
    fn unauthorized_with_token_refreshes() {
        let (state, action) = handle_event(sent(true), DispatchEvent::Responded { status: 401 });
        assert_eq!(state, DispatchState::Refreshing);
        assert!(matches!(action, DispatchAction::Refresh));
    }

    #[test]
    fn unauthorized_without_token_rejects() {
        let (state, action) = handle_event(sent(false), DispatchEvent::Responded { status: 401 });
        assert_eq!(state, DispatchState::Failed);
        assert!(matches!(action, DispatchAction::RejectUnauthenticated));
    }

    #[test]
    fn refresh_success_replays_with_new_token() {
        let (state, action) = handle_event(
            DispatchState::Refreshing,
            DispatchEvent::RefreshFinished {
                access: token("at_new"),
            },
        );
        assert_eq!(state, DispatchState::Retried);
        match action {
            DispatchAction::Send {
                access: Some(access),
            } => assert_eq!(access.expose(), "at_new"),
            other => panic!("expected Send with token, got {other:?}"),
        }
    }

    #[test]
    fn refresh_failure_expires_session() {
        let (state, action) = handle_event(
            DispatchState::Refreshing,
            DispatchEvent::RefreshFinished { access: None },
        );
        assert_eq!(state, DispatchState::Failed);
        assert!(matches!(action, DispatchAction::ExpireSession));
    }

    #[test]
    fn second_unauthorized_expires_session_instead_of_refreshing() {
        let (state, action) =
            handle_event(DispatchState::Retried, DispatchEvent::Responded { status: 401 });
        assert_eq!(state, DispatchState::Failed);
        assert!(matches!(action, DispatchAction::ExpireSession));
    }

    #[test]
    fn non_success_statuses_are_normalized() {
        for status in [400, 403, 404, 500, 503] {
            let (state, action) = handle_event(sent(true), DispatchEvent::Responded { status });
            assert_eq!(state, DispatchState::Failed, "status {status}");
            assert!(matches!(action, DispatchAction::ReadFailure));

            let (state, action) =
                handle_event(DispatchState::Retried, DispatchEvent::Responded { status });
            assert_eq!(state, DispatchState::Failed, "retried status {status}");
            assert!(matches!(action, DispatchAction::ReadFailure));
        }
    }

    #[test]
    fn transport_failure_aborts() {
        let (state, action) = handle_event(DispatchState::Retried, DispatchEvent::TransportFailed);
        assert_eq!(state, DispatchState::Failed);
        assert!(matches!(action, DispatchAction::Abort));
    }

    #[test]
    fn terminal_states_ignore_events() {
        for terminal in [DispatchState::Succeeded, DispatchState::Failed] {
            let (state, action) =
                handle_event(terminal, DispatchEvent::Responded { status: 401 });
            assert_eq!(state, terminal);
            assert!(matches!(action, DispatchAction::None));
        }
    }

    /// Drive the machine with a server that always answers 401 and a refresh
    /// that always succeeds: it must send exactly twice and refresh once.
    #[test]
    fn at_most_one_retry_against_persistent_unauthorized() {
        let mut state = DispatchState::Initial;
        let mut event = DispatchEvent::Begin {
            access: token("at"),
        };
        let (mut sends, mut refreshes) = (0, 0);

        while !state.is_terminal() {
            let (next, action) = handle_event(state, event);
            state = next;
            event = match action {
                DispatchAction::Send { .. } => {
                    sends += 1;
                    DispatchEvent::Responded { status: 401 }
                }
                DispatchAction::Refresh => {
                    refreshes += 1;
                    DispatchEvent::RefreshFinished {
                        access: token("at_next"),
                    }
                }
                DispatchAction::ExpireSession => break,
                other => panic!("unexpected action {other:?}"),
            };
        }

        assert_eq!(state, DispatchState::Failed);
        assert_eq!(sends, 2);
        assert_eq!(refreshes, 1);
    }
}
