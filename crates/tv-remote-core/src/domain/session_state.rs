//! Explicit state machine for the control-channel session.
//!
//! # Lifecycle
//!
//! ```text
//!                 ConnectRequested                HandshakeSucceeded
//! Disconnected ───────────────────► Connecting ───────────────────────► Connected
//!      ▲                                 │                                  │
//!      │        HandshakeFailed          │                                  │
//!      ├─────────────────────────────────┘                                  │
//!      │        ChannelLost / DisconnectRequested                           │
//!      └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The state is generic over the two handles the session juggles:
//!
//! - `P` – a cloneable, awaitable *pending* handshake.  Every caller that
//!   finds the session `Connecting` receives a clone of the same pending value
//!   and awaits it instead of opening a second transport (single-flight).
//! - `C` – a cloneable handle to the open channel.
//!
//! [`transition`] is a pure function: it consumes the current state and an
//! event and returns the next state plus the [`Effect`] the caller must carry
//! out.  The session use case owns the I/O; this module only decides.
//!
//! Every attempt is labelled with an [`AttemptId`].  Results for an attempt
//! other than the one currently recorded in the state are *stale* and never
//! change the state.

use tracing::trace;

use crate::domain::attempt::AttemptId;

/// Where the session currently is in its lifecycle.
#[derive(Debug, Clone)]
pub enum SessionState<P, C> {
    /// No transport.  Initial state, and the state after any failure.
    Disconnected,
    /// A handshake is in flight; `pending` resolves when it completes.
    Connecting { attempt: AttemptId, pending: P },
    /// The channel is open and ready for commands.
    Connected { attempt: AttemptId, channel: C },
}

impl<P, C> Default for SessionState<P, C> {
    fn default() -> Self {
        SessionState::Disconnected
    }
}

impl<P, C> SessionState<P, C> {
    /// Short label for logs and assertions.
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting { .. } => "connecting",
            SessionState::Connected { .. } => "connected",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, SessionState::Connected { .. })
    }

    pub fn is_connecting(&self) -> bool {
        matches!(self, SessionState::Connecting { .. })
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone)]
pub enum SessionEvent<P, C> {
    /// A caller needs a channel.  `attempt`/`pending` describe the handshake
    /// to start if none is running; they are dropped unused otherwise.
    ConnectRequested { attempt: AttemptId, pending: P },
    /// The handshake for `attempt` produced an open channel.
    HandshakeSucceeded { attempt: AttemptId, channel: C },
    /// The handshake for `attempt` failed.
    HandshakeFailed { attempt: AttemptId },
    /// A send on the channel opened by `attempt` failed.
    ChannelLost { attempt: AttemptId },
    /// The caller explicitly released the session.
    DisconnectRequested,
}

/// What the caller must do after a transition.
#[derive(Debug, Clone)]
pub enum Effect<P, C> {
    /// Nothing further.
    None,
    /// Await `pending` (which belongs to `attempt`) to obtain a channel.
    Await { attempt: AttemptId, pending: P },
    /// Use the already open channel.
    Use { attempt: AttemptId, channel: C },
    /// Tear this channel down.
    Close(C),
}

/// Computes the next state and the effect for `event`.
///
/// The function never performs I/O and never panics.
pub fn transition<P: Clone, C: Clone>(
    state: SessionState<P, C>,
    event: SessionEvent<P, C>,
) -> (SessionState<P, C>, Effect<P, C>) {
    use SessionEvent as E;
    use SessionState as S;

    match (state, event) {
        // ── Connection requests ──────────────────────────────────────────────
        (S::Disconnected, E::ConnectRequested { attempt, pending }) => (
            S::Connecting {
                attempt,
                pending: pending.clone(),
            },
            Effect::Await { attempt, pending },
        ),
        (S::Connecting { attempt, pending }, E::ConnectRequested { .. }) => (
            S::Connecting {
                attempt,
                pending: pending.clone(),
            },
            Effect::Await { attempt, pending },
        ),
        (S::Connected { attempt, channel }, E::ConnectRequested { .. }) => (
            S::Connected {
                attempt,
                channel: channel.clone(),
            },
            Effect::Use { attempt, channel },
        ),

        // ── Handshake results ────────────────────────────────────────────────
        (S::Connecting { attempt, pending }, E::HandshakeSucceeded { attempt: done, channel }) => {
            if attempt == done {
                (S::Connected { attempt, channel }, Effect::None)
            } else {
                trace!("attempt {done} finished after {attempt} started; closing its channel");
                (S::Connecting { attempt, pending }, Effect::Close(channel))
            }
        }
        (S::Connected { attempt, channel }, E::HandshakeSucceeded { attempt: done, channel: other }) => {
            // Joiners of the winning attempt report the same channel again.
            let effect = if attempt == done {
                Effect::None
            } else {
                Effect::Close(other)
            };
            (S::Connected { attempt, channel }, effect)
        }
        (S::Disconnected, E::HandshakeSucceeded { attempt, channel }) => {
            trace!("attempt {attempt} finished after disconnect; closing its channel");
            (S::Disconnected, Effect::Close(channel))
        }
        (S::Connecting { attempt, pending }, E::HandshakeFailed { attempt: done }) => {
            if attempt == done {
                (S::Disconnected, Effect::None)
            } else {
                (S::Connecting { attempt, pending }, Effect::None)
            }
        }
        (state, E::HandshakeFailed { .. }) => (state, Effect::None),

        // ── Channel loss and explicit disconnect ─────────────────────────────
        (S::Connected { attempt, channel }, E::ChannelLost { attempt: lost }) => {
            if attempt == lost {
                (S::Disconnected, Effect::Close(channel))
            } else {
                (S::Connected { attempt, channel }, Effect::None)
            }
        }
        (state, E::ChannelLost { .. }) => (state, Effect::None),
        (S::Connected { channel, .. }, E::DisconnectRequested) => {
            (S::Disconnected, Effect::Close(channel))
        }
        (_, E::DisconnectRequested) => (S::Disconnected, Effect::None),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // Strings stand in for the pending future and the channel handle.
    type State = SessionState<&'static str, &'static str>;
    type Event = SessionEvent<&'static str, &'static str>;

    fn request(id: u64, pending: &'static str) -> Event {
        SessionEvent::ConnectRequested {
            attempt: AttemptId(id),
            pending,
        }
    }

    fn connecting(id: u64, pending: &'static str) -> State {
        SessionState::Connecting {
            attempt: AttemptId(id),
            pending,
        }
    }

    fn connected(id: u64, channel: &'static str) -> State {
        SessionState::Connected {
            attempt: AttemptId(id),
            channel,
        }
    }

    #[test]
    fn test_default_state_is_disconnected() {
        let state: State = SessionState::default();
        assert_eq!(state.name(), "disconnected");
    }

    #[test]
    fn test_connect_request_from_disconnected_starts_attempt() {
        // Arrange / Act
        let (next, effect) = transition(SessionState::Disconnected, request(1, "p1"));

        // Assert
        assert!(matches!(next, SessionState::Connecting { attempt: AttemptId(1), pending: "p1" }));
        assert!(matches!(effect, Effect::Await { attempt: AttemptId(1), pending: "p1" }));
    }

    #[test]
    fn test_connect_request_while_connecting_joins_existing_attempt() {
        // Arrange
        let state = connecting(1, "p1");

        // Act – the second caller brings its own candidate, which must be ignored
        let (next, effect) = transition(state, request(2, "p2"));

        // Assert
        assert!(matches!(next, SessionState::Connecting { attempt: AttemptId(1), pending: "p1" }));
        assert!(matches!(effect, Effect::Await { attempt: AttemptId(1), pending: "p1" }));
    }

    #[test]
    fn test_connect_request_while_connected_uses_channel() {
        let (next, effect) = transition(connected(1, "ch"), request(2, "p2"));

        assert!(next.is_connected());
        assert!(matches!(effect, Effect::Use { attempt: AttemptId(1), channel: "ch" }));
    }

    #[test]
    fn test_matching_handshake_success_connects() {
        let event = SessionEvent::HandshakeSucceeded {
            attempt: AttemptId(1),
            channel: "ch",
        };

        let (next, effect) = transition(connecting(1, "p1"), event);

        assert!(matches!(next, SessionState::Connected { attempt: AttemptId(1), channel: "ch" }));
        assert!(matches!(effect, Effect::None));
    }

    #[test]
    fn test_repeated_success_report_from_joiner_is_noop() {
        let event = SessionEvent::HandshakeSucceeded {
            attempt: AttemptId(1),
            channel: "ch",
        };

        let (next, effect) = transition(connected(1, "ch"), event);

        assert!(next.is_connected());
        assert!(matches!(effect, Effect::None));
    }

    #[test]
    fn test_success_after_disconnect_closes_stale_channel() {
        let event: Event = SessionEvent::HandshakeSucceeded {
            attempt: AttemptId(1),
            channel: "stale",
        };

        let (next, effect) = transition(SessionState::Disconnected, event);

        assert_eq!(next.name(), "disconnected");
        assert!(matches!(effect, Effect::Close("stale")));
    }

    #[test]
    fn test_success_for_superseded_attempt_closes_channel() {
        let event = SessionEvent::HandshakeSucceeded {
            attempt: AttemptId(1),
            channel: "old",
        };

        let (next, effect) = transition(connecting(2, "p2"), event);

        assert!(matches!(next, SessionState::Connecting { attempt: AttemptId(2), .. }));
        assert!(matches!(effect, Effect::Close("old")));
    }

    #[test]
    fn test_matching_handshake_failure_disconnects() {
        let event = SessionEvent::HandshakeFailed {
            attempt: AttemptId(3),
        };

        let (next, _) = transition(connecting(3, "p3"), event);

        assert_eq!(next.name(), "disconnected");
    }

    #[test]
    fn test_failure_for_other_attempt_keeps_connecting() {
        let event = SessionEvent::HandshakeFailed {
            attempt: AttemptId(1),
        };

        let (next, _) = transition(connecting(2, "p2"), event);

        assert!(next.is_connecting());
    }

    #[test]
    fn test_channel_lost_closes_and_disconnects() {
        let event = SessionEvent::ChannelLost {
            attempt: AttemptId(1),
        };

        let (next, effect) = transition(connected(1, "ch"), event);

        assert_eq!(next.name(), "disconnected");
        assert!(matches!(effect, Effect::Close("ch")));
    }

    #[test]
    fn test_channel_lost_for_replaced_channel_is_ignored() {
        let event = SessionEvent::ChannelLost {
            attempt: AttemptId(1),
        };

        let (next, effect) = transition(connected(2, "new"), event);

        assert!(next.is_connected());
        assert!(matches!(effect, Effect::None));
    }

    #[test]
    fn test_disconnect_from_connected_closes_channel() {
        let (next, effect) = transition(connected(1, "ch"), SessionEvent::DisconnectRequested);

        assert_eq!(next.name(), "disconnected");
        assert!(matches!(effect, Effect::Close("ch")));
    }

    #[test]
    fn test_disconnect_while_connecting_discards_pending() {
        let (next, effect) = transition(connecting(1, "p1"), SessionEvent::DisconnectRequested);

        assert_eq!(next.name(), "disconnected");
        assert!(matches!(effect, Effect::None));
    }
}
