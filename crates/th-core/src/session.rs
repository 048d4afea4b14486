//! Session lifecycle state

use std::fmt;

use crate::error::ConnectError;

/// Lifecycle state of a connection to the event source
///
/// ```text
/// Disconnected -> Connecting -> Authenticating -> Active -> Closing -> Disconnected
/// ```
///
/// A failed connect or handshake drops straight back to `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No transport
    #[default]
    Disconnected,
    /// Transport is being established
    Connecting,
    /// Transport is up, credentials or registration in progress
    Authenticating,
    /// Frames are flowing
    Active,
    /// Transport is being torn down
    Closing,
}

impl SessionState {
    /// Whether `next` is reachable from this state in one step
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;

        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Authenticating)
                | (Authenticating, Active)
                | (Active, Closing)
                | (Closing, Disconnected)
                | (Connecting, Disconnected)
                | (Authenticating, Disconnected)
        )
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow
    pub fn transition(&mut self, next: SessionState) -> Result<(), ConnectError> {
        if !self.can_transition_to(next) {
            return Err(ConnectError::InvalidTransition {
                from: *self,
                to: next,
            });
        }
        tracing::trace!(from = %self, to = %next, "Session state change");
        *self = next;
        Ok(())
    }

    /// Whether frames may be read
    pub fn is_active(self) -> bool {
        self == SessionState::Active
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Authenticating => "authenticating",
            SessionState::Active => "active",
            SessionState::Closing => "closing",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_lifecycle() {
        let mut state = SessionState::default();

        for next in [
            SessionState::Connecting,
            SessionState::Authenticating,
            SessionState::Active,
            SessionState::Closing,
            SessionState::Disconnected,
        ] {
            state.transition(next).unwrap();
            assert_eq!(state, next);
        }
    }

    #[test]
    fn test_failed_handshake_returns_to_disconnected() {
        let mut state = SessionState::Authenticating;
        state.transition(SessionState::Disconnected).unwrap();
        assert_eq!(state, SessionState::Disconnected);
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let mut state = SessionState::Disconnected;

        let err = state.transition(SessionState::Active).unwrap_err();
        assert!(matches!(
            err,
            ConnectError::InvalidTransition {
                from: SessionState::Disconnected,
                to: SessionState::Active,
            }
        ));
        assert_eq!(state, SessionState::Disconnected);
    }

    #[test]
    fn test_only_active_is_active() {
        assert!(SessionState::Active.is_active());
        assert!(!SessionState::Closing.is_active());
        assert_eq!(SessionState::Authenticating.to_string(), "authenticating");
    }
}
