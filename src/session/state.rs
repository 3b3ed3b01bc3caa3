//! Session lifecycle

use std::fmt;

/// Lifecycle state of a debug session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Disconnected,
    /// Handshake in progress
    Connecting,
    Running,
    Suspended,
    /// `disconnect` called, transport not yet gone
    Closing,
}

impl SessionState {
    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            // Transport loss is legal from anywhere
            (_, Disconnected) => self != Disconnected,
            (Disconnected, Connecting) => true,
            (Connecting, Running) => true,
            // A pause can arrive while the handshake is still running
            (Connecting, Suspended) => true,
            (Running, Suspended) => true,
            (Suspended, Running) => true,
            (Connecting | Running | Suspended, Closing) => true,
            _ => false,
        }
    }

    /// True while commands may be sent
    pub fn is_live(self) -> bool {
        matches!(
            self,
            SessionState::Connecting | SessionState::Running | SessionState::Suspended
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Running => "running",
            SessionState::Suspended => "suspended",
            SessionState::Closing => "closing",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::SessionState::*;

    #[test]
    fn test_transitions() {
        assert!(Disconnected.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Running));
        assert!(Running.can_transition_to(Suspended));
        assert!(Suspended.can_transition_to(Running));
        assert!(Suspended.can_transition_to(Closing));
        assert!(Closing.can_transition_to(Disconnected));

        assert!(!Disconnected.can_transition_to(Running));
        assert!(!Disconnected.can_transition_to(Disconnected));
        assert!(!Closing.can_transition_to(Running));
        assert!(!Running.can_transition_to(Connecting));
    }

    #[test]
    fn test_liveness() {
        assert!(Running.is_live());
        assert!(Suspended.is_live());
        assert!(!Closing.is_live());
        assert!(!Disconnected.is_live());
        assert_eq!(Suspended.to_string(), "suspended");
    }
}
