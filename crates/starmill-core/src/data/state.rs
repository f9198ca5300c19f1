//! Connection and sequencer state machines

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of the machine link connection.
///
/// Transitions are driven by machine-link notifications only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No link is open
    #[default]
    Disconnected,
    /// The link is open but the controller has not announced itself yet
    Connecting,
    /// The controller announced itself and accepts commands
    Connected,
    /// The link was closed at the end of the job
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

/// Job-level state of the command sequencer.
///
/// `Idle -> AwaitingConnection -> Connected -> Homing -> Homed -> Ready`,
/// then `Ready <-> Running` once per batch. `Failed` and `Closed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SequencerState {
    /// Nothing has happened yet
    #[default]
    Idle,
    /// Waiting for the controller to announce itself
    AwaitingConnection,
    /// Connected, axes not yet homed
    Connected,
    /// Homing cycle in flight
    Homing,
    /// Homing finished
    Homed,
    /// Accepting batches
    Ready,
    /// One batch in flight
    Running,
    /// A wait timed out or the link faulted
    Failed,
    /// The job finished and the link was released
    Closed,
}

impl SequencerState {
    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(self, next: SequencerState) -> bool {
        use SequencerState::*;
        match (self, next) {
            (_, Failed) => !matches!(self, Closed),
            (_, Closed) => true,
            (Idle, AwaitingConnection) => true,
            (AwaitingConnection, Connected) => true,
            (Connected, Homing) => true,
            (Homing, Homed) => true,
            (Homed, Ready) => true,
            (Ready, Running) => true,
            (Running, Ready) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SequencerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::AwaitingConnection => "AwaitingConnection",
            Self::Connected => "Connected",
            Self::Homing => "Homing",
            Self::Homed => "Homed",
            Self::Ready => "Ready",
            Self::Running => "Running",
            Self::Failed => "Failed",
            Self::Closed => "Closed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        use SequencerState::*;
        let path = [Idle, AwaitingConnection, Connected, Homing, Homed, Ready, Running, Ready];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_batches_require_ready() {
        use SequencerState::*;
        for state in [Idle, AwaitingConnection, Connected, Homing, Homed, Running, Failed, Closed] {
            assert!(!state.can_transition_to(Running), "{state} must not start a batch");
        }
    }

    #[test]
    fn test_failed_is_terminal() {
        assert!(!SequencerState::Failed.can_transition_to(SequencerState::Ready));
        assert!(SequencerState::Failed.can_transition_to(SequencerState::Closed));
        assert!(!SequencerState::Closed.can_transition_to(SequencerState::Failed));
    }
}
