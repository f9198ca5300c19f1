//! Error handling for Starmill
//!
//! Provides the error types shared by every layer of a machining job:
//! - Connection errors (machine link open/drop)
//! - Sequencer errors (timeouts, invariant violations, link faults)
//! - Probe errors (missing or failed surface measurement)
//! - Gate errors (raw outcome of a blocking wait)
//!
//! All error types use `thiserror` for ergonomic error handling.

use crate::core::event::EventKind;
use crate::data::{ConnectionState, SequencerState};
use thiserror::Error;

/// Connection error type
///
/// Represents failures of the machine link itself. Always fatal, and raised
/// before any motion when the link cannot be opened.
#[derive(Error, Debug, Clone)]
pub enum ConnectionError {
    /// Failed to open port
    #[error("Failed to open port {port}: {reason}")]
    FailedToOpen {
        /// The name of the port that failed to open.
        port: String,
        /// The reason the port failed to open.
        reason: String,
    },

    /// A batch was attempted while the link was not in the Connected state
    #[error("Link not connected (state: {state})")]
    NotConnected {
        /// The connection state observed at submission time.
        state: ConnectionState,
    },

    /// The link is not open
    #[error("Link is not open")]
    NotOpen,

    /// The link is already open
    #[error("Link is already open")]
    AlreadyOpen,

    /// Connection lost
    #[error("Connection lost: {reason}")]
    ConnectionLost {
        /// The reason the connection was lost.
        reason: String,
    },

    /// Serial port error
    #[error("Serial port error: {reason}")]
    SerialError {
        /// The reason for the serial port error.
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {reason}")]
    IoError {
        /// The reason for the I/O error.
        reason: String,
    },
}

impl From<std::io::Error> for ConnectionError {
    fn from(err: std::io::Error) -> Self {
        ConnectionError::IoError {
            reason: err.to_string(),
        }
    }
}

/// Outcome of a failed blocking wait on the event gate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GateError {
    /// No notification of the awaited kind arrived within the bound
    #[error("Timed out after {timeout_ms}ms waiting for {kind}")]
    TimedOut {
        /// The event kind that was awaited.
        kind: EventKind,
        /// The wait bound in milliseconds.
        timeout_ms: u64,
    },

    /// The machine link reported a fault while the wait was pending
    #[error("Link fault: {reason}")]
    Faulted {
        /// The fault reported by the link.
        reason: String,
    },
}

/// Sequencer error type
///
/// Raised by the command sequencer. A timeout or link fault moves the
/// sequencer to its terminal `Failed` state.
#[derive(Error, Debug, Clone)]
pub enum SequencerError {
    /// A blocking wait exceeded its bound
    #[error("Timed out after {timeout_ms}ms waiting for {event}")]
    Timeout {
        /// The event kind that never arrived.
        event: EventKind,
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// An ordering invariant was broken by the caller
    #[error("Sequencing violation: {reason}")]
    SequencingViolation {
        /// What was attempted.
        reason: String,
    },

    /// Invalid state transition
    #[error("Invalid state transition from {current} to {requested}")]
    InvalidStateTransition {
        /// The current state.
        current: SequencerState,
        /// The requested state.
        requested: SequencerState,
    },

    /// The machine link reported an error, alarm, or drop mid-operation
    #[error("Link fault: {reason}")]
    LinkFault {
        /// The fault reported by the link.
        reason: String,
    },

    /// The sequencer already failed and refuses further batches
    #[error("Sequencer has failed; no further batches are issued")]
    Failed,

    /// Underlying connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

impl SequencerError {
    /// Map a failed gate wait onto the sequencer taxonomy.
    pub fn from_gate(err: GateError) -> Self {
        match err {
            GateError::TimedOut { kind, timeout_ms } => SequencerError::Timeout {
                event: kind,
                timeout_ms,
            },
            GateError::Faulted { reason } => SequencerError::LinkFault { reason },
        }
    }
}

/// Probe measurement error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProbeError {
    /// The probe-result line reports that the probe never made contact
    #[error("Probe did not make contact: {line}")]
    NotTriggered {
        /// The raw probe-result line.
        line: String,
    },

    /// A probe batch completed without any probe-result line
    #[error("No probe result was reported before the probe batch completed")]
    Missing,

    /// The line carries the probe-result prefix but cannot be parsed
    #[error("Malformed probe result: {line}")]
    Malformed {
        /// The raw unparsed line.
        line: String,
    },
}

/// Main error type for Starmill
///
/// A unified error type that can represent any error from all layers.
#[derive(Error, Debug)]
pub enum Error {
    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Sequencer error
    #[error(transparent)]
    Sequencer(#[from] SequencerError),

    /// Probe error
    #[error(transparent)]
    Probe(#[from] ProbeError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Sequencer(SequencerError::Timeout { .. }))
    }

    /// Check if this is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Error::Connection(_) | Error::Sequencer(SequencerError::Connection(_))
        )
    }

    /// Check if this is a probe measurement error
    pub fn is_probe_error(&self) -> bool {
        matches!(self, Error::Probe(_))
    }

    /// Check if this is an invariant violation (a defect, not a runtime condition)
    pub fn is_sequencing_violation(&self) -> bool {
        matches!(
            self,
            Error::Sequencer(
                SequencerError::SequencingViolation { .. }
                    | SequencerError::InvalidStateTransition { .. }
            )
        )
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
