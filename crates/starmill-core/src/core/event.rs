//! Job event types
//!
//! Events are facts about the past reported by the machine link. They are
//! never retracted; the gate only remembers whether each kind has occurred
//! since it was last armed.

use crate::data::ProbePosition;
use crate::error::ProbeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of parsing a probe-result line.
pub type ProbeOutcome = std::result::Result<ProbePosition, ProbeError>;

/// Class of event a sequencer can wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// The controller announced itself on the link
    Connected,
    /// A homing cycle finished
    HomingComplete,
    /// Every command of the in-flight batch was acknowledged
    BatchComplete,
    /// A probe-result line was observed
    ProbeMeasurement,
}

impl EventKind {
    pub(crate) fn slot(self) -> usize {
        match self {
            EventKind::Connected => 0,
            EventKind::HomingComplete => 1,
            EventKind::BatchComplete => 2,
            EventKind::ProbeMeasurement => 3,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Connected => write!(f, "connected"),
            EventKind::HomingComplete => write!(f, "homing complete"),
            EventKind::BatchComplete => write!(f, "batch complete"),
            EventKind::ProbeMeasurement => write!(f, "probe measurement"),
        }
    }
}

/// Notification delivered by the machine link.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    /// The controller announced itself
    Connected,
    /// A homing cycle finished
    HomingComplete,
    /// The batch submitted under this sequence number finished
    BatchComplete(u64),
    /// A probe-result line was parsed
    ProbeMeasurement(ProbeOutcome),
}

impl JobEvent {
    /// The kind this event signals
    pub fn kind(&self) -> EventKind {
        match self {
            JobEvent::Connected => EventKind::Connected,
            JobEvent::HomingComplete => EventKind::HomingComplete,
            JobEvent::BatchComplete(_) => EventKind::BatchComplete,
            JobEvent::ProbeMeasurement(_) => EventKind::ProbeMeasurement,
        }
    }
}

impl fmt::Display for JobEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobEvent::ProbeMeasurement(Ok(position)) => write!(f, "probe measurement {}", position),
            JobEvent::ProbeMeasurement(Err(err)) => write!(f, "probe measurement error: {}", err),
            JobEvent::BatchComplete(sequence) => write!(f, "batch {} complete", sequence),
            other => write!(f, "{}", other.kind()),
        }
    }
}
