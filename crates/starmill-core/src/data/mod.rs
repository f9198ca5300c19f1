//! Data models for a machining job
//!
//! Commands and batches sent to the machine link, the connection and
//! sequencer state machines, and probe measurements.

pub mod command;
pub mod state;

pub use command::{Command, CommandBatch};
pub use state::{ConnectionState, SequencerState};

use serde::{Deserialize, Serialize};

/// Position reported by a triggered surface probe, in machine coordinates (mm).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbePosition {
    /// X axis
    pub x: f64,
    /// Y axis
    pub y: f64,
    /// Z axis
    pub z: f64,
}

impl ProbePosition {
    /// Create a new probe position
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl std::fmt::Display for ProbePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}
