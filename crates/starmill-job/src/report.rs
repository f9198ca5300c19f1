//! Summary of a completed job

use serde::Serialize;

/// One cut pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PassReport {
    pub index: u32,
    pub depth: f64,
}

/// What a successful job run did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobReport {
    /// Machine Z of the fine probe contact
    pub measured_z: f64,
    /// Z the work origin was reset to at the probed position
    pub work_z: f64,
    /// The coordinate-reset command that was issued
    pub calibration_command: String,
    /// Passes in cutting order
    pub passes: Vec<PassReport>,
    /// Batches acknowledged by the controller
    pub batches_issued: usize,
    /// Wall time from opening the link to closing it
    pub elapsed_ms: u64,
}
