//! # Starmill Job
//!
//! The star cutting job: connect, home, probe the work surface, move the
//! work origin onto the measured surface, cut the star outline in several
//! passes, and shut down. Any failure aborts the remaining steps and runs
//! a best-effort spindle stop before the link is closed.

pub mod calibration;
pub mod error;
pub mod orchestrator;
pub mod programs;
pub mod report;

pub use calibration::{Calibration, CalibrationState};
pub use error::{JobError, JobPhase, JobResult};
pub use orchestrator::{build_link, JobOrchestrator};
pub use report::{JobReport, PassReport};
