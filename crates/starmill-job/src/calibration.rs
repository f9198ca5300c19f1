//! Work origin calibration from a probe measurement.
//!
//! The probe touches a plate of known height sitting on the material. The
//! work Z origin is placed so that the probed surface reads as
//! `probe_offset - measured_z`, which puts Z0 on the bottom of the material.

use starmill_camtools::gcode;
use starmill_core::{Command, CommandBatch, ProbePosition, SequencerError};
use starmill_settings::CalibrationSettings;

/// A work origin derived from one probe contact.
///
/// Only constructible from a measurement, so anything holding a
/// `Calibration` is known to run after probing succeeded.
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    measured_z: f64,
    work_z: f64,
    command: Command,
}

impl Calibration {
    pub fn from_probe(position: ProbePosition, settings: &CalibrationSettings) -> Self {
        let work_z = settings.probe_offset - position.z;
        let command = Command::new(gcode::set_work_origin(
            settings.origin_x,
            settings.origin_y,
            work_z,
        ));
        tracing::info!(
            measured_z = position.z,
            work_z,
            command = command.as_str(),
            "Computed work origin"
        );
        Self {
            measured_z: position.z,
            work_z,
            command,
        }
    }

    /// Machine Z where the probe made contact
    pub fn measured_z(&self) -> f64 {
        self.measured_z
    }

    /// Z the current position is set to
    pub fn work_z(&self) -> f64 {
        self.work_z
    }

    /// The coordinate-reset command
    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn batch(&self) -> CommandBatch {
        CommandBatch::new("calibrate").with(self.command.clone())
    }
}

/// Calibration data for one job run: empty until the fine probe succeeds,
/// then written once.
#[derive(Debug, Clone, Default)]
pub struct CalibrationState {
    calibration: Option<Calibration>,
}

impl CalibrationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the fine probe contact and derive the origin from it.
    pub fn record(
        &mut self,
        position: ProbePosition,
        settings: &CalibrationSettings,
    ) -> Result<&Calibration, SequencerError> {
        if let Some(existing) = &self.calibration {
            return Err(SequencerError::SequencingViolation {
                reason: format!(
                    "calibration already recorded from Z {:.3}",
                    existing.measured_z
                ),
            });
        }
        Ok(self
            .calibration
            .insert(Calibration::from_probe(position, settings)))
    }

    /// Most recent probe-derived Z, if any
    pub fn measured_z(&self) -> Option<f64> {
        self.calibration.as_ref().map(Calibration::measured_z)
    }

    pub fn calibration(&self) -> Option<&Calibration> {
        self.calibration.as_ref()
    }

    /// The stored calibration, or a sequencing violation when cutting is
    /// attempted before one exists.
    pub fn require(&self) -> Result<&Calibration, SequencerError> {
        self.calibration
            .as_ref()
            .ok_or_else(|| SequencerError::SequencingViolation {
                reason: "cut requested before the work origin was calibrated".to_string(),
            })
    }
}
