//! Command programs issued by the job.
//!
//! The probing and shutdown programs are fixed sequences for the machine
//! this job was built around; everything else is derived from the job
//! configuration and the star geometry.

use starmill_camtools::{gcode, Pass, StarOutline};
use starmill_core::CommandBatch;

/// Reset offsets and units, then probe down quickly to find the plate.
pub fn coarse_probe() -> CommandBatch {
    CommandBatch::from_lines(
        "coarse probe",
        [
            "G4P0.005",
            "M05",
            "G92.1",
            "G54",
            "G10 L2 P1 X0 Y0 Z0",
            "G21",
            "G49",
            "G90",
            "G10 L2 P1 X0 Y0 Z0",
            "G0 X-2.5 Z-5",
            "G0 Z-35.000",
            "G38.2Z-105 F800",
            "G4P0.005",
        ],
    )
}

/// Back off and probe again slowly. Its contact position is the one the
/// work origin is calibrated from.
pub fn fine_probe() -> CommandBatch {
    CommandBatch::from_lines("fine probe", ["G0 Z-70", "G38.2Z-182.675F200.0", "G4P0.005"])
}

/// Lift off the plate and move clear of it.
pub fn retract() -> CommandBatch {
    CommandBatch::from_lines("retract", ["G0 Z-5", "G0 X-5"])
}

pub fn spindle_start(rpm: f64) -> CommandBatch {
    CommandBatch::new("spindle start")
        .with("G21")
        .with("G90")
        .with(gcode::spindle_on(rpm))
}

/// Rapid to the first outline vertex, `height` above the work origin.
pub fn safe_start(star: &StarOutline, height: f64) -> CommandBatch {
    CommandBatch::new("safe start").with(gcode::rapid_move(star.start(), height))
}

/// Plunge to the pass depth at `plunge_rate`.
pub fn pass_plunge(pass: Pass, plunge_rate: f64) -> CommandBatch {
    CommandBatch::new(format!("pass {} plunge", pass.index))
        .with(gcode::plunge(pass.depth, plunge_rate))
}

/// Switch to the cutting feed rate.
pub fn pass_feed(pass: Pass, cut_rate: f64) -> CommandBatch {
    CommandBatch::new(format!("pass {} feed", pass.index)).with(gcode::feed_rate(cut_rate))
}

/// The closed star outline as linear moves.
pub fn pass_outline(pass: Pass, star: &StarOutline) -> CommandBatch {
    CommandBatch::from_lines(
        format!("pass {} outline", pass.index),
        star.iter().map(gcode::linear_move),
    )
}

/// Stop the spindle, re-home, end the program.
pub fn shutdown() -> CommandBatch {
    CommandBatch::from_lines("shutdown", ["M5", "$H", "M30"])
}

/// Stop the spindle after a failure.
pub fn abort_shutdown() -> CommandBatch {
    CommandBatch::from_lines("abort shutdown", ["M5"])
}
