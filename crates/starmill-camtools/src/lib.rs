//! # Starmill CAM Tools
//!
//! Pure toolpath computation for Starmill: star outlines, multi-pass depth
//! schedules, and the G-code line builders used to emit them. Nothing in
//! this crate performs I/O.

pub mod error;
pub mod gcode;
pub mod multipass;
pub mod star;

pub use error::{CamToolError, CamToolResult, ParameterError};
pub use multipass::{pass_depths, Pass, PassDepths, PassPlan};
pub use star::{star_outline, Point, StarOutline, StarVertices};
