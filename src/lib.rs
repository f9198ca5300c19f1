//! # Starmill
//!
//! Cuts a star outline on a GRBL machine after calibrating the work origin
//! from a surface probe.
//!
//! ## Architecture
//!
//! Starmill is organized as a workspace with multiple crates:
//!
//! 1. **starmill-core** - Errors, commands, the event gate, link listener trait
//! 2. **starmill-camtools** - Star outline, pass depths, G-code formatting
//! 3. **starmill-settings** - Job configuration
//! 4. **starmill-communication** - Machine links, GRBL parsing, command sequencer
//! 5. **starmill-job** - Job orchestration
//! 6. **starmill** - Main binary that integrates all crates

pub use starmill_camtools::{pass_depths, star_outline, PassPlan, StarOutline};

pub use starmill_communication::{
    list_ports, CommandSequencer, GrblLink, MachineLink, ProbeResultParser, SerialPortInfo,
    SimulatedLink,
};

pub use starmill_core::{
    Command, CommandBatch, ConnectionError, ConnectionState, Error, EventGate, EventKind,
    JobEvent, ProbeError, ProbePosition, Result, SequencerError, SequencerState,
};

pub use starmill_job::{build_link, JobError, JobOrchestrator, JobPhase, JobReport};

pub use starmill_settings::{JobConfig, LinkType};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Console output on stderr, keeping stdout for the job report
/// - RUST_LOG environment variable support, INFO by default
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_names(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
