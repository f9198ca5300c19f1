//! Job orchestrator
//!
//! Runs the job phases strictly in order over a [`CommandSequencer`]:
//!
//! 1. connect: open the link and wait for the controller's ready banner
//! 2. home
//! 3. probe: coarse probe, fine probe, retract
//! 4. calibrate: reset the work origin from the fine probe contact
//! 5. cut: spindle on, safe start, then each pass
//! 6. shutdown: spindle off, re-home, end program
//!
//! After a failure the remaining phases are skipped and an abort batch
//! stops the spindle. Either way the link is closed after a settle delay.

use crate::calibration::{Calibration, CalibrationState};
use crate::error::{JobError, JobPhase, JobResult};
use crate::programs;
use crate::report::{JobReport, PassReport};
use starmill_camtools::{CamToolResult, PassPlan, StarOutline};
use starmill_communication::{
    CommandSequencer, GrblLink, GrblLinkConfig, MachineLink, SequencerTimeouts, SimulatedLink,
    SimulatorConfig,
};
use starmill_core::ProbePosition;
use starmill_settings::{JobConfig, LinkType};
use std::thread;
use std::time::{Duration, Instant};

/// Build the machine link selected by the configuration.
pub fn build_link(config: &JobConfig) -> Box<dyn MachineLink> {
    match config.connection.link {
        LinkType::Serial => Box::new(GrblLink::new(GrblLinkConfig {
            read_timeout: Duration::from_millis(config.connection.read_timeout_ms),
        })),
        LinkType::Simulated => Box::new(SimulatedLink::new(SimulatorConfig {
            probe_z: config.simulator.probe_z,
            probe_triggers: config.simulator.probe_triggers,
            latency: Duration::from_millis(config.simulator.latency_ms),
            ..Default::default()
        })),
    }
}

/// Drives one star cutting job.
#[derive(Debug, Clone)]
pub struct JobOrchestrator {
    config: JobConfig,
    star: StarOutline,
    plan: PassPlan,
}

impl JobOrchestrator {
    /// Prepare a job. Fails if the star or pass parameters are invalid.
    pub fn new(config: JobConfig) -> CamToolResult<Self> {
        let star = StarOutline::new(
            config.star.points,
            config.star.inner_radius,
            config.star.outer_radius,
            config.star.center_offset,
        )?;
        let plan = PassPlan::new(config.material.passes, config.material.thickness)?;
        Ok(Self { config, star, plan })
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    pub fn star(&self) -> &StarOutline {
        &self.star
    }

    pub fn plan(&self) -> &PassPlan {
        &self.plan
    }

    pub fn sequencer_timeouts(&self) -> SequencerTimeouts {
        let timeouts = &self.config.timeouts;
        SequencerTimeouts {
            connect: timeouts.connect(),
            homing: timeouts.homing(),
            batch: timeouts.batch(),
            abort: timeouts.abort(),
        }
    }

    /// Run the whole job over `link`. The link is closed before returning.
    pub fn run(&self, link: Box<dyn MachineLink>) -> JobResult<JobReport> {
        let started = Instant::now();
        let mut sequencer = CommandSequencer::new(link, self.sequencer_timeouts());

        let outcome = self.execute(&mut sequencer);
        if let Err(e) = &outcome {
            tracing::error!(phase = %e.phase, error = %e.source, "Job failed, aborting");
            self.abort(&mut sequencer);
        }

        thread::sleep(self.config.timeouts.settle());
        let closed = sequencer.close();

        let mut report = match (outcome, closed) {
            (Ok(report), Ok(())) => report,
            (Ok(_), Err(e)) => return Err(JobError::new(JobPhase::Shutdown, e)),
            (Err(e), closed) => {
                if let Err(close_error) = closed {
                    tracing::warn!(error = %close_error, "Failed to close link after abort");
                }
                return Err(e);
            }
        };
        report.batches_issued = sequencer.batches_completed();
        report.elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            passes = report.passes.len(),
            batches = report.batches_issued,
            elapsed_ms = report.elapsed_ms,
            "Job complete"
        );
        Ok(report)
    }

    fn execute(&self, sequencer: &mut CommandSequencer) -> JobResult<JobReport> {
        let mut calibration_state = CalibrationState::new();

        self.connect(sequencer)
            .map_err(JobError::at(JobPhase::Connect))?;

        tracing::info!(phase = %JobPhase::Home, "Homing");
        sequencer.home().map_err(JobError::at(JobPhase::Home))?;

        let contact = self.probe(sequencer)?;

        tracing::info!(phase = %JobPhase::Calibrate, "Resetting work origin");
        let origin = calibration_state
            .record(contact, &self.config.calibration)
            .map_err(JobError::at(JobPhase::Calibrate))?
            .batch();
        sequencer
            .run_batch(&origin)
            .map_err(JobError::at(JobPhase::Calibrate))?;

        let calibration = calibration_state
            .require()
            .map_err(JobError::at(JobPhase::Cut))?;

        let passes = self.cut(sequencer, calibration)?;

        tracing::info!(phase = %JobPhase::Shutdown, "Shutting down");
        sequencer
            .run_batch(&programs::shutdown())
            .map_err(JobError::at(JobPhase::Shutdown))?;

        Ok(JobReport {
            measured_z: calibration.measured_z(),
            work_z: calibration.work_z(),
            calibration_command: calibration.command().to_string(),
            passes,
            batches_issued: 0,
            elapsed_ms: 0,
        })
    }

    fn connect(&self, sequencer: &mut CommandSequencer) -> starmill_core::Result<()> {
        let connection = &self.config.connection;
        tracing::info!(phase = %JobPhase::Connect, port = connection.port.as_str(), "Connecting");
        sequencer.open(&connection.port, connection.baud_rate)?;
        sequencer.await_connection()?;
        Ok(())
    }

    /// Run the three probing batches and return the fine probe contact.
    fn probe(&self, sequencer: &mut CommandSequencer) -> JobResult<ProbePosition> {
        tracing::info!(phase = %JobPhase::Probe, "Probing work surface");

        sequencer
            .run_batch(&programs::coarse_probe())
            .map_err(JobError::at(JobPhase::Probe))?;
        let contact = sequencer
            .run_probe_batch(&programs::fine_probe())
            .map_err(JobError::at(JobPhase::Probe))?;
        sequencer
            .run_batch(&programs::retract())
            .map_err(JobError::at(JobPhase::Probe))?;

        tracing::info!(measured_z = contact.z, "Fine probe contact");
        Ok(contact)
    }

    /// Cutting needs a [`Calibration`], so it cannot run before the work
    /// origin has been reset.
    fn cut(
        &self,
        sequencer: &mut CommandSequencer,
        calibration: &Calibration,
    ) -> JobResult<Vec<PassReport>> {
        let feeds = &self.config.feeds;
        let material = &self.config.material;
        tracing::info!(
            phase = %JobPhase::Cut,
            work_z = calibration.work_z(),
            passes = self.plan.total_passes(),
            "Cutting"
        );

        let setup = [
            programs::spindle_start(feeds.spindle_rpm),
            programs::safe_start(&self.star, material.thickness + material.clearance),
        ];
        for batch in &setup {
            sequencer.run_batch(batch).map_err(JobError::at(JobPhase::Cut))?;
        }

        let mut passes = Vec::with_capacity(self.plan.total_passes() as usize);
        for pass in self.plan.iter() {
            tracing::info!(pass = pass.index, depth = pass.depth, "Starting pass");
            let batches = [
                programs::pass_plunge(pass, feeds.plunge_rate),
                programs::pass_feed(pass, feeds.cut_rate),
                programs::pass_outline(pass, &self.star),
            ];
            for batch in &batches {
                sequencer.run_batch(batch).map_err(JobError::at(JobPhase::Cut))?;
            }
            passes.push(PassReport {
                index: pass.index,
                depth: pass.depth,
            });
        }

        Ok(passes)
    }

    /// Best-effort spindle stop after a failure. Never fails the job twice.
    fn abort(&self, sequencer: &mut CommandSequencer) {
        match sequencer.abort(&programs::abort_shutdown()) {
            Ok(()) => tracing::info!("Abort shutdown acknowledged"),
            Err(e) => tracing::warn!(error = %e, "Abort shutdown failed"),
        }
    }
}
