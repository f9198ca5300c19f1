//! Command sequencer
//!
//! Turns the fire-and-forget [`MachineLink`] into a strictly sequential,
//! blocking workflow. Every operation arms the [`EventGate`] for the event
//! that completes it, issues the work, then blocks until the event arrives,
//! the link faults, or the timeout elapses.
//!
//! State machine: `Idle -> AwaitingConnection -> Connected -> Homing ->
//! Homed -> Ready <-> Running`. Any timeout or link error moves the
//! sequencer to `Failed`, after which only [`CommandSequencer::abort`] and
//! [`CommandSequencer::close`] are accepted.

pub mod listener;

pub use listener::GateListener;

use crate::communication::MachineLink;
use starmill_core::{
    CommandBatch, ConnectionError, ConnectionState, Error, EventGate, EventKind,
    MachineListenerHandle, ProbeError, ProbePosition, SequencerError, SequencerState,
};
use std::sync::Arc;
use std::time::Duration;

/// How long a probe report may trail the alarm that ended its batch.
const PROBE_REPORT_GRACE: Duration = Duration::from_millis(250);

/// Bounds on every blocking wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencerTimeouts {
    /// Wait for the controller's ready banner
    pub connect: Duration,
    /// Wait for a homing cycle
    pub homing: Duration,
    /// Wait for a batch to be acknowledged
    pub batch: Duration,
    /// Wait for the abort batch during best-effort shutdown
    pub abort: Duration,
}

impl Default for SequencerTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            homing: Duration::from_secs(60),
            batch: Duration::from_secs(120),
            abort: Duration::from_secs(10),
        }
    }
}

/// Issues batches to a machine link one at a time and waits for each.
pub struct CommandSequencer {
    link: Box<dyn MachineLink>,
    gate: Arc<EventGate>,
    listener: MachineListenerHandle,
    timeouts: SequencerTimeouts,
    state: SequencerState,
    in_flight: Option<String>,
    last_sequence: u64,
    batches_completed: usize,
}

impl CommandSequencer {
    /// Take ownership of `link` and route its notifications into a fresh
    /// event gate.
    pub fn new(mut link: Box<dyn MachineLink>, timeouts: SequencerTimeouts) -> Self {
        let gate = Arc::new(EventGate::new());
        let listener = link.register_listener(Arc::new(GateListener::new(gate.clone())));
        Self {
            link,
            gate,
            listener,
            timeouts,
            state: SequencerState::Idle,
            in_flight: None,
            last_sequence: 0,
            batches_completed: 0,
        }
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.gate.connection_state()
    }

    pub fn gate(&self) -> &Arc<EventGate> {
        &self.gate
    }

    pub fn timeouts(&self) -> &SequencerTimeouts {
        &self.timeouts
    }

    /// Batches acknowledged so far, abort batches excluded
    pub fn batches_completed(&self) -> usize {
        self.batches_completed
    }

    /// Label of the batch awaiting acknowledgement, if any
    pub fn in_flight(&self) -> Option<&str> {
        self.in_flight.as_deref()
    }

    /// Open the link. The ready banner may arrive before
    /// [`await_connection`](Self::await_connection) is called, so the
    /// gate is armed first.
    pub fn open(&mut self, port: &str, baud_rate: u32) -> Result<(), SequencerError> {
        self.transition(SequencerState::AwaitingConnection)?;
        self.gate.arm(EventKind::Connected);

        tracing::info!(link = self.link.name(), port, baud_rate, "Opening machine link");
        self.link.open(port, baud_rate).map_err(|e| self.fail(e.into()))
    }

    /// Block until the controller announces it is ready for commands.
    pub fn await_connection(&mut self) -> Result<(), SequencerError> {
        self.expect_state(SequencerState::AwaitingConnection, "await connection")?;
        self.wait(EventKind::Connected, self.timeouts.connect)?;
        self.transition(SequencerState::Connected)
    }

    /// Run a homing cycle. Must precede every batch.
    pub fn home(&mut self) -> Result<(), SequencerError> {
        self.expect_state(SequencerState::Connected, "home")?;
        self.require_connected()?;
        self.transition(SequencerState::Homing)?;

        self.gate.arm(EventKind::HomingComplete);
        self.link.request_homing().map_err(|e| self.fail(e.into()))?;
        self.wait(EventKind::HomingComplete, self.timeouts.homing)?;

        self.transition(SequencerState::Homed)?;
        self.transition(SequencerState::Ready)
    }

    /// Submit `batch` without waiting. Only one batch may be in flight.
    pub fn submit(&mut self, batch: &CommandBatch) -> Result<(), SequencerError> {
        if self.state == SequencerState::Failed {
            return Err(SequencerError::Failed);
        }
        if let Some(outstanding) = &self.in_flight {
            return Err(SequencerError::SequencingViolation {
                reason: format!(
                    "batch '{}' submitted while '{}' is unacknowledged",
                    batch.label(),
                    outstanding
                ),
            });
        }
        self.expect_state(SequencerState::Ready, "submit a batch")?;
        self.require_connected()?;

        let sequence = self.next_sequence();
        self.gate.arm_batch(sequence);
        self.transition(SequencerState::Running)?;
        tracing::debug!(
            sequence,
            label = batch.label(),
            commands = batch.len(),
            "Submitting batch"
        );
        self.link
            .submit_batch(sequence, batch)
            .map_err(|e| self.fail(e.into()))?;
        self.in_flight = Some(batch.label().to_string());
        Ok(())
    }

    /// Block until the in-flight batch is acknowledged.
    pub fn await_batch(&mut self) -> Result<(), SequencerError> {
        let Some(label) = self.in_flight.clone() else {
            return Err(SequencerError::SequencingViolation {
                reason: "no batch in flight".to_string(),
            });
        };

        self.wait(EventKind::BatchComplete, self.timeouts.batch)?;
        self.in_flight = None;
        self.batches_completed += 1;
        tracing::debug!(label = label.as_str(), "Batch acknowledged");
        self.transition(SequencerState::Ready)
    }

    /// Submit `batch` and block until it is acknowledged.
    pub fn run_batch(&mut self, batch: &CommandBatch) -> Result<(), SequencerError> {
        self.submit(batch)?;
        self.await_batch()
    }

    /// Run a probing batch and return the measurement it produced.
    ///
    /// The measurement slot is armed before submission and read after the
    /// batch completes, so a measurement from an earlier batch is never
    /// returned.
    pub fn run_probe_batch(&mut self, batch: &CommandBatch) -> Result<ProbePosition, Error> {
        self.gate.arm(EventKind::ProbeMeasurement);
        let completed = self.run_batch(batch);
        let measurement = match (&completed, self.gate.take_probe()) {
            (Err(SequencerError::LinkFault { .. }), None) => {
                // GRBL reports the probe parameters after the alarm.
                self.gate
                    .wait_latched(EventKind::ProbeMeasurement, PROBE_REPORT_GRACE);
                self.gate.take_probe()
            }
            (_, measurement) => measurement,
        };

        match (completed, measurement) {
            (Ok(()), Some(outcome)) => Ok(outcome?),
            (Ok(()), None) => Err(ProbeError::Missing.into()),
            // The controller alarms after a probe without contact; the probe
            // line is the more precise report.
            (
                Err(SequencerError::LinkFault { .. }),
                Some(Err(e @ ProbeError::NotTriggered { .. })),
            ) => Err(e.into()),
            (Err(e), _) => Err(e.into()),
        }
    }

    /// Best-effort shutdown batch, accepted in any state while the link is
    /// open. The link drops every unfinished batch first, and only the
    /// completion of `batch` itself ends the wait. Clears a pending fault so
    /// the batch can be acknowledged.
    pub fn abort(&mut self, batch: &CommandBatch) -> Result<(), SequencerError> {
        if !self.link.is_open() {
            return Err(ConnectionError::NotOpen.into());
        }

        if let Some(reason) = self.gate.clear_fault() {
            tracing::debug!(%reason, "Cleared fault before abort");
        }
        self.in_flight = None;
        let sequence = self.next_sequence();
        self.gate.arm_batch(sequence);
        tracing::warn!(
            sequence,
            label = batch.label(),
            state = %self.state,
            "Issuing abort batch"
        );
        self.link.abort(sequence, batch)?;
        self.gate
            .wait_for(EventKind::BatchComplete, self.timeouts.abort)
            .map_err(SequencerError::from_gate)
    }

    /// Close the link and detach from its notifications.
    pub fn close(&mut self) -> Result<(), SequencerError> {
        if self.state == SequencerState::Closed {
            return Ok(());
        }

        let closed = if self.link.is_open() {
            self.link.close()
        } else {
            Ok(())
        };
        self.link.unregister_listener(&self.listener);
        self.gate.set_connection_state(ConnectionState::Closed);
        self.in_flight = None;
        self.transition(SequencerState::Closed)?;
        tracing::info!(link = self.link.name(), "Machine link closed");
        closed.map_err(SequencerError::from)
    }

    fn next_sequence(&mut self) -> u64 {
        self.last_sequence += 1;
        self.last_sequence
    }

    fn wait(&mut self, kind: EventKind, timeout: Duration) -> Result<(), SequencerError> {
        self.gate
            .wait_for(kind, timeout)
            .map_err(|e| self.fail(SequencerError::from_gate(e)))
    }

    fn require_connected(&mut self) -> Result<(), SequencerError> {
        match self.gate.connection_state() {
            ConnectionState::Connected => Ok(()),
            state => Err(self.fail(ConnectionError::NotConnected { state }.into())),
        }
    }

    fn expect_state(&self, expected: SequencerState, action: &str) -> Result<(), SequencerError> {
        match self.state {
            state if state == expected => Ok(()),
            SequencerState::Failed => Err(SequencerError::Failed),
            state => Err(SequencerError::SequencingViolation {
                reason: format!("cannot {} while {}", action, state),
            }),
        }
    }

    fn transition(&mut self, next: SequencerState) -> Result<(), SequencerError> {
        if self.state == SequencerState::Failed && next != SequencerState::Closed {
            return Err(SequencerError::Failed);
        }
        if !self.state.can_transition_to(next) {
            return Err(SequencerError::InvalidStateTransition {
                current: self.state,
                requested: next,
            });
        }
        tracing::debug!(from = %self.state, to = %next, "Sequencer state");
        self.state = next;
        Ok(())
    }

    /// Enter the terminal failed state and hand back `err`.
    fn fail(&mut self, err: SequencerError) -> SequencerError {
        if self.state != SequencerState::Failed {
            tracing::error!(state = %self.state, error = %err, "Sequencer failed");
            self.state = SequencerState::Failed;
        }
        err
    }
}

impl std::fmt::Debug for CommandSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSequencer")
            .field("link", &self.link.name())
            .field("state", &self.state)
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::{SimulatedLink, SimulatorConfig};

    fn quick_timeouts() -> SequencerTimeouts {
        SequencerTimeouts {
            connect: Duration::from_secs(5),
            homing: Duration::from_secs(5),
            batch: Duration::from_secs(5),
            abort: Duration::from_secs(5),
        }
    }

    fn ready(config: SimulatorConfig) -> CommandSequencer {
        let mut sequencer =
            CommandSequencer::new(Box::new(SimulatedLink::new(config)), quick_timeouts());
        sequencer.open("sim", 115200).unwrap();
        sequencer.await_connection().unwrap();
        sequencer.home().unwrap();
        sequencer
    }

    #[test]
    fn test_lifecycle_reaches_ready() {
        let mut sequencer = ready(SimulatorConfig::default());
        assert_eq!(sequencer.state(), SequencerState::Ready);
        assert_eq!(sequencer.connection_state(), ConnectionState::Connected);

        sequencer
            .run_batch(&CommandBatch::from_lines("retract", ["G0 Z-5"]))
            .unwrap();
        assert_eq!(sequencer.state(), SequencerState::Ready);
        assert_eq!(sequencer.batches_completed(), 1);

        sequencer.close().unwrap();
        assert_eq!(sequencer.state(), SequencerState::Closed);
    }

    #[test]
    fn test_second_submit_while_unacknowledged_is_rejected() {
        let mut sequencer = ready(SimulatorConfig::default());
        sequencer
            .submit(&CommandBatch::from_lines("first", ["G0 Z-5"]))
            .unwrap();

        let second = sequencer.submit(&CommandBatch::from_lines("second", ["G0 X-5"]));
        assert!(matches!(
            second,
            Err(SequencerError::SequencingViolation { .. })
        ));

        sequencer.await_batch().unwrap();
        assert_eq!(sequencer.in_flight(), None);
    }

    #[test]
    fn test_batches_refused_before_homing() {
        let mut sequencer =
            CommandSequencer::new(Box::new(SimulatedLink::default()), quick_timeouts());
        let batch = CommandBatch::from_lines("early", ["G0 Z-5"]);
        assert!(matches!(
            sequencer.run_batch(&batch),
            Err(SequencerError::SequencingViolation { .. })
        ));

        sequencer.open("sim", 115200).unwrap();
        sequencer.await_connection().unwrap();
        assert!(matches!(
            sequencer.run_batch(&batch),
            Err(SequencerError::SequencingViolation { .. })
        ));
    }

    #[test]
    fn test_timeout_fails_sequencer() {
        let mut sequencer = ready(SimulatorConfig {
            stall_after_batches: Some(0),
            ..Default::default()
        });
        sequencer.timeouts.batch = Duration::from_millis(50);

        let result = sequencer.run_batch(&CommandBatch::from_lines("stalls", ["G0 Z-5"]));
        assert!(matches!(
            result,
            Err(SequencerError::Timeout {
                event: EventKind::BatchComplete,
                timeout_ms: 50
            })
        ));
        assert_eq!(sequencer.state(), SequencerState::Failed);
        assert!(matches!(
            sequencer.run_batch(&CommandBatch::from_lines("after", ["M5"])),
            Err(SequencerError::Failed)
        ));
    }

    #[test]
    fn test_banner_before_open_notification_still_homes() {
        for _ in 0..200 {
            let mut sequencer = ready(SimulatorConfig {
                latency: Duration::ZERO,
                ..Default::default()
            });
            assert_eq!(sequencer.connection_state(), ConnectionState::Connected);
            sequencer.close().unwrap();
        }
    }

    #[test]
    fn test_abort_waits_for_its_own_batch() {
        let latency = Duration::from_millis(300);
        let link = SimulatedLink::new(SimulatorConfig {
            latency,
            ..Default::default()
        });
        let history = link.history();
        let mut sequencer = CommandSequencer::new(Box::new(link), quick_timeouts());
        sequencer.open("sim", 115200).unwrap();
        sequencer.await_connection().unwrap();
        sequencer.home().unwrap();
        sequencer.timeouts.batch = Duration::from_millis(50);

        let result = sequencer.run_batch(&CommandBatch::from_lines("slow", ["G0 Z-5"]));
        assert!(matches!(result, Err(SequencerError::Timeout { .. })));

        let started = std::time::Instant::now();
        sequencer
            .abort(&CommandBatch::from_lines("abort shutdown", ["M5"]))
            .unwrap();
        assert!(started.elapsed() >= latency);
        assert_eq!(history.labels(), vec!["slow", "abort shutdown"]);
        sequencer.close().unwrap();
    }

    #[test]
    fn test_rejected_command_faults_immediately() {
        let mut sequencer = ready(SimulatorConfig {
            reject_prefix: Some("M3".to_string()),
            ..Default::default()
        });
        let result = sequencer.run_batch(&CommandBatch::from_lines("spindle", ["G21", "M3 S9000"]));
        match result {
            Err(SequencerError::LinkFault { reason }) => assert!(reason.contains("M3 S9000")),
            other => panic!("expected link fault, got {:?}", other),
        }
        assert_eq!(sequencer.state(), SequencerState::Failed);

        sequencer.abort(&CommandBatch::from_lines("abort", ["M5"])).unwrap();
        sequencer.close().unwrap();
    }

    #[test]
    fn test_probe_batch_returns_fresh_measurement() {
        let mut sequencer = ready(SimulatorConfig::default());
        sequencer
            .run_batch(&CommandBatch::from_lines("coarse", ["G38.2Z-105 F800"]))
            .unwrap();

        let position = sequencer
            .run_probe_batch(&CommandBatch::from_lines(
                "fine",
                ["G38.2Z-182.675F200.0", "G4P0.005"],
            ))
            .unwrap();
        assert_eq!(position.z, -105.123);

        let missing = sequencer.run_probe_batch(&CommandBatch::from_lines("no probe", ["G0 Z-5"]));
        assert!(matches!(missing, Err(Error::Probe(ProbeError::Missing))));
    }

    #[test]
    fn test_probe_without_contact() {
        let mut sequencer = ready(SimulatorConfig {
            probe_triggers: false,
            ..Default::default()
        });
        let result =
            sequencer.run_probe_batch(&CommandBatch::from_lines("fine", ["G38.2Z-182.675F200.0"]));
        assert!(matches!(
            result,
            Err(Error::Probe(ProbeError::NotTriggered { .. }))
        ));
    }

    #[test]
    fn test_open_failure() {
        let mut sequencer = CommandSequencer::new(
            Box::new(SimulatedLink::new(SimulatorConfig {
                fail_open: true,
                ..Default::default()
            })),
            quick_timeouts(),
        );
        assert!(matches!(
            sequencer.open("sim", 115200),
            Err(SequencerError::Connection(_))
        ));
        assert_eq!(sequencer.state(), SequencerState::Failed);
        assert!(matches!(
            sequencer.abort(&CommandBatch::new("abort")),
            Err(SequencerError::Connection(_))
        ));
        sequencer.close().unwrap();
    }
}
