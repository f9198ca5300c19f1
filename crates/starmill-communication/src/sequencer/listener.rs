//! Bridge from machine link notifications to the event gate.

use crate::firmware::grbl::{is_unlock_banner, ProbeResultParser};
use starmill_core::{ConnectionState, EventGate, JobEvent, MachineListener};
use std::sync::Arc;

/// Translates link notifications into gate signals and faults.
///
/// Runs on the link's notification thread. It never blocks: every callback
/// only records state in the gate and wakes the waiting thread.
pub struct GateListener {
    gate: Arc<EventGate>,
    probe_parser: ProbeResultParser,
}

impl GateListener {
    pub fn new(gate: Arc<EventGate>) -> Self {
        Self {
            gate,
            probe_parser: ProbeResultParser::new(),
        }
    }
}

impl MachineListener for GateListener {
    fn on_link_opened(&self) {
        self.gate.mark_connecting();
    }

    fn on_message(&self, line: &str) {
        if is_unlock_banner(line) {
            tracing::info!("Controller ready");
            self.gate.signal(JobEvent::Connected);
            return;
        }

        if let Some(outcome) = self.probe_parser.parse(line) {
            match &outcome {
                Ok(position) => tracing::info!(%position, "Probe contact"),
                Err(e) => tracing::warn!(error = %e, "Probe result without position"),
            }
            self.gate.signal(JobEvent::ProbeMeasurement(outcome));
        }
    }

    fn on_homing_complete(&self) {
        self.gate.signal(JobEvent::HomingComplete);
    }

    fn on_batch_complete(&self, sequence: u64) {
        self.gate.signal(JobEvent::BatchComplete(sequence));
    }

    fn on_error(&self, command: &str, message: &str) {
        self.gate
            .fault(format!("command '{}' rejected: {}", command, message));
    }

    fn on_alarm(&self, code: u8, description: &str) {
        self.gate.fault(format!("ALARM:{} {}", code, description));
    }

    fn on_link_lost(&self, reason: &str) {
        self.gate.set_connection_state(ConnectionState::Disconnected);
        self.gate.fault(format!("connection lost: {}", reason));
    }

    fn on_link_closed(&self) {
        self.gate.set_connection_state(ConnectionState::Closed);
    }
}
