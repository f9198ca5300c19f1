//! Event gate
//!
//! Correlates notifications arriving from the machine link's own thread with
//! blocking waits issued by the sequencer. One mutex guards all gate state;
//! each event kind has its own condition variable.
//!
//! Protocol for every operation that completes asynchronously:
//!
//! 1. `arm(kind)` clears any earlier completion of that kind,
//! 2. the operation is issued to the link,
//! 3. `wait_for(kind, timeout)` blocks until a completion is latched.
//!
//! A completion signalled between steps 2 and 3 stays latched, so a fast
//! controller cannot cause a missed wakeup.

use crate::core::event::{EventKind, JobEvent, ProbeOutcome};
use crate::data::ConnectionState;
use crate::error::GateError;
use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct GateState {
    latched: [bool; 4],
    armed: [bool; 4],
    probe: Option<ProbeOutcome>,
    batch_sequence: Option<u64>,
    fault: Option<String>,
    connection: ConnectionState,
}

/// Race-free "wait until this kind of event has occurred" primitive.
#[derive(Debug, Default)]
pub struct EventGate {
    state: Mutex<GateState>,
    conditions: [Condvar; 4],
}

impl EventGate {
    /// Create a new gate with nothing latched
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear any earlier completion of `kind` ahead of issuing the operation
    /// that will signal it. Arming the probe slot also drops the stored
    /// measurement.
    pub fn arm(&self, kind: EventKind) {
        let mut state = self.state.lock();
        Self::arm_slot(&mut state, kind);
    }

    /// Arm the batch slot so that only the completion of batch `sequence`
    /// latches it. Completions of earlier batches are dropped.
    pub fn arm_batch(&self, sequence: u64) {
        let mut state = self.state.lock();
        Self::arm_slot(&mut state, EventKind::BatchComplete);
        state.batch_sequence = Some(sequence);
    }

    fn arm_slot(state: &mut GateState, kind: EventKind) {
        let slot = kind.slot();
        if state.latched[slot] {
            tracing::trace!(%kind, "Discarding stale completion while arming");
        }
        state.latched[slot] = false;
        state.armed[slot] = true;
        match kind {
            EventKind::ProbeMeasurement => state.probe = None,
            EventKind::BatchComplete => state.batch_sequence = None,
            EventKind::Connected | EventKind::HomingComplete => {}
        }
    }

    /// Block until `kind` has been signalled since it was armed, the link
    /// faults, or `timeout` elapses. A successful wait consumes the latch.
    pub fn wait_for(&self, kind: EventKind, timeout: Duration) -> Result<(), GateError> {
        let slot = kind.slot();
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();

        if !state.armed[slot] && !state.latched[slot] {
            tracing::warn!(%kind, "Waiting on an event kind that was never armed");
        }

        loop {
            if state.latched[slot] {
                state.latched[slot] = false;
                state.armed[slot] = false;
                return Ok(());
            }
            if let Some(reason) = state.fault.clone() {
                state.armed[slot] = false;
                return Err(GateError::Faulted { reason });
            }
            if Instant::now() >= deadline {
                state.armed[slot] = false;
                return Err(GateError::TimedOut {
                    kind,
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            // Spurious and early wakeups fall through to the checks above.
            self.conditions[slot].wait_until(&mut state, deadline);
        }
    }

    /// Block until `kind` is latched or `timeout` elapses, ignoring any
    /// recorded fault. Used to collect reports a controller sends after an
    /// alarm. Does not consume the latch.
    pub fn wait_latched(&self, kind: EventKind, timeout: Duration) -> bool {
        let slot = kind.slot();
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while !state.latched[slot] {
            if self.conditions[slot]
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                break;
            }
        }
        state.latched[slot]
    }

    /// Record that an event occurred and wake its waiter. Events nobody is
    /// waiting for stay latched until the next `arm` of that kind.
    pub fn signal(&self, event: JobEvent) {
        let kind = event.kind();
        let slot = kind.slot();
        let mut state = self.state.lock();

        match event {
            JobEvent::Connected => {
                state.connection = ConnectionState::Connected;
            }
            JobEvent::ProbeMeasurement(outcome) => {
                if state.probe.is_some() {
                    tracing::debug!("Replacing unread probe measurement");
                }
                state.probe = Some(outcome);
            }
            JobEvent::BatchComplete(sequence) => {
                if let Some(expected) = state.batch_sequence {
                    if sequence != expected {
                        tracing::debug!(
                            sequence,
                            expected,
                            "Ignoring completion of an earlier batch"
                        );
                        return;
                    }
                }
            }
            JobEvent::HomingComplete => {}
        }

        state.latched[slot] = true;
        tracing::trace!(%kind, armed = state.armed[slot], "Event latched");
        self.conditions[slot].notify_all();
    }

    /// Fail every pending and future wait with `reason` until cleared.
    pub fn fault(&self, reason: impl Into<String>) {
        let reason = reason.into();
        let mut state = self.state.lock();
        tracing::error!(%reason, "Machine link fault");
        if state.fault.is_none() {
            state.fault = Some(reason);
        }
        for condition in &self.conditions {
            condition.notify_all();
        }
    }

    /// Drop a recorded fault so a best-effort shutdown batch can still be awaited.
    pub fn clear_fault(&self) -> Option<String> {
        self.state.lock().fault.take()
    }

    /// The recorded fault, if any
    pub fn fault_reason(&self) -> Option<String> {
        self.state.lock().fault.clone()
    }

    /// Take the probe measurement recorded since the probe slot was armed.
    pub fn take_probe(&self) -> Option<ProbeOutcome> {
        let mut state = self.state.lock();
        let slot = EventKind::ProbeMeasurement.slot();
        state.latched[slot] = false;
        state.armed[slot] = false;
        state.probe.take()
    }

    /// Whether `kind` is currently latched
    pub fn is_latched(&self, kind: EventKind) -> bool {
        self.state.lock().latched[kind.slot()]
    }

    /// Connection state as last reported by the link
    pub fn connection_state(&self) -> ConnectionState {
        self.state.lock().connection
    }

    /// Record that the transport opened. A controller that already
    /// announced itself stays `Connected`.
    pub fn mark_connecting(&self) {
        let mut state = self.state.lock();
        if state.connection == ConnectionState::Connected {
            tracing::debug!("Link reported open after the controller announced itself");
            return;
        }
        state.connection = ConnectionState::Connecting;
    }

    /// Record a connection state change reported by the link
    pub fn set_connection_state(&self, connection: ConnectionState) {
        let mut state = self.state.lock();
        if state.connection != connection {
            tracing::debug!(from = %state.connection, to = %connection, "Connection state changed");
            state.connection = connection;
        }
    }
}
