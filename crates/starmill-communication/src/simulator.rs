//! Simulated machine link
//!
//! Behaves like a GRBL controller that accepts every command: it announces
//! itself after opening, acknowledges batches and homing after a short
//! latency, and answers each `G38.2` probing move with a `[PRB:...]` line.
//! Notifications come from a worker thread, just like a real link.
//!
//! Failure modes can be switched on through [`SimulatorConfig`] to exercise
//! the job's error paths without hardware.

use crate::communication::MachineLink;
use crate::firmware::grbl::{alarm_description, error_description};
use parking_lot::Mutex;
use starmill_core::{
    CommandBatch, ConnectionError, ListenerSet, MachineListener, MachineListenerHandle,
};
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const VERSION_BANNER: &str = "Grbl 1.1h ['$' for help]";
const UNLOCK_BANNER: &str = "[MSG:'$H'|'$X' to unlock]";

/// Probe-failure alarm raised when a probing move finds no contact.
const PROBE_FAIL_ALARM: u8 = 5;

/// Behaviour of a [`SimulatedLink`]
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Machine Z where the simulated probe touches the plate (mm)
    pub probe_z: f64,
    /// Whether probing moves make contact
    pub probe_triggers: bool,
    /// Whether probing moves print a `[PRB:...]` line at all
    pub report_probe: bool,
    /// Delay before each notification
    pub latency: Duration,
    /// Stop acknowledging after this many batches
    pub stall_after_batches: Option<usize>,
    /// Reject commands starting with this text with `error:20`
    pub reject_prefix: Option<String>,
    /// Refuse to open
    pub fail_open: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            probe_z: -105.123,
            probe_triggers: true,
            report_probe: true,
            latency: Duration::from_millis(5),
            stall_after_batches: None,
            reject_prefix: None,
            fail_open: false,
        }
    }
}

/// Everything a [`SimulatedLink`] was asked to do. Cheap to clone; clones
/// share the same record.
#[derive(Debug, Clone, Default)]
pub struct SimulatorHistory {
    inner: Arc<Mutex<HistoryRecord>>,
}

#[derive(Debug, Default)]
struct HistoryRecord {
    batches: Vec<CommandBatch>,
    homing_requests: usize,
    opens: usize,
    closes: usize,
}

impl SimulatorHistory {
    /// Batches in submission order
    pub fn batches(&self) -> Vec<CommandBatch> {
        self.inner.lock().batches.clone()
    }

    /// Labels of submitted batches in order
    pub fn labels(&self) -> Vec<String> {
        self.inner
            .lock()
            .batches
            .iter()
            .map(|b| b.label().to_string())
            .collect()
    }

    /// Every submitted command line, flattened in order
    pub fn lines(&self) -> Vec<String> {
        self.inner
            .lock()
            .batches
            .iter()
            .flat_map(|b| b.lines().map(str::to_string).collect::<Vec<_>>())
            .collect()
    }

    pub fn homing_requests(&self) -> usize {
        self.inner.lock().homing_requests
    }

    pub fn opens(&self) -> usize {
        self.inner.lock().opens
    }

    pub fn closes(&self) -> usize {
        self.inner.lock().closes
    }
}

enum SimRequest {
    Batch { sequence: u64, batch: CommandBatch },
    Abort { sequence: u64, batch: CommandBatch },
    Home,
    Shutdown,
}

struct Worker {
    requests: Sender<SimRequest>,
    handle: JoinHandle<()>,
}

/// Machine link backed by an in-process controller simulation.
pub struct SimulatedLink {
    config: SimulatorConfig,
    listeners: ListenerSet,
    history: SimulatorHistory,
    worker: Option<Worker>,
}

impl SimulatedLink {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            config,
            listeners: ListenerSet::new(),
            history: SimulatorHistory::default(),
            worker: None,
        }
    }

    /// Handle on the record of submitted work; stays valid after the link
    /// is moved into a sequencer.
    pub fn history(&self) -> SimulatorHistory {
        self.history.clone()
    }

    fn send(&self, request: SimRequest) -> Result<(), ConnectionError> {
        let worker = self.worker.as_ref().ok_or(ConnectionError::NotOpen)?;
        worker
            .requests
            .send(request)
            .map_err(|_| ConnectionError::ConnectionLost {
                reason: "simulator stopped".to_string(),
            })
    }
}

impl Default for SimulatedLink {
    fn default() -> Self {
        Self::new(SimulatorConfig::default())
    }
}

impl MachineLink for SimulatedLink {
    fn name(&self) -> &str {
        "simulator"
    }

    fn open(&mut self, port: &str, _baud_rate: u32) -> Result<(), ConnectionError> {
        if self.worker.is_some() {
            return Err(ConnectionError::AlreadyOpen);
        }
        if self.config.fail_open {
            return Err(ConnectionError::FailedToOpen {
                port: port.to_string(),
                reason: "simulated open failure".to_string(),
            });
        }

        let (requests, receiver) = mpsc::channel();
        let controller = SimulatedController {
            config: self.config.clone(),
            listeners: self.listeners.clone(),
            history: self.history.clone(),
            requests: receiver,
            backlog: VecDeque::new(),
            position: [0.0; 3],
            batches_seen: 0,
        };

        self.listeners.notify(|l| l.on_link_opened());
        let handle = thread::Builder::new()
            .name("simulated-controller".to_string())
            .spawn(move || controller.run())?;

        self.history.inner.lock().opens += 1;
        self.worker = Some(Worker { requests, handle });
        tracing::info!(port, "Opened simulated link");
        Ok(())
    }

    fn close(&mut self) -> Result<(), ConnectionError> {
        let Some(worker) = self.worker.take() else {
            return Err(ConnectionError::NotOpen);
        };
        let _ = worker.requests.send(SimRequest::Shutdown);
        if worker.handle.join().is_err() {
            tracing::error!("Simulated controller thread panicked");
        }
        self.history.inner.lock().closes += 1;
        tracing::info!("Closed simulated link");
        self.listeners.notify(|l| l.on_link_closed());
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.worker.is_some()
    }

    fn submit_batch(
        &mut self,
        sequence: u64,
        batch: &CommandBatch,
    ) -> Result<(), ConnectionError> {
        self.send(SimRequest::Batch {
            sequence,
            batch: batch.clone(),
        })
    }

    fn abort(&mut self, sequence: u64, batch: &CommandBatch) -> Result<(), ConnectionError> {
        self.send(SimRequest::Abort {
            sequence,
            batch: batch.clone(),
        })
    }

    fn request_homing(&mut self) -> Result<(), ConnectionError> {
        self.send(SimRequest::Home)
    }

    fn register_listener(&mut self, listener: Arc<dyn MachineListener>) -> MachineListenerHandle {
        self.listeners.register(listener)
    }

    fn unregister_listener(&mut self, handle: &MachineListenerHandle) {
        self.listeners.unregister(handle);
    }
}

impl Drop for SimulatedLink {
    fn drop(&mut self) {
        if self.worker.is_some() {
            let _ = self.close();
        }
    }
}

struct SimulatedController {
    config: SimulatorConfig,
    listeners: ListenerSet,
    history: SimulatorHistory,
    requests: Receiver<SimRequest>,
    backlog: VecDeque<SimRequest>,
    position: [f64; 3],
    batches_seen: usize,
}

impl SimulatedController {
    fn run(mut self) {
        self.pause();
        self.message(VERSION_BANNER);
        self.message(UNLOCK_BANNER);

        while let Some(request) = self.next_request() {
            match request {
                SimRequest::Batch { sequence, batch } | SimRequest::Abort { sequence, batch } => {
                    self.execute(sequence, &batch)
                }
                SimRequest::Home => self.home(),
                SimRequest::Shutdown => break,
            }
        }
    }

    fn next_request(&mut self) -> Option<SimRequest> {
        self.backlog
            .pop_front()
            .or_else(|| self.requests.recv().ok())
    }

    /// Move requests that arrived while busy into the backlog. Returns true
    /// when one of them supersedes the work in progress.
    fn interrupted(&mut self) -> bool {
        let mut interrupted = false;
        while let Ok(request) = self.requests.try_recv() {
            if matches!(request, SimRequest::Abort { .. } | SimRequest::Shutdown) {
                if !self.backlog.is_empty() {
                    tracing::debug!(dropped = self.backlog.len(), "Discarding queued work");
                }
                self.backlog.clear();
                interrupted = true;
            }
            self.backlog.push_back(request);
        }
        interrupted
    }

    fn pause(&self) {
        if !self.config.latency.is_zero() {
            thread::sleep(self.config.latency);
        }
    }

    fn message(&self, line: &str) {
        self.listeners.notify(|l| l.on_message(line));
    }

    fn home(&mut self) {
        self.history.inner.lock().homing_requests += 1;
        self.pause();
        if self.interrupted() {
            return;
        }
        self.position = [0.0; 3];
        self.listeners.notify(|l| l.on_homing_complete());
    }

    fn execute(&mut self, sequence: u64, batch: &CommandBatch) {
        self.history.inner.lock().batches.push(batch.clone());
        self.batches_seen += 1;

        if let Some(limit) = self.config.stall_after_batches {
            if self.batches_seen > limit {
                tracing::debug!(label = batch.label(), "Simulated controller stalled");
                return;
            }
        }

        for line in batch.lines() {
            if self.interrupted() {
                tracing::debug!(sequence, label = batch.label(), "Batch superseded");
                return;
            }

            if let Some(prefix) = &self.config.reject_prefix {
                if line.starts_with(prefix.as_str()) {
                    let message = format!("error:20 {}", error_description(20));
                    self.pause();
                    self.listeners.notify(|l| l.on_error(line, &message));
                    return;
                }
            }

            for (axis, letter) in ['X', 'Y', 'Z'].into_iter().enumerate() {
                if let Some(value) = axis_word(line, letter) {
                    self.position[axis] = value;
                }
            }

            if line.starts_with("G38.2") && !self.probe() {
                return;
            }
        }

        self.pause();
        if self.interrupted() {
            tracing::debug!(sequence, label = batch.label(), "Batch superseded");
            return;
        }
        self.listeners.notify(|l| l.on_batch_complete(sequence));
    }

    /// Report a probing move. Returns false when the batch must stop.
    ///
    /// Like GRBL 1.1, a move without contact raises the alarm first and
    /// reports the probe parameters afterwards.
    fn probe(&mut self) -> bool {
        if !self.config.report_probe {
            return true;
        }

        let [x, y, target] = self.position;
        if !self.config.probe_triggers {
            let description = alarm_description(PROBE_FAIL_ALARM);
            self.listeners
                .notify(|l| l.on_alarm(PROBE_FAIL_ALARM, description));
            self.message(&format!("[PRB:{:.3},{:.3},{:.3}:0]", x, y, target));
            return false;
        }

        self.position[2] = self.config.probe_z;
        self.message(&format!("[PRB:{:.3},{:.3},{:.3}:1]", x, y, self.config.probe_z));
        true
    }
}

/// Value of the first `letter` word in a command line, e.g. `Z-105` in
/// `G38.2Z-105 F800`.
fn axis_word(line: &str, letter: char) -> Option<f64> {
    let start = line.find(letter)? + 1;
    let rest = &line[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(rest.len());
    rest[..end].parse().ok()
}
