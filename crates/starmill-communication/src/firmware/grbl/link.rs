//! GRBL serial link
//!
//! Owns the serial port on a dedicated I/O thread. Batches are streamed one
//! command at a time: the next line is written only after the controller
//! acknowledged the previous one, so the controller's receive buffer can
//! never overflow. Every notification is delivered from the I/O thread.

use super::response_parser::{
    alarm_description, error_description, GrblResponse, GrblResponseParser,
};
use crate::communication::{serial, MachineLink};
use starmill_core::{
    Command, CommandBatch, ConnectionError, ListenerSet, MachineListener, MachineListenerHandle,
};
use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Homing cycle command
const HOMING_COMMAND: &str = "$H";

/// GRBL link settings
#[derive(Debug, Clone)]
pub struct GrblLinkConfig {
    /// Read timeout of the serial port; bounds how long outgoing requests
    /// wait while the controller is silent
    pub read_timeout: Duration,
}

impl Default for GrblLinkConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(50),
        }
    }
}

enum LinkRequest {
    Batch { sequence: u64, batch: CommandBatch },
    Abort { sequence: u64, batch: CommandBatch },
    Home,
    Shutdown,
}

enum Work {
    Batch {
        sequence: u64,
        label: String,
        commands: VecDeque<Command>,
    },
    Homing,
}

impl Work {
    fn batch(sequence: u64, batch: CommandBatch) -> Self {
        Work::Batch {
            sequence,
            label: batch.label().to_string(),
            commands: batch.commands().iter().cloned().collect(),
        }
    }
}

struct Worker {
    requests: Sender<LinkRequest>,
    handle: JoinHandle<()>,
}

/// Machine link to a GRBL controller over a serial port.
pub struct GrblLink {
    config: GrblLinkConfig,
    listeners: ListenerSet,
    worker: Option<Worker>,
    port_name: Option<String>,
}

impl GrblLink {
    pub fn new(config: GrblLinkConfig) -> Self {
        Self {
            config,
            listeners: ListenerSet::new(),
            worker: None,
            port_name: None,
        }
    }

    fn send(&self, request: LinkRequest) -> Result<(), ConnectionError> {
        let worker = self.worker.as_ref().ok_or(ConnectionError::NotOpen)?;
        worker
            .requests
            .send(request)
            .map_err(|_| ConnectionError::ConnectionLost {
                reason: "I/O thread has stopped".to_string(),
            })
    }
}

impl Default for GrblLink {
    fn default() -> Self {
        Self::new(GrblLinkConfig::default())
    }
}

impl MachineLink for GrblLink {
    fn name(&self) -> &str {
        "grbl"
    }

    fn open(&mut self, port: &str, baud_rate: u32) -> Result<(), ConnectionError> {
        if self.is_open() {
            return Err(ConnectionError::AlreadyOpen);
        }

        let serial_port = serial::open_port(port, baud_rate, self.config.read_timeout)?;
        let (requests, receiver) = mpsc::channel();
        let listeners = self.listeners.clone();

        // Listeners must see the open before the controller's banner.
        self.listeners.notify(|l| l.on_link_opened());
        let handle = thread::Builder::new()
            .name(format!("grbl-io {}", port))
            .spawn(move || IoLoop::new(serial_port, receiver, listeners).run())?;

        tracing::info!(port, baud_rate, "Opened GRBL link");
        self.port_name = Some(port.to_string());
        self.worker = Some(Worker { requests, handle });
        Ok(())
    }

    fn close(&mut self) -> Result<(), ConnectionError> {
        let Some(worker) = self.worker.take() else {
            return Err(ConnectionError::NotOpen);
        };

        let _ = worker.requests.send(LinkRequest::Shutdown);
        if worker.handle.join().is_err() {
            tracing::error!("GRBL I/O thread panicked");
        }

        tracing::info!(port = ?self.port_name.take(), "Closed GRBL link");
        self.listeners.notify(|l| l.on_link_closed());
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }

    fn submit_batch(
        &mut self,
        sequence: u64,
        batch: &CommandBatch,
    ) -> Result<(), ConnectionError> {
        tracing::debug!(
            sequence,
            label = batch.label(),
            commands = batch.len(),
            "Queueing batch"
        );
        self.send(LinkRequest::Batch {
            sequence,
            batch: batch.clone(),
        })
    }

    fn abort(&mut self, sequence: u64, batch: &CommandBatch) -> Result<(), ConnectionError> {
        tracing::warn!(sequence, label = batch.label(), "Aborting queued work");
        self.send(LinkRequest::Abort {
            sequence,
            batch: batch.clone(),
        })
    }

    fn request_homing(&mut self) -> Result<(), ConnectionError> {
        self.send(LinkRequest::Home)
    }

    fn register_listener(&mut self, listener: Arc<dyn MachineListener>) -> MachineListenerHandle {
        self.listeners.register(listener)
    }

    fn unregister_listener(&mut self, handle: &MachineListenerHandle) {
        self.listeners.unregister(handle);
    }
}

impl Drop for GrblLink {
    fn drop(&mut self) {
        if self.worker.is_some() {
            let _ = self.close();
        }
    }
}

/// State owned by the I/O thread.
struct IoLoop {
    port: Box<dyn serialport::SerialPort>,
    requests: Receiver<LinkRequest>,
    listeners: ListenerSet,
    parser: GrblResponseParser,
    queue: VecDeque<Work>,
    current: Option<Work>,
    in_flight: Option<Command>,
    pending: String,
}

impl IoLoop {
    fn new(
        port: Box<dyn serialport::SerialPort>,
        requests: Receiver<LinkRequest>,
        listeners: ListenerSet,
    ) -> Self {
        Self {
            port,
            requests,
            listeners,
            parser: GrblResponseParser::new(),
            queue: VecDeque::new(),
            current: None,
            in_flight: None,
            pending: String::new(),
        }
    }

    fn run(mut self) {
        let mut buf = [0u8; 256];

        loop {
            loop {
                match self.requests.try_recv() {
                    Ok(LinkRequest::Batch { sequence, batch }) => {
                        self.queue.push_back(Work::batch(sequence, batch))
                    }
                    Ok(LinkRequest::Abort { sequence, batch }) => {
                        self.discard_work();
                        self.queue.push_back(Work::batch(sequence, batch));
                    }
                    Ok(LinkRequest::Home) => self.queue.push_back(Work::Homing),
                    Ok(LinkRequest::Shutdown) | Err(TryRecvError::Disconnected) => return,
                    Err(TryRecvError::Empty) => break,
                }
            }

            if let Err(e) = self.send_next() {
                self.link_lost(format!("write failed: {}", e));
                return;
            }

            match self.port.read(&mut buf) {
                Ok(0) => {}
                Ok(n) => {
                    self.pending.push_str(&String::from_utf8_lossy(&buf[..n]));
                    self.drain_lines();
                }
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => {}
                Err(e) => {
                    self.link_lost(format!("read failed: {}", e));
                    return;
                }
            }
        }
    }

    /// Write the next command if nothing is awaiting acknowledgement.
    fn send_next(&mut self) -> std::io::Result<()> {
        if self.in_flight.is_some() {
            return Ok(());
        }
        if self.current.is_none() {
            self.current = self.queue.pop_front();
        }

        let command = match &mut self.current {
            Some(Work::Batch {
                sequence,
                label,
                commands,
            }) => match commands.pop_front() {
                Some(command) => command,
                None => {
                    let sequence = *sequence;
                    tracing::debug!(sequence, label = label.as_str(), "Batch complete");
                    self.current = None;
                    self.listeners.notify(|l| l.on_batch_complete(sequence));
                    return Ok(());
                }
            },
            Some(Work::Homing) => Command::new(HOMING_COMMAND),
            None => return Ok(()),
        };

        tracing::trace!(command = command.as_str(), "Sending");
        self.port.write_all(format!("{}\n", command).as_bytes())?;
        self.port.flush()?;
        self.in_flight = Some(command);
        Ok(())
    }

    fn drain_lines(&mut self) {
        while let Some(end) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=end).collect();
            if let Some(response) = self.parser.parse(&line) {
                self.handle_response(response);
            }
        }
    }

    fn handle_response(&mut self, response: GrblResponse) {
        match response {
            GrblResponse::Ok => {
                if self.in_flight.take().is_none() {
                    tracing::debug!("Unsolicited ok");
                    return;
                }
                if matches!(self.current, Some(Work::Homing)) {
                    self.current = None;
                    tracing::info!("Homing cycle complete");
                    self.listeners.notify(|l| l.on_homing_complete());
                }
                // An exhausted batch is reported by the next send_next call.
            }
            GrblResponse::Error(code) => {
                let command = self
                    .in_flight
                    .take()
                    .map(|c| c.to_string())
                    .unwrap_or_default();
                let message = format!("error:{} {}", code, error_description(code));
                tracing::warn!(command = command.as_str(), %message, "Command rejected");
                self.abandon_current();
                self.listeners.notify(|l| l.on_error(&command, &message));
            }
            GrblResponse::Alarm(code) => {
                let description = alarm_description(code);
                tracing::error!(code, description, "Controller alarm");
                self.in_flight = None;
                self.abandon_current();
                self.listeners.notify(|l| l.on_alarm(code, description));
            }
            GrblResponse::Status(status) => {
                tracing::trace!(status = status.as_str(), "Status report");
            }
            GrblResponse::Version(line)
            | GrblResponse::Feedback(line)
            | GrblResponse::Message(line) => {
                tracing::debug!(line = line.as_str(), "Controller message");
                self.listeners.notify(|l| l.on_message(&line));
            }
        }
    }

    /// Drop queued and unfinished work. A command already written stays in
    /// flight; its acknowledgement is consumed without a notification.
    fn discard_work(&mut self) {
        if !self.queue.is_empty() {
            tracing::warn!(dropped = self.queue.len(), "Discarding queued work");
            self.queue.clear();
        }
        self.abandon_current();
    }

    fn abandon_current(&mut self) {
        match self.current.take() {
            Some(Work::Batch {
                sequence,
                label,
                commands,
            }) => {
                tracing::warn!(
                    sequence,
                    label = label.as_str(),
                    remaining = commands.len(),
                    "Abandoning batch"
                );
            }
            Some(Work::Homing) => tracing::warn!("Abandoning homing cycle"),
            None => {}
        }
    }

    fn link_lost(&mut self, reason: String) {
        tracing::error!(reason = reason.as_str(), "GRBL link lost");
        self.listeners.notify(|l| l.on_link_lost(&reason));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_link_rejects_work() {
        let mut link = GrblLink::default();
        assert!(!link.is_open());
        assert!(matches!(
            link.submit_batch(1, &CommandBatch::from_lines("t", ["G0 X0"])),
            Err(ConnectionError::NotOpen)
        ));
        assert!(matches!(
            link.abort(2, &CommandBatch::from_lines("abort", ["M5"])),
            Err(ConnectionError::NotOpen)
        ));
        assert!(matches!(link.request_homing(), Err(ConnectionError::NotOpen)));
        assert!(matches!(link.close(), Err(ConnectionError::NotOpen)));
    }

    #[test]
    fn test_open_missing_port() {
        let mut link = GrblLink::default();
        let result = link.open("/dev/ttyACM-starmill-missing", 115200);
        assert!(matches!(result, Err(ConnectionError::FailedToOpen { .. })));
        assert!(!link.is_open());
    }
}
