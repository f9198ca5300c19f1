//! Machine link interface
//!
//! A machine link owns the transport to one controller. Work submitted to it
//! is fire-and-forget; completion is reported asynchronously through the
//! registered [`MachineListener`]s from the link's own thread.

pub mod serial;

use starmill_core::{CommandBatch, ConnectionError, MachineListener, MachineListenerHandle};
use std::sync::Arc;

/// Transport to a single machine controller.
pub trait MachineLink: Send {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Open the transport. The controller announces itself later through
    /// a listener message.
    fn open(&mut self, port: &str, baud_rate: u32) -> Result<(), ConnectionError>;

    /// Close the transport and stop notifying listeners.
    fn close(&mut self) -> Result<(), ConnectionError>;

    /// Whether the transport is open
    fn is_open(&self) -> bool;

    /// Queue a batch for streaming. Completion is reported once through
    /// [`MachineListener::on_batch_complete`] carrying `sequence`.
    fn submit_batch(
        &mut self,
        sequence: u64,
        batch: &CommandBatch,
    ) -> Result<(), ConnectionError>;

    /// Drop all queued and unfinished work, then stream `batch`. Work that
    /// was dropped is never reported complete.
    fn abort(&mut self, sequence: u64, batch: &CommandBatch) -> Result<(), ConnectionError>;

    /// Start a homing cycle. Completion is reported through
    /// [`MachineListener::on_homing_complete`].
    fn request_homing(&mut self) -> Result<(), ConnectionError>;

    /// Register a listener for link notifications
    fn register_listener(&mut self, listener: Arc<dyn MachineListener>) -> MachineListenerHandle;

    /// Unregister a listener
    fn unregister_listener(&mut self, handle: &MachineListenerHandle);
}
