//! Machine link listener interface
//!
//! Defines the callbacks a machine link invokes from its own thread, and a
//! small registry links use to fan notifications out to listeners.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Handle for a registered machine listener.
///
/// Uniquely identifies a listener subscription. Can be used to unsubscribe
/// from link notifications.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MachineListenerHandle(pub String);

/// Listener trait for machine link notifications
///
/// Every method is called from the link's notification thread, never from
/// the thread that submitted the work.
pub trait MachineListener: Send + Sync {
    /// The transport was opened; the controller has not announced itself yet
    fn on_link_opened(&self) {}

    /// A free-text line from the controller that is not an acknowledgement
    fn on_message(&self, _line: &str) {}

    /// The homing cycle finished
    fn on_homing_complete(&self) {}

    /// Every command of the batch submitted under `sequence` was acknowledged
    fn on_batch_complete(&self, _sequence: u64) {}

    /// The controller rejected a command
    fn on_error(&self, _command: &str, _message: &str) {}

    /// The controller raised an alarm
    fn on_alarm(&self, _code: u8, _description: &str) {}

    /// The transport dropped unexpectedly
    fn on_link_lost(&self, _reason: &str) {}

    /// The transport was closed on request
    fn on_link_closed(&self) {}
}

/// Registry of listeners shared between a link and its notification thread.
#[derive(Clone, Default)]
pub struct ListenerSet {
    listeners: Arc<RwLock<HashMap<String, Arc<dyn MachineListener>>>>,
}

impl ListenerSet {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener
    pub fn register(&self, listener: Arc<dyn MachineListener>) -> MachineListenerHandle {
        let id = Uuid::new_v4().to_string();
        let handle = MachineListenerHandle(id.clone());
        self.listeners.write().insert(id, listener);
        handle
    }

    /// Remove a listener; unknown handles are ignored
    pub fn unregister(&self, handle: &MachineListenerHandle) {
        let _ = self.listeners.write().remove(&handle.0);
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// Whether no listener is registered
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Invoke `f` on every listener.
    ///
    /// The registry lock is released before any callback runs so a listener
    /// may register or unregister from inside a callback.
    pub fn notify(&self, f: impl Fn(&dyn MachineListener)) {
        let snapshot: Vec<Arc<dyn MachineListener>> =
            self.listeners.read().values().cloned().collect();
        for listener in snapshot {
            f(listener.as_ref());
        }
    }
}

impl std::fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSet")
            .field("listeners", &self.len())
            .finish()
    }
}
