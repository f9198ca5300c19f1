//! Event correlation between the machine link and the job sequencer

pub mod event;
pub mod gate;
pub mod listener;

pub use event::{EventKind, JobEvent, ProbeOutcome};
pub use gate::EventGate;
pub use listener::{ListenerSet, MachineListener, MachineListenerHandle};
