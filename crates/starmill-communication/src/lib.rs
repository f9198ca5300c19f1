//! # Starmill Communication
//!
//! The machine link abstraction and everything that talks through it:
//! GRBL response and probe-result parsing, the serial GRBL link, a
//! simulated link for dry runs, and the command sequencer that turns the
//! link's asynchronous notifications into ordered, blocking steps.

pub mod communication;
pub mod firmware;
pub mod sequencer;
pub mod simulator;

pub use communication::{
    serial::{list_ports, SerialPortInfo},
    MachineLink,
};

pub use firmware::grbl::{
    is_unlock_banner, GrblLink, GrblLinkConfig, GrblResponse, GrblResponseParser,
    ProbeResultParser,
};

pub use sequencer::{CommandSequencer, GateListener, SequencerTimeouts};

pub use simulator::{SimulatedLink, SimulatorConfig, SimulatorHistory};
