//! # Starmill Core
//!
//! Core types, errors, and synchronization primitives for Starmill.
//! Provides the data model for commands and batches, the connection and
//! sequencer state machines, and the event gate that turns machine link
//! notifications into blocking waits.

pub mod core;
pub mod data;
pub mod error;

pub use self::core::{
    EventGate, EventKind, JobEvent, ListenerSet, MachineListener, MachineListenerHandle,
    ProbeOutcome,
};

pub use data::{Command, CommandBatch, ConnectionState, ProbePosition, SequencerState};

pub use error::{ConnectionError, Error, GateError, ProbeError, Result, SequencerError};
