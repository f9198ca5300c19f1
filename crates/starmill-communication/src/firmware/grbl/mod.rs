//! GRBL firmware support
//!
//! Line classification, probe result parsing, and the serial link that
//! streams command batches to a GRBL controller.

pub mod link;
pub mod probe_parser;
pub mod response_parser;

pub use link::{GrblLink, GrblLinkConfig};
pub use probe_parser::ProbeResultParser;
pub use response_parser::{
    alarm_description, error_description, is_unlock_banner, GrblResponse, GrblResponseParser,
};
