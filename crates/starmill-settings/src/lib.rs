//! Starmill Settings Crate
//!
//! Handles job configuration: defaults, file loading, and validation.

pub mod config;
pub mod error;

pub use config::{
    CalibrationSettings, ConnectionSettings, FeedSettings, JobConfig, LinkType, MaterialSettings,
    SimulatorSettings, StarSettings, TimeoutSettings,
};
pub use error::{ConfigError, ConfigResult, SettingsError, SettingsResult};
