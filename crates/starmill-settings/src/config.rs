//! Job configuration for Starmill
//!
//! Provides the configuration for one machining job and its loading and
//! validation. Supports JSON and TOML file formats.
//!
//! Configuration is organized into logical sections:
//! - Connection settings (link type, port, baud rate)
//! - Timeouts for every blocking wait
//! - Calibration constants for the probed work origin
//! - Material, star geometry, and feed settings
//! - Simulator behaviour for dry runs
//!
//! Every section has defaults that reproduce the standard star job, so an
//! empty file is a valid configuration.

use crate::error::{ConfigError, ConfigResult, SettingsError, SettingsResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Machine link implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    /// GRBL controller over a serial/USB port
    #[default]
    Serial,
    /// In-process simulated controller
    Simulated,
}

impl std::fmt::Display for LinkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serial => write!(f, "serial"),
            Self::Simulated => write!(f, "simulated"),
        }
    }
}

/// Connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Link implementation
    pub link: LinkType,
    /// Serial port name
    pub port: String,
    /// Baud rate for serial connections
    pub baud_rate: u32,
    /// Serial read timeout in milliseconds; bounds the I/O loop's poll interval
    pub read_timeout_ms: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            link: LinkType::Serial,
            port: "/dev/ttyACM0".to_string(),
            baud_rate: 115200,
            read_timeout_ms: 50,
        }
    }
}

/// Bounds for every blocking wait, in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    /// Wait for the controller to announce itself
    pub connect_ms: u64,
    /// Wait for the homing cycle
    pub homing_ms: u64,
    /// Wait for any command batch
    pub batch_ms: u64,
    /// Wait for the abort shutdown batch
    pub abort_ms: u64,
    /// Pause before closing the link
    pub settle_ms: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            connect_ms: 30_000,
            homing_ms: 60_000,
            batch_ms: 120_000,
            abort_ms: 10_000,
            settle_ms: 5_000,
        }
    }
}

impl TimeoutSettings {
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn homing(&self) -> Duration {
        Duration::from_millis(self.homing_ms)
    }

    pub fn batch(&self) -> Duration {
        Duration::from_millis(self.batch_ms)
    }

    pub fn abort(&self) -> Duration {
        Duration::from_millis(self.abort_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// Work origin calibration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationSettings {
    /// Height of the probe contact point above the material surface (mm)
    pub probe_offset: f64,
    /// X of the work origin after calibration
    pub origin_x: f64,
    /// Y of the work origin after calibration
    pub origin_y: f64,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            probe_offset: 1.045,
            origin_x: 220.0,
            origin_y: 205.0,
        }
    }
}

/// Stock material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialSettings {
    /// Material thickness (mm)
    pub thickness: f64,
    /// Number of cutting passes
    pub passes: u32,
    /// Height above the material for the safe start position (mm)
    pub clearance: f64,
}

impl Default for MaterialSettings {
    fn default() -> Self {
        Self {
            thickness: 25.4 / 8.0,
            passes: 7,
            clearance: 1.0,
        }
    }
}

/// Star outline geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StarSettings {
    pub points: u32,
    pub inner_radius: f64,
    pub outer_radius: f64,
    /// Translation applied to both X and Y
    pub center_offset: f64,
}

impl Default for StarSettings {
    fn default() -> Self {
        Self {
            points: 9,
            inner_radius: 50.0,
            outer_radius: 90.0,
            center_offset: 100.0,
        }
    }
}

/// Feeds and speeds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    /// Z feed rate when stepping down to a pass depth (mm/min)
    pub plunge_rate: f64,
    /// XY feed rate while tracing the outline (mm/min)
    pub cut_rate: f64,
    /// Spindle speed (RPM)
    pub spindle_rpm: f64,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            plunge_rate: 355.6,
            cut_rate: 1117.6,
            spindle_rpm: 9000.0,
        }
    }
}

/// Simulated controller behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorSettings {
    /// Z reported by every probe
    pub probe_z: f64,
    /// Whether probes make contact
    pub probe_triggers: bool,
    /// Delay before each notification (ms)
    pub latency_ms: u64,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            probe_z: -105.123,
            probe_triggers: true,
            latency_ms: 5,
        }
    }
}

/// Complete configuration for one job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub connection: ConnectionSettings,
    pub timeouts: TimeoutSettings,
    pub calibration: CalibrationSettings,
    pub material: MaterialSettings,
    pub star: StarSettings,
    pub feeds: FeedSettings,
    pub simulator: SimulatorSettings,
}

impl JobConfig {
    /// Load and validate a configuration file, choosing the format by extension.
    pub fn load(path: impl AsRef<Path>) -> SettingsResult<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let text = std::fs::read_to_string(path).map_err(|e| SettingsError::LoadError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let config = match extension.as_str() {
            "toml" => Self::from_toml_str(&text)?,
            "json" => Self::from_json_str(&text)?,
            other => return Err(ConfigError::UnsupportedFormat(other.to_string()).into()),
        };

        tracing::info!(
            path = %path.display(),
            link = %config.connection.link,
            "Loaded job configuration"
        );
        Ok(config)
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(text: &str) -> SettingsResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate JSON text
    pub fn from_json_str(text: &str) -> SettingsResult<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value the job depends on.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.connection.port.trim().is_empty() && self.connection.link == LinkType::Serial {
            return Err(ConfigError::out_of_range(
                "connection.port",
                "\"\"",
                "a serial link needs a port",
            ));
        }
        if self.connection.baud_rate == 0 {
            return Err(ConfigError::out_of_range(
                "connection.baud_rate",
                0,
                "must be positive",
            ));
        }

        for (key, value) in [
            ("timeouts.connect_ms", self.timeouts.connect_ms),
            ("timeouts.homing_ms", self.timeouts.homing_ms),
            ("timeouts.batch_ms", self.timeouts.batch_ms),
            ("timeouts.abort_ms", self.timeouts.abort_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::out_of_range(key, value, "must be positive"));
            }
        }

        for (key, value) in [
            ("calibration.probe_offset", self.calibration.probe_offset),
            ("calibration.origin_x", self.calibration.origin_x),
            ("calibration.origin_y", self.calibration.origin_y),
            ("star.center_offset", self.star.center_offset),
            ("material.clearance", self.material.clearance),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::out_of_range(key, value, "must be finite"));
            }
        }

        for (key, value) in [
            ("material.thickness", self.material.thickness),
            ("star.inner_radius", self.star.inner_radius),
            ("feeds.plunge_rate", self.feeds.plunge_rate),
            ("feeds.cut_rate", self.feeds.cut_rate),
            ("feeds.spindle_rpm", self.feeds.spindle_rpm),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::out_of_range(
                    key,
                    value,
                    "must be positive and finite",
                ));
            }
        }

        if self.material.passes == 0 {
            return Err(ConfigError::out_of_range(
                "material.passes",
                0,
                "at least one pass is required",
            ));
        }
        if self.star.points < 3 {
            return Err(ConfigError::out_of_range(
                "star.points",
                self.star.points,
                "must be at least 3",
            ));
        }
        if !(self.star.outer_radius.is_finite() && self.star.outer_radius > self.star.inner_radius)
        {
            return Err(ConfigError::out_of_range(
                "star.outer_radius",
                self.star.outer_radius,
                "must be greater than star.inner_radius",
            ));
        }

        Ok(())
    }
}
