//! Job error types

use serde::Serialize;
use starmill_core::Error;
use std::fmt;
use thiserror::Error;

/// Job stage a failure is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPhase {
    Connect,
    Home,
    Probe,
    Calibrate,
    Cut,
    Shutdown,
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connect => "connect",
            Self::Home => "home",
            Self::Probe => "probe",
            Self::Calibrate => "calibrate",
            Self::Cut => "cut",
            Self::Shutdown => "shutdown",
        };
        f.write_str(name)
    }
}

/// A failed job run.
#[derive(Error, Debug)]
#[error("{phase} phase failed: {source}")]
pub struct JobError {
    /// The phase that failed.
    pub phase: JobPhase,
    /// The underlying failure.
    #[source]
    pub source: Error,
}

impl JobError {
    pub fn new(phase: JobPhase, source: impl Into<Error>) -> Self {
        Self {
            phase,
            source: source.into(),
        }
    }

    /// Adapter for `map_err`
    pub fn at<E: Into<Error>>(phase: JobPhase) -> impl FnOnce(E) -> Self {
        move |source| Self::new(phase, source)
    }

    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    pub fn is_timeout(&self) -> bool {
        self.source.is_timeout()
    }

    pub fn is_probe_error(&self) -> bool {
        self.source.is_probe_error()
    }
}

/// Result type for job runs
pub type JobResult<T> = std::result::Result<T, JobError>;
