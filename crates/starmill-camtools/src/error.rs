//! Error types for the CAM tools crate.
//!
//! This module provides structured error types for toolpath parameter
//! validation.

use thiserror::Error;

/// Errors that can occur while building a toolpath.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CamToolError {
    /// Invalid parameters were provided to a CAM tool.
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// A parameter validation error occurred.
    #[error("Parameter error: {0}")]
    Parameter(#[from] ParameterError),
}

/// Errors related to CAM tool parameter validation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    /// A parameter value is out of the valid range.
    #[error("Parameter '{name}' out of range: {value} (expected {expected})")]
    OutOfRange {
        name: String,
        value: String,
        expected: String,
    },

    /// A parameter is not a finite number.
    #[error("Parameter '{0}' must be finite")]
    NotFinite(String),
}

/// Result type alias for CAM tool operations.
pub type CamToolResult<T> = Result<T, CamToolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_error_display() {
        let err = ParameterError::OutOfRange {
            name: "points".to_string(),
            value: "2".to_string(),
            expected: ">= 3".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Parameter 'points' out of range: 2 (expected >= 3)"
        );

        let wrapped: CamToolError = err.into();
        assert!(matches!(wrapped, CamToolError::Parameter(_)));
    }
}
