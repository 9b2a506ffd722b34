//! Error types and handling for Landau
//!
//! This module defines the error types used throughout the application,
//! providing consistent error handling and reporting. Precondition violations
//! (`InvalidCommand`, `InvalidCharging`) are raised before anything is queued
//! or mutated; simulated execution failures are command statuses, not errors.

use crate::safety::CommandRejection;
use thiserror::Error;

/// Result type alias for Landau operations
pub type Result<T> = std::result::Result<T, LandauError>;

/// Main error type for Landau
#[derive(Debug, Error)]
pub enum LandauError {
    /// A remote command failed validation against the current vehicle state
    #[error("Invalid command: {reason}")]
    InvalidCommand { reason: CommandRejection },

    /// A charging request failed validation
    #[error("Invalid charging request: {message}")]
    InvalidCharging { message: String },

    /// Stop requested while nothing is charging
    #[error("No active charging session")]
    NoActiveSession,

    /// Lookup of an unknown command, schedule or session
    #[error("Not found: {what}")]
    NotFound { what: String },

    /// Operation conflicts with the current state of a resource
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// HTTP/Web server errors
    #[error("Web server error: {message}")]
    Web { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Timeout errors
    #[error("Timeout error: {message}")]
    Timeout { message: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl LandauError {
    /// Create a new invalid-command error
    pub fn invalid_command(reason: CommandRejection) -> Self {
        LandauError::InvalidCommand { reason }
    }

    /// Create a new invalid-charging error
    pub fn invalid_charging<S: Into<String>>(message: S) -> Self {
        LandauError::InvalidCharging {
            message: message.into(),
        }
    }

    /// Create a new not-found error
    pub fn not_found<S: Into<String>>(what: S) -> Self {
        LandauError::NotFound { what: what.into() }
    }

    /// Create a new conflict error
    pub fn conflict<S: Into<String>>(message: S) -> Self {
        LandauError::Conflict {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        LandauError::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        LandauError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new web error
    pub fn web<S: Into<String>>(message: S) -> Self {
        LandauError::Web {
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        LandauError::Io {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        LandauError::Timeout {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        LandauError::Generic {
            message: message.into(),
        }
    }

    /// Whether the caller can fix the request and retry (maps to a 4xx)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            LandauError::InvalidCommand { .. }
                | LandauError::InvalidCharging { .. }
                | LandauError::NoActiveSession
                | LandauError::NotFound { .. }
                | LandauError::Conflict { .. }
                | LandauError::Validation { .. }
        )
    }
}

impl From<CommandRejection> for LandauError {
    fn from(reason: CommandRejection) -> Self {
        LandauError::invalid_command(reason)
    }
}

impl From<std::io::Error> for LandauError {
    fn from(err: std::io::Error) -> Self {
        LandauError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for LandauError {
    fn from(err: serde_yaml::Error) -> Self {
        LandauError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for LandauError {
    fn from(err: serde_json::Error) -> Self {
        LandauError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<chrono::ParseError> for LandauError {
    fn from(err: chrono::ParseError) -> Self {
        LandauError::validation("datetime", err.to_string())
    }
}
