//! Error types for coedit-core
//!
//! Exit code scheme (shared with the CLI):
//! - 1: validation or configuration error
//! - 2: system error (IO)
//! - 3: not found
//! - 4: invalid state (database, lifecycle)
//! - 5: save failed

use thiserror::Error;

/// Core error type for coedit operations
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Input failed validation
    #[error("Invalid {field}: {message}")]
    ValidationError {
        /// Field that failed validation
        field: String,
        /// What was wrong with it
        message: String,
    },

    /// Configuration is invalid
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Stored or supplied data could not be parsed
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Database errors
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Lifecycle transition not allowed
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// The record write issued by a save failed
    #[error("Save failed: {0}")]
    SaveFailed(String),

    /// Filesystem or other IO failure
    #[error("IO error: {0}")]
    IoError(String),
}

impl Error {
    /// Create a validation error for a named field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Returns the process exit code for this error.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::ValidationError { .. } | Self::InvalidConfig(_) | Self::ParseError(_) => 1,
            Self::IoError(_) => 2,
            Self::NotFound(_) => 3,
            Self::DatabaseError(_) | Self::InvalidTransition(_) => 4,
            Self::SaveFailed(_) => 5,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::DatabaseError(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::ParseError(format!("Failed to parse config: {err}"))
    }
}

/// Result type alias for coedit-core operations
pub type Result<T> = std::result::Result<T, Error>;
