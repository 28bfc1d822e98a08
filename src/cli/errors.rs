//! CLI-specific error types
//!
//! Every CLI error ends the process with exit code 1 and is printed as
//! `<CODE>: <message>`.

use std::fmt;
use std::io;

use crate::config::ConfigError;
use crate::coordinator::CoordinatorError;
use crate::recovery::PositionError;

/// CLI error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (stdout, log file)
    IoError,
    /// Position file could not be read or written
    PositionError,
    /// Argument accepted by the parser but semantically invalid
    InvalidArgument,
    /// A simulated transaction failed to commit
    CommitFailed,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "CERT_CLI_CONFIG_ERROR",
            Self::IoError => "CERT_CLI_IO_ERROR",
            Self::PositionError => "CERT_CLI_POSITION_ERROR",
            Self::InvalidArgument => "CERT_CLI_INVALID_ARGUMENT",
            Self::CommitFailed => "CERT_CLI_COMMIT_FAILED",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::InvalidArgument, msg)
    }

    pub fn code(&self) -> CliErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::new(CliErrorCode::ConfigError, format!("{} ({})", e, e.code()))
    }
}

impl From<PositionError> for CliError {
    fn from(e: PositionError) -> Self {
        Self::new(CliErrorCode::PositionError, format!("{} ({})", e, e.code()))
    }
}

impl From<CoordinatorError> for CliError {
    fn from(e: CoordinatorError) -> Self {
        Self::new(CliErrorCode::CommitFailed, format!("{} ({})", e, e.code()))
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
