//! Position file errors
//!
//! All of these are FATAL at startup: a node that cannot tell where it
//! stopped must not rejoin with a guessed position.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::provider::PositionParseError;

pub type PositionResult<T> = Result<T, PositionError>;

#[derive(Debug, Error)]
pub enum PositionError {
    #[error("position file I/O failed at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("corrupt position file {}: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: PositionParseError,
    },
}

impl PositionError {
    pub fn code(&self) -> &'static str {
        match self {
            PositionError::Io { .. } => "CERT_POSITION_IO",
            PositionError::Corrupt { .. } => "CERT_POSITION_CORRUPT",
        }
    }

    pub(crate) fn io(path: &std::path::Path, source: io::Error) -> Self {
        PositionError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
