//! Write-set streaming errors
//!
//! Codes:
//! - CERT_WRITESET_SIZE_LIMIT (ERROR)
//! - CERT_WRITESET_CACHE_REINIT (FATAL)
//! - CERT_WRITESET_CACHE_READ (FATAL)
//! - CERT_WRITESET_CACHE_WRITE (FATAL)
//! - CERT_WRITESET_PROVIDER_APPEND (ERROR)
//! - CERT_WRITESET_DUMP (ERROR)
//!
//! FATAL here means fatal to the current drain, not to the process. None
//! of these are retried: the caller decides whether to re-run the whole
//! transaction.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::observability::Severity;
use crate::provider::ProviderStatus;

/// Result type for write-set operations
pub type WriteSetResult<T> = Result<T, WriteSetError>;

/// Write-set streaming errors
#[derive(Debug, Error)]
pub enum WriteSetError {
    /// Bytes drained in one call exceeded the configured maximum
    #[error("transaction size limit ({limit}) exceeded: {size}")]
    SizeLimitExceeded { limit: u64, size: u64 },

    /// Staging cache could not be positioned for reading
    #[error("failed to initialize staging cache for read at offset {offset}: {source}")]
    CacheReinit {
        offset: u64,
        #[source]
        source: io::Error,
    },

    /// Staging cache refill failed
    #[error("failed to read staging cache: {0}")]
    CacheRead(#[source] io::Error),

    /// Appending an event to the staging cache failed
    #[error("failed to write staging cache: {0}")]
    CacheWrite(#[source] io::Error),

    /// Provider returned a non-success status for an append
    #[error("provider append failed: {status}")]
    ProviderAppend { status: ProviderStatus },

    /// Rejected write-set could not be written to disk
    #[error("failed to dump write-set to {}: {source}", .path.display())]
    Dump {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl WriteSetError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            WriteSetError::SizeLimitExceeded { .. } => "CERT_WRITESET_SIZE_LIMIT",
            WriteSetError::CacheReinit { .. } => "CERT_WRITESET_CACHE_REINIT",
            WriteSetError::CacheRead(_) => "CERT_WRITESET_CACHE_READ",
            WriteSetError::CacheWrite(_) => "CERT_WRITESET_CACHE_WRITE",
            WriteSetError::ProviderAppend { .. } => "CERT_WRITESET_PROVIDER_APPEND",
            WriteSetError::Dump { .. } => "CERT_WRITESET_DUMP",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            WriteSetError::CacheReinit { .. }
            | WriteSetError::CacheRead(_)
            | WriteSetError::CacheWrite(_) => Severity::Fatal,
            _ => Severity::Error,
        }
    }

    /// Whether the error came from the staging cache rather than the
    /// destination or the size check
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            WriteSetError::CacheReinit { .. }
                | WriteSetError::CacheRead(_)
                | WriteSetError::CacheWrite(_)
                | WriteSetError::Dump { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_limit_message_carries_both_numbers() {
        let err = WriteSetError::SizeLimitExceeded { limit: 10, size: 11 };
        assert_eq!(err.to_string(), "transaction size limit (10) exceeded: 11");
        assert_eq!(err.code(), "CERT_WRITESET_SIZE_LIMIT");
        assert_eq!(err.severity(), Severity::Error);
        assert!(!err.is_io());
    }

    #[test]
    fn test_cache_errors_are_fatal_io() {
        let err = WriteSetError::CacheReinit {
            offset: 3,
            source: io::Error::new(io::ErrorKind::Other, "seek failed"),
        };
        assert_eq!(err.severity(), Severity::Fatal);
        assert!(err.is_io());
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_provider_append_code() {
        let err = WriteSetError::ProviderAppend {
            status: ProviderStatus::ConnectionFail,
        };
        assert_eq!(err.code(), "CERT_WRITESET_PROVIDER_APPEND");
        assert!(err.to_string().contains("ConnectionFail(6)"));
    }
}
