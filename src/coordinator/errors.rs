//! Group-commit coordinator errors
//!
//! Codes:
//! - CERT_WRITESET_* (see writeset errors), raised before registration
//! - CERT_COORDINATOR_CERTIFICATION_ABORTED (ERROR), never registered
//! - CERT_COORDINATOR_CANCELLED (ERROR), aborted while waiting its turn
//! - CERT_COORDINATOR_LOCAL_COMMIT (FATAL), after certification

use thiserror::Error;

use crate::observability::Severity;
use crate::trx::TrxId;
use crate::writeset::WriteSetError;

/// Result type for coordinator operations
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// Streaming the write-set to the provider failed
    #[error(transparent)]
    WriteSet(#[from] WriteSetError),

    /// The provider rejected the transaction
    #[error("transaction {trx} aborted by certification")]
    CertificationAborted { trx: TrxId },

    /// Another thread aborted the transaction while it waited
    #[error("transaction {trx} cancelled before commit")]
    Cancelled { trx: TrxId },

    /// Local commit failed after certification succeeded
    #[error("local commit of transaction {trx} failed: {message}")]
    LocalCommit { trx: TrxId, message: String },
}

impl CoordinatorError {
    pub fn code(&self) -> &'static str {
        match self {
            CoordinatorError::WriteSet(e) => e.code(),
            CoordinatorError::CertificationAborted { .. } => {
                "CERT_COORDINATOR_CERTIFICATION_ABORTED"
            }
            CoordinatorError::Cancelled { .. } => "CERT_COORDINATOR_CANCELLED",
            CoordinatorError::LocalCommit { .. } => "CERT_COORDINATOR_LOCAL_COMMIT",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            CoordinatorError::WriteSet(e) => e.severity(),
            CoordinatorError::LocalCommit { .. } => Severity::Fatal,
            _ => Severity::Error,
        }
    }

    /// Whether the provider had certified the transaction and assigned it
    /// a seqno before the failure. Streaming failures and certification
    /// aborts happen before that point.
    pub fn after_certification(&self) -> bool {
        matches!(
            self,
            CoordinatorError::Cancelled { .. } | CoordinatorError::LocalCommit { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_set_codes_pass_through() {
        let err: CoordinatorError = WriteSetError::SizeLimitExceeded { limit: 1, size: 2 }.into();
        assert_eq!(err.code(), "CERT_WRITESET_SIZE_LIMIT");
        assert_eq!(err.to_string(), "transaction size limit (1) exceeded: 2");
        assert!(!err.after_certification());
    }

    #[test]
    fn test_local_commit_is_fatal() {
        let err = CoordinatorError::LocalCommit {
            trx: TrxId::new(4),
            message: "disk full".to_string(),
        };
        assert_eq!(err.severity(), Severity::Fatal);
        assert!(err.after_certification());
        assert_eq!(
            err.to_string(),
            "local commit of transaction 4 failed: disk full"
        );
    }

    #[test]
    fn test_after_certification_per_variant() {
        let trx = TrxId::new(7);
        let cases = vec![
            (
                CoordinatorError::from(WriteSetError::SizeLimitExceeded { limit: 1, size: 2 }),
                false,
            ),
            (CoordinatorError::CertificationAborted { trx }, false),
            (CoordinatorError::Cancelled { trx }, true),
            (
                CoordinatorError::LocalCommit {
                    trx,
                    message: "engine refused".to_string(),
                },
                true,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.after_certification(), expected, "{}", err.code());
        }
    }
}
