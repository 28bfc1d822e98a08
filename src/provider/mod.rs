//! Replication provider boundary
//!
//! The provider orders and certifies transactions across the cluster. It
//! is opaque to this crate: we stream write-set bytes into it, ask it to
//! certify, and get back either a global sequence number or an abort.
//! Cluster membership, state transfer and the wire protocol stay on the
//! other side of this trait.

mod position;
mod recording;

pub use position::{GlobalPosition, PositionParseError, Seqno};
pub use recording::RecordingProvider;

use std::fmt;

use crate::trx::TrxId;

/// Status codes returned by provider calls.
///
/// Anything other than `Success` is fatal for the call that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderStatus {
    Success,
    Warning,
    TrxMissing,
    TrxFail,
    BruteForceAbort,
    SizeExceeded,
    ConnectionFail,
    NodeFail,
    Fatal,
    NotImplemented,
    NotAllowed,
}

impl ProviderStatus {
    /// Numeric status as reported by the provider
    pub fn code(&self) -> i32 {
        match self {
            ProviderStatus::Success => 0,
            ProviderStatus::Warning => 1,
            ProviderStatus::TrxMissing => 2,
            ProviderStatus::TrxFail => 3,
            ProviderStatus::BruteForceAbort => 4,
            ProviderStatus::SizeExceeded => 5,
            ProviderStatus::ConnectionFail => 6,
            ProviderStatus::NodeFail => 7,
            ProviderStatus::Fatal => 8,
            ProviderStatus::NotImplemented => 9,
            ProviderStatus::NotAllowed => 10,
        }
    }

    pub fn is_success(&self) -> bool {
        *self == ProviderStatus::Success
    }
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

/// Outcome of certifying one transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Certification {
    /// Accepted and placed at this position in the global order
    Certified(Seqno),
    /// Conflicts with a concurrently certified transaction
    Aborted,
}

/// Replication provider as seen from the commit path.
pub trait Provider: Send + Sync {
    /// Append bytes to the write-set of `trx`. Appends cannot be undone.
    fn append_data(&self, trx: TrxId, data: &[u8]) -> ProviderStatus;

    /// Certify `trx` against concurrently replicated transactions.
    fn certify(&self, trx: TrxId) -> Certification;
}
