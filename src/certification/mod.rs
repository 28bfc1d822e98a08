//! Certification keys and the commit-time key audit
//!
//! Keys are declared by the executor as statements run and handed to the
//! provider with the write-set. The audit cross-checks them against the
//! table locks the transaction actually holds.

mod audit;
mod key;

pub use audit::{KeyAuditor, LockNamespace, LockTicket, LockType, MissingKey};
pub use key::{CertKey, CertKeySet, KeyMode};

use crate::trx::Transaction;
use crate::writeset::LogCache;

impl KeyAuditor {
    /// Audit a transaction's own locks against its own keys.
    pub fn audit_transaction<C: LogCache>(&self, trx: &Transaction<C>) -> Vec<MissingKey> {
        self.audit(trx.id(), trx.locks(), trx.keys(), trx.query())
    }
}
