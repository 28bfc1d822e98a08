//! Transaction handles
//!
//! A [`Transaction`] is one in-flight session transaction as seen by the
//! replication commit path: its table locks, its declared certification
//! keys, the staging cache holding its pending change events, how far that
//! cache has already been streamed, and the sequence number assigned once
//! it passes certification.
//!
//! Transactions are exclusively owned by their session thread. Nothing in
//! here is shared or locked; cross-transaction state lives in
//! [`crate::commit_order`].

mod transaction;

pub use transaction::Transaction;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identity of a transaction.
///
/// Used as the arena key in the commit-order queue, so links between
/// transactions never own each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TrxId(u64);

impl TrxId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TrxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
