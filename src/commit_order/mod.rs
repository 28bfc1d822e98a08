//! Ordered commit
//!
//! Certified transactions commit locally in exactly the order the provider
//! certified them. Everything before the commit step (streaming, engine
//! prepare, log write) still runs concurrently across sessions.
//!
//! Per transaction:
//! 1. `register` right after certification, in seqno order
//! 2. `wait_for_prior` until the previous registrant has unregistered
//! 3. commit locally
//! 4. `unregister`, always, which wakes the next registrant
//!
//! Registration and unregistration cannot fail. Misuse (double
//! registration, out-of-order seqnos, committing ahead of the prior) is a
//! programming error: it trips a debug assertion and is logged as
//! `COMMIT_ORDER_VIOLATION`.

mod queue;
mod signal;

pub use queue::{CommitOrderQueue, CommitState, PendingEntry};
