//! certcommit - ordered group commit for certification-based replication
//!
//! Transactions certified by a replication provider commit locally in
//! exactly the order the provider assigned, while everything before the
//! commit step runs concurrently.
//!
//! - [`writeset`]: incremental, size-bounded streaming of staged changes
//! - [`certification`]: certification keys and the commit-time key audit
//! - [`commit_order`]: the ordered-commit queue
//! - [`coordinator`]: the commit path tying them together

pub mod certification;
pub mod cli;
pub mod commit_order;
pub mod config;
pub mod coordinator;
pub mod monitor;
pub mod observability;
pub mod provider;
pub mod recovery;
pub mod trx;
pub mod writeset;
