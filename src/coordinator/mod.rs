//! Group-commit coordination
//!
//! Ties the write-set streamer, the provider, the key auditor and the
//! commit-order queue into the commit path of one transaction. Settings
//! are passed in at construction.

mod coordinator;
mod errors;

use std::path::PathBuf;

pub use coordinator::{CommitReport, GroupCommitCoordinator};
pub use errors::{CoordinatorError, CoordinatorResult};

use crate::writeset::DEFAULT_MAX_WS_SIZE;

/// Coordinator settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Maximum bytes streamed per write-set drain
    pub max_ws_size: u64,
    /// Commit order is already enforced by an independent durability log;
    /// the commit-order queue stays inert.
    pub external_commit_ordering: bool,
    /// Where write-sets rejected by certification are dumped
    pub dump_dir: Option<PathBuf>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_ws_size: DEFAULT_MAX_WS_SIZE,
            external_commit_ordering: false,
            dump_dir: None,
        }
    }
}
