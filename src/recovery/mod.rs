//! Replication position recovery
//!
//! A node restarting from a prepared data directory resumes replication
//! from the position recorded in its position file instead of requesting
//! a full state transfer.

mod errors;
mod position_file;

pub use errors::{PositionError, PositionResult};
pub use position_file::PositionFile;
