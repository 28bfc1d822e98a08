//! Cluster connection monitoring
//!
//! The provider reports every connection it opens or closes to other
//! nodes. We keep the current set for status reporting only.

mod connections;

pub use connections::{Connection, ConnectionEvent, ConnectionMonitor};
