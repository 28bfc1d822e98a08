//! CLI module for certcommit
//!
//! Provides command-line interface for:
//! - position write: record a cluster position for a prepared data directory
//! - position show: print the recorded position
//! - simulate: run concurrent transactions through the group-commit path

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, PositionAction};
pub use commands::{
    position_show, position_write, run, run_command, simulate, PositionShowReport,
    PositionWriteReport, SimulationReport, MAX_SIMULATED_TRANSACTIONS,
};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_json, write_json_to};
