//! CLI argument definitions using clap
//!
//! Commands:
//! - certcommit position write --data-dir <dir> --cluster-id <uuid> --seqno <n> [--overwrite]
//! - certcommit position show --data-dir <dir>
//! - certcommit simulate --config <path> --transactions <n>

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

/// certcommit - ordered group commit for certification-based replication
#[derive(Parser, Debug)]
#[command(name = "certcommit")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read or write the recovery position file
    Position {
        #[command(subcommand)]
        action: PositionAction,
    },

    /// Run concurrent transactions through the commit path and report the
    /// resulting commit order
    Simulate {
        /// Path to configuration file
        #[arg(long, default_value = "./certcommit.json")]
        config: PathBuf,

        /// Number of concurrent transactions
        #[arg(long, default_value_t = 8)]
        transactions: u64,

        /// Leave out the certification key of every Nth transaction (0 = never)
        #[arg(long, default_value_t = 0)]
        omit_key_every: u64,
    },
}

#[derive(Subcommand, Debug)]
pub enum PositionAction {
    /// Write `<cluster-id>:<seqno>` unless a position is already recorded
    Write {
        #[arg(long)]
        data_dir: PathBuf,

        #[arg(long)]
        cluster_id: Uuid,

        /// Sequence number, -1 for undefined
        #[arg(long, allow_hyphen_values = true)]
        seqno: i64,

        /// Replace an existing position (incremental backup)
        #[arg(long)]
        overwrite: bool,
    },

    /// Print the recorded position
    Show {
        #[arg(long)]
        data_dir: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
