//! CLI command implementations
//!
//! Each command returns a serializable result; `run_command` prints it as
//! one JSON line on stdout.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;

use serde::Serialize;
use uuid::Uuid;

use crate::certification::{CertKey, KeyMode, LockType};
use crate::config::ReplicationConfig;
use crate::coordinator::{CommitReport, CoordinatorResult, GroupCommitCoordinator};
use crate::observability::{
    install_error_log, log_event_with_fields, uninstall_error_log, BufferedErrorLog,
    BufferedLogConfig, CommitMetrics, Event, MetricsSnapshot,
};
use crate::provider::{GlobalPosition, RecordingProvider, Seqno};
use crate::recovery::PositionFile;
use crate::trx::{Transaction, TrxId};
use crate::writeset::StagingCache;

use super::args::{Command, PositionAction};
use super::errors::{CliError, CliErrorCode, CliResult};
use super::io::write_json;

/// Upper bound on `simulate --transactions`; each transaction gets its
/// own thread.
pub const MAX_SIMULATED_TRANSACTIONS: u64 = 1024;

/// Output of `position write`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionWriteReport {
    pub written: bool,
    pub position: String,
}

/// Output of `position show`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionShowReport {
    pub position: Option<String>,
}

/// Output of `simulate`
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub transactions: u64,
    /// Transaction ids in local commit order
    pub commit_order: Vec<TrxId>,
    /// Seqnos in local commit order
    pub seqnos: Vec<Seqno>,
    pub missing_keys: u64,
    /// Position after the last certified transaction
    pub position: String,
    pub metrics: MetricsSnapshot,
}

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Position {
            action:
                PositionAction::Write {
                    data_dir,
                    cluster_id,
                    seqno,
                    overwrite,
                },
        } => write_json(&position_write(&data_dir, cluster_id, seqno, overwrite)?),
        Command::Position {
            action: PositionAction::Show { data_dir },
        } => write_json(&position_show(&data_dir)?),
        Command::Simulate {
            config,
            transactions,
            omit_key_every,
        } => write_json(&simulate(&config, transactions, omit_key_every)?),
    }
}

/// Record `<cluster_id>:<seqno>` in the data directory's position file.
pub fn position_write(
    data_dir: &Path,
    cluster_id: Uuid,
    seqno: i64,
    overwrite: bool,
) -> CliResult<PositionWriteReport> {
    let seqno = Seqno::checked(seqno).ok_or_else(|| {
        CliError::invalid_argument(format!(
            "seqno must be between -1 and {}, got {}",
            Seqno::MAX,
            seqno
        ))
    })?;
    let position = GlobalPosition::new(cluster_id, seqno);
    let written = PositionFile::new(data_dir).write(&position, overwrite)?;
    Ok(PositionWriteReport {
        written,
        position: position.to_string(),
    })
}

pub fn position_show(data_dir: &Path) -> CliResult<PositionShowReport> {
    let position = PositionFile::new(data_dir).read()?;
    Ok(PositionShowReport {
        position: position.map(|p| p.to_string()),
    })
}

/// Commit `transactions` concurrent transactions through the group-commit
/// path against an in-process provider.
///
/// The provider resumes from the position file when one exists, and the
/// final position is written back.
pub fn simulate(
    config_path: &Path,
    transactions: u64,
    omit_key_every: u64,
) -> CliResult<SimulationReport> {
    if transactions > MAX_SIMULATED_TRANSACTIONS {
        return Err(CliError::invalid_argument(format!(
            "at most {} transactions can be simulated, got {}",
            MAX_SIMULATED_TRANSACTIONS, transactions
        )));
    }

    let config = ReplicationConfig::load(config_path)?;
    let _error_log = config.buffered_log.clone().map(InstalledLog::install);
    log_event_with_fields(
        Event::ConfigLoaded,
        &[("path", &config_path.display().to_string())],
    );

    let positions = PositionFile::new(config.data_path());
    let provider = match positions.read()? {
        Some(position) => RecordingProvider::resume_from(position),
        None => RecordingProvider::new(Uuid::new_v4()),
    };
    let metrics = Arc::new(CommitMetrics::new());
    let coordinator = Arc::new(GroupCommitCoordinator::new(
        config.coordinator_config(),
        Arc::new(provider),
        Arc::clone(&metrics),
    ));
    let committed: Arc<Mutex<Vec<(TrxId, Seqno)>>> = Arc::new(Mutex::new(Vec::new()));

    log_event_with_fields(
        Event::SimulationStart,
        &[("transactions", &transactions.to_string())],
    );

    let mut handles = Vec::with_capacity(transactions as usize);
    for n in 1..=transactions {
        let coordinator = Arc::clone(&coordinator);
        let committed = Arc::clone(&committed);
        let chunk_size = config.cache_chunk_size;
        let omit_key = omit_key_every > 0 && n % omit_key_every == 0;
        let handle = thread::Builder::new()
            .name(format!("trx-{}", n))
            .spawn(move || run_transaction(&coordinator, &committed, n, chunk_size, omit_key))
            .map_err(|e| {
                CliError::new(
                    CliErrorCode::CommitFailed,
                    format!("failed to start transaction thread {}: {}", n, e),
                )
            })?;
        handles.push(handle);
    }

    let mut missing_keys = 0;
    for handle in handles {
        let report = handle.join().map_err(|_| {
            CliError::new(CliErrorCode::CommitFailed, "transaction thread panicked")
        })??;
        missing_keys += report.missing_keys.len() as u64;
    }

    let last = coordinator.provider().last_position();
    if !last.seqno.is_undefined() {
        positions.write(&last, true)?;
    }

    let (commit_order, seqnos): (Vec<TrxId>, Vec<Seqno>) = committed
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .iter()
        .copied()
        .unzip();
    let report = SimulationReport {
        transactions,
        commit_order,
        seqnos,
        missing_keys,
        position: last.to_string(),
        metrics: metrics.snapshot(),
    };

    log_event_with_fields(
        Event::SimulationComplete,
        &[
            ("committed", &report.commit_order.len().to_string()),
            ("position", &report.position),
        ],
    );

    Ok(report)
}

/// Buffered error log installed for the duration of one command.
struct InstalledLog(Arc<BufferedErrorLog>);

impl InstalledLog {
    fn install(config: BufferedLogConfig) -> Self {
        let log = Arc::new(BufferedErrorLog::open(config));
        install_error_log(Arc::clone(&log));
        Self(log)
    }
}

impl Drop for InstalledLog {
    fn drop(&mut self) {
        uninstall_error_log();
        self.0.close();
    }
}

fn run_transaction(
    coordinator: &GroupCommitCoordinator<RecordingProvider>,
    committed: &Mutex<Vec<(TrxId, Seqno)>>,
    n: u64,
    chunk_size: usize,
    omit_key: bool,
) -> CoordinatorResult<CommitReport> {
    let table = format!("t{}", n);
    let mut trx = Transaction::with_cache(TrxId::new(n), n, StagingCache::in_memory(chunk_size));
    trx.set_query(&format!("UPDATE sim.{} SET v = v + 1", table));
    trx.write_statement_event(format!("BEGIN;UPDATE sim.{};", table).as_bytes())?;
    trx.write_event(format!("row:{}:{}", table, n).as_bytes())?;
    trx.acquire_lock("sim", &table, LockType::SharedWrite);
    if !omit_key {
        trx.append_key(CertKey::table("sim", &table, KeyMode::Update));
    }

    coordinator.commit(&mut trx, |t: &Transaction| {
        committed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((t.id(), t.seqno()));
        Ok::<(), String>(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn create_config(temp_dir: &TempDir) -> PathBuf {
        let config_path = temp_dir.path().join("certcommit.json");
        let data_dir = temp_dir.path().join("data");

        let config = json!({
            "data_dir": data_dir.to_string_lossy()
        });

        fs::write(&config_path, config.to_string()).unwrap();
        config_path
    }

    #[test]
    fn test_position_write_then_show() {
        let temp_dir = TempDir::new().unwrap();
        let id = Uuid::new_v4();

        let written = position_write(temp_dir.path(), id, 17, false).unwrap();
        assert!(written.written);
        assert_eq!(written.position, format!("{}:17", id));

        let again = position_write(temp_dir.path(), id, 18, false).unwrap();
        assert!(!again.written);

        let shown = position_show(temp_dir.path()).unwrap();
        assert_eq!(shown.position, Some(format!("{}:17", id)));
    }

    #[test]
    fn test_position_show_without_file() {
        let temp_dir = TempDir::new().unwrap();
        assert_eq!(position_show(temp_dir.path()).unwrap().position, None);
    }

    #[test]
    fn test_position_write_rejects_bad_seqno() {
        let temp_dir = TempDir::new().unwrap();
        let err = position_write(temp_dir.path(), Uuid::new_v4(), -2, false).unwrap_err();
        assert_eq!(err.code(), CliErrorCode::InvalidArgument);
    }

    #[test]
    fn test_simulate_commits_in_seqno_order() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = create_config(&temp_dir);

        let report = simulate(&config_path, 16, 0).unwrap();
        assert_eq!(report.commit_order.len(), 16);
        let expected: Vec<Seqno> = (0..16).map(Seqno::new).collect();
        assert_eq!(report.seqnos, expected);
        assert_eq!(report.missing_keys, 0);
        assert_eq!(report.metrics.commits, 16);
    }

    #[test]
    fn test_simulate_resumes_from_position_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = create_config(&temp_dir);

        let first = simulate(&config_path, 3, 0).unwrap();
        let second = simulate(&config_path, 2, 0).unwrap();
        assert_eq!(second.seqnos, vec![Seqno::new(3), Seqno::new(4)]);
        assert_eq!(
            first.position.split(':').next(),
            second.position.split(':').next()
        );
    }

    #[test]
    fn test_simulate_reports_missing_keys() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = create_config(&temp_dir);
        let report = simulate(&config_path, 6, 3).unwrap();
        assert_eq!(report.missing_keys, 2);
    }

    #[test]
    fn test_position_write_rejects_seqno_without_successor() {
        let temp_dir = TempDir::new().unwrap();
        let err = position_write(temp_dir.path(), Uuid::new_v4(), i64::MAX, false).unwrap_err();
        assert_eq!(err.code(), CliErrorCode::InvalidArgument);

        let written = position_write(temp_dir.path(), Uuid::new_v4(), i64::MAX - 1, false).unwrap();
        assert!(written.written);
    }

    #[test]
    fn test_simulate_without_commits_records_no_position() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = create_config(&temp_dir);

        let report = simulate(&config_path, 0, 0).unwrap();
        assert!(report.commit_order.is_empty());
        assert!(report.position.ends_with(":-1"));
        assert!(!PositionFile::new(&temp_dir.path().join("data")).exists());
    }

    #[test]
    fn test_simulate_rejects_too_many_transactions() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = create_config(&temp_dir);

        let err = simulate(&config_path, MAX_SIMULATED_TRANSACTIONS + 1, 0).unwrap_err();
        assert_eq!(err.code(), CliErrorCode::InvalidArgument);
    }

    #[test]
    fn test_simulate_requires_config() {
        let temp_dir = TempDir::new().unwrap();
        let err = simulate(&temp_dir.path().join("missing.json"), 1, 0).unwrap_err();
        assert_eq!(err.code(), CliErrorCode::ConfigError);
    }
}
