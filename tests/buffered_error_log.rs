//! Buffered error log wiring
//!
//! Once installed, the buffered log receives the commit path's own
//! warnings and errors, not only lines written to it directly.

use std::fs;
use std::sync::{Arc, Mutex, MutexGuard};

use certcommit::certification::LockType;
use certcommit::cli::simulate;
use certcommit::coordinator::{CoordinatorConfig, GroupCommitCoordinator};
use certcommit::observability::{
    install_error_log, uninstall_error_log, BufferedErrorLog, BufferedLogConfig, CommitMetrics,
};
use certcommit::provider::RecordingProvider;
use certcommit::trx::{Transaction, TrxId};
use serde_json::json;
use tempfile::TempDir;
use uuid::Uuid;

// One installed log per process: tests that install run one at a time.
static INSTALLED: Mutex<()> = Mutex::new(());

fn serialize_install() -> MutexGuard<'static, ()> {
    INSTALLED.lock().unwrap_or_else(|e| e.into_inner())
}

fn log_config(dir: &TempDir) -> BufferedLogConfig {
    BufferedLogConfig {
        path: dir.path().join("error.log"),
        buffer_size: 4096,
        file_size: 1 << 20,
        rotations: 2,
    }
}

/// Lines of `content` whose JSON part carries `event`.
fn events_named(content: &str, event: &str) -> Vec<serde_json::Value> {
    content
        .lines()
        .filter_map(|line| line.split_once(' '))
        .filter_map(|(_, json)| serde_json::from_str::<serde_json::Value>(json).ok())
        .filter(|value| value["event"] == event)
        .collect()
}

#[test]
fn test_missing_key_warning_reaches_installed_log() {
    let _serial = serialize_install();
    let dir = TempDir::new().unwrap();
    let log = Arc::new(BufferedErrorLog::open(log_config(&dir)));
    install_error_log(Arc::clone(&log));

    let coordinator = GroupCommitCoordinator::new(
        CoordinatorConfig::default(),
        Arc::new(RecordingProvider::new(Uuid::new_v4())),
        Arc::new(CommitMetrics::new()),
    );
    let mut trx = Transaction::new(TrxId::new(1), 1);
    trx.set_query("UPDATE billing.invoices SET paid = 1");
    trx.write_statement_event(b"update").unwrap();
    trx.acquire_lock("billing", "invoices", LockType::SharedWrite);
    coordinator
        .commit(&mut trx, |_| Ok::<(), String>(()))
        .unwrap();

    uninstall_error_log();
    log.close();

    let content = fs::read_to_string(dir.path().join("error.log")).unwrap();
    let missing = events_named(&content, "CERT_KEY_MISSING");
    assert!(missing
        .iter()
        .any(|line| line["name"] == "invoices" && line["db"] == "billing"));
    assert!(missing.iter().all(|line| line["severity"] == "WARN"));
}

#[test]
fn test_uninstalled_log_receives_nothing() {
    let _serial = serialize_install();
    let dir = TempDir::new().unwrap();
    let log = Arc::new(BufferedErrorLog::open(log_config(&dir)));
    install_error_log(Arc::clone(&log));
    uninstall_error_log();

    let coordinator = GroupCommitCoordinator::new(
        CoordinatorConfig::default(),
        Arc::new(RecordingProvider::new(Uuid::new_v4())),
        Arc::new(CommitMetrics::new()),
    );
    let mut trx = Transaction::new(TrxId::new(2), 2);
    trx.write_statement_event(b"update").unwrap();
    trx.acquire_lock("billing", "refunds", LockType::SharedWrite);
    coordinator
        .commit(&mut trx, |_| Ok::<(), String>(()))
        .unwrap();
    log.close();

    let content = fs::read_to_string(dir.path().join("error.log")).unwrap();
    assert!(events_named(&content, "CERT_KEY_MISSING")
        .iter()
        .all(|line| line["name"] != "refunds"));
}

/// `simulate` installs the configured log for the whole run.
#[test]
fn test_simulate_writes_configured_log() {
    let _serial = serialize_install();
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("certcommit.json");
    let log_path = dir.path().join("logs").join("error.log");
    let config = json!({
        "data_dir": dir.path().join("data").to_string_lossy(),
        "buffered_log": {
            "path": log_path.to_string_lossy(),
            "buffer_size": 512,
            "file_size": 1 << 20,
        }
    });
    fs::write(&config_path, config.to_string()).unwrap();

    let report = simulate(&config_path, 4, 2).unwrap();
    assert_eq!(report.missing_keys, 2);

    let content = fs::read_to_string(&log_path).unwrap();
    assert_eq!(events_named(&content, "SIMULATION_COMPLETE").len(), 1);
    let missing = events_named(&content, "CERT_KEY_MISSING");
    let mut tables: Vec<&str> = missing
        .iter()
        .filter_map(|line| line["name"].as_str())
        .collect();
    tables.sort_unstable();
    assert_eq!(tables, vec!["t2", "t4"]);
}
