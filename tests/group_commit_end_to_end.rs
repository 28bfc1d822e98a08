//! Group commit end to end
//!
//! Concurrent transactions stream, certify and commit through one
//! coordinator against the recording provider.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use certcommit::certification::{CertKey, KeyMode, LockType};
use certcommit::coordinator::{CoordinatorConfig, CoordinatorError, GroupCommitCoordinator};
use certcommit::observability::CommitMetrics;
use certcommit::provider::{RecordingProvider, Seqno};
use certcommit::trx::{Transaction, TrxId};
use tempfile::TempDir;
use uuid::Uuid;

fn coordinator(config: CoordinatorConfig) -> Arc<GroupCommitCoordinator<RecordingProvider>> {
    Arc::new(GroupCommitCoordinator::new(
        config,
        Arc::new(RecordingProvider::new(Uuid::new_v4())),
        Arc::new(CommitMetrics::new()),
    ))
}

fn transaction(n: u64) -> Transaction {
    let mut trx = Transaction::new(TrxId::new(n), n);
    let table = format!("t{}", n);
    trx.write_statement_event(table.as_bytes()).unwrap();
    trx.acquire_lock("app", &table, LockType::SharedWrite);
    trx.append_key(CertKey::table("app", &table, KeyMode::Update));
    trx
}

/// Local commits observe seqnos in strictly increasing order.
#[test]
fn test_concurrent_commits_in_seqno_order() {
    let coordinator = coordinator(CoordinatorConfig::default());
    let seen = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = (1..=24)
        .map(|n| {
            let coordinator = Arc::clone(&coordinator);
            let seen = Arc::clone(&seen);
            thread::spawn(move || {
                let mut trx = transaction(n);
                coordinator
                    .commit(&mut trx, |t: &Transaction| {
                        seen.lock().unwrap().push(t.seqno());
                        Ok::<(), String>(())
                    })
                    .unwrap()
            })
        })
        .collect();

    for handle in handles {
        let report = handle.join().unwrap();
        assert!(report.registered);
    }

    let expected: Vec<Seqno> = (0..24).map(Seqno::new).collect();
    assert_eq!(*seen.lock().unwrap(), expected);
    assert!(coordinator.queue().is_empty());

    let snapshot = coordinator.metrics().snapshot();
    assert_eq!(snapshot.commits, 24);
    assert_eq!(snapshot.registrations, 24);
}

/// A failed local commit unblocks the transactions behind it.
#[test]
fn test_local_failure_releases_successors() {
    let coordinator = coordinator(CoordinatorConfig::default());

    let handles: Vec<_> = (1..=4)
        .map(|n| {
            let coordinator = Arc::clone(&coordinator);
            thread::spawn(move || {
                let mut trx = transaction(n);
                coordinator.commit(&mut trx, |t: &Transaction| {
                    if t.seqno() == Seqno::new(1) {
                        Err("engine refused")
                    } else {
                        Ok(())
                    }
                })
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let failures = results.iter().filter(|r| r.is_err()).count();
    assert_eq!(failures, 1);
    assert!(coordinator.queue().is_empty());
    assert_eq!(coordinator.metrics().snapshot().local_commit_failures, 1);
}

/// Cancelling a transaction blocked behind a stalled one returns
/// `Cancelled` to its committing thread.
#[test]
fn test_cancel_blocked_transaction() {
    let coordinator = coordinator(CoordinatorConfig::default());
    let (stall_tx, stall_rx) = std::sync::mpsc::channel::<()>();

    let first = {
        let coordinator = Arc::clone(&coordinator);
        thread::spawn(move || {
            let mut trx = transaction(1);
            coordinator.commit(&mut trx, |_| {
                stall_rx.recv().ok();
                Ok::<(), String>(())
            })
        })
    };
    while coordinator.queue().len() < 1 {
        thread::sleep(Duration::from_millis(5));
    }

    let second = {
        let coordinator = Arc::clone(&coordinator);
        thread::spawn(move || {
            let mut trx = transaction(2);
            coordinator.commit(&mut trx, |_| Ok::<(), String>(()))
        })
    };
    while coordinator.queue().len() < 2 {
        thread::sleep(Duration::from_millis(5));
    }

    assert!(coordinator.abort(TrxId::new(2)));
    let err = second.join().unwrap().unwrap_err();
    assert!(matches!(err, CoordinatorError::Cancelled { .. }));

    stall_tx.send(()).unwrap();
    assert!(first.join().unwrap().is_ok());
    assert!(coordinator.queue().is_empty());
}

/// With external ordering nothing is registered and nothing waits.
#[test]
fn test_external_ordering_bypasses_queue() {
    let coordinator = coordinator(CoordinatorConfig {
        external_commit_ordering: true,
        ..CoordinatorConfig::default()
    });

    let mut trx = transaction(1);
    let report = coordinator
        .commit(&mut trx, |_| Ok::<(), String>(()))
        .unwrap();
    assert!(!report.registered);
    assert!(!report.waited);
    assert_eq!(coordinator.metrics().snapshot().bypassed, 1);
}

/// Certification aborts leave a dump of the rejected write-set.
#[test]
fn test_certification_abort_dumps_write_set() {
    let dir = TempDir::new().unwrap();
    let coordinator = coordinator(CoordinatorConfig {
        dump_dir: Some(dir.path().to_path_buf()),
        ..CoordinatorConfig::default()
    });
    coordinator.provider().abort_certification(TrxId::new(5));

    let mut trx = transaction(5);
    let err = coordinator
        .commit(&mut trx, |_| Ok::<(), String>(()))
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::CertificationAborted { .. }));
    assert!(!err.after_certification());
    assert_eq!(trx.seqno(), Seqno::UNDEFINED);

    let dump = std::fs::read(dir.path().join("GRA_5_-1.log")).unwrap();
    assert_eq!(dump, b"t5");
}
