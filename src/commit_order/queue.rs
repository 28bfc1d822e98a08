//! Ordered-commit queue
//!
//! An arena of registered transactions keyed by [`TrxId`]. Each entry
//! names the transaction it waits for (`prior`) and the transactions
//! waiting for it (`subsequent`). Links are ids, never owning references.
//! The tail is the most recently registered transaction.
//!
//! The queue lock covers link/unlink and the tail swap only. Blocking and
//! waking go through each entry's own [`CommitSignal`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use super::signal::CommitSignal;
use crate::observability::{log_event_with_fields, Event};
use crate::provider::Seqno;
use crate::trx::TrxId;

/// Group-commit state of one transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitState {
    Unregistered,
    RegisteredWaiting,
    RegisteredReady,
    Committed,
}

/// One registered transaction as seen by [`CommitOrderQueue::pending`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingEntry {
    pub trx: TrxId,
    pub seqno: Seqno,
    pub depends_on: Option<TrxId>,
    pub state: CommitState,
}

#[derive(Debug)]
struct Entry {
    seqno: Seqno,
    prior: Option<TrxId>,
    subsequent: Vec<TrxId>,
    committed: bool,
    signal: Arc<CommitSignal>,
}

#[derive(Debug, Default)]
struct QueueInner {
    tail: Option<TrxId>,
    entries: HashMap<TrxId, Entry>,
}

impl QueueInner {
    /// Remove `trx` from its prior's successor list.
    fn unlink_from_prior(&mut self, trx: TrxId, prior: Option<TrxId>) {
        if let Some(entry) = prior.and_then(|p| self.entries.get_mut(&p)) {
            entry.subsequent.retain(|t| *t != trx);
        }
    }

    /// Clear the prior link of every successor and collect their signals.
    fn release_successors(&mut self, successors: &[TrxId]) -> Vec<Arc<CommitSignal>> {
        let mut signals = Vec::with_capacity(successors.len());
        for successor in successors {
            if let Some(entry) = self.entries.get_mut(successor) {
                entry.prior = None;
                signals.push(Arc::clone(&entry.signal));
            }
        }
        signals
    }
}

/// Serializes the commit step of certified transactions in seqno order.
///
/// A disabled queue (another component already orders commits) accepts
/// every call and records nothing.
#[derive(Debug)]
pub struct CommitOrderQueue {
    enabled: bool,
    inner: Mutex<QueueInner>,
}

impl Default for CommitOrderQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CommitOrderQueue {
    pub fn new() -> Self {
        Self {
            enabled: true,
            inner: Mutex::new(QueueInner::default()),
        }
    }

    /// Inert queue: `register` never links anything.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Link `trx` behind the current tail and make it the new tail.
    ///
    /// `trx` must have been certified, and registrations must arrive in
    /// seqno order. Returns false when nothing was linked: the queue is
    /// disabled, or `trx` is already registered.
    pub fn register(&self, trx: TrxId, seqno: Seqno) -> bool {
        if !self.enabled {
            return false;
        }

        let mut inner = self.lock();
        if inner.entries.contains_key(&trx) {
            drop(inner);
            violation(trx, "already registered");
            debug_assert!(false, "transaction {} registered twice", trx);
            return false;
        }

        let prior = inner.tail;
        if let Some(prior_entry) = prior.and_then(|p| inner.entries.get_mut(&p)) {
            if !seqno.is_undefined() && seqno <= prior_entry.seqno {
                violation(trx, "seqno not after tail");
                debug_assert!(false, "transaction {} registered out of seqno order", trx);
            }
            prior_entry.subsequent.push(trx);
        }

        inner.entries.insert(
            trx,
            Entry {
                seqno,
                prior,
                subsequent: Vec::new(),
                committed: false,
                signal: Arc::new(CommitSignal::new(prior.is_none())),
            },
        );
        inner.tail = Some(trx);
        true
    }

    /// Block until every transaction registered before `trx` has
    /// unregistered. Returns immediately for an unregistered `trx` or one
    /// with no prior. Returns whether the caller actually blocked.
    pub fn wait_for_prior(&self, trx: TrxId) -> bool {
        let signal = match self.lock().entries.get(&trx) {
            Some(entry) => Arc::clone(&entry.signal),
            None => return false,
        };
        signal.wait()
    }

    /// Record that `trx` has committed locally.
    pub fn mark_committed(&self, trx: TrxId) {
        let mut inner = self.lock();
        let Some(entry) = inner.entries.get_mut(&trx) else {
            return;
        };
        let early = entry.prior.is_some();
        entry.committed = true;
        drop(inner);

        if early {
            violation(trx, "committed before prior");
        }
    }

    /// Detach `trx` and wake everything waiting on it, including a
    /// thread still blocked on `trx`'s own prior.
    ///
    /// The tail is cleared only if it is still `trx`. Returns false when
    /// `trx` was not registered.
    pub fn unregister(&self, trx: TrxId) -> bool {
        let mut inner = self.lock();
        let Some(entry) = inner.entries.remove(&trx) else {
            return false;
        };

        inner.unlink_from_prior(trx, entry.prior);
        let released = inner.release_successors(&entry.subsequent);
        if inner.tail == Some(trx) {
            inner.tail = None;
        }
        drop(inner);

        entry.signal.release();
        for signal in released {
            signal.release();
        }
        true
    }

    /// Detach `trx`, which will never commit.
    ///
    /// If `trx` still waits for a registered prior, its successors are
    /// handed over to that prior instead of being woken, and a tail `trx`
    /// is replaced by the prior. Otherwise behaves like
    /// [`unregister`](Self::unregister).
    pub fn abort(&self, trx: TrxId) -> bool {
        let mut inner = self.lock();
        let prior = match inner.entries.get(&trx) {
            None => return false,
            Some(entry) => entry.prior.filter(|p| inner.entries.contains_key(p)),
        };
        let Some(prior) = prior else {
            drop(inner);
            return self.unregister(trx);
        };
        let Some(entry) = inner.entries.remove(&trx) else {
            return false;
        };

        for successor in &entry.subsequent {
            if let Some(s) = inner.entries.get_mut(successor) {
                s.prior = Some(prior);
            }
        }
        if let Some(p) = inner.entries.get_mut(&prior) {
            p.subsequent.retain(|t| *t != trx);
            p.subsequent.extend(entry.subsequent.iter().copied());
        }
        if inner.tail == Some(trx) {
            inner.tail = Some(prior);
        }
        drop(inner);

        entry.signal.release();
        true
    }

    pub fn state(&self, trx: TrxId) -> CommitState {
        self.lock()
            .entries
            .get(&trx)
            .map_or(CommitState::Unregistered, entry_state)
    }

    /// Transaction `trx` waits for, if any
    pub fn prior_of(&self, trx: TrxId) -> Option<TrxId> {
        self.lock().entries.get(&trx).and_then(|e| e.prior)
    }

    /// Transactions waiting for `trx`
    pub fn subsequent_of(&self, trx: TrxId) -> Vec<TrxId> {
        self.lock()
            .entries
            .get(&trx)
            .map(|e| e.subsequent.clone())
            .unwrap_or_default()
    }

    /// Most recently registered transaction still registered
    pub fn tail(&self) -> Option<TrxId> {
        self.lock().tail
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Snapshot of all registered transactions, ordered by seqno.
    pub fn pending(&self) -> Vec<PendingEntry> {
        let inner = self.lock();
        let mut pending: Vec<PendingEntry> = inner
            .entries
            .iter()
            .map(|(trx, entry)| PendingEntry {
                trx: *trx,
                seqno: entry.seqno,
                depends_on: entry.prior,
                state: entry_state(entry),
            })
            .collect();
        drop(inner);

        pending.sort_by_key(|p| (p.seqno, p.trx));
        pending
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn entry_state(entry: &Entry) -> CommitState {
    if entry.committed {
        CommitState::Committed
    } else if entry.prior.is_none() && entry.signal.is_ready() {
        CommitState::RegisteredReady
    } else {
        CommitState::RegisteredWaiting
    }
}

fn violation(trx: TrxId, reason: &str) {
    log_event_with_fields(
        Event::CommitOrderViolation,
        &[("reason", reason), ("trx", &trx.to_string())],
    );
}
