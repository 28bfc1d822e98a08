//! Group-commit coordinator
//!
//! Drives one transaction through the replicated commit path:
//!
//! ```text
//! stream write-set -> certify + register -> audit keys
//!     -> wait for prior -> local commit -> unregister
//! ```
//!
//! Certification and registration share one critical section, so the
//! registration order is the seqno order. Unregistration is tied to a
//! drop guard and runs on every exit path once registered, panics
//! included.

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use super::errors::{CoordinatorError, CoordinatorResult};
use super::CoordinatorConfig;
use crate::certification::{KeyAuditor, MissingKey};
use crate::commit_order::{CommitOrderQueue, CommitState};
use crate::observability::{log_event_with_fields, CommitMetrics, Event};
use crate::provider::{Certification, Provider, Seqno};
use crate::trx::{Transaction, TrxId};
use crate::writeset::{dump_writeset, LogCache, WriteSetError, WriteSetStreamer};

/// What a successful commit went through
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitReport {
    pub trx: TrxId,
    pub seqno: Seqno,
    pub bytes_streamed: u64,
    /// Whether the transaction entered the commit-order queue
    pub registered: bool,
    /// Whether it had to block for a prior commit
    pub waited: bool,
    #[serde(skip)]
    pub missing_keys: Vec<MissingKey>,
}

/// Unregisters on drop.
struct Registration<'a> {
    queue: &'a CommitOrderQueue,
    trx: TrxId,
    active: bool,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        if self.active {
            self.queue.unregister(self.trx);
        }
    }
}

pub struct GroupCommitCoordinator<P: Provider> {
    config: CoordinatorConfig,
    queue: CommitOrderQueue,
    streamer: WriteSetStreamer,
    auditor: KeyAuditor,
    provider: Arc<P>,
    metrics: Arc<CommitMetrics>,
    certification: Mutex<()>,
}

impl<P: Provider> GroupCommitCoordinator<P> {
    pub fn new(config: CoordinatorConfig, provider: Arc<P>, metrics: Arc<CommitMetrics>) -> Self {
        let queue = if config.external_commit_ordering {
            CommitOrderQueue::disabled()
        } else {
            CommitOrderQueue::new()
        };
        Self {
            streamer: WriteSetStreamer::new(config.max_ws_size),
            config,
            queue,
            auditor: KeyAuditor::default(),
            provider,
            metrics,
            certification: Mutex::new(()),
        }
    }

    pub fn with_auditor(mut self, auditor: KeyAuditor) -> Self {
        self.auditor = auditor;
        self
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn queue(&self) -> &CommitOrderQueue {
        &self.queue
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn metrics(&self) -> &CommitMetrics {
        &self.metrics
    }

    /// Replicate and commit `trx`.
    ///
    /// `local_commit` performs the storage engine commit. It runs only
    /// after every transaction certified earlier has committed, unless
    /// commit ordering is external. Its error is reported as
    /// [`CoordinatorError::LocalCommit`].
    pub fn commit<C, F, E>(&self, trx: &mut Transaction<C>, local_commit: F) -> CoordinatorResult<CommitReport>
    where
        C: LogCache,
        F: FnOnce(&Transaction<C>) -> Result<(), E>,
        E: fmt::Display,
    {
        let id = trx.id();

        let bytes_streamed = match self.streamer.prepare_data_for_replication(trx, &*self.provider) {
            Ok(sent) => sent,
            Err(e) => {
                if matches!(e, WriteSetError::SizeLimitExceeded { .. }) {
                    self.metrics.increment_size_limit_aborts();
                }
                return Err(e.into());
            }
        };
        self.metrics.add_bytes_streamed(bytes_streamed);

        let (seqno, registered) = {
            let _section = self.certification.lock().unwrap_or_else(|e| e.into_inner());
            match self.provider.certify(id) {
                Certification::Certified(seqno) => {
                    trx.set_seqno(seqno);
                    (Some(seqno), self.queue.register(id, seqno))
                }
                Certification::Aborted => (None, false),
            }
        };
        let _registration = Registration {
            queue: &self.queue,
            trx: id,
            active: registered,
        };

        let Some(seqno) = seqno else {
            self.metrics.increment_certification_aborts();
            log_event_with_fields(
                Event::CertificationAborted,
                &[("thread", &trx.thread_id().to_string()), ("trx", &id.to_string())],
            );
            self.dump_rejected(trx);
            return Err(CoordinatorError::CertificationAborted { trx: id });
        };

        if registered {
            self.metrics.increment_registrations();
        } else {
            self.metrics.increment_bypassed();
        }

        let missing_keys = self.auditor.audit_transaction(trx);
        self.metrics.add_missing_keys(missing_keys.len() as u64);

        let waited = registered && self.queue.wait_for_prior(id);
        if waited {
            self.metrics.increment_waits();
        }
        if registered && self.queue.state(id) == CommitState::Unregistered {
            return Err(CoordinatorError::Cancelled { trx: id });
        }

        if let Err(e) = local_commit(&*trx) {
            let message = e.to_string();
            self.metrics.increment_local_commit_failures();
            log_event_with_fields(
                Event::LocalCommitFailed,
                &[
                    ("error", &message),
                    ("seqno", &seqno.to_string()),
                    ("trx", &id.to_string()),
                ],
            );
            return Err(CoordinatorError::LocalCommit { trx: id, message });
        }

        self.queue.mark_committed(id);
        self.metrics.increment_commits();

        Ok(CommitReport {
            trx: id,
            seqno,
            bytes_streamed,
            registered,
            waited,
            missing_keys,
        })
    }

    /// Cancel a registered transaction that will never commit, from any
    /// thread. A thread blocked in [`commit`](Self::commit) for it returns
    /// [`CoordinatorError::Cancelled`]. Returns false when `trx` was not
    /// registered.
    pub fn abort(&self, trx: TrxId) -> bool {
        self.queue.abort(trx)
    }

    fn dump_rejected<C: LogCache>(&self, trx: &mut Transaction<C>) {
        let Some(dir) = self.config.dump_dir.as_deref() else {
            return;
        };
        let mut bytes = Vec::new();
        let mut from = 0;
        let unbounded = WriteSetStreamer::new(u64::MAX);
        if unbounded
            .write_cache_buf(trx.cache_mut(), &mut from, &mut bytes)
            .is_ok()
        {
            // failures are logged by the dump itself
            let _ = dump_writeset(dir, trx.thread_id(), trx.seqno(), &bytes);
        }
    }
}
