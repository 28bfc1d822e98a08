//! In-process provider that records what it is given.
//!
//! Sequence numbers are handed out in call order under one mutex, which is
//! all the ordering the commit path relies on. Appends and certification
//! can be made to fail per transaction.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use super::{Certification, GlobalPosition, Provider, ProviderStatus, Seqno};
use crate::trx::TrxId;

#[derive(Debug, Default)]
struct RecordingState {
    last_seqno: Seqno,
    write_sets: HashMap<TrxId, Vec<u8>>,
    certified: Vec<(TrxId, Seqno)>,
    append_calls: usize,
    failing_appends: HashSet<TrxId>,
    failing_certifications: HashSet<TrxId>,
}

/// Recording provider for simulations and tests
#[derive(Debug)]
pub struct RecordingProvider {
    cluster_id: Uuid,
    state: Mutex<RecordingState>,
}

impl RecordingProvider {
    pub fn new(cluster_id: Uuid) -> Self {
        Self {
            cluster_id,
            state: Mutex::new(RecordingState::default()),
        }
    }

    /// Start numbering after `position` instead of from zero.
    pub fn resume_from(position: GlobalPosition) -> Self {
        let provider = Self::new(position.cluster_id);
        provider.state().last_seqno = position.seqno;
        provider
    }

    /// Make every append for `trx` fail with `TrxFail`.
    pub fn fail_appends(&self, trx: TrxId) {
        self.state().failing_appends.insert(trx);
    }

    /// Make certification of `trx` abort.
    pub fn abort_certification(&self, trx: TrxId) {
        self.state().failing_certifications.insert(trx);
    }

    /// Bytes appended so far for `trx`
    pub fn write_set(&self, trx: TrxId) -> Vec<u8> {
        self.state().write_sets.get(&trx).cloned().unwrap_or_default()
    }

    /// Number of `append_data` calls, failed ones included
    pub fn append_calls(&self) -> usize {
        self.state().append_calls
    }

    /// Certified transactions in the order they were certified
    pub fn certified(&self) -> Vec<(TrxId, Seqno)> {
        self.state().certified.clone()
    }

    /// Position of the most recently certified transaction
    pub fn last_position(&self) -> GlobalPosition {
        GlobalPosition::new(self.cluster_id, self.state().last_seqno)
    }

    fn state(&self) -> MutexGuard<'_, RecordingState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Provider for RecordingProvider {
    fn append_data(&self, trx: TrxId, data: &[u8]) -> ProviderStatus {
        let mut state = self.state();
        state.append_calls += 1;
        if state.failing_appends.contains(&trx) {
            return ProviderStatus::TrxFail;
        }
        state.write_sets.entry(trx).or_default().extend_from_slice(data);
        ProviderStatus::Success
    }

    fn certify(&self, trx: TrxId) -> Certification {
        let mut state = self.state();
        if state.failing_certifications.contains(&trx) {
            return Certification::Aborted;
        }
        let Some(seqno) = state.last_seqno.next() else {
            return Certification::Aborted;
        };
        state.last_seqno = seqno;
        state.certified.push((trx, seqno));
        Certification::Certified(seqno)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seqnos_are_monotonic() {
        let provider = RecordingProvider::new(Uuid::new_v4());
        let a = provider.certify(TrxId::new(1));
        let b = provider.certify(TrxId::new(2));
        assert_eq!(a, Certification::Certified(Seqno::new(0)));
        assert_eq!(b, Certification::Certified(Seqno::new(1)));
        assert_eq!(provider.last_position().seqno, Seqno::new(1));
    }

    #[test]
    fn test_resume_continues_numbering() {
        let id = Uuid::new_v4();
        let provider = RecordingProvider::resume_from(GlobalPosition::new(id, Seqno::new(99)));
        assert_eq!(
            provider.certify(TrxId::new(7)),
            Certification::Certified(Seqno::new(100))
        );
    }

    #[test]
    fn test_exhausted_numbering_aborts() {
        let id = Uuid::new_v4();
        let provider = RecordingProvider::resume_from(GlobalPosition::new(id, Seqno::MAX));
        assert_eq!(
            provider.certify(TrxId::new(1)),
            Certification::Certified(Seqno::new(i64::MAX))
        );
        assert_eq!(provider.certify(TrxId::new(2)), Certification::Aborted);
        assert_eq!(provider.last_position().seqno, Seqno::new(i64::MAX));
    }

    #[test]
    fn test_appends_accumulate_per_transaction() {
        let provider = RecordingProvider::new(Uuid::new_v4());
        assert!(provider.append_data(TrxId::new(1), b"ab").is_success());
        assert!(provider.append_data(TrxId::new(2), b"zz").is_success());
        assert!(provider.append_data(TrxId::new(1), b"cd").is_success());
        assert_eq!(provider.write_set(TrxId::new(1)), b"abcd");
        assert_eq!(provider.append_calls(), 3);
    }

    #[test]
    fn test_failure_injection() {
        let provider = RecordingProvider::new(Uuid::new_v4());
        provider.fail_appends(TrxId::new(1));
        provider.abort_certification(TrxId::new(2));

        assert_eq!(provider.append_data(TrxId::new(1), b"x"), ProviderStatus::TrxFail);
        assert!(provider.write_set(TrxId::new(1)).is_empty());
        assert_eq!(provider.certify(TrxId::new(2)), Certification::Aborted);
        assert!(provider.certified().is_empty());
    }
}
