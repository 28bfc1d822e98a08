//! In-flight transaction state owned by one session thread

use crate::certification::{CertKey, CertKeySet, LockTicket, LockType};
use crate::provider::Seqno;
use crate::writeset::{LogCache, MemoryCache, WriteSetError, WriteSetResult};

use super::TrxId;

/// One session transaction on the replication commit path.
///
/// Change events are staged in `cache`. The most recent row event stays
/// pending in memory until the statement ends, because later rows of the
/// same statement may still be merged into it by the executor.
#[derive(Debug)]
pub struct Transaction<C: LogCache = MemoryCache> {
    id: TrxId,
    thread_id: u64,
    query: String,
    locks: Vec<LockTicket>,
    keys: CertKeySet,
    cache: C,
    pending_event: Option<Vec<u8>>,
    ws_offset: u64,
    seqno: Seqno,
}

impl Transaction<MemoryCache> {
    /// Transaction staging into an in-memory cache
    pub fn new(id: TrxId, thread_id: u64) -> Self {
        Self::with_cache(id, thread_id, MemoryCache::default())
    }
}

impl<C: LogCache> Transaction<C> {
    pub fn with_cache(id: TrxId, thread_id: u64, cache: C) -> Self {
        Self {
            id,
            thread_id,
            query: String::new(),
            locks: Vec::new(),
            keys: CertKeySet::new(),
            cache,
            pending_event: None,
            ws_offset: 0,
            seqno: Seqno::UNDEFINED,
        }
    }

    pub fn id(&self) -> TrxId {
        self.id
    }

    pub fn thread_id(&self) -> u64 {
        self.thread_id
    }

    /// Text of the statement currently executing
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_query(&mut self, query: &str) {
        self.query = query.to_string();
    }

    /// Stage a row event. Any earlier pending event is flushed first.
    pub fn write_event(&mut self, event: &[u8]) -> WriteSetResult<()> {
        self.flush_pending_event()?;
        self.pending_event = Some(event.to_vec());
        Ok(())
    }

    /// Append a statement event straight to the cache.
    pub fn write_statement_event(&mut self, event: &[u8]) -> WriteSetResult<()> {
        self.flush_pending_event()?;
        self.cache.write(event).map_err(WriteSetError::CacheWrite)
    }

    /// Move the pending row event, if any, into the cache.
    ///
    /// On failure the event stays pending.
    pub fn flush_pending_event(&mut self) -> WriteSetResult<()> {
        if let Some(event) = self.pending_event.as_deref() {
            self.cache.write(event).map_err(WriteSetError::CacheWrite)?;
            self.pending_event = None;
        }
        Ok(())
    }

    pub fn pending_event_len(&self) -> usize {
        self.pending_event.as_ref().map_or(0, Vec::len)
    }

    /// Record a granted table lock held by this transaction.
    pub fn acquire_lock(&mut self, db: &str, name: &str, lock_type: LockType) {
        self.locks.push(LockTicket::table(self.id, db, name, lock_type));
    }

    /// Record an arbitrary lock ticket (possibly foreign or not granted).
    pub fn add_lock(&mut self, ticket: LockTicket) {
        self.locks.push(ticket);
    }

    pub fn locks(&self) -> &[LockTicket] {
        &self.locks
    }

    pub fn append_key(&mut self, key: CertKey) {
        self.keys.append(key);
    }

    pub fn keys(&self) -> &CertKeySet {
        &self.keys
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut C {
        &mut self.cache
    }

    /// Cache plus the offset up to which it has already been streamed,
    /// borrowed together for one streaming call.
    pub fn cache_and_offset(&mut self) -> (&mut C, &mut u64) {
        (&mut self.cache, &mut self.ws_offset)
    }

    /// Bytes of the cache already handed to the provider
    pub fn ws_offset(&self) -> u64 {
        self.ws_offset
    }

    pub fn seqno(&self) -> Seqno {
        self.seqno
    }

    pub fn set_seqno(&mut self, seqno: Seqno) {
        self.seqno = seqno;
    }

    /// Discard everything staged so far, flushed or pending.
    pub fn reset_write_set(&mut self) -> WriteSetResult<()> {
        self.pending_event = None;
        self.ws_offset = 0;
        self.cache
            .reinit_for_append(0)
            .map_err(|source| WriteSetError::CacheReinit { offset: 0, source })
    }

    /// Forget locks and keys once the transaction has ended.
    pub fn release_locks(&mut self) {
        self.locks.clear();
        self.keys.clear();
    }
}
