//! Incremental write-set streaming
//!
//! Drains the bytes a transaction staged since the last call into a
//! [`ChunkSink`], in bounded chunks, enforcing the maximum write-set size.
//! Whatever happens, the cache is handed back write-positioned at the
//! position it had on entry.

use std::ops::{Deref, DerefMut};

use super::cache::LogCache;
use super::errors::{WriteSetError, WriteSetResult};
use super::sink::{BufferSink, ChunkSink, ProviderSink};
use crate::observability::{log_event_with_fields, Event};
use crate::provider::Provider;
use crate::trx::{Transaction, TrxId};

/// Default maximum write-set size in bytes
pub const DEFAULT_MAX_WS_SIZE: u64 = 2_147_483_647;

/// Restores a cache to append mode at its entry position when dropped.
struct AppendOnDrop<'a, C: LogCache + ?Sized> {
    cache: &'a mut C,
    saved_pos: u64,
}

impl<'a, C: LogCache + ?Sized> AppendOnDrop<'a, C> {
    fn new(cache: &'a mut C) -> Self {
        let saved_pos = cache.tell();
        Self { cache, saved_pos }
    }
}

impl<C: LogCache + ?Sized> Deref for AppendOnDrop<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.cache
    }
}

impl<C: LogCache + ?Sized> DerefMut for AppendOnDrop<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.cache
    }
}

impl<C: LogCache + ?Sized> Drop for AppendOnDrop<'_, C> {
    fn drop(&mut self) {
        if let Err(e) = self.cache.reinit_for_append(self.saved_pos) {
            log_event_with_fields(
                Event::WritesetCacheReinitFailed,
                &[
                    ("error", &e.to_string()),
                    ("mode", "append"),
                    ("offset", &self.saved_pos.to_string()),
                ],
            );
        }
    }
}

/// Size-bounded write-set drainer
#[derive(Debug, Clone, Copy)]
pub struct WriteSetStreamer {
    max_ws_size: u64,
}

impl Default for WriteSetStreamer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WS_SIZE)
    }
}

impl WriteSetStreamer {
    pub fn new(max_ws_size: u64) -> Self {
        Self { max_ws_size }
    }

    pub fn max_ws_size(&self) -> u64 {
        self.max_ws_size
    }

    /// Drain `cache` from `*offset` to its current end into `sink`.
    ///
    /// On success `*offset` advances to the end and the number of bytes
    /// sent is returned. On failure `*offset` is untouched and the sink's
    /// cleanup hook has run. The cache is write-positioned at its entry
    /// position on every exit path.
    pub fn stream<C, S>(&self, cache: &mut C, offset: &mut u64, sink: &mut S) -> WriteSetResult<u64>
    where
        C: LogCache + ?Sized,
        S: ChunkSink + ?Sized,
    {
        let mut cache = AppendOnDrop::new(cache);
        let saved_pos = cache.saved_pos;

        match self.drain(&mut *cache, *offset, sink) {
            Ok(sent) => {
                debug_assert_eq!(sent + *offset, saved_pos);
                *offset = saved_pos;
                Ok(sent)
            }
            Err(e) => {
                sink.cleanup_after_error();
                Err(e)
            }
        }
    }

    fn drain<C, S>(&self, cache: &mut C, offset: u64, sink: &mut S) -> WriteSetResult<u64>
    where
        C: LogCache + ?Sized,
        S: ChunkSink + ?Sized,
    {
        if let Err(source) = cache.reinit_for_read(offset) {
            log_event_with_fields(
                Event::WritesetCacheReinitFailed,
                &[
                    ("error", &source.to_string()),
                    ("mode", "read"),
                    ("offset", &offset.to_string()),
                ],
            );
            return Err(WriteSetError::CacheReinit { offset, source });
        }

        let mut total: u64 = 0;
        loop {
            let chunk = cache.next_chunk().map_err(WriteSetError::CacheRead)?;
            if chunk.is_empty() {
                return Ok(total);
            }

            total += chunk.len() as u64;
            if total > self.max_ws_size {
                log_event_with_fields(
                    Event::WritesetSizeLimit,
                    &[
                        ("limit", &self.max_ws_size.to_string()),
                        ("size", &total.to_string()),
                    ],
                );
                return Err(WriteSetError::SizeLimitExceeded {
                    limit: self.max_ws_size,
                    size: total,
                });
            }

            sink.write_chunk(chunk)?;
        }
    }

    /// Drain into a caller-owned buffer. The buffer is cleared on failure.
    pub fn write_cache_buf<C: LogCache + ?Sized>(
        &self,
        cache: &mut C,
        offset: &mut u64,
        buffer: &mut Vec<u8>,
    ) -> WriteSetResult<u64> {
        self.stream(cache, offset, &mut BufferSink::new(buffer))
    }

    /// Drain straight into the provider's write-set for `trx`.
    pub fn write_cache<P, C>(
        &self,
        provider: &P,
        trx: TrxId,
        cache: &mut C,
        offset: &mut u64,
    ) -> WriteSetResult<u64>
    where
        P: Provider + ?Sized,
        C: LogCache + ?Sized,
    {
        self.stream(cache, offset, &mut ProviderSink::new(provider, trx))
    }

    /// Flush the pending event and stream everything not yet replicated
    /// to the provider. On failure the transaction's write-set is
    /// discarded.
    pub fn prepare_data_for_replication<C, P>(
        &self,
        trx: &mut Transaction<C>,
        provider: &P,
    ) -> WriteSetResult<u64>
    where
        C: LogCache,
        P: Provider + ?Sized,
    {
        let id = trx.id();
        let result = trx.flush_pending_event().and_then(|()| {
            let (cache, offset) = trx.cache_and_offset();
            self.write_cache(provider, id, cache, offset)
        });
        discard_on_error(trx, result)
    }

    /// Flush the pending event and append everything not yet replicated
    /// to `buffer`, for a fragment sent to the provider in one call.
    pub fn prepare_fragment_for_replication<C: LogCache>(
        &self,
        trx: &mut Transaction<C>,
        buffer: &mut Vec<u8>,
    ) -> WriteSetResult<u64> {
        let result = trx.flush_pending_event().and_then(|()| {
            let (cache, offset) = trx.cache_and_offset();
            self.write_cache_buf(cache, offset, buffer)
        });
        discard_on_error(trx, result)
    }
}

fn discard_on_error<C: LogCache>(
    trx: &mut Transaction<C>,
    result: WriteSetResult<u64>,
) -> WriteSetResult<u64> {
    if result.is_err() {
        if let Err(e) = trx.reset_write_set() {
            log_event_with_fields(
                Event::WritesetCacheReinitFailed,
                &[("error", &e.to_string()), ("trx", &trx.id().to_string())],
            );
        }
    }
    result
}

/// Bytes staged by `trx` so far, including the pending event
pub fn cache_size<C: LogCache>(trx: &Transaction<C>) -> u64 {
    trx.cache().tell() + trx.pending_event_len() as u64
}

#[cfg(test)]
mod tests {
    use std::io;

    use uuid::Uuid;

    use super::*;
    use crate::provider::RecordingProvider;
    use crate::writeset::StagingCache;

    fn cache_with(data: &[u8], chunk: usize) -> StagingCache<io::Cursor<Vec<u8>>> {
        let mut cache = StagingCache::in_memory(chunk);
        cache.write(data).unwrap();
        cache
    }

    /// Cache double whose read side can be made to fail.
    struct FailingCache {
        inner: StagingCache<io::Cursor<Vec<u8>>>,
        fail_reinit: bool,
        fail_after_chunks: Option<usize>,
        chunks: usize,
    }

    impl FailingCache {
        fn new(data: &[u8]) -> Self {
            Self {
                inner: cache_with(data, 2),
                fail_reinit: false,
                fail_after_chunks: None,
                chunks: 0,
            }
        }
    }

    impl LogCache for FailingCache {
        fn tell(&self) -> u64 {
            self.inner.tell()
        }

        fn reinit_for_read(&mut self, offset: u64) -> io::Result<()> {
            if self.fail_reinit {
                return Err(io::Error::new(io::ErrorKind::Other, "seek failed"));
            }
            self.inner.reinit_for_read(offset)
        }

        fn reinit_for_append(&mut self, pos: u64) -> io::Result<()> {
            self.inner.reinit_for_append(pos)
        }

        fn next_chunk(&mut self) -> io::Result<&[u8]> {
            if self.fail_after_chunks == Some(self.chunks) {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "short read"));
            }
            self.chunks += 1;
            self.inner.next_chunk()
        }

        fn write(&mut self, data: &[u8]) -> io::Result<()> {
            self.inner.write(data)
        }
    }

    #[test]
    fn test_stream_sends_everything_in_chunks() {
        let mut cache = cache_with(b"abcdefghij", 3);
        let mut offset = 0;
        let mut out = Vec::new();

        let sent = WriteSetStreamer::default()
            .write_cache_buf(&mut cache, &mut offset, &mut out)
            .unwrap();
        assert_eq!(sent, 10);
        assert_eq!(offset, 10);
        assert_eq!(out, b"abcdefghij");
        assert!(!cache.is_read_positioned());
        assert_eq!(cache.tell(), 10);
    }

    #[test]
    fn test_resumption_sends_only_new_bytes() {
        let cases: Vec<(Vec<u8>, Vec<u8>)> = vec![
            (Vec::new(), Vec::new()),
            (b"x".to_vec(), b"y".to_vec()),
            (vec![7; 70], vec![9; 33]),
        ];
        for (first, second) in cases {
            let mut cache = StagingCache::in_memory(16);
            let streamer = WriteSetStreamer::default();
            let mut offset = 0;
            let mut out = Vec::new();

            cache.write(&first).unwrap();
            streamer.write_cache_buf(&mut cache, &mut offset, &mut out).unwrap();
            cache.write(&second).unwrap();
            let sent = streamer
                .write_cache_buf(&mut cache, &mut offset, &mut out)
                .unwrap();

            assert_eq!(sent, second.len() as u64);
            assert_eq!(out, [first.as_slice(), second.as_slice()].concat());
            assert_eq!(offset, (first.len() + second.len()) as u64);
        }
    }

    #[test]
    fn test_size_equal_to_limit_succeeds() {
        let mut cache = cache_with(b"12345", 2);
        let mut offset = 0;
        let mut out = Vec::new();
        WriteSetStreamer::new(5)
            .write_cache_buf(&mut cache, &mut offset, &mut out)
            .unwrap();
        assert_eq!(out, b"12345");
    }

    #[test]
    fn test_size_limit_exceeded_by_one_byte() {
        let mut cache = cache_with(b"123456", 2);
        let mut offset = 0;
        let mut out = b"stale".to_vec();

        let err = WriteSetStreamer::new(5)
            .write_cache_buf(&mut cache, &mut offset, &mut out)
            .unwrap_err();
        assert!(matches!(
            err,
            WriteSetError::SizeLimitExceeded { limit: 5, size: 6 }
        ));
        assert!(out.is_empty());
        assert_eq!(offset, 0);
        assert!(!cache.is_read_positioned());
        assert_eq!(cache.tell(), 6);
        cache.write(b"7").unwrap();
        assert_eq!(cache.tell(), 7);
    }

    #[test]
    fn test_limit_counts_only_bytes_of_this_call() {
        let mut cache = cache_with(b"1234", 4);
        let streamer = WriteSetStreamer::new(4);
        let mut offset = 0;
        let mut out = Vec::new();
        streamer.write_cache_buf(&mut cache, &mut offset, &mut out).unwrap();
        cache.write(b"5678").unwrap();
        streamer.write_cache_buf(&mut cache, &mut offset, &mut out).unwrap();
        assert_eq!(out, b"12345678");
    }

    #[test]
    fn test_reinit_failure_restores_append_position() {
        let mut cache = FailingCache::new(b"abc");
        cache.fail_reinit = true;
        let mut offset = 0;
        let mut out = Vec::new();

        let err = WriteSetStreamer::default()
            .write_cache_buf(&mut cache, &mut offset, &mut out)
            .unwrap_err();
        assert!(matches!(err, WriteSetError::CacheReinit { offset: 0, .. }));
        assert!(!cache.inner.is_read_positioned());
        assert_eq!(cache.tell(), 3);
    }

    #[test]
    fn test_read_failure_mid_drain_clears_buffer() {
        let mut cache = FailingCache::new(b"abcdef");
        cache.fail_after_chunks = Some(1);
        let mut offset = 0;
        let mut out = Vec::new();

        let err = WriteSetStreamer::default()
            .write_cache_buf(&mut cache, &mut offset, &mut out)
            .unwrap_err();
        assert!(matches!(err, WriteSetError::CacheRead(_)));
        assert!(out.is_empty());
        assert_eq!(offset, 0);
        assert!(!cache.inner.is_read_positioned());
    }

    #[test]
    fn test_offset_past_end_is_reinit_error() {
        let mut cache = cache_with(b"ab", 4);
        let mut offset = 3;
        let mut out = Vec::new();
        let err = WriteSetStreamer::default()
            .write_cache_buf(&mut cache, &mut offset, &mut out)
            .unwrap_err();
        assert!(matches!(err, WriteSetError::CacheReinit { offset: 3, .. }));
        assert_eq!(cache.tell(), 2);
    }

    #[test]
    fn test_write_cache_appends_to_provider() {
        let provider = RecordingProvider::new(Uuid::new_v4());
        let trx = TrxId::new(3);
        let mut cache = cache_with(b"0123456789", 4);
        let mut offset = 2;

        let sent = WriteSetStreamer::default()
            .write_cache(&provider, trx, &mut cache, &mut offset)
            .unwrap();
        assert_eq!(sent, 8);
        assert_eq!(provider.write_set(trx), b"23456789");
        assert_eq!(provider.append_calls(), 2);
    }

    #[test]
    fn test_provider_failure_stops_drain() {
        let provider = RecordingProvider::new(Uuid::new_v4());
        let trx = TrxId::new(3);
        provider.fail_appends(trx);
        let mut cache = cache_with(b"abcd", 2);
        let mut offset = 0;

        let err = WriteSetStreamer::default()
            .write_cache(&provider, trx, &mut cache, &mut offset)
            .unwrap_err();
        assert_eq!(err.code(), "CERT_WRITESET_PROVIDER_APPEND");
        assert_eq!(provider.append_calls(), 1);
        assert_eq!(offset, 0);
        assert_eq!(cache.tell(), 4);
    }

    #[test]
    fn test_prepare_data_flushes_pending_event() {
        let provider = RecordingProvider::new(Uuid::new_v4());
        let mut trx = Transaction::new(TrxId::new(5), 1);
        trx.write_statement_event(b"stmt;").unwrap();
        trx.write_event(b"row").unwrap();
        assert_eq!(cache_size(&trx), 8);

        let streamer = WriteSetStreamer::default();
        assert_eq!(streamer.prepare_data_for_replication(&mut trx, &provider).unwrap(), 8);
        assert_eq!(trx.ws_offset(), 8);

        trx.write_event(b"+more").unwrap();
        assert_eq!(streamer.prepare_data_for_replication(&mut trx, &provider).unwrap(), 5);
        assert_eq!(provider.write_set(trx.id()), b"stmt;row+more");
    }

    #[test]
    fn test_prepare_data_failure_discards_write_set() {
        let provider = RecordingProvider::new(Uuid::new_v4());
        let mut trx = Transaction::new(TrxId::new(5), 1);
        trx.write_event(b"too large").unwrap();

        let err = WriteSetStreamer::new(4)
            .prepare_data_for_replication(&mut trx, &provider)
            .unwrap_err();
        assert!(matches!(err, WriteSetError::SizeLimitExceeded { .. }));
        assert_eq!(cache_size(&trx), 0);
        assert_eq!(trx.ws_offset(), 0);
        assert!(provider.write_set(trx.id()).is_empty());
    }

    #[test]
    fn test_prepare_fragment_uses_buffer() {
        let mut trx = Transaction::new(TrxId::new(6), 1);
        trx.write_event(b"frag-1").unwrap();
        let mut fragment = Vec::new();

        let streamer = WriteSetStreamer::default();
        streamer
            .prepare_fragment_for_replication(&mut trx, &mut fragment)
            .unwrap();
        assert_eq!(fragment, b"frag-1");

        fragment.clear();
        trx.write_event(b"frag-2").unwrap();
        streamer
            .prepare_fragment_for_replication(&mut trx, &mut fragment)
            .unwrap();
        assert_eq!(fragment, b"frag-2");
    }
}
