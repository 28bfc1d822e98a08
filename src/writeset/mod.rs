//! Write-set streaming
//!
//! A transaction's change events are staged in a local [`LogCache`] and
//! streamed to a destination in bounded chunks, possibly several times per
//! transaction (once per statement in streaming mode), each call sending
//! only the bytes staged since the previous one.
//!
//! Failure handling:
//! - size limit: the drain stops, nothing more is sent
//! - cache I/O: fatal to the drain
//! - provider append: fatal to the drain, already-appended bytes stay
//!
//! In every case the cache ends up write-positioned where it was on entry.

mod cache;
mod dump;
mod errors;
mod sink;
mod stream;

pub use cache::{LogCache, MemoryCache, StagingCache, DEFAULT_CHUNK_SIZE};
pub use dump::{dump_file_name, dump_writeset, dump_writeset_with_header, LOG_MAGIC};
pub use errors::{WriteSetError, WriteSetResult};
pub use sink::{BufferSink, ChunkSink, ProviderSink};
pub use stream::{cache_size, WriteSetStreamer, DEFAULT_MAX_WS_SIZE};
