//! Staging cache for pending change events
//!
//! The cache is append-only while a statement runs. Streaming temporarily
//! turns it into a sequential reader, starting at whatever offset has not
//! been replicated yet, and then turns it back into an appender.

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

/// Default size of one refill chunk
pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

/// The five primitives the streaming writer needs from a local log cache.
pub trait LogCache {
    /// Current position: the append position when write-positioned, the
    /// read cursor when read-positioned.
    fn tell(&self) -> u64;

    /// Switch to reading, starting at `offset`.
    fn reinit_for_read(&mut self, offset: u64) -> io::Result<()>;

    /// Switch to appending at `pos`. Bytes beyond `pos` are discarded.
    fn reinit_for_append(&mut self, pos: u64) -> io::Result<()>;

    /// Next contiguous chunk of unread bytes, refilled from storage.
    /// An empty slice means everything written has been read.
    fn next_chunk(&mut self) -> io::Result<&[u8]>;

    /// Append raw bytes. Fails while read-positioned.
    fn write(&mut self, data: &[u8]) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Write,
    Read { pos: u64, end: u64 },
}

/// Seekable-storage backed staging cache.
///
/// Works over anything `Read + Write + Seek`: `Cursor<Vec<u8>>` for an
/// in-memory cache, `std::fs::File` for one spilled to disk.
#[derive(Debug)]
pub struct StagingCache<S> {
    storage: S,
    chunk: Vec<u8>,
    write_pos: u64,
    mode: Mode,
}

/// In-memory staging cache
pub type MemoryCache = StagingCache<Cursor<Vec<u8>>>;

impl StagingCache<Cursor<Vec<u8>>> {
    pub fn in_memory(chunk_size: usize) -> Self {
        Self::new(Cursor::new(Vec::new()), chunk_size)
    }
}

impl Default for StagingCache<Cursor<Vec<u8>>> {
    fn default() -> Self {
        Self::in_memory(DEFAULT_CHUNK_SIZE)
    }
}

impl<S: Read + Write + Seek> StagingCache<S> {
    /// Wrap `storage`. Existing storage content is ignored and overwritten.
    pub fn new(storage: S, chunk_size: usize) -> Self {
        Self {
            storage,
            chunk: vec![0; chunk_size.max(1)],
            write_pos: 0,
            mode: Mode::Write,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk.len()
    }

    /// Bytes written so far
    pub fn len(&self) -> u64 {
        self.write_pos
    }

    pub fn is_empty(&self) -> bool {
        self.write_pos == 0
    }

    pub fn is_read_positioned(&self) -> bool {
        matches!(self.mode, Mode::Read { .. })
    }

    pub fn into_inner(self) -> S {
        self.storage
    }
}

impl<S: Read + Write + Seek> LogCache for StagingCache<S> {
    fn tell(&self) -> u64 {
        match self.mode {
            Mode::Write => self.write_pos,
            Mode::Read { pos, .. } => pos,
        }
    }

    fn reinit_for_read(&mut self, offset: u64) -> io::Result<()> {
        if offset > self.write_pos {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "read offset {} is past the end of the cache ({})",
                    offset, self.write_pos
                ),
            ));
        }
        self.storage.seek(SeekFrom::Start(offset))?;
        self.mode = Mode::Read {
            pos: offset,
            end: self.write_pos,
        };
        Ok(())
    }

    fn reinit_for_append(&mut self, pos: u64) -> io::Result<()> {
        if pos > self.write_pos {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "append position {} is past the end of the cache ({})",
                    pos, self.write_pos
                ),
            ));
        }
        self.storage.seek(SeekFrom::Start(pos))?;
        self.write_pos = pos;
        self.mode = Mode::Write;
        Ok(())
    }

    fn next_chunk(&mut self) -> io::Result<&[u8]> {
        let (pos, end) = match self.mode {
            Mode::Read { pos, end } => (pos, end),
            Mode::Write => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "cache is not positioned for read",
                ))
            }
        };
        if pos >= end {
            return Ok(&[]);
        }

        let n = (end - pos).min(self.chunk.len() as u64) as usize;
        self.storage.seek(SeekFrom::Start(pos))?;
        self.storage.read_exact(&mut self.chunk[..n])?;
        self.mode = Mode::Read {
            pos: pos + n as u64,
            end,
        };
        Ok(&self.chunk[..n])
    }

    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        if self.is_read_positioned() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cache is positioned for read",
            ));
        }
        self.storage.seek(SeekFrom::Start(self.write_pos))?;
        self.storage.write_all(data)?;
        self.write_pos += data.len() as u64;
        Ok(())
    }
}
