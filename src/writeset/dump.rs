//! Rejected write-set dumps
//!
//! A write-set that failed certification or could not be applied is
//! written to `<dir>/GRA_<thread>_<seqno>.log` for offline inspection.
//! The `_v2` variant writes the 4-byte binary log magic before the
//! write-set bytes and nothing else.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::errors::{WriteSetError, WriteSetResult};
use crate::observability::{log_event_with_fields, Event};
use crate::provider::Seqno;

/// Binary log magic: `\xfe` followed by `bin`
pub const LOG_MAGIC: [u8; 4] = [0xfe, 0x62, 0x69, 0x6e];

/// File name of the dump for `thread_id` at `seqno`
pub fn dump_file_name(thread_id: u64, seqno: Seqno, with_header: bool) -> String {
    if with_header {
        format!("GRA_{}_{}_v2.log", thread_id, seqno)
    } else {
        format!("GRA_{}_{}.log", thread_id, seqno)
    }
}

/// Write `data` as-is. Returns the path written.
pub fn dump_writeset(
    dir: &Path,
    thread_id: u64,
    seqno: Seqno,
    data: &[u8],
) -> WriteSetResult<PathBuf> {
    let path = dir.join(dump_file_name(thread_id, seqno, false));
    write_dump(&path, &[data])
}

/// Write `data` behind the log magic. Returns the path written.
pub fn dump_writeset_with_header(
    dir: &Path,
    thread_id: u64,
    seqno: Seqno,
    data: &[u8],
) -> WriteSetResult<PathBuf> {
    let path = dir.join(dump_file_name(thread_id, seqno, true));
    write_dump(&path, &[&LOG_MAGIC, data])
}

fn write_dump(path: &Path, parts: &[&[u8]]) -> WriteSetResult<PathBuf> {
    let result = (|| {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        for part in parts {
            file.write_all(part)?;
        }
        file.sync_all()
    })();

    let path_str = path.display().to_string();
    match result {
        Ok(()) => {
            log_event_with_fields(Event::WritesetDumped, &[("path", &path_str)]);
            Ok(path.to_path_buf())
        }
        Err(source) => {
            log_event_with_fields(
                Event::WritesetDumpFailed,
                &[("error", &source.to_string()), ("path", &path_str)],
            );
            Err(WriteSetError::Dump {
                path: path.to_path_buf(),
                source,
            })
        }
    }
}
