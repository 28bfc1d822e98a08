//! Buffered error log
//!
//! Optional file sink that keeps formatted log lines in memory and writes
//! them out in batches. The file is size-capped and rotated
//! (`path` -> `path.1` -> ... -> `path.N`). Any I/O failure disables the
//! sink; the failure is reported once through the stdout logger.
//!
//! At most one log is installed process-wide; [`Logger`] copies each line
//! it writes into it.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use serde::{Deserialize, Serialize};

use super::events::Event;
use super::logger::{Logger, Severity};

/// Settings for [`BufferedErrorLog`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferedLogConfig {
    /// Log file path
    pub path: PathBuf,
    /// In-memory buffer size in bytes
    pub buffer_size: u64,
    /// Maximum file size in bytes before rotation
    pub file_size: u64,
    /// Number of rotated files kept; 0 truncates instead of rotating
    #[serde(default)]
    pub rotations: u32,
}

impl BufferedLogConfig {
    /// All three of path, buffer size and file size must be set.
    pub fn is_usable(&self) -> bool {
        self.buffer_size > 0 && self.file_size > 0 && !self.path.as_os_str().is_empty()
    }
}

/// Batched, rotating log file.
///
/// Shared between threads: the buffer and the file sit behind one mutex.
/// Once installed with [`install_error_log`], every line written by
/// [`Logger`] is copied here as well.
#[derive(Debug)]
pub struct BufferedErrorLog {
    path: PathBuf,
    state: Mutex<LogState>,
}

#[derive(Debug)]
struct LogState {
    config: BufferedLogConfig,
    buffer: Vec<u8>,
    file: Option<File>,
    file_len: u64,
}

/// The sink was switched off by a failed operation.
struct Disabled {
    operation: &'static str,
    error: io::Error,
}

static ERROR_LOG: RwLock<Option<Arc<BufferedErrorLog>>> = RwLock::new(None);

/// Copy every subsequently logged line into `log`. Returns the log that
/// was installed before, if any.
pub fn install_error_log(log: Arc<BufferedErrorLog>) -> Option<Arc<BufferedErrorLog>> {
    ERROR_LOG
        .write()
        .unwrap_or_else(|e| e.into_inner())
        .replace(log)
}

/// Stop copying log lines. Returns the log that was installed.
pub fn uninstall_error_log() -> Option<Arc<BufferedErrorLog>> {
    ERROR_LOG.write().unwrap_or_else(|e| e.into_inner()).take()
}

/// Hand one formatted line to the installed log, if there is one.
pub(crate) fn record_line(line: &str) {
    let installed = ERROR_LOG
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .clone();
    if let Some(log) = installed {
        log.write_timestamped(line);
    }
}

impl BufferedErrorLog {
    /// Open the log. Returns an inactive sink when the configuration is not
    /// usable or the file cannot be opened.
    pub fn open(config: BufferedLogConfig) -> Self {
        let mut state = LogState {
            buffer: Vec::with_capacity(config.buffer_size.min(1 << 20) as usize),
            config,
            file: None,
            file_len: 0,
        };
        let path = state.config.path.clone();

        if state.config.is_usable() {
            match open_append(&path) {
                Ok((file, len)) => {
                    state.file = Some(file);
                    state.file_len = len;
                    Logger::info(
                        Event::BufferedLogOpened.as_str(),
                        &[
                            ("buffer_size", &state.config.buffer_size.to_string()),
                            ("file_size", &state.config.file_size.to_string()),
                            ("path", &path.display().to_string()),
                            ("rotations", &state.config.rotations.to_string()),
                        ],
                    );
                }
                Err(error) => report_disabled(
                    &path,
                    Disabled {
                        operation: "open",
                        error,
                    },
                ),
            }
        }

        Self {
            path,
            state: Mutex::new(state),
        }
    }

    /// Whether lines are currently being recorded
    pub fn is_active(&self) -> bool {
        self.lock().is_active()
    }

    /// Bytes held in memory, not yet written to the file
    pub fn buffered_len(&self) -> usize {
        self.lock().buffer.len()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record one structured event, prefixed with a UTC timestamp.
    pub fn log(&self, severity: Severity, event: &str, fields: &[(&str, &str)]) {
        self.write_timestamped(&Logger::format_line(severity, event, fields));
    }

    /// Record raw bytes. Lines larger than the buffer bypass it.
    pub fn write_line(&self, line: &[u8]) {
        self.with_active(|state| state.write_line(line));
    }

    /// Flush the buffer and sync the file.
    pub fn write_to_disk(&self) {
        self.with_active(LogState::write_to_disk);
    }

    /// Change the in-memory buffer size; buffered lines are flushed first.
    pub fn resize_buffer(&self, buffer_size: u64) {
        self.with_active(|state| {
            state.flush_buffer()?;
            state.config.buffer_size = buffer_size;
            if buffer_size == 0 {
                return Err(state.disable(
                    "resize_buffer",
                    io::Error::new(io::ErrorKind::InvalidInput, "buffer size must be non-zero"),
                ));
            }
            Ok(())
        });
    }

    /// Change the file size cap. Takes effect on the next write.
    pub fn resize_file_size(&self, file_size: u64) {
        self.with_active(|state| {
            state.config.file_size = file_size;
            if file_size == 0 {
                return Err(state.disable(
                    "resize_file_size",
                    io::Error::new(io::ErrorKind::InvalidInput, "file size must be non-zero"),
                ));
            }
            Ok(())
        });
    }

    /// Force a rotation now, keeping `rotations` old files.
    pub fn rotate(&self, rotations: u32) {
        if rotations == 0 {
            return;
        }
        self.with_active(|state| {
            state.config.rotations = rotations;
            state.flush_buffer()?;
            state
                .rotate_files()
                .map_err(|error| state.disable("rotate", error))
        });
    }

    /// Flush, sync and close. The sink is inactive afterwards.
    pub fn close(&self) {
        self.with_active(LogState::write_to_disk);
        let mut state = self.lock();
        state.file = None;
        state.buffer.clear();
    }

    fn write_timestamped(&self, line: &str) {
        let mut stamped = chrono::Utc::now().to_rfc3339();
        stamped.push(' ');
        stamped.push_str(line);
        self.write_line(stamped.as_bytes());
    }

    /// Run `op` on an active sink. A failure is reported after the lock is
    /// released, since the report itself is logged and copied back here.
    fn with_active<F>(&self, op: F)
    where
        F: FnOnce(&mut LogState) -> Result<(), Disabled>,
    {
        let result = {
            let mut state = self.lock();
            if !state.is_active() {
                return;
            }
            op(&mut state)
        };
        if let Err(disabled) = result {
            report_disabled(&self.path, disabled);
        }
    }

    fn lock(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for BufferedErrorLog {
    fn drop(&mut self) {
        self.close();
    }
}

impl LogState {
    fn is_active(&self) -> bool {
        self.file.is_some()
    }

    fn write_line(&mut self, line: &[u8]) -> Result<(), Disabled> {
        let capacity = self.config.buffer_size as usize;
        if self.buffer.len() + line.len() > capacity && !self.buffer.is_empty() {
            self.flush_buffer()?;
        }
        if line.len() > capacity {
            self.write_out(line)
        } else {
            self.buffer.extend_from_slice(line);
            Ok(())
        }
    }

    fn write_to_disk(&mut self) -> Result<(), Disabled> {
        self.flush_buffer()?;
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };
        file.sync_data().map_err(|error| self.disable("sync", error))
    }

    fn flush_buffer(&mut self) -> Result<(), Disabled> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let mut pending = std::mem::take(&mut self.buffer);
        let result = self.write_out(&pending);
        if self.is_active() {
            pending.clear();
            self.buffer = pending;
        }
        result
    }

    fn write_out(&mut self, bytes: &[u8]) -> Result<(), Disabled> {
        if self.file_len > 0 && self.file_len + bytes.len() as u64 > self.config.file_size {
            if let Err(error) = self.rotate_files() {
                return Err(self.disable("rotate", error));
            }
        }
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };
        match file.write_all(bytes) {
            Ok(()) => {
                self.file_len += bytes.len() as u64;
                Ok(())
            }
            Err(error) => Err(self.disable("write", error)),
        }
    }

    fn rotate_files(&mut self) -> io::Result<()> {
        let path = self.config.path.clone();
        let rotations = self.config.rotations;

        if rotations == 0 {
            if let Some(file) = self.file.as_mut() {
                file.set_len(0)?;
            }
            self.file_len = 0;
            return Ok(());
        }

        self.file = None;
        for i in (1..rotations).rev() {
            let from = rotated_path(&path, i);
            if from.exists() {
                fs::rename(&from, rotated_path(&path, i + 1))?;
            }
        }
        fs::rename(&path, rotated_path(&path, 1))?;

        let (file, len) = open_append(&path)?;
        self.file = Some(file);
        self.file_len = len;
        Ok(())
    }

    fn disable(&mut self, operation: &'static str, error: io::Error) -> Disabled {
        self.file = None;
        self.buffer.clear();
        Disabled { operation, error }
    }
}

fn report_disabled(path: &Path, disabled: Disabled) {
    Logger::warn(
        Event::BufferedLogDisabled.as_str(),
        &[
            ("error", &disabled.error.to_string()),
            ("operation", disabled.operation),
            ("path", &path.display().to_string()),
        ],
    );
}

fn open_append(path: &Path) -> io::Result<(File, u64)> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let len = file.metadata()?.len();
    Ok((file, len))
}

fn rotated_path(path: &Path, index: u32) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{}", index));
    PathBuf::from(name)
}
