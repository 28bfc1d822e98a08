//! Cluster position file
//!
//! One line, `<cluster uuid>:<seqno>`, in `<data_dir>/cluster_position`.
//! Written once when a node's data directory is prepared (for example
//! after a backup is taken) and read at startup to resume replication
//! from that position.
//!
//! Atomicity comes from the usual sequence:
//! 1. write `cluster_position.tmp`
//! 2. fsync it
//! 3. rename over `cluster_position`
//! 4. fsync the directory

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::errors::{PositionError, PositionResult};
use crate::observability::{log_event_with_fields, Event};
use crate::provider::GlobalPosition;

const POSITION_FILE_NAME: &str = "cluster_position";

#[derive(Debug, Clone)]
pub struct PositionFile {
    path: PathBuf,
    temp_path: PathBuf,
}

impl PositionFile {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(POSITION_FILE_NAME),
            temp_path: data_dir.join(format!("{}.tmp", POSITION_FILE_NAME)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Persist `position`.
    ///
    /// An existing file is left alone unless `overwrite` is set (an
    /// incremental backup moves the position forward). Returns whether
    /// the file was written.
    pub fn write(&self, position: &GlobalPosition, overwrite: bool) -> PositionResult<bool> {
        if !overwrite && self.exists() {
            return Ok(false);
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| PositionError::io(parent, e))?;
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.temp_path)
            .map_err(|e| PositionError::io(&self.temp_path, e))?;
        writeln!(file, "{}", position).map_err(|e| PositionError::io(&self.temp_path, e))?;
        file.sync_all()
            .map_err(|e| PositionError::io(&self.temp_path, e))?;

        fs::rename(&self.temp_path, &self.path).map_err(|e| PositionError::io(&self.path, e))?;

        if let Some(parent) = self.path.parent() {
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        log_event_with_fields(
            Event::PositionRecovered,
            &[
                ("path", &self.path.display().to_string()),
                ("position", &position.to_string()),
            ],
        );
        Ok(true)
    }

    /// Position stored in the file, or `None` when there is no file.
    pub fn read(&self) -> PositionResult<Option<GlobalPosition>> {
        if !self.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path).map_err(|e| PositionError::io(&self.path, e))?;
        content
            .parse::<GlobalPosition>()
            .map(Some)
            .map_err(|source| PositionError::Corrupt {
                path: self.path.clone(),
                source,
            })
    }

    /// Delete the file. Missing is fine.
    pub fn remove(&self) -> PositionResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PositionError::io(&self.path, e)),
        }
    }
}
