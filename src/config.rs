//! Replication configuration
//!
//! Loaded once from a JSON file and passed explicitly to whatever needs
//! it. Nothing reads configuration from globals.
//!
//! ```json
//! {
//!   "data_dir": "/var/lib/certcommit",
//!   "max_ws_size": 2147483647,
//!   "external_commit_ordering": false,
//!   "cache_chunk_size": 32768,
//!   "buffered_log": { "path": "/var/log/certcommit.err", "buffer_size": 65536, "file_size": 1048576, "rotations": 3 }
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coordinator::CoordinatorConfig;
use crate::observability::BufferedLogConfig;
use crate::writeset::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_WS_SIZE};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{0} must be > 0")]
    Zero(&'static str),
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Read { .. } => "CERT_CONFIG_READ",
            ConfigError::Parse(_) => "CERT_CONFIG_PARSE",
            ConfigError::Zero(_) => "CERT_CONFIG_INVALID",
        }
    }
}

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationConfig {
    /// Directory for the position file and write-set dumps
    pub data_dir: String,

    /// Maximum bytes streamed per write-set drain
    #[serde(default = "default_max_ws_size")]
    pub max_ws_size: u64,

    /// An independent durability log already orders commits
    #[serde(default)]
    pub external_commit_ordering: bool,

    /// Refill chunk of the staging cache
    #[serde(default = "default_cache_chunk_size")]
    pub cache_chunk_size: usize,

    #[serde(default)]
    pub buffered_log: Option<BufferedLogConfig>,
}

fn default_max_ws_size() -> u64 {
    DEFAULT_MAX_WS_SIZE
}

fn default_cache_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl ReplicationConfig {
    /// Defaults for everything but the data directory
    pub fn new(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_string_lossy().into_owned(),
            max_ws_size: default_max_ws_size(),
            external_commit_ordering: false,
            cache_chunk_size: default_cache_chunk_size(),
            buffered_log: None,
        }
    }

    /// Read, parse and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ReplicationConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_ws_size == 0 {
            return Err(ConfigError::Zero("max_ws_size"));
        }
        if self.cache_chunk_size == 0 {
            return Err(ConfigError::Zero("cache_chunk_size"));
        }
        Ok(())
    }

    pub fn data_path(&self) -> &Path {
        Path::new(&self.data_dir)
    }

    /// Coordinator settings derived from this file
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            max_ws_size: self.max_ws_size,
            external_commit_ordering: self.external_commit_ordering,
            dump_dir: Some(self.data_path().to_path_buf()),
        }
    }
}
