//! Global replication position
//!
//! A position is the cluster identity plus the sequence number the
//! provider assigned during certification. Text form: `<uuid>:<seqno>`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Provider-assigned global sequence number.
///
/// `-1` is the undefined value carried by transactions that have not
/// been certified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Seqno(i64);

impl Seqno {
    /// Sequence number of an uncertified transaction
    pub const UNDEFINED: Seqno = Seqno(-1);

    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_undefined(&self) -> bool {
        self.0 < 0
    }

    /// Largest sequence number accepted from outside. It still has a
    /// successor, so numbering can resume after it.
    pub const MAX: Seqno = Seqno(i64::MAX - 1);

    /// `value` as a sequence number, if it is `-1` or in `0..=MAX`.
    pub fn checked(value: i64) -> Option<Self> {
        (Self::UNDEFINED.0..=Self::MAX.0)
            .contains(&value)
            .then_some(Self(value))
    }

    /// The following sequence number, `None` once the range is used up.
    /// Undefined is followed by 0.
    pub fn next(&self) -> Option<Self> {
        if self.is_undefined() {
            Some(Self(0))
        } else {
            self.0.checked_add(1).map(Self)
        }
    }
}

impl Default for Seqno {
    fn default() -> Self {
        Self::UNDEFINED
    }
}

impl fmt::Display for Seqno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors from parsing `<uuid>:<seqno>`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionParseError {
    #[error("missing ':' separator in position '{0}'")]
    MissingSeparator(String),

    #[error("invalid cluster id '{0}'")]
    InvalidClusterId(String),

    #[error("invalid sequence number '{0}'")]
    InvalidSeqno(String),
}

/// Cluster identity plus sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GlobalPosition {
    pub cluster_id: Uuid,
    pub seqno: Seqno,
}

impl GlobalPosition {
    pub fn new(cluster_id: Uuid, seqno: Seqno) -> Self {
        Self { cluster_id, seqno }
    }

    /// The nil cluster at the undefined sequence number
    pub fn undefined() -> Self {
        Self::new(Uuid::nil(), Seqno::UNDEFINED)
    }

    pub fn is_undefined(&self) -> bool {
        self.cluster_id.is_nil() && self.seqno.is_undefined()
    }
}

impl fmt::Display for GlobalPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.cluster_id.hyphenated(), self.seqno)
    }
}

impl FromStr for GlobalPosition {
    type Err = PositionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (id, seqno) = s
            .rsplit_once(':')
            .ok_or_else(|| PositionParseError::MissingSeparator(s.to_string()))?;

        let cluster_id = Uuid::parse_str(id)
            .map_err(|_| PositionParseError::InvalidClusterId(id.to_string()))?;
        let seqno = seqno
            .parse::<i64>()
            .ok()
            .and_then(Seqno::checked)
            .ok_or_else(|| PositionParseError::InvalidSeqno(seqno.to_string()))?;

        Ok(Self::new(cluster_id, seqno))
    }
}
