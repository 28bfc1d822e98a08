//! Certification keys
//!
//! A key names a resource (schema, then table) and carries the access mode
//! the transaction needs on it. The provider compares key sets of
//! concurrently certifying transactions to find conflicts.

use std::collections::HashMap;
use std::fmt;

/// Access mode of a certification key, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyMode {
    /// Read dependency
    Shared,
    /// Referenced by a foreign key
    Reference,
    /// Row update
    Update,
    /// Whole-resource exclusive access
    Exclusive,
}

impl KeyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyMode::Shared => "shared",
            KeyMode::Reference => "reference",
            KeyMode::Update => "update",
            KeyMode::Exclusive => "exclusive",
        }
    }

    /// Whether a key held in `self` mode covers a requirement of `required`
    pub fn satisfies(&self, required: KeyMode) -> bool {
        *self >= required
    }
}

impl fmt::Display for KeyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite resource name plus access mode
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CertKey {
    parts: Vec<String>,
    mode: KeyMode,
}

impl CertKey {
    pub fn new(mode: KeyMode) -> Self {
        Self {
            parts: Vec::new(),
            mode,
        }
    }

    /// Table-level key: `[db, table]`
    pub fn table(db: &str, table: &str, mode: KeyMode) -> Self {
        let mut key = Self::new(mode);
        key.append_part(db);
        key.append_part(table);
        key
    }

    pub fn append_part(&mut self, part: &str) {
        self.parts.push(part.to_string());
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    pub fn mode(&self) -> KeyMode {
        self.mode
    }
}

impl fmt::Display for CertKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.parts.join("."), self.mode)
    }
}

/// Keys declared by one transaction.
///
/// Appending the same resource twice keeps the stronger mode.
#[derive(Debug, Clone, Default)]
pub struct CertKeySet {
    keys: HashMap<Vec<String>, KeyMode>,
}

impl CertKeySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, key: CertKey) {
        let mode = self.keys.entry(key.parts).or_insert(key.mode);
        if key.mode > *mode {
            *mode = key.mode;
        }
    }

    /// Whether a key for the same resource exists in at least the
    /// requested mode
    pub fn has_key(&self, key: &CertKey) -> bool {
        self.keys
            .get(key.parts())
            .map_or(false, |held| held.satisfies(key.mode()))
    }

    /// Mode held for a resource, if any
    pub fn mode_of(&self, parts: &[String]) -> Option<KeyMode> {
        self.keys.get(parts).copied()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }
}
