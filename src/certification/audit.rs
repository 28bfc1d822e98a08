//! Certification key audit
//!
//! Advisory check run at commit: every table lock the transaction holds
//! should be covered by a certification key, otherwise the provider cannot
//! see conflicts on that table. Missing keys are reported, never repaired,
//! and never fail the transaction.

use std::fmt;

use super::key::{CertKey, CertKeySet, KeyMode};
use crate::observability::{log_event_with_fields, Event};
use crate::trx::TrxId;

/// Lock namespaces. Only table locks are audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockNamespace {
    Global,
    Schema,
    Table,
    Function,
    Procedure,
    Trigger,
    Event,
}

/// Metadata lock types, weakest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockType {
    IntentionExclusive,
    Shared,
    SharedHighPriority,
    SharedRead,
    SharedWrite,
    SharedUpgradable,
    SharedReadOnly,
    SharedNoWrite,
    SharedNoReadWrite,
    Exclusive,
}

impl LockType {
    pub fn name(&self) -> &'static str {
        match self {
            LockType::IntentionExclusive => "MDL_INTENTION_EXCLUSIVE",
            LockType::Shared => "MDL_SHARED",
            LockType::SharedHighPriority => "MDL_SHARED_HIGH_PRIO",
            LockType::SharedRead => "MDL_SHARED_READ",
            LockType::SharedWrite => "MDL_SHARED_WRITE",
            LockType::SharedUpgradable => "MDL_SHARED_UPGRADABLE",
            LockType::SharedReadOnly => "MDL_SHARED_READ_ONLY",
            LockType::SharedNoWrite => "MDL_SHARED_NO_WRITE",
            LockType::SharedNoReadWrite => "MDL_SHARED_NO_READ_WRITE",
            LockType::Exclusive => "MDL_EXCLUSIVE",
        }
    }
}

impl fmt::Display for LockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One metadata lock held (or requested) by a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockTicket {
    pub owner: TrxId,
    pub namespace: LockNamespace,
    pub db: String,
    pub name: String,
    pub lock_type: LockType,
    pub granted: bool,
}

impl LockTicket {
    /// Granted table lock
    pub fn table(owner: TrxId, db: &str, name: &str, lock_type: LockType) -> Self {
        Self {
            owner,
            namespace: LockNamespace::Table,
            db: db.to_string(),
            name: name.to_string(),
            lock_type,
            granted: true,
        }
    }

    pub fn pending(mut self) -> Self {
        self.granted = false;
        self
    }
}

/// A held table lock with no covering certification key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingKey {
    pub db: String,
    pub name: String,
    pub lock_type: LockType,
}

/// Walks held locks against declared keys.
#[derive(Debug, Clone)]
pub struct KeyAuditor {
    exempt_schemas: Vec<String>,
    exempt_tables: Vec<String>,
    required_mode: KeyMode,
}

impl Default for KeyAuditor {
    /// Exempts the performance schema and the replication position table.
    fn default() -> Self {
        Self {
            exempt_schemas: vec!["performance_schema".to_string()],
            exempt_tables: vec!["gtid_slave_pos".to_string()],
            required_mode: KeyMode::Shared,
        }
    }
}

impl KeyAuditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exempt_schema(mut self, schema: &str) -> Self {
        self.exempt_schemas.push(schema.to_string());
        self
    }

    pub fn exempt_table(mut self, table: &str) -> Self {
        self.exempt_tables.push(table.to_string());
        self
    }

    /// Audit `locks` of transaction `trx` against `keys`.
    ///
    /// Locks that are pending, belong to another transaction, are not
    /// table locks, or name an exempt schema or table are skipped. One
    /// warning is logged per missing key, naming the triggering `query`.
    pub fn audit(
        &self,
        trx: TrxId,
        locks: &[LockTicket],
        keys: &CertKeySet,
        query: &str,
    ) -> Vec<MissingKey> {
        let mut missing = Vec::new();

        for lock in locks {
            if !self.is_audited(trx, lock) {
                continue;
            }

            let key = CertKey::table(&lock.db, &lock.name, self.required_mode);
            if keys.has_key(&key) {
                continue;
            }

            log_event_with_fields(
                Event::CertKeyMissing,
                &[
                    ("db", &lock.db),
                    ("lock_type", lock.lock_type.name()),
                    ("name", &lock.name),
                    ("query", query),
                    ("trx", &trx.to_string()),
                ],
            );
            missing.push(MissingKey {
                db: lock.db.clone(),
                name: lock.name.clone(),
                lock_type: lock.lock_type,
            });
        }

        missing
    }

    fn is_audited(&self, trx: TrxId, lock: &LockTicket) -> bool {
        lock.granted
            && lock.owner == trx
            && lock.namespace == LockNamespace::Table
            && !self.exempt_schemas.iter().any(|s| *s == lock.db)
            && !self.exempt_tables.iter().any(|t| *t == lock.name)
    }
}
