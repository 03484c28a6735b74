use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use copperbooks_accounting::JournalEntry;
use copperbooks_core::{ExpectedVersion, TenantId};

/// A journal entry as persisted: the immutable entry plus its position in
/// the tenant's journal.
///
/// Sequence numbers are assigned by the store during append, are
/// monotonically increasing per tenant (1, 2, 3, ...), and never change;
/// they are the stable tie-breaker for same-date ordering in reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedEntry {
    pub sequence_number: u64,
    pub entry: JournalEntry,
}

/// Journal persistence error.
///
/// Infrastructure failures (storage, concurrency, isolation), as opposed to
/// domain errors (validation, invariants).
#[derive(Debug, Error)]
pub enum JournalStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),
}

/// Append-only, tenant-scoped journal persistence.
///
/// One stream per tenant. `append` must be atomic (every entry in the batch
/// is persisted or none is; a concurrent reader never observes part of a
/// batch), must enforce tenant isolation, and must check the optimistic
/// `expected_version` against the stream's current version (its last
/// sequence number) before writing. Entries are immutable once appended;
/// there is no update or delete.
pub trait JournalStore: Send + Sync {
    /// Append validated entries to a tenant's journal.
    fn append(
        &self,
        tenant_id: TenantId,
        entries: Vec<JournalEntry>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<PostedEntry>, JournalStoreError>;

    /// Load a tenant's full journal in sequence order.
    fn load_journal(&self, tenant_id: TenantId) -> Result<Vec<PostedEntry>, JournalStoreError>;
}

impl<S> JournalStore for Arc<S>
where
    S: JournalStore + ?Sized,
{
    fn append(
        &self,
        tenant_id: TenantId,
        entries: Vec<JournalEntry>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<PostedEntry>, JournalStoreError> {
        (**self).append(tenant_id, entries, expected_version)
    }

    fn load_journal(&self, tenant_id: TenantId) -> Result<Vec<PostedEntry>, JournalStoreError> {
        (**self).load_journal(tenant_id)
    }
}
