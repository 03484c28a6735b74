use std::collections::HashMap;
use std::sync::RwLock;

use copperbooks_accounting::JournalEntry;
use copperbooks_core::{ExpectedVersion, TenantId};

use super::r#trait::{JournalStore, JournalStoreError, PostedEntry};

/// In-memory append-only journal store.
///
/// Intended for tests/dev. Appends happen entirely under the write lock:
/// validation first, then every entry pushed, so readers see either none or
/// all of a batch.
#[derive(Debug, Default)]
pub struct InMemoryJournalStore {
    journals: RwLock<HashMap<TenantId, Vec<PostedEntry>>>,
}

impl InMemoryJournalStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(journal: &[PostedEntry]) -> u64 {
        journal.last().map(|e| e.sequence_number).unwrap_or(0)
    }
}

impl JournalStore for InMemoryJournalStore {
    fn append(
        &self,
        tenant_id: TenantId,
        entries: Vec<JournalEntry>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<PostedEntry>, JournalStoreError> {
        if entries.is_empty() {
            return Ok(vec![]);
        }

        for (idx, entry) in entries.iter().enumerate() {
            if entry.tenant_id != tenant_id {
                return Err(JournalStoreError::TenantIsolation(format!(
                    "batch contains a foreign tenant_id (index {idx})"
                )));
            }
        }

        let mut journals = self
            .journals
            .write()
            .map_err(|_| JournalStoreError::InvalidAppend("lock poisoned".to_string()))?;

        let journal = journals.entry(tenant_id).or_default();
        let current = Self::current_version(journal);

        if !expected_version.matches(current) {
            return Err(JournalStoreError::Concurrency(format!(
                "expected {expected_version:?}, found {current}"
            )));
        }

        for (idx, entry) in entries.iter().enumerate() {
            if journal.iter().any(|p| p.entry.entry_id == entry.entry_id) {
                return Err(JournalStoreError::InvalidAppend(format!(
                    "entry_id already appended (index {idx})"
                )));
            }
        }

        // Assign sequence numbers and append (append-only).
        let mut next = current + 1;
        let mut committed = Vec::with_capacity(entries.len());
        for entry in entries {
            let posted = PostedEntry {
                sequence_number: next,
                entry,
            };
            next += 1;
            journal.push(posted.clone());
            committed.push(posted);
        }

        Ok(committed)
    }

    fn load_journal(&self, tenant_id: TenantId) -> Result<Vec<PostedEntry>, JournalStoreError> {
        let journals = self
            .journals
            .read()
            .map_err(|_| JournalStoreError::InvalidAppend("lock poisoned".to_string()))?;

        Ok(journals.get(&tenant_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use copperbooks_accounting::{EntryReference, JournalLine};
    use copperbooks_core::{AccountId, EntryId, Money};

    fn entry_for(tenant_id: TenantId, amount: i64) -> JournalEntry {
        JournalEntry::new(
            EntryId::new(),
            tenant_id,
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            "store test",
            EntryReference::manual(),
            vec![
                JournalLine::debit(AccountId::new(), Money::new(amount), None),
                JournalLine::credit(AccountId::new(), Money::new(amount), None),
            ],
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn append_assigns_monotonic_sequence_numbers() {
        let store = InMemoryJournalStore::new();
        let tenant_id = TenantId::new();

        let first = store
            .append(tenant_id, vec![entry_for(tenant_id, 100)], ExpectedVersion::Exact(0))
            .unwrap();
        let second = store
            .append(tenant_id, vec![entry_for(tenant_id, 200)], ExpectedVersion::Exact(1))
            .unwrap();

        assert_eq!(first[0].sequence_number, 1);
        assert_eq!(second[0].sequence_number, 2);
        assert_eq!(store.load_journal(tenant_id).unwrap().len(), 2);
    }

    #[test]
    fn stale_expected_version_is_a_concurrency_error() {
        let store = InMemoryJournalStore::new();
        let tenant_id = TenantId::new();

        store
            .append(tenant_id, vec![entry_for(tenant_id, 100)], ExpectedVersion::Exact(0))
            .unwrap();
        let err = store
            .append(tenant_id, vec![entry_for(tenant_id, 200)], ExpectedVersion::Exact(0))
            .unwrap_err();
        assert!(matches!(err, JournalStoreError::Concurrency(_)));

        // Nothing was written by the failed call.
        assert_eq!(store.load_journal(tenant_id).unwrap().len(), 1);
    }

    #[test]
    fn foreign_tenant_entries_are_rejected() {
        let store = InMemoryJournalStore::new();
        let tenant_id = TenantId::new();
        let other = TenantId::new();

        let err = store
            .append(tenant_id, vec![entry_for(other, 100)], ExpectedVersion::Any)
            .unwrap_err();
        assert!(matches!(err, JournalStoreError::TenantIsolation(_)));
        assert!(store.load_journal(tenant_id).unwrap().is_empty());
    }

    #[test]
    fn journals_are_isolated_per_tenant() {
        let store = InMemoryJournalStore::new();
        let tenant_a = TenantId::new();
        let tenant_b = TenantId::new();

        store
            .append(tenant_a, vec![entry_for(tenant_a, 100)], ExpectedVersion::Any)
            .unwrap();

        assert_eq!(store.load_journal(tenant_a).unwrap().len(), 1);
        assert!(store.load_journal(tenant_b).unwrap().is_empty());
    }
}
