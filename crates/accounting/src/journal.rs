//! Journal entries and the event-sourced journal aggregate.
//!
//! The journal is the system of record: every financial event becomes one
//! immutable, balanced entry of debit/credit lines. Posting is all-or-nothing
//! and the only correction mechanism is a reversal entry that mirrors the
//! original; nothing is ever edited or deleted.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use copperbooks_core::{
    AccountId, Aggregate, AggregateRoot, DomainError, DomainResult, EntryId, LineId, Money,
    TenantId,
};

/// What kind of upstream event produced an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    Invoice,
    Expense,
    Payroll,
    Depreciation,
    Reversal,
    Manual,
}

/// Link from an entry back to the business document that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryReference {
    pub kind: ReferenceKind,
    /// Upstream identifier (invoice number, payroll run id, ...). Free-form;
    /// the ledger never dereferences it.
    pub reference_id: Option<String>,
}

impl EntryReference {
    pub fn new(kind: ReferenceKind, reference_id: impl Into<String>) -> Self {
        Self {
            kind,
            reference_id: Some(reference_id.into()),
        }
    }

    pub fn manual() -> Self {
        Self {
            kind: ReferenceKind::Manual,
            reference_id: None,
        }
    }
}

/// One side of a journal entry.
///
/// Exactly one of `debit`/`credit` is nonzero, and neither is negative. A
/// line belongs to exactly one entry and is persisted or dropped with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLine {
    pub line_id: LineId,
    pub account_id: AccountId,
    pub debit: Money,
    pub credit: Money,
    pub description: Option<String>,
}

impl JournalLine {
    pub fn debit(account_id: AccountId, amount: Money, description: Option<String>) -> Self {
        Self {
            line_id: LineId::new(),
            account_id,
            debit: amount,
            credit: Money::ZERO,
            description,
        }
    }

    pub fn credit(account_id: AccountId, amount: Money, description: Option<String>) -> Self {
        Self {
            line_id: LineId::new(),
            account_id,
            debit: Money::ZERO,
            credit: amount,
            description,
        }
    }

    fn validate(&self) -> DomainResult<()> {
        if self.debit.is_negative() || self.credit.is_negative() {
            return Err(DomainError::validation(
                "line amounts must not be negative",
            ));
        }
        match (self.debit.is_zero(), self.credit.is_zero()) {
            (true, true) => Err(DomainError::validation(
                "line must have a nonzero debit or credit",
            )),
            (false, false) => Err(DomainError::validation(
                "line must not be both a debit and a credit",
            )),
            _ => Ok(()),
        }
    }

    /// The mirror of this line: debit and credit swapped, same account.
    fn mirrored(&self) -> Self {
        Self {
            line_id: LineId::new(),
            account_id: self.account_id,
            debit: self.credit,
            credit: self.debit,
            description: self.description.clone(),
        }
    }

    fn mirrors(&self, original: &JournalLine) -> bool {
        self.account_id == original.account_id
            && self.debit == original.credit
            && self.credit == original.debit
    }
}

/// An immutable, posted journal entry.
///
/// Entries exist only in posted form: construction validates the balance
/// invariant and the store persists the whole entry atomically, so there is
/// no draft state anywhere in the core. Once committed, an entry's lines
/// never change; corrections go through [`JournalEntry::reversal_of`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub entry_id: EntryId,
    pub tenant_id: TenantId,
    pub entry_date: NaiveDate,
    pub description: String,
    pub reference: EntryReference,
    /// Set when this entry reverses another; the original is never mutated.
    pub reversal_of: Option<EntryId>,
    pub lines: Vec<JournalLine>,
    pub posted_at: DateTime<Utc>,
}

impl JournalEntry {
    /// Build a posted entry, enforcing every line-level and entry-level
    /// invariant. An entry that fails here can never reach the store.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        entry_id: EntryId,
        tenant_id: TenantId,
        entry_date: NaiveDate,
        description: impl Into<String>,
        reference: EntryReference,
        lines: Vec<JournalLine>,
        posted_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let entry = Self {
            entry_id,
            tenant_id,
            entry_date,
            description: description.into(),
            reference,
            reversal_of: None,
            lines,
            posted_at,
        };
        entry.validate()?;
        Ok(entry)
    }

    /// Synthesize the reversal of `original`: every line mirrored 1:1
    /// (debit and credit swapped), linked via `reversal_of`. The mirror of a
    /// balanced entry is balanced, but it is validated again anyway because
    /// it goes through the same posting path.
    pub fn reversal_of(
        original: &JournalEntry,
        reason: Option<String>,
        reversal_date: NaiveDate,
        posted_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let description =
            reason.unwrap_or_else(|| format!("reversal of: {}", original.description));
        let entry = Self {
            entry_id: EntryId::new(),
            tenant_id: original.tenant_id,
            entry_date: reversal_date,
            description,
            reference: EntryReference::new(ReferenceKind::Reversal, original.entry_id.to_string()),
            reversal_of: Some(original.entry_id),
            lines: original.lines.iter().map(JournalLine::mirrored).collect(),
            posted_at,
        };
        entry.validate()?;
        Ok(entry)
    }

    /// Entry-level invariants: non-empty, well-formed lines, debits == credits
    /// exactly (to the minor unit).
    pub fn validate(&self) -> DomainResult<()> {
        if self.lines.is_empty() {
            return Err(DomainError::validation("journal entry must have lines"));
        }
        for line in &self.lines {
            line.validate()?;
        }
        let (debits, credits) = self.totals()?;
        if debits != credits {
            return Err(DomainError::validation(format!(
                "entry is not balanced: debits {debits}, credits {credits}"
            )));
        }
        Ok(())
    }

    /// Exact debit and credit totals across all lines.
    pub fn totals(&self) -> DomainResult<(Money, Money)> {
        let mut debits = Money::ZERO;
        let mut credits = Money::ZERO;
        for line in &self.lines {
            debits = debits
                .checked_add(line.debit)
                .ok_or_else(|| DomainError::invariant("entry debit total overflow"))?;
            credits = credits
                .checked_add(line.credit)
                .ok_or_else(|| DomainError::invariant("entry credit total overflow"))?;
        }
        Ok((debits, credits))
    }

    pub fn is_reversal(&self) -> bool {
        self.reversal_of.is_some()
    }
}

/// Command: post an already-constructed entry (a reversal is a post whose
/// entry carries `reversal_of`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostEntry {
    pub tenant_id: TenantId,
    pub entry: JournalEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalCommand {
    PostEntry(PostEntry),
}

/// Event: an entry was posted to the journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPosted {
    pub tenant_id: TenantId,
    pub entry: JournalEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalEvent {
    EntryPosted(EntryPosted),
}

/// Aggregate root: one tenant's journal.
///
/// State is rebuilt by replaying posted entries; `handle` decides, `apply`
/// evolves. The aggregate holds the full entry map so reversal checks
/// (existence, idempotency, mirror correctness) are authoritative here, not
/// in the calling layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Journal {
    tenant_id: TenantId,
    entries: HashMap<EntryId, JournalEntry>,
    /// original entry id → the reversal that undid it.
    reversals: HashMap<EntryId, EntryId>,
    /// Posting order, oldest first.
    order: Vec<EntryId>,
    version: u64,
}

impl Journal {
    /// Empty aggregate for rehydration.
    pub fn empty(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            entries: HashMap::new(),
            reversals: HashMap::new(),
            order: Vec::new(),
            version: 0,
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn entry(&self, entry_id: EntryId) -> Option<&JournalEntry> {
        self.entries.get(&entry_id)
    }

    /// The reversal entry that undid `entry_id`, if any.
    pub fn reversed_by(&self, entry_id: EntryId) -> Option<EntryId> {
        self.reversals.get(&entry_id).copied()
    }

    /// Posted entries in posting order.
    pub fn entries(&self) -> impl Iterator<Item = &JournalEntry> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn ensure_tenant(&self, tenant_id: TenantId) -> DomainResult<()> {
        if self.tenant_id != tenant_id {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn handle_post(&self, cmd: &PostEntry) -> Result<Vec<JournalEvent>, DomainError> {
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_tenant(cmd.entry.tenant_id)?;

        if self.entries.contains_key(&cmd.entry.entry_id) {
            return Err(DomainError::conflict("entry already posted"));
        }

        cmd.entry.validate()?;

        if let Some(original_id) = cmd.entry.reversal_of {
            let original = self
                .entries
                .get(&original_id)
                .ok_or_else(DomainError::not_found)?;
            if self.reversals.contains_key(&original_id) {
                return Err(DomainError::conflict("entry already reversed"));
            }
            if cmd.entry.lines.len() != original.lines.len()
                || !cmd
                    .entry
                    .lines
                    .iter()
                    .zip(&original.lines)
                    .all(|(rev, orig)| rev.mirrors(orig))
            {
                return Err(DomainError::invariant(
                    "reversal lines must mirror the original entry",
                ));
            }
        }

        Ok(vec![JournalEvent::EntryPosted(EntryPosted {
            tenant_id: cmd.tenant_id,
            entry: cmd.entry.clone(),
        })])
    }
}

impl AggregateRoot for Journal {
    type Id = TenantId;

    fn id(&self) -> &Self::Id {
        &self.tenant_id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Aggregate for Journal {
    type Command = JournalCommand;
    type Event = JournalEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            JournalEvent::EntryPosted(e) => {
                if let Some(original_id) = e.entry.reversal_of {
                    self.reversals.insert(original_id, e.entry.entry_id);
                }
                self.order.push(e.entry.entry_id);
                self.entries.insert(e.entry.entry_id, e.entry.clone());
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            JournalCommand::PostEntry(cmd) => self.handle_post(cmd),
        }
    }
}
