//! Ledger service: the command pipeline plus account management and the
//! period batch operations.
//!
//! Posting follows the same lifecycle for every caller: load the tenant's
//! journal, rehydrate the [`Journal`] aggregate, let it decide, then append
//! the decided entries with an optimistic concurrency check. Validation
//! failures surface before anything is written; a lost concurrency race
//! writes nothing and is safe to retry.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::info;

use copperbooks_accounting::{
    Account, AccountType, EntryPosted, EntryReference, Journal, JournalCommand, JournalEntry,
    JournalEvent, JournalLine, PostEntry, ReferenceKind,
};
use copperbooks_core::{
    AccountId, Aggregate, AssetId, DomainError, DomainResult, EntryId, ExpectedVersion, Money,
    TenantId,
};
use copperbooks_payroll::{
    compute_straight_line_depreciation, PayrollConfig, PayrollRun,
};

use crate::chart::{ChartOfAccounts, DeactivationPolicy};
use crate::journal_store::{JournalStore, JournalStoreError, PostedEntry};

/// Ledger account mapping for a payroll posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayrollAccounts {
    pub salary_expense: AccountId,
    pub employer_contributions_expense: AccountId,
    pub paye_payable: AccountId,
    pub pension_payable: AccountId,
    pub health_payable: AccountId,
    pub net_wages_payable: AccountId,
}

/// Ledger account mapping for a depreciation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepreciationAccounts {
    pub depreciation_expense: AccountId,
    pub accumulated_depreciation: AccountId,
}

/// An asset as the external registry hands it to a depreciation run.
///
/// `months_elapsed` counts elapsed periods *including* the one being run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepreciableAsset {
    pub asset_id: AssetId,
    pub name: String,
    pub cost: Money,
    pub salvage_value: Money,
    pub useful_life_months: u32,
    pub months_elapsed: u32,
}

/// Application service over one journal store and a shared chart.
#[derive(Debug)]
pub struct LedgerService<S> {
    store: S,
    chart: Arc<ChartOfAccounts>,
    deactivation_policy: DeactivationPolicy,
}

impl<S> LedgerService<S> {
    pub fn new(store: S, chart: Arc<ChartOfAccounts>) -> Self {
        Self {
            store,
            chart,
            deactivation_policy: DeactivationPolicy::allow_all(),
        }
    }

    pub fn with_deactivation_policy(mut self, policy: DeactivationPolicy) -> Self {
        self.deactivation_policy = policy;
        self
    }

    pub fn chart(&self) -> &ChartOfAccounts {
        &self.chart
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: JournalStore> LedgerService<S> {
    // ----- chart of accounts ------------------------------------------------

    pub fn create_account(
        &self,
        tenant_id: TenantId,
        code: impl Into<String>,
        name: impl Into<String>,
        account_type: AccountType,
    ) -> DomainResult<Account> {
        self.chart.create_account(tenant_id, code, name, account_type)
    }

    /// Deactivate an account, honoring the open-period policy.
    ///
    /// Always succeeds for accounts with zero lifetime activity; rejected
    /// when the account has postings dated inside the open reporting period.
    pub fn deactivate_account(
        &self,
        tenant_id: TenantId,
        account_id: AccountId,
    ) -> DomainResult<Account> {
        self.chart
            .lookup(tenant_id, account_id)
            .ok_or_else(DomainError::not_found)?;

        let journal = self.store.load_journal(tenant_id).map_err(map_store_error)?;
        let posting_dates = journal.iter().flat_map(|posted| {
            posted
                .entry
                .lines
                .iter()
                .filter(|line| line.account_id == account_id)
                .map(|_| posted.entry.entry_date)
        });
        if self.deactivation_policy.blocks(posting_dates) {
            return Err(DomainError::conflict(
                "account has postings in the open reporting period",
            ));
        }

        self.chart.deactivate_account(tenant_id, account_id)
    }

    // ----- journal ----------------------------------------------------------

    /// Validate and atomically commit a balanced entry; returns its id.
    pub fn post_entry(
        &self,
        tenant_id: TenantId,
        entry_date: NaiveDate,
        description: impl Into<String>,
        reference: EntryReference,
        lines: Vec<JournalLine>,
    ) -> DomainResult<EntryId> {
        self.verify_line_accounts(tenant_id, &lines)?;

        let entry = JournalEntry::new(
            EntryId::new(),
            tenant_id,
            entry_date,
            description,
            reference,
            lines,
            Utc::now(),
        )?;
        self.commit(tenant_id, entry)
    }

    /// Post the mirror of an existing entry, linking the two.
    ///
    /// Runs through the same pipeline as [`Self::post_entry`], so the
    /// reversal is balanced by construction and subject to every posting
    /// check. The original entry is never touched.
    pub fn reverse_entry(
        &self,
        tenant_id: TenantId,
        entry_id: EntryId,
        reason: Option<String>,
        reversal_date: Option<NaiveDate>,
    ) -> DomainResult<EntryId> {
        let (journal, _) = self.load_journal(tenant_id)?;
        let original = journal.entry(entry_id).ok_or_else(DomainError::not_found)?;
        if journal.reversed_by(entry_id).is_some() {
            return Err(DomainError::conflict("entry already reversed"));
        }

        let reversal_date = reversal_date.unwrap_or_else(|| Utc::now().date_naive());
        let reversal =
            JournalEntry::reversal_of(original, reason, reversal_date, Utc::now())?;
        self.verify_line_accounts(tenant_id, &reversal.lines)?;
        self.commit(tenant_id, reversal)
    }

    // ----- period batch operations -----------------------------------------

    /// Turn an approved payroll run into one balanced journal entry:
    /// salary and employer-contribution expense against the statutory
    /// liabilities and net wages payable.
    pub fn post_payroll_run(
        &self,
        tenant_id: TenantId,
        run: &PayrollRun,
        config: &PayrollConfig,
        accounts: &PayrollAccounts,
        entry_date: NaiveDate,
    ) -> DomainResult<EntryId> {
        let totals = run.totals(config)?;
        let overflow = || DomainError::invariant("payroll posting overflow");
        let pension_total = totals
            .pension_employee
            .checked_add(totals.pension_employer)
            .ok_or_else(overflow)?;
        let health_total = totals
            .health_employee
            .checked_add(totals.health_employer)
            .ok_or_else(overflow)?;

        let mut lines = vec![JournalLine::debit(
            accounts.salary_expense,
            totals.gross,
            Some("gross pay".to_string()),
        )];
        let employer = totals.employer_contributions()?;
        if !employer.is_zero() {
            lines.push(JournalLine::debit(
                accounts.employer_contributions_expense,
                employer,
                Some("employer contributions".to_string()),
            ));
        }
        if !totals.paye.is_zero() {
            lines.push(JournalLine::credit(
                accounts.paye_payable,
                totals.paye,
                Some("PAYE withheld".to_string()),
            ));
        }
        if !pension_total.is_zero() {
            lines.push(JournalLine::credit(
                accounts.pension_payable,
                pension_total,
                Some("pension contributions".to_string()),
            ));
        }
        if !health_total.is_zero() {
            lines.push(JournalLine::credit(
                accounts.health_payable,
                health_total,
                Some("health fund contributions".to_string()),
            ));
        }
        lines.push(JournalLine::credit(
            accounts.net_wages_payable,
            totals.net_pay,
            Some("net wages".to_string()),
        ));

        self.post_entry(
            tenant_id,
            entry_date,
            format!("payroll run {}", run.reference),
            EntryReference::new(ReferenceKind::Payroll, run.reference.clone()),
            lines,
        )
    }

    /// Post the period's straight-line charge for each asset.
    ///
    /// Fully depreciated assets produce a zero charge and are skipped, so
    /// re-running a period past an asset's life posts nothing for it.
    pub fn run_depreciation(
        &self,
        tenant_id: TenantId,
        assets: &[DepreciableAsset],
        accounts: &DepreciationAccounts,
        period_date: NaiveDate,
    ) -> DomainResult<Vec<EntryId>> {
        let mut posted = Vec::new();
        for asset in assets {
            let period = compute_straight_line_depreciation(
                asset.cost,
                asset.salvage_value,
                asset.useful_life_months,
                asset.months_elapsed,
            )?;
            if period.period_depreciation.is_zero() {
                continue;
            }

            let entry_id = self.post_entry(
                tenant_id,
                period_date,
                format!("depreciation: {}", asset.name),
                EntryReference::new(ReferenceKind::Depreciation, asset.asset_id.to_string()),
                vec![
                    JournalLine::debit(
                        accounts.depreciation_expense,
                        period.period_depreciation,
                        None,
                    ),
                    JournalLine::credit(
                        accounts.accumulated_depreciation,
                        period.period_depreciation,
                        None,
                    ),
                ],
            )?;
            posted.push(entry_id);
        }
        Ok(posted)
    }

    // ----- pipeline ---------------------------------------------------------

    /// Rehydrate the tenant's journal aggregate and its stream version.
    fn load_journal(&self, tenant_id: TenantId) -> DomainResult<(Journal, u64)> {
        let history = self.store.load_journal(tenant_id).map_err(map_store_error)?;
        validate_loaded_journal(tenant_id, &history)?;
        let version = history.last().map(|e| e.sequence_number).unwrap_or(0);

        let mut journal = Journal::empty(tenant_id);
        for posted in &history {
            journal.apply(&JournalEvent::EntryPosted(EntryPosted {
                tenant_id,
                entry: posted.entry.clone(),
            }));
        }
        Ok((journal, version))
    }

    /// Decide through the aggregate, then append with the loaded version.
    fn commit(&self, tenant_id: TenantId, entry: JournalEntry) -> DomainResult<EntryId> {
        let (journal, version) = self.load_journal(tenant_id)?;
        let entry_id = entry.entry_id;
        let is_reversal = entry.is_reversal();

        let events = journal.handle(&JournalCommand::PostEntry(PostEntry { tenant_id, entry }))?;
        let entries = events
            .into_iter()
            .map(|event| {
                let JournalEvent::EntryPosted(posted) = event;
                posted.entry
            })
            .collect();

        self.store
            .append(tenant_id, entries, ExpectedVersion::Exact(version))
            .map_err(map_store_error)?;

        info!(%tenant_id, %entry_id, is_reversal, "journal entry posted");
        Ok(entry_id)
    }

    /// Every line must reference an active account of this tenant.
    fn verify_line_accounts(
        &self,
        tenant_id: TenantId,
        lines: &[JournalLine],
    ) -> DomainResult<()> {
        for line in lines {
            let account = self
                .chart
                .lookup(tenant_id, line.account_id)
                .ok_or_else(|| {
                    DomainError::validation("line references an unknown account")
                })?;
            if !account.is_active {
                return Err(DomainError::validation(format!(
                    "line references an inactive account: {}",
                    account.code
                )));
            }
        }
        Ok(())
    }
}

/// Defense in depth: reject streams a buggy backend returned malformed.
fn validate_loaded_journal(
    tenant_id: TenantId,
    journal: &[PostedEntry],
) -> DomainResult<()> {
    let mut last = 0u64;
    for (idx, posted) in journal.iter().enumerate() {
        if posted.entry.tenant_id != tenant_id {
            return Err(DomainError::invariant(format!(
                "loaded journal contains wrong tenant_id at index {idx}"
            )));
        }
        if posted.sequence_number <= last {
            return Err(DomainError::invariant(format!(
                "non-monotonic sequence_number in loaded journal (last={last}, found={})",
                posted.sequence_number
            )));
        }
        last = posted.sequence_number;
    }
    Ok(())
}

fn map_store_error(err: JournalStoreError) -> DomainError {
    match err {
        JournalStoreError::Concurrency(msg) => DomainError::conflict(msg),
        JournalStoreError::TenantIsolation(msg) => DomainError::invariant(msg),
        JournalStoreError::InvalidAppend(msg) => DomainError::invariant(msg),
    }
}
