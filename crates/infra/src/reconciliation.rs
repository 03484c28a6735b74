//! Bank reconciliation: matching statement balances against cleared lines.
//!
//! Posted entries stay immutable, so reconciled state lives here in the
//! infra layer keyed by line id. A reconciliation commits only when the
//! statement and the cleared book balance agree to the minor unit; any other
//! outcome changes nothing and hands the signed difference back.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use copperbooks_accounting::NormalBalance;
use copperbooks_core::{AccountId, DomainError, DomainResult, LineId, Money, TenantId};

use crate::chart::ChartOfAccounts;
use crate::journal_store::JournalStore;

/// Immutable record of a committed reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationSnapshot {
    pub snapshot_id: Uuid,
    pub account_id: AccountId,
    pub as_of: NaiveDate,
    pub statement_balance: Money,
    pub cleared_line_count: usize,
    pub recorded_at: DateTime<Utc>,
}

/// Outcome of a reconciliation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub committed: bool,
    /// `statement_balance - cleared_balance`, signed; zero iff committed.
    pub difference: Money,
    pub cleared_balance: Money,
}

#[derive(Debug, Default)]
struct AccountReconState {
    reconciled_lines: HashSet<LineId>,
    snapshots: Vec<ReconciliationSnapshot>,
}

/// Matches externally reported balances against ledger-derived ones.
#[derive(Debug)]
pub struct ReconciliationEngine<S> {
    store: S,
    chart: Arc<ChartOfAccounts>,
    state: RwLock<HashMap<(TenantId, AccountId), AccountReconState>>,
}

impl<S: JournalStore> ReconciliationEngine<S> {
    pub fn new(store: S, chart: Arc<ChartOfAccounts>) -> Self {
        Self {
            store,
            chart,
            state: RwLock::new(HashMap::new()),
        }
    }

    /// Reconcile `account_id` against a statement balance.
    ///
    /// The cleared balance is the signed sum (on the account's normal side)
    /// of every previously reconciled line plus the lines cleared in this
    /// call. A zero difference commits: the cleared lines are marked
    /// reconciled and a snapshot is recorded. A nonzero difference commits
    /// nothing — the exact signed difference comes back for investigation.
    pub fn reconcile(
        &self,
        tenant_id: TenantId,
        account_id: AccountId,
        statement_balance: Money,
        cleared_line_ids: &[LineId],
        as_of: NaiveDate,
    ) -> DomainResult<Reconciliation> {
        let account = self
            .chart
            .lookup(tenant_id, account_id)
            .ok_or_else(DomainError::not_found)?;
        let normal = account.normal_balance();

        let journal = self
            .store
            .load_journal(tenant_id)
            .map_err(|e| DomainError::invariant(e.to_string()))?;

        // Every line ever posted to this account, with its signed amount.
        let mut account_lines: HashMap<LineId, (NaiveDate, i128)> = HashMap::new();
        for posted in &journal {
            for line in &posted.entry.lines {
                if line.account_id != account_id {
                    continue;
                }
                let signed = match normal {
                    NormalBalance::Debit => line.debit.minor() as i128 - line.credit.minor() as i128,
                    NormalBalance::Credit => line.credit.minor() as i128 - line.debit.minor() as i128,
                };
                account_lines.insert(line.line_id, (posted.entry.entry_date, signed));
            }
        }

        let mut state = self
            .state
            .write()
            .map_err(|_| DomainError::invariant("reconciliation lock poisoned"))?;
        let account_state = state.entry((tenant_id, account_id)).or_default();

        // Validate the cleared set fully before touching anything.
        let mut cleared: HashSet<LineId> = HashSet::with_capacity(cleared_line_ids.len());
        let mut cleared_sum: i128 = 0;
        for line_id in cleared_line_ids {
            let (date, signed) = account_lines.get(line_id).ok_or_else(|| {
                DomainError::validation(format!(
                    "line {line_id} is not posted to account {}",
                    account.code
                ))
            })?;
            if account_state.reconciled_lines.contains(line_id) {
                return Err(DomainError::conflict(format!(
                    "line {line_id} is already reconciled"
                )));
            }
            if !cleared.insert(*line_id) {
                return Err(DomainError::validation(format!(
                    "line {line_id} appears twice in the cleared set"
                )));
            }
            if *date > as_of {
                return Err(DomainError::validation(format!(
                    "line {line_id} is dated after the reconciliation date"
                )));
            }
            cleared_sum += signed;
        }

        let reconciled_base: i128 = account_state
            .reconciled_lines
            .iter()
            .filter_map(|id| account_lines.get(id))
            .map(|(_, signed)| *signed)
            .sum();

        let cleared_balance = to_money(reconciled_base + cleared_sum)?;
        let difference = statement_balance
            .checked_sub(cleared_balance)
            .ok_or_else(|| DomainError::invariant("reconciliation difference overflow"))?;

        if !difference.is_zero() {
            return Ok(Reconciliation {
                committed: false,
                difference,
                cleared_balance,
            });
        }

        account_state.reconciled_lines.extend(cleared.iter().copied());
        account_state.snapshots.push(ReconciliationSnapshot {
            snapshot_id: Uuid::now_v7(),
            account_id,
            as_of,
            statement_balance,
            cleared_line_count: cleared.len(),
            recorded_at: Utc::now(),
        });
        info!(
            %tenant_id,
            code = %account.code,
            cleared = cleared.len(),
            %statement_balance,
            "reconciliation committed"
        );

        Ok(Reconciliation {
            committed: true,
            difference: Money::ZERO,
            cleared_balance,
        })
    }

    pub fn is_reconciled(&self, tenant_id: TenantId, account_id: AccountId, line_id: LineId) -> bool {
        match self.state.read() {
            Ok(state) => state
                .get(&(tenant_id, account_id))
                .is_some_and(|s| s.reconciled_lines.contains(&line_id)),
            Err(_) => false,
        }
    }

    /// Committed snapshots for an account, oldest first.
    pub fn snapshots(&self, tenant_id: TenantId, account_id: AccountId) -> Vec<ReconciliationSnapshot> {
        match self.state.read() {
            Ok(state) => state
                .get(&(tenant_id, account_id))
                .map(|s| s.snapshots.clone())
                .unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }
}

fn to_money(minor: i128) -> DomainResult<Money> {
    i64::try_from(minor)
        .map(Money::new)
        .map_err(|_| DomainError::invariant("reconciliation total overflow"))
}
