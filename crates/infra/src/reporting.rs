//! Point-in-time reports derived from posted lines.
//!
//! Every figure here is recomputed from the journal on each call. Balances
//! are never stored, so a report can never diverge from the lines that back
//! it. A report that fails to balance is not a report result; it is an
//! integrity alarm (the posting invariants make it unreachable) and comes
//! back as a distinct, fatal error.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::error;

use copperbooks_accounting::{Account, AccountType, NormalBalance};
use copperbooks_core::{AccountId, DomainError, DomainResult, EntryId, LineId, Money, TenantId};

use crate::chart::ChartOfAccounts;
use crate::journal_store::JournalStore;

/// Per-account debit/credit totals over a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountActivity {
    pub account_id: AccountId,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub debit_total: Money,
    pub credit_total: Money,
    /// Movement signed on the account's normal side.
    pub net_movement: Money,
}

/// One trial-balance row: the cumulative balance shown on the side it falls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrialBalanceRow {
    pub account_id: AccountId,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub debit_balance: Money,
    pub credit_balance: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrialBalance {
    pub as_of: NaiveDate,
    pub rows: Vec<TrialBalanceRow>,
    pub total_debits: Money,
    pub total_credits: Money,
    /// Always true in a returned report; an out-of-balance aggregation is
    /// surfaced as [`DomainError::Integrity`] instead of a report.
    pub is_balanced: bool,
}

/// A named amount on a statement (account + its figure for the statement).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub account_id: AccountId,
    pub code: String,
    pub name: String,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfitAndLoss {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub income: Vec<ReportRow>,
    pub expenses: Vec<ReportRow>,
    pub total_income: Money,
    pub total_expenses: Money,
    pub net_profit: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceSheet {
    pub as_of: NaiveDate,
    pub assets: Vec<ReportRow>,
    pub liabilities: Vec<ReportRow>,
    pub equity: Vec<ReportRow>,
    /// Cumulative net profit to date; closes the accounting equation in the
    /// absence of a closing-entries workflow.
    pub retained_earnings: Money,
    pub total_assets: Money,
    pub total_liabilities: Money,
    pub total_equity: Money,
    pub is_balanced: bool,
}

/// One line of an account's general ledger with the running balance after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneralLedgerRow {
    pub entry_id: EntryId,
    pub line_id: LineId,
    pub entry_date: NaiveDate,
    pub description: String,
    pub debit: Money,
    pub credit: Money,
    pub running_balance: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneralLedger {
    pub account_id: AccountId,
    pub code: String,
    pub name: String,
    /// Balance brought forward from before the range, on the normal side.
    pub opening_balance: Money,
    pub rows: Vec<GeneralLedgerRow>,
}

/// Read-side engine: pure aggregation over the journal store.
#[derive(Debug)]
pub struct ReportingEngine<S> {
    store: S,
    chart: Arc<ChartOfAccounts>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Movement {
    debit: i128,
    credit: i128,
}

impl<S: JournalStore> ReportingEngine<S> {
    pub fn new(store: S, chart: Arc<ChartOfAccounts>) -> Self {
        Self { store, chart }
    }

    /// Per-account totals for lines dated within `[start, end]`.
    pub fn account_balances(
        &self,
        tenant_id: TenantId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> DomainResult<Vec<AccountActivity>> {
        check_range(start, end)?;
        let movements = self.movements(tenant_id, |date| start <= date && date <= end)?;

        let mut rows = Vec::with_capacity(movements.len());
        for (account_id, movement) in movements {
            let account = self.account_meta(tenant_id, account_id)?;
            let net = signed_on(account.normal_balance(), movement);
            rows.push(AccountActivity {
                account_id,
                code: account.code,
                name: account.name,
                account_type: account.account_type,
                debit_total: to_money(movement.debit)?,
                credit_total: to_money(movement.credit)?,
                net_movement: to_money(net)?,
            });
        }
        rows.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(rows)
    }

    /// Cumulative balance of every account through `as_of`, each shown on
    /// the side it falls, plus the equal-totals check.
    pub fn trial_balance(&self, tenant_id: TenantId, as_of: NaiveDate) -> DomainResult<TrialBalance> {
        let movements = self.movements(tenant_id, |date| date <= as_of)?;

        let mut rows = Vec::new();
        let mut total_debits: i128 = 0;
        let mut total_credits: i128 = 0;
        for (account_id, movement) in movements {
            let net = movement.debit - movement.credit;
            if net == 0 {
                continue;
            }
            let account = self.account_meta(tenant_id, account_id)?;
            let (debit_balance, credit_balance) = if net > 0 {
                total_debits += net;
                (to_money(net)?, Money::ZERO)
            } else {
                total_credits += -net;
                (Money::ZERO, to_money(-net)?)
            };
            rows.push(TrialBalanceRow {
                account_id,
                code: account.code,
                name: account.name,
                account_type: account.account_type,
                debit_balance,
                credit_balance,
            });
        }
        rows.sort_by(|a, b| a.code.cmp(&b.code));

        let total_debits = to_money(total_debits)?;
        let total_credits = to_money(total_credits)?;
        if total_debits != total_credits {
            error!(
                %tenant_id,
                %total_debits,
                %total_credits,
                "trial balance failed to balance; ledger integrity violated"
            );
            return Err(DomainError::integrity(format!(
                "trial balance out of balance: debits {total_debits}, credits {total_credits}"
            )));
        }

        Ok(TrialBalance {
            as_of,
            rows,
            total_debits,
            total_credits,
            is_balanced: true,
        })
    }

    /// Revenue against cost-of-sales and expense movement over a range.
    pub fn profit_and_loss(
        &self,
        tenant_id: TenantId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> DomainResult<ProfitAndLoss> {
        check_range(start, end)?;
        let movements = self.movements(tenant_id, |date| start <= date && date <= end)?;

        let mut income = Vec::new();
        let mut expenses = Vec::new();
        let mut total_income: i128 = 0;
        let mut total_expenses: i128 = 0;
        for (account_id, movement) in movements {
            let account = self.account_meta(tenant_id, account_id)?;
            if !account.account_type.is_profit_and_loss() {
                continue;
            }
            let net = signed_on(account.normal_balance(), movement);
            if net == 0 {
                continue;
            }
            let row = ReportRow {
                account_id,
                code: account.code,
                name: account.name,
                amount: to_money(net)?,
            };
            if account.account_type == AccountType::Revenue {
                total_income += net;
                income.push(row);
            } else {
                total_expenses += net;
                expenses.push(row);
            }
        }
        income.sort_by(|a, b| a.code.cmp(&b.code));
        expenses.sort_by(|a, b| a.code.cmp(&b.code));

        Ok(ProfitAndLoss {
            start,
            end,
            income,
            expenses,
            total_income: to_money(total_income)?,
            total_expenses: to_money(total_expenses)?,
            net_profit: to_money(total_income - total_expenses)?,
        })
    }

    /// Assets against liabilities + equity as of a single date.
    pub fn balance_sheet(&self, tenant_id: TenantId, as_of: NaiveDate) -> DomainResult<BalanceSheet> {
        let movements = self.movements(tenant_id, |date| date <= as_of)?;

        let mut assets = Vec::new();
        let mut liabilities = Vec::new();
        let mut equity = Vec::new();
        let mut total_assets: i128 = 0;
        let mut total_liabilities: i128 = 0;
        let mut equity_accounts: i128 = 0;
        let mut retained: i128 = 0;
        for (account_id, movement) in movements {
            let account = self.account_meta(tenant_id, account_id)?;
            if account.account_type.is_profit_and_loss() {
                // Income statement accounts roll into retained earnings.
                retained += movement.credit - movement.debit;
                continue;
            }
            let net = signed_on(account.normal_balance(), movement);
            if net == 0 {
                continue;
            }
            let row = ReportRow {
                account_id,
                code: account.code,
                name: account.name,
                amount: to_money(net)?,
            };
            match account.account_type {
                AccountType::Asset => {
                    total_assets += net;
                    assets.push(row);
                }
                AccountType::Liability => {
                    total_liabilities += net;
                    liabilities.push(row);
                }
                AccountType::Equity => {
                    equity_accounts += net;
                    equity.push(row);
                }
                _ => unreachable!("profit and loss accounts handled above"),
            }
        }
        assets.sort_by(|a, b| a.code.cmp(&b.code));
        liabilities.sort_by(|a, b| a.code.cmp(&b.code));
        equity.sort_by(|a, b| a.code.cmp(&b.code));

        let total_equity = equity_accounts + retained;
        if total_assets != total_liabilities + total_equity {
            error!(
                %tenant_id,
                total_assets,
                total_liabilities,
                total_equity,
                "balance sheet failed to balance; ledger integrity violated"
            );
            return Err(DomainError::integrity(format!(
                "balance sheet out of balance: assets {}, liabilities + equity {}",
                to_money(total_assets)?,
                to_money(total_liabilities + total_equity)?
            )));
        }

        Ok(BalanceSheet {
            as_of,
            assets,
            liabilities,
            equity,
            retained_earnings: to_money(retained)?,
            total_assets: to_money(total_assets)?,
            total_liabilities: to_money(total_liabilities)?,
            total_equity: to_money(total_equity)?,
            is_balanced: true,
        })
    }

    /// One account's lines in date order (ties broken by posting order) with
    /// a running balance on the account's normal side.
    pub fn general_ledger(
        &self,
        tenant_id: TenantId,
        account_id: AccountId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> DomainResult<GeneralLedger> {
        check_range(start, end)?;
        let account = self
            .chart
            .lookup(tenant_id, account_id)
            .ok_or_else(DomainError::not_found)?;
        let normal = account.normal_balance();

        let journal = self
            .store
            .load_journal(tenant_id)
            .map_err(|e| DomainError::invariant(e.to_string()))?;

        // The journal is already in sequence order; a stable sort on the
        // entry date keeps posting order as the tie-breaker.
        let mut touched: Vec<_> = journal
            .iter()
            .flat_map(|posted| {
                posted
                    .entry
                    .lines
                    .iter()
                    .filter(|line| line.account_id == account_id)
                    .map(move |line| (posted.entry.entry_date, &posted.entry, line))
            })
            .collect();
        touched.sort_by_key(|(date, _, _)| *date);

        let mut running: i128 = 0;
        let mut opening: i128 = 0;
        let mut rows = Vec::new();
        for (date, entry, line) in touched {
            if date > end {
                break;
            }
            let delta = signed_on(
                normal,
                Movement {
                    debit: line.debit.minor() as i128,
                    credit: line.credit.minor() as i128,
                },
            );
            running += delta;
            if date < start {
                opening = running;
                continue;
            }
            rows.push(GeneralLedgerRow {
                entry_id: entry.entry_id,
                line_id: line.line_id,
                entry_date: date,
                description: line
                    .description
                    .clone()
                    .unwrap_or_else(|| entry.description.clone()),
                debit: line.debit,
                credit: line.credit,
                running_balance: to_money(running)?,
            });
        }

        Ok(GeneralLedger {
            account_id,
            code: account.code,
            name: account.name,
            opening_balance: to_money(opening)?,
            rows,
        })
    }

    /// Fold posted lines into per-account movement, filtered by entry date.
    fn movements(
        &self,
        tenant_id: TenantId,
        include: impl Fn(NaiveDate) -> bool,
    ) -> DomainResult<BTreeMap<AccountId, Movement>> {
        let journal = self
            .store
            .load_journal(tenant_id)
            .map_err(|e| DomainError::invariant(e.to_string()))?;

        let mut movements: BTreeMap<AccountId, Movement> = BTreeMap::new();
        for posted in &journal {
            if !include(posted.entry.entry_date) {
                continue;
            }
            for line in &posted.entry.lines {
                let movement = movements.entry(line.account_id).or_default();
                movement.debit += line.debit.minor() as i128;
                movement.credit += line.credit.minor() as i128;
            }
        }
        Ok(movements)
    }

    /// A posted line's account must exist in the chart; a miss means the
    /// store and chart disagree, which is an integrity problem, not a user
    /// error.
    fn account_meta(&self, tenant_id: TenantId, account_id: AccountId) -> DomainResult<Account> {
        self.chart.lookup(tenant_id, account_id).ok_or_else(|| {
            error!(%tenant_id, %account_id, "posted line references an account missing from the chart");
            DomainError::integrity("posted line references an account missing from the chart")
        })
    }
}

fn signed_on(normal: NormalBalance, movement: Movement) -> i128 {
    match normal {
        NormalBalance::Debit => movement.debit - movement.credit,
        NormalBalance::Credit => movement.credit - movement.debit,
    }
}

fn to_money(minor: i128) -> DomainResult<Money> {
    i64::try_from(minor)
        .map(Money::new)
        .map_err(|_| DomainError::invariant("report total overflow"))
}

fn check_range(start: NaiveDate, end: NaiveDate) -> DomainResult<()> {
    if start > end {
        return Err(DomainError::validation(
            "start date must not be after end date",
        ));
    }
    Ok(())
}
