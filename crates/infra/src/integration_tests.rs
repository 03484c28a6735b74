//! Integration tests for the full ledger pipeline.
//!
//! Tests: LedgerService → JournalStore → ReportingEngine / ReconciliationEngine
//!
//! Verifies:
//! - Posting commits atomically and rejected posts leave no trace
//! - Reversal semantics (mirroring, idempotency, original untouched)
//! - Reports stay balanced and idempotent; tenant isolation holds
//! - Payroll and depreciation batches land as balanced entries

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use proptest::prelude::*;

    use copperbooks_accounting::{AccountType, EntryReference, JournalLine, ReferenceKind};
    use copperbooks_core::{AccountId, DomainError, EntryId, Money, TenantId};
    use copperbooks_payroll::{PayrollConfig, PayrollEmployee, PayrollRun};

    use crate::chart::{ChartOfAccounts, DeactivationPolicy};
    use crate::journal_store::{InMemoryJournalStore, JournalStore};
    use crate::reconciliation::ReconciliationEngine;
    use crate::reporting::ReportingEngine;
    use crate::service::{DepreciableAsset, DepreciationAccounts, LedgerService, PayrollAccounts};

    use copperbooks_core::EmployeeId;

    struct TestAccounts {
        cash: AccountId,
        receivables: AccountId,
        equipment: AccountId,
        accumulated_depreciation: AccountId,
        paye_payable: AccountId,
        pension_payable: AccountId,
        health_payable: AccountId,
        wages_payable: AccountId,
        capital: AccountId,
        sales: AccountId,
        cost_of_sales: AccountId,
        salaries: AccountId,
        employer_contributions: AccountId,
        depreciation_expense: AccountId,
        rent: AccountId,
    }

    struct Fixture {
        tenant_id: TenantId,
        store: Arc<InMemoryJournalStore>,
        service: LedgerService<Arc<InMemoryJournalStore>>,
        reporting: ReportingEngine<Arc<InMemoryJournalStore>>,
        reconciliation: ReconciliationEngine<Arc<InMemoryJournalStore>>,
        accounts: TestAccounts,
    }

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn setup() -> Fixture {
        copperbooks_observability::init();

        let tenant_id = TenantId::new();
        let store = Arc::new(InMemoryJournalStore::new());
        let chart = Arc::new(ChartOfAccounts::new());
        let service = LedgerService::new(store.clone(), chart.clone());
        let reporting = ReportingEngine::new(store.clone(), chart.clone());
        let reconciliation = ReconciliationEngine::new(store.clone(), chart.clone());

        let create = |code: &str, name: &str, account_type| {
            service
                .create_account(tenant_id, code, name, account_type)
                .unwrap()
                .id
        };
        let accounts = TestAccounts {
            cash: create("1000", "Cash", AccountType::Asset),
            receivables: create("1100", "Accounts receivable", AccountType::Asset),
            equipment: create("1500", "Equipment", AccountType::Asset),
            accumulated_depreciation: create(
                "1590",
                "Accumulated depreciation",
                AccountType::Asset,
            ),
            paye_payable: create("2100", "PAYE payable", AccountType::Liability),
            pension_payable: create("2110", "Pension payable", AccountType::Liability),
            health_payable: create("2120", "Health fund payable", AccountType::Liability),
            wages_payable: create("2130", "Net wages payable", AccountType::Liability),
            capital: create("3000", "Owner capital", AccountType::Equity),
            sales: create("4000", "Sales", AccountType::Revenue),
            cost_of_sales: create("5000", "Cost of sales", AccountType::CostOfSales),
            salaries: create("6000", "Salaries", AccountType::Expense),
            employer_contributions: create(
                "6010",
                "Employer contributions",
                AccountType::Expense,
            ),
            depreciation_expense: create("6020", "Depreciation", AccountType::Expense),
            rent: create("6100", "Rent", AccountType::Expense),
        };

        Fixture {
            tenant_id,
            store,
            service,
            reporting,
            reconciliation,
            accounts,
        }
    }

    impl Fixture {
        fn post_simple(
            &self,
            debit: AccountId,
            credit: AccountId,
            amount: Money,
            date: NaiveDate,
            description: &str,
        ) -> EntryId {
            self.service
                .post_entry(
                    self.tenant_id,
                    date,
                    description,
                    EntryReference::manual(),
                    vec![
                        JournalLine::debit(debit, amount, None),
                        JournalLine::credit(credit, amount, None),
                    ],
                )
                .unwrap()
        }

        fn journal_len(&self) -> usize {
            self.store.load_journal(self.tenant_id).unwrap().len()
        }
    }

    #[test]
    fn posting_flows_through_to_a_balanced_trial_balance() {
        let fx = setup();
        let a = &fx.accounts;

        fx.post_simple(a.cash, a.capital, Money::from_major(100_000), d(2024, 1, 2), "capital");
        fx.post_simple(a.receivables, a.sales, Money::from_major(5_000), d(2024, 1, 10), "invoice 42");
        fx.post_simple(a.rent, a.cash, Money::from_major(1_500), d(2024, 1, 15), "january rent");

        let tb = fx.reporting.trial_balance(fx.tenant_id, d(2024, 1, 31)).unwrap();
        assert!(tb.is_balanced);
        assert_eq!(tb.total_debits, tb.total_credits);
        assert_eq!(tb.total_debits, Money::from_major(105_000 + 1_500));

        let cash_row = tb.rows.iter().find(|r| r.code == "1000").unwrap();
        assert_eq!(cash_row.debit_balance, Money::from_major(98_500));
        assert_eq!(cash_row.credit_balance, Money::ZERO);

        let sales_row = tb.rows.iter().find(|r| r.code == "4000").unwrap();
        assert_eq!(sales_row.credit_balance, Money::from_major(5_000));
    }

    #[test]
    fn unbalanced_post_is_rejected_and_persists_nothing() {
        let fx = setup();
        let a = &fx.accounts;

        let err = fx
            .service
            .post_entry(
                fx.tenant_id,
                d(2024, 2, 1),
                "does not balance",
                EntryReference::manual(),
                vec![
                    JournalLine::debit(a.rent, Money::from_major(100), None),
                    JournalLine::credit(a.cash, Money::from_major(95), None),
                ],
            )
            .unwrap_err();
        match err {
            DomainError::Validation(msg) => {
                assert_eq!(msg, "entry is not balanced: debits 100.00, credits 95.00");
            }
            other => panic!("expected validation error, got {other:?}"),
        }

        assert_eq!(fx.journal_len(), 0);
        let tb = fx.reporting.trial_balance(fx.tenant_id, d(2024, 12, 31)).unwrap();
        assert!(tb.rows.is_empty());
    }

    #[test]
    fn posting_to_unknown_or_inactive_accounts_is_rejected() {
        let fx = setup();
        let a = &fx.accounts;

        let err = fx
            .service
            .post_entry(
                fx.tenant_id,
                d(2024, 2, 1),
                "phantom account",
                EntryReference::manual(),
                vec![
                    JournalLine::debit(AccountId::new(), Money::from_major(10), None),
                    JournalLine::credit(a.cash, Money::from_major(10), None),
                ],
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let dormant = fx
            .service
            .create_account(fx.tenant_id, "1900", "Dormant", AccountType::Asset)
            .unwrap();
        fx.service.deactivate_account(fx.tenant_id, dormant.id).unwrap();
        let err = fx
            .service
            .post_entry(
                fx.tenant_id,
                d(2024, 2, 1),
                "inactive account",
                EntryReference::manual(),
                vec![
                    JournalLine::debit(dormant.id, Money::from_major(10), None),
                    JournalLine::credit(a.cash, Money::from_major(10), None),
                ],
            )
            .unwrap_err();
        match err {
            DomainError::Validation(msg) => assert!(msg.contains("inactive")),
            other => panic!("expected validation error, got {other:?}"),
        }

        assert_eq!(fx.journal_len(), 0);
    }

    #[test]
    fn reversal_nets_every_account_to_zero() {
        let fx = setup();
        let a = &fx.accounts;

        let entry_id = fx.post_simple(a.rent, a.cash, Money::from_major(1_500), d(2024, 3, 1), "rent");
        let before = fx.store.load_journal(fx.tenant_id).unwrap();

        let reversal_id = fx
            .service
            .reverse_entry(fx.tenant_id, entry_id, Some("posted in error".to_string()), Some(d(2024, 3, 5)))
            .unwrap();
        assert_ne!(reversal_id, entry_id);

        // The original entry is byte-for-byte what it was before the reversal.
        let after = fx.store.load_journal(fx.tenant_id).unwrap();
        assert_eq!(after[0], before[0]);
        assert_eq!(after[1].entry.reversal_of, Some(entry_id));
        assert_eq!(after[1].entry.reference.kind, ReferenceKind::Reversal);

        let balances = fx
            .reporting
            .account_balances(fx.tenant_id, d(2024, 3, 1), d(2024, 3, 31))
            .unwrap();
        for row in balances {
            assert!(row.net_movement.is_zero(), "{} did not net out", row.code);
        }
    }

    #[test]
    fn reversing_twice_fails_and_changes_nothing() {
        let fx = setup();
        let a = &fx.accounts;

        let entry_id = fx.post_simple(a.rent, a.cash, Money::from_major(800), d(2024, 3, 1), "rent");
        fx.service
            .reverse_entry(fx.tenant_id, entry_id, None, Some(d(2024, 3, 2)))
            .unwrap();
        let len_before = fx.journal_len();

        let err = fx
            .service
            .reverse_entry(fx.tenant_id, entry_id, None, Some(d(2024, 3, 3)))
            .unwrap_err();
        match err {
            DomainError::Conflict(msg) => assert!(msg.contains("already reversed")),
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(fx.journal_len(), len_before);
    }

    #[test]
    fn reversing_an_unknown_entry_is_not_found() {
        let fx = setup();
        let err = fx
            .service
            .reverse_entry(fx.tenant_id, EntryId::new(), None, None)
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn trial_balance_reads_are_idempotent() {
        let fx = setup();
        let a = &fx.accounts;
        fx.post_simple(a.cash, a.capital, Money::from_major(9_000), d(2024, 1, 2), "capital");
        fx.post_simple(a.rent, a.cash, Money::from_major(750), d(2024, 1, 20), "rent");

        let first = fx.reporting.trial_balance(fx.tenant_id, d(2024, 1, 31)).unwrap();
        let second = fx.reporting.trial_balance(fx.tenant_id, d(2024, 1, 31)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn profit_and_loss_and_balance_sheet_agree_on_retained_earnings() {
        let fx = setup();
        let a = &fx.accounts;

        fx.post_simple(a.cash, a.capital, Money::from_major(50_000), d(2024, 1, 2), "capital");
        fx.post_simple(a.receivables, a.sales, Money::from_major(8_000), d(2024, 1, 12), "invoice");
        fx.post_simple(a.cost_of_sales, a.cash, Money::from_major(3_000), d(2024, 1, 13), "stock sold");
        fx.post_simple(a.rent, a.cash, Money::from_major(1_000), d(2024, 1, 20), "rent");

        let pnl = fx
            .reporting
            .profit_and_loss(fx.tenant_id, d(2024, 1, 1), d(2024, 1, 31))
            .unwrap();
        assert_eq!(pnl.total_income, Money::from_major(8_000));
        assert_eq!(pnl.total_expenses, Money::from_major(4_000));
        assert_eq!(pnl.net_profit, Money::from_major(4_000));

        let bs = fx.reporting.balance_sheet(fx.tenant_id, d(2024, 1, 31)).unwrap();
        assert!(bs.is_balanced);
        assert_eq!(bs.retained_earnings, pnl.net_profit);
        assert_eq!(bs.total_assets, Money::from_major(54_000));
        assert_eq!(
            bs.total_assets,
            bs.total_liabilities
                .checked_add(bs.total_equity)
                .unwrap()
        );
    }

    #[test]
    fn general_ledger_folds_a_running_balance_in_date_order() {
        let fx = setup();
        let a = &fx.accounts;

        fx.post_simple(a.cash, a.capital, Money::from_major(10_000), d(2024, 1, 2), "opening");
        fx.post_simple(a.rent, a.cash, Money::from_major(2_000), d(2024, 2, 5), "feb rent");
        fx.post_simple(a.cash, a.sales, Money::from_major(3_500), d(2024, 2, 5), "cash sale");
        fx.post_simple(a.rent, a.cash, Money::from_major(2_000), d(2024, 3, 5), "mar rent");

        let gl = fx
            .reporting
            .general_ledger(fx.tenant_id, a.cash, d(2024, 2, 1), d(2024, 2, 28))
            .unwrap();

        // January activity lands in the opening balance, March is cut off.
        assert_eq!(gl.opening_balance, Money::from_major(10_000));
        assert_eq!(gl.rows.len(), 2);
        // Same-date rows stay in posting order.
        assert_eq!(gl.rows[0].credit, Money::from_major(2_000));
        assert_eq!(gl.rows[0].running_balance, Money::from_major(8_000));
        assert_eq!(gl.rows[1].debit, Money::from_major(3_500));
        assert_eq!(gl.rows[1].running_balance, Money::from_major(11_500));
    }

    #[test]
    fn payroll_run_posts_one_balanced_entry_with_statutory_liabilities() {
        let fx = setup();
        let a = &fx.accounts;
        let config = PayrollConfig::statutory_2024();
        let run = PayrollRun {
            reference: "2024-03".to_string(),
            employees: vec![
                PayrollEmployee {
                    employee_id: EmployeeId::new(),
                    gross_pay: Money::from_major(10_000),
                    basic_pay: Money::from_major(8_000),
                },
                PayrollEmployee {
                    employee_id: EmployeeId::new(),
                    gross_pay: Money::from_major(4_000),
                    basic_pay: Money::from_major(4_000),
                },
            ],
        };
        let payroll_accounts = PayrollAccounts {
            salary_expense: a.salaries,
            employer_contributions_expense: a.employer_contributions,
            paye_payable: a.paye_payable,
            pension_payable: a.pension_payable,
            health_payable: a.health_payable,
            net_wages_payable: a.wages_payable,
        };

        fx.service
            .post_payroll_run(fx.tenant_id, &run, &config, &payroll_accounts, d(2024, 3, 31))
            .unwrap();

        let tb = fx.reporting.trial_balance(fx.tenant_id, d(2024, 3, 31)).unwrap();
        assert!(tb.is_balanced);

        let balances = fx
            .reporting
            .account_balances(fx.tenant_id, d(2024, 3, 1), d(2024, 3, 31))
            .unwrap();
        let net_of = |code: &str| {
            balances
                .iter()
                .find(|r| r.code == code)
                .map(|r| r.net_movement)
                .unwrap()
        };
        assert_eq!(net_of("6000"), Money::from_major(14_000));
        assert_eq!(net_of("2100"), Money::from_major(1_326));
        // Employee + employer sides: pension 700 × 2, health 120 × 2.
        assert_eq!(net_of("2110"), Money::from_major(1_400));
        assert_eq!(net_of("2120"), Money::from_major(240));
        assert_eq!(net_of("2130"), Money::from_major(11_854));
        assert_eq!(net_of("6010"), Money::from_major(820));
    }

    #[test]
    fn depreciation_run_caps_at_the_depreciable_base() {
        let fx = setup();
        let a = &fx.accounts;
        let depreciation_accounts = DepreciationAccounts {
            depreciation_expense: a.depreciation_expense,
            accumulated_depreciation: a.accumulated_depreciation,
        };

        let mut asset = DepreciableAsset {
            asset_id: copperbooks_core::AssetId::new(),
            name: "Delivery van".to_string(),
            cost: Money::from_major(12_000),
            salvage_value: Money::ZERO,
            useful_life_months: 12,
            months_elapsed: 0,
        };

        for month in 1..=12u32 {
            asset.months_elapsed = month;
            let posted = fx
                .service
                .run_depreciation(
                    fx.tenant_id,
                    std::slice::from_ref(&asset),
                    &depreciation_accounts,
                    d(2024, month, 28),
                )
                .unwrap();
            assert_eq!(posted.len(), 1);
        }

        let balances = fx
            .reporting
            .account_balances(fx.tenant_id, d(2024, 1, 1), d(2024, 12, 31))
            .unwrap();
        let accumulated = balances
            .iter()
            .find(|r| r.code == "1590")
            .unwrap()
            .credit_total;
        assert_eq!(accumulated, Money::from_major(12_000));

        // A thirteenth run charges nothing and posts nothing.
        asset.months_elapsed = 13;
        let len_before = fx.journal_len();
        let posted = fx
            .service
            .run_depreciation(
                fx.tenant_id,
                std::slice::from_ref(&asset),
                &depreciation_accounts,
                d(2025, 1, 28),
            )
            .unwrap();
        assert!(posted.is_empty());
        assert_eq!(fx.journal_len(), len_before);
    }

    #[test]
    fn reconciliation_commits_only_on_a_zero_difference() {
        let fx = setup();
        let a = &fx.accounts;

        fx.post_simple(a.cash, a.capital, Money::from_major(1_000), d(2024, 4, 1), "capital");
        fx.post_simple(a.cash, a.sales, Money::from_major(250), d(2024, 4, 10), "cash sale");

        let journal = fx.store.load_journal(fx.tenant_id).unwrap();
        let cash_lines: Vec<_> = journal
            .iter()
            .flat_map(|p| p.entry.lines.iter())
            .filter(|l| l.account_id == a.cash)
            .map(|l| l.line_id)
            .collect();
        assert_eq!(cash_lines.len(), 2);

        // Statement disagrees by 0.01: nothing committed, exact difference back.
        let attempt = fx
            .reconciliation
            .reconcile(fx.tenant_id, a.cash, Money::new(125_001), &cash_lines, d(2024, 4, 30))
            .unwrap();
        assert!(!attempt.committed);
        assert_eq!(attempt.difference, Money::new(1));
        assert!(!fx.reconciliation.is_reconciled(fx.tenant_id, a.cash, cash_lines[0]));

        // Statement agrees: commits and records a snapshot.
        let committed = fx
            .reconciliation
            .reconcile(fx.tenant_id, a.cash, Money::from_major(1_250), &cash_lines, d(2024, 4, 30))
            .unwrap();
        assert!(committed.committed);
        assert_eq!(committed.difference, Money::ZERO);
        assert_eq!(committed.cleared_balance, Money::from_major(1_250));
        assert!(fx.reconciliation.is_reconciled(fx.tenant_id, a.cash, cash_lines[0]));
        assert_eq!(fx.reconciliation.snapshots(fx.tenant_id, a.cash).len(), 1);

        // The same lines cannot be reconciled twice.
        let err = fx
            .reconciliation
            .reconcile(fx.tenant_id, a.cash, Money::from_major(1_250), &cash_lines, d(2024, 5, 31))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn reconciliation_rejects_foreign_and_duplicate_lines() {
        let fx = setup();
        let a = &fx.accounts;

        fx.post_simple(a.cash, a.capital, Money::from_major(100), d(2024, 4, 1), "capital");
        let journal = fx.store.load_journal(fx.tenant_id).unwrap();
        let capital_line = journal[0]
            .entry
            .lines
            .iter()
            .find(|l| l.account_id == a.capital)
            .unwrap()
            .line_id;
        let cash_line = journal[0]
            .entry
            .lines
            .iter()
            .find(|l| l.account_id == a.cash)
            .unwrap()
            .line_id;

        let err = fx
            .reconciliation
            .reconcile(fx.tenant_id, a.cash, Money::from_major(100), &[capital_line], d(2024, 4, 30))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = fx
            .reconciliation
            .reconcile(
                fx.tenant_id,
                a.cash,
                Money::from_major(200),
                &[cash_line, cash_line],
                d(2024, 4, 30),
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn tenants_never_see_each_other() {
        let fx = setup();
        let a = &fx.accounts;
        fx.post_simple(a.cash, a.capital, Money::from_major(5_000), d(2024, 1, 2), "capital");

        let other_tenant = TenantId::new();
        let tb = fx.reporting.trial_balance(other_tenant, d(2024, 12, 31)).unwrap();
        assert!(tb.rows.is_empty());
        assert!(fx.store.load_journal(other_tenant).unwrap().is_empty());
    }

    #[test]
    fn open_period_policy_gates_deactivation() {
        let tenant_id = TenantId::new();
        let store = Arc::new(InMemoryJournalStore::new());
        let chart = Arc::new(ChartOfAccounts::new());
        let service = LedgerService::new(store, chart)
            .with_deactivation_policy(DeactivationPolicy::open_period_from(d(2024, 1, 1)));

        let cash = service
            .create_account(tenant_id, "1000", "Cash", AccountType::Asset)
            .unwrap();
        let capital = service
            .create_account(tenant_id, "3000", "Capital", AccountType::Equity)
            .unwrap();
        let untouched = service
            .create_account(tenant_id, "1800", "Unused", AccountType::Asset)
            .unwrap();

        service
            .post_entry(
                tenant_id,
                d(2024, 2, 1),
                "capital",
                EntryReference::manual(),
                vec![
                    JournalLine::debit(cash.id, Money::from_major(100), None),
                    JournalLine::credit(capital.id, Money::from_major(100), None),
                ],
            )
            .unwrap();

        // Zero lifetime activity: always deactivatable.
        service.deactivate_account(tenant_id, untouched.id).unwrap();

        // Postings inside the open period: protected.
        let err = service.deactivate_account(tenant_id, cash.id).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    proptest! {
        /// Any balanced line set posts, and the stored entry reproduces the
        /// exact totals; any imbalance is rejected with nothing persisted.
        #[test]
        fn posting_preserves_totals_exactly(
            amounts in prop::collection::vec(1i64..5_000_000i64, 1..8),
            skew in 0i64..2,
        ) {
            let fx = setup();
            let a = &fx.accounts;

            let total: i64 = amounts.iter().sum();
            let mut lines: Vec<_> = amounts
                .iter()
                .map(|&m| JournalLine::debit(a.rent, Money::new(m), None))
                .collect();
            lines.push(JournalLine::credit(a.cash, Money::new(total + skew), None));

            let result = fx.service.post_entry(
                fx.tenant_id,
                d(2024, 6, 1),
                "property test",
                EntryReference::new(ReferenceKind::Expense, "prop"),
                lines,
            );

            if skew == 0 {
                result.unwrap();
                let journal = fx.store.load_journal(fx.tenant_id).unwrap();
                prop_assert_eq!(journal.len(), 1);
                let (debits, credits) = journal[0].entry.totals().unwrap();
                prop_assert_eq!(debits.minor(), total);
                prop_assert_eq!(credits, debits);
            } else {
                prop_assert!(result.is_err());
                prop_assert!(fx.store.load_journal(fx.tenant_id).unwrap().is_empty());
            }
        }
    }
}
