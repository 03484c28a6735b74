//! Infrastructure layer: journal persistence, chart registry, ledger
//! service, reporting, reconciliation.
//!
//! Everything here is backed by in-memory stores behind the [`JournalStore`]
//! seam; swapping in a SQL implementation touches nothing in the domain
//! crates.

pub mod chart;
pub mod journal_store;
pub mod reconciliation;
pub mod reporting;
pub mod service;

#[cfg(test)]
mod integration_tests;

pub use chart::{ChartOfAccounts, DeactivationPolicy};
pub use journal_store::{InMemoryJournalStore, JournalStore, JournalStoreError, PostedEntry};
pub use reconciliation::{Reconciliation, ReconciliationEngine, ReconciliationSnapshot};
pub use reporting::{
    AccountActivity, BalanceSheet, GeneralLedger, GeneralLedgerRow, ProfitAndLoss, ReportRow,
    ReportingEngine, TrialBalance, TrialBalanceRow,
};
pub use service::{
    DepreciableAsset, DepreciationAccounts, LedgerService, PayrollAccounts,
};
