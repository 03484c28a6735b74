//! Tenant-scoped chart-of-accounts registry.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use chrono::NaiveDate;
use tracing::info;

use copperbooks_accounting::{Account, AccountType};
use copperbooks_core::{AccountId, DomainError, DomainResult, TenantId};

/// When an account with posting history may be deactivated.
///
/// Deactivation always succeeds for accounts with zero lifetime activity.
/// With an open reporting period configured, accounts with postings dated on
/// or after `open_period_start` are protected; postings confined to closed
/// periods do not block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeactivationPolicy {
    pub open_period_start: Option<NaiveDate>,
}

impl DeactivationPolicy {
    /// No open period: any account may be deactivated.
    pub fn allow_all() -> Self {
        Self {
            open_period_start: None,
        }
    }

    pub fn open_period_from(start: NaiveDate) -> Self {
        Self {
            open_period_start: Some(start),
        }
    }

    pub fn blocks(&self, mut posting_dates: impl Iterator<Item = NaiveDate>) -> bool {
        match self.open_period_start {
            Some(start) => posting_dates.any(|d| d >= start),
            None => false,
        }
    }
}

/// Shared, read-mostly account registry.
///
/// Mutated only by explicit account-management operations, never implicitly
/// by posting. Codes are unique per tenant and the registry keeps them
/// sorted, so listings come back in code order.
#[derive(Debug, Default)]
pub struct ChartOfAccounts {
    inner: RwLock<HashMap<TenantId, BTreeMap<String, Account>>>,
}

impl ChartOfAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new, active account. Fails with a conflict if the code is
    /// already taken for this tenant.
    pub fn create_account(
        &self,
        tenant_id: TenantId,
        code: impl Into<String>,
        name: impl Into<String>,
        account_type: AccountType,
    ) -> DomainResult<Account> {
        let account = Account::new(AccountId::new(), code, name, account_type)?;

        let mut inner = self
            .inner
            .write()
            .map_err(|_| DomainError::invariant("chart lock poisoned"))?;
        let chart = inner.entry(tenant_id).or_default();
        if chart.contains_key(&account.code) {
            return Err(DomainError::conflict(format!(
                "account code '{}' already exists",
                account.code
            )));
        }

        info!(%tenant_id, code = %account.code, "account created");
        chart.insert(account.code.clone(), account.clone());
        Ok(account)
    }

    /// Flip an account inactive. Policy checks (postings in an open period)
    /// live in the ledger service, which can see the journal; this is the
    /// raw registry operation.
    pub fn deactivate_account(
        &self,
        tenant_id: TenantId,
        account_id: AccountId,
    ) -> DomainResult<Account> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| DomainError::invariant("chart lock poisoned"))?;
        let chart = inner.get_mut(&tenant_id).ok_or_else(DomainError::not_found)?;
        let account = chart
            .values_mut()
            .find(|a| a.id == account_id)
            .ok_or_else(DomainError::not_found)?;

        account.deactivate();
        info!(%tenant_id, code = %account.code, "account deactivated");
        Ok(account.clone())
    }

    pub fn lookup(&self, tenant_id: TenantId, account_id: AccountId) -> Option<Account> {
        let inner = self.inner.read().ok()?;
        inner
            .get(&tenant_id)?
            .values()
            .find(|a| a.id == account_id)
            .cloned()
    }

    pub fn lookup_by_code(&self, tenant_id: TenantId, code: &str) -> Option<Account> {
        let inner = self.inner.read().ok()?;
        inner.get(&tenant_id)?.get(code).cloned()
    }

    /// All accounts for a tenant, in code order.
    pub fn list(&self, tenant_id: TenantId) -> Vec<Account> {
        match self.inner.read() {
            Ok(inner) => inner
                .get(&tenant_id)
                .map(|chart| chart.values().cloned().collect())
                .unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    pub fn list_by_type(&self, tenant_id: TenantId, account_type: AccountType) -> Vec<Account> {
        self.list(tenant_id)
            .into_iter()
            .filter(|a| a.account_type == account_type)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_codes_are_rejected_per_tenant() {
        let chart = ChartOfAccounts::new();
        let tenant_a = TenantId::new();
        let tenant_b = TenantId::new();

        chart
            .create_account(tenant_a, "1000", "Cash", AccountType::Asset)
            .unwrap();
        let err = chart
            .create_account(tenant_a, "1000", "Petty cash", AccountType::Asset)
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        // The same code is free in another tenant.
        chart
            .create_account(tenant_b, "1000", "Cash", AccountType::Asset)
            .unwrap();
    }

    #[test]
    fn listings_come_back_in_code_order() {
        let chart = ChartOfAccounts::new();
        let tenant_id = TenantId::new();
        for code in ["4000", "1000", "2000"] {
            chart
                .create_account(tenant_id, code, format!("acct {code}"), AccountType::Asset)
                .unwrap();
        }

        let codes: Vec<_> = chart
            .list(tenant_id)
            .into_iter()
            .map(|a| a.code)
            .collect();
        assert_eq!(codes, ["1000", "2000", "4000"]);
    }

    #[test]
    fn list_by_type_filters() {
        let chart = ChartOfAccounts::new();
        let tenant_id = TenantId::new();
        chart
            .create_account(tenant_id, "1000", "Cash", AccountType::Asset)
            .unwrap();
        chart
            .create_account(tenant_id, "4000", "Sales", AccountType::Revenue)
            .unwrap();

        let revenue = chart.list_by_type(tenant_id, AccountType::Revenue);
        assert_eq!(revenue.len(), 1);
        assert_eq!(revenue[0].code, "4000");
    }

    #[test]
    fn deactivate_unknown_account_is_not_found() {
        let chart = ChartOfAccounts::new();
        let tenant_id = TenantId::new();
        chart
            .create_account(tenant_id, "1000", "Cash", AccountType::Asset)
            .unwrap();
        let err = chart
            .deactivate_account(tenant_id, AccountId::new())
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn policy_blocks_only_open_period_postings() {
        let policy =
            DeactivationPolicy::open_period_from(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let closed = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        let open = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();

        assert!(!policy.blocks([closed].into_iter()));
        assert!(policy.blocks([closed, open].into_iter()));
        assert!(!policy.blocks(std::iter::empty()));
        assert!(!DeactivationPolicy::allow_all().blocks([open].into_iter()));
    }
}
