//! Chart-of-accounts domain model.

use serde::{Deserialize, Serialize};

use copperbooks_core::{AccountId, DomainError, DomainResult, Entity};

/// High-level account classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    CostOfSales,
    Expense,
}

impl AccountType {
    /// The side on which this account type's balance conventionally increases.
    ///
    /// Derived deterministically; there is no way to configure an account
    /// against its type's convention.
    pub const fn normal_balance(self) -> NormalBalance {
        match self {
            AccountType::Asset | AccountType::CostOfSales | AccountType::Expense => {
                NormalBalance::Debit
            }
            AccountType::Liability | AccountType::Equity | AccountType::Revenue => {
                NormalBalance::Credit
            }
        }
    }

    /// Account types that feed the profit & loss statement.
    pub const fn is_profit_and_loss(self) -> bool {
        matches!(
            self,
            AccountType::Revenue | AccountType::CostOfSales | AccountType::Expense
        )
    }
}

/// Normal balance side of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalBalance {
    Debit,
    Credit,
}

/// A ledger account.
///
/// `code` is the sortable, tenant-unique key users see (e.g. "1000" for
/// Cash); uniqueness is enforced by the chart registry. An account that has
/// posted lines never changes type and is never deleted, only deactivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub is_active: bool,
}

impl Account {
    pub fn new(
        id: AccountId,
        code: impl Into<String>,
        name: impl Into<String>,
        account_type: AccountType,
    ) -> DomainResult<Self> {
        let code = code.into();
        let name = name.into();
        if code.trim().is_empty() {
            return Err(DomainError::validation("account code must not be empty"));
        }
        if code.trim() != code {
            return Err(DomainError::validation(
                "account code must not have surrounding whitespace",
            ));
        }
        if name.trim().is_empty() {
            return Err(DomainError::validation("account name must not be empty"));
        }
        Ok(Self {
            id,
            code,
            name,
            account_type,
            is_active: true,
        })
    }

    pub const fn normal_balance(&self) -> NormalBalance {
        self.account_type.normal_balance()
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }
}

impl Entity for Account {
    type Id = AccountId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
