//! Payroll-run figures: the amounts a run approval turns into a journal entry.

use serde::{Deserialize, Serialize};

use copperbooks_core::{DomainError, DomainResult, EmployeeId, Money, Rate};

use crate::contributions::{
    compute_health_fund_contribution, compute_pension_contribution, ContributionSplit,
};
use crate::paye::{compute_paye, TaxTable};

/// Statutory rates and tables for one payroll period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollConfig {
    pub tax_table: TaxTable,
    pub pension_rate: Rate,
    pub pension_ceiling: Money,
    pub health_rate: Rate,
}

impl PayrollConfig {
    /// Bundled 2024 monthly configuration: the 2024 PAYE table, 5% pension
    /// either side capped at K26,840 of gross, 1% health fund on basic pay.
    pub fn statutory_2024() -> Self {
        Self {
            tax_table: TaxTable::monthly_2024(),
            pension_rate: Rate::from_percent(5),
            pension_ceiling: Money::from_major(26_840),
            health_rate: Rate::from_percent(1),
        }
    }
}

/// One employee's pay inputs for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollEmployee {
    pub employee_id: EmployeeId,
    pub gross_pay: Money,
    /// Basic pay (excludes allowances); the health-fund base.
    pub basic_pay: Money,
}

/// A payroll run awaiting approval: a reference plus employee pay inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollRun {
    /// Upstream run identifier (e.g. "2024-03"), carried onto the entry.
    pub reference: String,
    pub employees: Vec<PayrollEmployee>,
}

impl PayrollRun {
    /// Fold every employee's breakdown into run totals.
    pub fn totals(&self, config: &PayrollConfig) -> DomainResult<PayrollTotals> {
        if self.employees.is_empty() {
            return Err(DomainError::validation(
                "payroll run must have employees",
            ));
        }
        let mut totals = PayrollTotals::default();
        for employee in &self.employees {
            let breakdown =
                PayrollBreakdown::compute(employee.gross_pay, employee.basic_pay, config)?;
            totals.accumulate(&breakdown)?;
        }
        Ok(totals)
    }
}

/// One employee's statutory deductions and resulting net pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollBreakdown {
    pub gross_pay: Money,
    pub basic_pay: Money,
    pub paye: Money,
    pub pension: ContributionSplit,
    pub health: ContributionSplit,
    /// Gross less PAYE and the employee-side contributions.
    pub net_pay: Money,
    /// Gross plus the employer-side contributions.
    pub employer_cost: Money,
}

impl PayrollBreakdown {
    pub fn compute(gross_pay: Money, basic_pay: Money, config: &PayrollConfig) -> DomainResult<Self> {
        if basic_pay > gross_pay {
            return Err(DomainError::validation(
                "basic pay must not exceed gross pay",
            ));
        }

        let paye = compute_paye(gross_pay, &config.tax_table)?;
        let pension =
            compute_pension_contribution(gross_pay, config.pension_rate, config.pension_ceiling)?;
        let health = compute_health_fund_contribution(basic_pay, config.health_rate)?;

        let overflow = || DomainError::invariant("payroll amount overflow");
        let net_pay = gross_pay
            .checked_sub(paye)
            .and_then(|v| v.checked_sub(pension.employee))
            .and_then(|v| v.checked_sub(health.employee))
            .ok_or_else(overflow)?;
        if net_pay.is_negative() {
            return Err(DomainError::invariant(
                "deductions exceed gross pay",
            ));
        }
        let employer_cost = gross_pay
            .checked_add(pension.employer)
            .and_then(|v| v.checked_add(health.employer))
            .ok_or_else(overflow)?;

        Ok(Self {
            gross_pay,
            basic_pay,
            paye,
            pension,
            health,
            net_pay,
            employer_cost,
        })
    }
}

/// Summed figures across a run; the shape a payroll journal entry needs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollTotals {
    pub gross: Money,
    pub paye: Money,
    pub pension_employee: Money,
    pub pension_employer: Money,
    pub health_employee: Money,
    pub health_employer: Money,
    pub net_pay: Money,
}

impl PayrollTotals {
    fn accumulate(&mut self, breakdown: &PayrollBreakdown) -> DomainResult<()> {
        let overflow = || DomainError::invariant("payroll totals overflow");
        self.gross = self.gross.checked_add(breakdown.gross_pay).ok_or_else(overflow)?;
        self.paye = self.paye.checked_add(breakdown.paye).ok_or_else(overflow)?;
        self.pension_employee = self
            .pension_employee
            .checked_add(breakdown.pension.employee)
            .ok_or_else(overflow)?;
        self.pension_employer = self
            .pension_employer
            .checked_add(breakdown.pension.employer)
            .ok_or_else(overflow)?;
        self.health_employee = self
            .health_employee
            .checked_add(breakdown.health.employee)
            .ok_or_else(overflow)?;
        self.health_employer = self
            .health_employer
            .checked_add(breakdown.health.employer)
            .ok_or_else(overflow)?;
        self.net_pay = self.net_pay.checked_add(breakdown.net_pay).ok_or_else(overflow)?;
        Ok(())
    }

    /// Employer-side expense on top of gross.
    pub fn employer_contributions(&self) -> DomainResult<Money> {
        self.pension_employer
            .checked_add(self.health_employer)
            .ok_or_else(|| DomainError::invariant("payroll totals overflow"))
    }
}
