//! Pension and health-fund contribution calculations.

use serde::{Deserialize, Serialize};

use copperbooks_core::{DomainError, DomainResult, Money, Rate};

/// Matched employee/employer contribution amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionSplit {
    pub employee: Money,
    pub employer: Money,
}

impl ContributionSplit {
    pub fn total(&self) -> DomainResult<Money> {
        self.employee
            .checked_add(self.employer)
            .ok_or_else(|| DomainError::invariant("contribution total overflow"))
    }
}

/// Pension contribution: both sides pay `rate` of `min(gross_pay, ceiling)`.
pub fn compute_pension_contribution(
    gross_pay: Money,
    rate: Rate,
    ceiling: Money,
) -> DomainResult<ContributionSplit> {
    if gross_pay.is_negative() {
        return Err(DomainError::validation("gross pay must not be negative"));
    }
    if ceiling.is_negative() {
        return Err(DomainError::validation(
            "pension ceiling must not be negative",
        ));
    }

    let pensionable = gross_pay.min(ceiling);
    let side = pensionable
        .mul_rate(rate)
        .ok_or_else(|| DomainError::invariant("pension contribution overflow"))?;
    Ok(ContributionSplit {
        employee: side,
        employer: side,
    })
}

/// Health-fund contribution: `rate` of basic pay, no ceiling.
pub fn compute_health_fund_contribution(
    basic_pay: Money,
    rate: Rate,
) -> DomainResult<ContributionSplit> {
    if basic_pay.is_negative() {
        return Err(DomainError::validation("basic pay must not be negative"));
    }

    let side = basic_pay
        .mul_rate(rate)
        .ok_or_else(|| DomainError::invariant("health contribution overflow"))?;
    Ok(ContributionSplit {
        employee: side,
        employer: side,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pension_is_capped_at_the_ceiling() {
        let below = compute_pension_contribution(
            Money::from_major(10_000),
            Rate::from_percent(5),
            Money::from_major(26_840),
        )
        .unwrap();
        assert_eq!(below.employee, Money::from_major(500));
        assert_eq!(below.employer, Money::from_major(500));

        let capped = compute_pension_contribution(
            Money::from_major(50_000),
            Rate::from_percent(5),
            Money::from_major(26_840),
        )
        .unwrap();
        assert_eq!(capped.employee, Money::from_major(1_342));
        assert_eq!(capped.employee, capped.employer);
    }

    #[test]
    fn health_fund_has_no_ceiling() {
        let split =
            compute_health_fund_contribution(Money::from_major(80_000), Rate::from_percent(1))
                .unwrap();
        assert_eq!(split.employee, Money::from_major(800));
        assert_eq!(split.total().unwrap(), Money::from_major(1_600));
    }

    #[test]
    fn contribution_rounding_is_half_up() {
        // 1% of 0.50 = 0.005 → 0.01
        let split = compute_health_fund_contribution(Money::new(50), Rate::from_percent(1)).unwrap();
        assert_eq!(split.employee, Money::new(1));
    }

    #[test]
    fn negative_inputs_are_rejected() {
        assert!(compute_pension_contribution(
            Money::new(-1),
            Rate::from_percent(5),
            Money::from_major(100)
        )
        .is_err());
        assert!(compute_pension_contribution(
            Money::from_major(100),
            Rate::from_percent(5),
            Money::new(-1)
        )
        .is_err());
        assert!(compute_health_fund_contribution(Money::new(-1), Rate::from_percent(1)).is_err());
    }
}
