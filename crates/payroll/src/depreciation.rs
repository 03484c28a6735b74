//! Straight-line asset depreciation.

use serde::{Deserialize, Serialize};

use copperbooks_core::{DomainError, DomainResult, Money};

/// Depreciation figures for one period of an asset's life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepreciationPeriod {
    /// Charge for this period (zero once the asset is fully depreciated).
    pub period_depreciation: Money,
    /// Total charged through and including this period; never exceeds
    /// `cost - salvage_value`.
    pub accumulated_depreciation: Money,
    pub net_book_value: Money,
}

/// Straight-line depreciation for period `months_elapsed` (1-based: the
/// first monthly run passes 1).
///
/// The monthly charge is `(cost - salvage_value) / useful_life_months`
/// rounded half-up; the final in-life period absorbs any rounding remainder
/// so accumulated depreciation lands exactly on `cost - salvage_value`.
/// Periods past the useful life charge `max(0, remaining)`, i.e. zero.
pub fn compute_straight_line_depreciation(
    cost: Money,
    salvage_value: Money,
    useful_life_months: u32,
    months_elapsed: u32,
) -> DomainResult<DepreciationPeriod> {
    if cost.is_negative() {
        return Err(DomainError::validation("asset cost must not be negative"));
    }
    if salvage_value.is_negative() {
        return Err(DomainError::validation(
            "salvage value must not be negative",
        ));
    }
    if salvage_value > cost {
        return Err(DomainError::validation(
            "salvage value must not exceed asset cost",
        ));
    }
    if useful_life_months == 0 {
        return Err(DomainError::validation(
            "useful life must be at least one month",
        ));
    }
    if months_elapsed == 0 {
        return Err(DomainError::validation(
            "months elapsed must be at least one",
        ));
    }

    let depreciable = cost
        .checked_sub(salvage_value)
        .ok_or_else(|| DomainError::invariant("depreciable base overflow"))?;
    let monthly = depreciable
        .div_round(i64::from(useful_life_months))
        .ok_or_else(|| DomainError::invariant("monthly depreciation overflow"))?;

    // Accumulated through the *previous* period, capped at the base.
    let prior_minor = (monthly.minor() as i128) * i128::from(months_elapsed - 1);
    let prior = if prior_minor >= depreciable.minor() as i128 {
        depreciable
    } else {
        Money::new(prior_minor as i64)
    };

    let remaining = depreciable
        .checked_sub(prior)
        .ok_or_else(|| DomainError::invariant("remaining depreciation overflow"))?;
    let period = if months_elapsed >= useful_life_months {
        // Final in-life period (or later): charge whatever remains.
        remaining
    } else {
        monthly.min(remaining)
    };

    let accumulated = prior
        .checked_add(period)
        .ok_or_else(|| DomainError::invariant("accumulated depreciation overflow"))?;
    let net_book_value = cost
        .checked_sub(accumulated)
        .ok_or_else(|| DomainError::invariant("net book value overflow"))?;

    Ok(DepreciationPeriod {
        period_depreciation: period,
        accumulated_depreciation: accumulated,
        net_book_value,
    })
}
