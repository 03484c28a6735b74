//! Progressive PAYE (Pay As You Earn) bracket tax.

use serde::{Deserialize, Serialize};

use copperbooks_core::{DomainError, DomainResult, Money, Rate};

/// One band of a progressive tax table.
///
/// Bands are half-open `[lower, upper)`: income exactly on a boundary falls
/// in the band *below* it. The final band has no upper bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBracket {
    pub lower: Money,
    pub upper: Option<Money>,
    pub rate: Rate,
    /// Flat amount added once when any income falls inside this band.
    /// Zero in the bundled tables; kept for jurisdictions that levy one.
    pub flat_adjustment: Money,
}

impl TaxBracket {
    pub fn new(lower: Money, upper: Option<Money>, rate: Rate) -> Self {
        Self {
            lower,
            upper,
            rate,
            flat_adjustment: Money::ZERO,
        }
    }
}

/// Validated, ordered bracket table for one tax year / jurisdiction.
///
/// Immutable once constructed: brackets start at zero, are contiguous, and
/// end in exactly one unbounded band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxTable {
    brackets: Vec<TaxBracket>,
}

impl TaxTable {
    pub fn new(brackets: Vec<TaxBracket>) -> DomainResult<Self> {
        let Some(first) = brackets.first() else {
            return Err(DomainError::validation("tax table must have brackets"));
        };
        if !first.lower.is_zero() {
            return Err(DomainError::validation(
                "first tax bracket must start at zero",
            ));
        }

        for (idx, pair) in brackets.windows(2).enumerate() {
            let upper = pair[0].upper.ok_or_else(|| {
                DomainError::validation(format!(
                    "only the final tax bracket may be unbounded (bracket {idx})"
                ))
            })?;
            if upper <= pair[0].lower {
                return Err(DomainError::validation(format!(
                    "tax bracket {idx} upper bound must exceed its lower bound"
                )));
            }
            if pair[1].lower != upper {
                return Err(DomainError::validation(format!(
                    "tax brackets must be contiguous (gap after bracket {idx})"
                )));
            }
        }

        if brackets.last().is_some_and(|last| last.upper.is_some()) {
            return Err(DomainError::validation(
                "final tax bracket must be unbounded",
            ));
        }

        Ok(Self { brackets })
    }

    pub fn brackets(&self) -> &[TaxBracket] {
        &self.brackets
    }

    /// Monthly PAYE table for the 2024 tax year: 0% to K5,100, then 20%,
    /// 30% and 37% bands.
    pub fn monthly_2024() -> Self {
        Self::new(vec![
            TaxBracket::new(Money::ZERO, Some(Money::from_major(5_100)), Rate::ZERO),
            TaxBracket::new(
                Money::from_major(5_100),
                Some(Money::from_major(7_100)),
                Rate::from_percent(20),
            ),
            TaxBracket::new(
                Money::from_major(7_100),
                Some(Money::from_major(9_200)),
                Rate::from_percent(30),
            ),
            TaxBracket::new(Money::from_major(9_200), None, Rate::from_percent(37)),
        ])
        .expect("bundled table is well-formed")
    }
}

/// Tax due on `gross_taxable_pay` under `table`.
///
/// Walks the bands, taxing the slice of gross inside each at that band's
/// rate. Half-open bands mean a gross exactly on a boundary is taxed
/// entirely at the lower band's rate for that unit.
pub fn compute_paye(gross_taxable_pay: Money, table: &TaxTable) -> DomainResult<Money> {
    if gross_taxable_pay.is_negative() {
        return Err(DomainError::validation(
            "gross taxable pay must not be negative",
        ));
    }

    let mut tax = Money::ZERO;
    for bracket in table.brackets() {
        let ceiling = match bracket.upper {
            Some(upper) => gross_taxable_pay.min(upper),
            None => gross_taxable_pay,
        };
        let Some(portion) = ceiling.checked_sub(bracket.lower) else {
            continue;
        };
        if portion <= Money::ZERO {
            continue;
        }
        let banded = portion
            .mul_rate(bracket.rate)
            .ok_or_else(|| DomainError::invariant("tax amount overflow"))?;
        tax = tax
            .checked_add(banded)
            .and_then(|t| t.checked_add(bracket.flat_adjustment))
            .ok_or_else(|| DomainError::invariant("tax total overflow"))?;
    }
    Ok(tax)
}
