//! Statutory payroll and asset calculations.
//!
//! Every function here is pure and deterministic: gross pay and asset figures
//! in, exact amounts out. Nothing reads the clock, nothing touches IO, and
//! invalid inputs are rejected up front rather than clamped; these amounts
//! end up on journal lines and must be auditable.

pub mod contributions;
pub mod depreciation;
pub mod paye;
pub mod run;

pub use contributions::{
    compute_health_fund_contribution, compute_pension_contribution, ContributionSplit,
};
pub use depreciation::{compute_straight_line_depreciation, DepreciationPeriod};
pub use paye::{compute_paye, TaxBracket, TaxTable};
pub use run::{PayrollBreakdown, PayrollConfig, PayrollEmployee, PayrollRun, PayrollTotals};
