//! Contribution calculator.
//!
//! Pure functions turning a gross salary and a set of contribution
//! definitions into employee and employer amounts.  Nothing here rounds:
//! rounding happens once, at the presentation boundary, so that many
//! small contributions do not compound rounding error.
//!
//! The calculator is total.  A definition that slipped past catalog
//! validation (unknown base type, negative rate) yields a zero amount
//! and a warning rather than an error.

use crate::catalog::TIER_B_CEILING_MULTIPLIER;
use crate::models::{BaseType, Category, ContributionDefinition};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Employee and employer shares of one contribution.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ContributionAmounts {
    pub employee_amount: f64,
    pub employer_amount: f64,
}

/// Audit line for one applied contribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributionDetail {
    pub id: String,
    pub name: String,
    pub category: Category,
    pub base_type: BaseType,
    pub base: f64,
    pub employee_rate: f64,
    pub employer_rate: f64,
    pub employee_amount: f64,
    pub employer_amount: f64,
}

/// Sums over every required contribution, with the per-item breakdown
/// in input order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContributionTotals {
    pub total_employee: f64,
    pub total_employer: f64,
    pub details: Vec<ContributionDetail>,
}

/// Portion of `gross_salary` a rate of the given base type applies to.
pub fn compute_base(base_type: BaseType, gross_salary: f64, ceiling: f64) -> f64 {
    match base_type {
        BaseType::Total => gross_salary,
        BaseType::Capped | BaseType::TierA => gross_salary.min(ceiling),
        BaseType::TierB => {
            (gross_salary.min(ceiling * TIER_B_CEILING_MULTIPLIER) - ceiling).max(0.0)
        }
        BaseType::Unrecognized => 0.0,
    }
}

fn usable_rate(definition: &ContributionDefinition, side: &str, rate: f64) -> f64 {
    if rate.is_finite() && rate >= 0.0 {
        rate
    } else {
        warn!(
            contribution = %definition.id,
            side,
            rate,
            "invalid contribution rate, counting zero"
        );
        0.0
    }
}

/// Employee and employer amounts of one contribution.
pub fn compute_amounts(
    definition: &ContributionDefinition,
    gross_salary: f64,
    ceiling: f64,
) -> ContributionAmounts {
    if definition.base_type == BaseType::Unrecognized {
        warn!(contribution = %definition.id, "unrecognized base type, counting zero");
    }
    let base = compute_base(definition.base_type, gross_salary, ceiling);
    let employee_rate = usable_rate(definition, "employee", definition.employee_rate);
    let employer_rate = usable_rate(definition, "employer", definition.employer_rate);
    ContributionAmounts {
        employee_amount: base * employee_rate / 100.0,
        employer_amount: base * employer_rate / 100.0,
    }
}

/// Applies every required definition to `gross_salary`.
pub fn compute_totals(
    definitions: &[ContributionDefinition],
    gross_salary: f64,
    ceiling: f64,
) -> ContributionTotals {
    let details: Vec<ContributionDetail> = definitions
        .iter()
        .filter(|d| d.is_required)
        .map(|d| {
            let amounts = compute_amounts(d, gross_salary, ceiling);
            ContributionDetail {
                id: d.id.clone(),
                name: d.name.clone(),
                category: d.category,
                base_type: d.base_type,
                base: compute_base(d.base_type, gross_salary, ceiling),
                employee_rate: d.employee_rate,
                employer_rate: d.employer_rate,
                employee_amount: amounts.employee_amount,
                employer_amount: amounts.employer_amount,
            }
        })
        .collect();
    ContributionTotals {
        total_employee: details.iter().map(|d| d.employee_amount).sum(),
        total_employer: details.iter().map(|d| d.employer_amount).sum(),
        details,
    }
}
