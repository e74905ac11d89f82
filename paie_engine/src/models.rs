//! Data models for the Paie Engine.
//!
//! The `models` module defines the serialisable records exchanged with
//! the rest of the application: contribution definitions, salary line
//! items, pay period dates and cumulative figures, plus the input and
//! output shapes of a batch pay run.  All types derive `Serialize` and
//! `Deserialize` so they can travel as plain JSON.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Family a social contribution belongs to.  Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    SocialSecurity,
    Retirement,
    Unemployment,
    CsgCrds,
    Other,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::SocialSecurity,
        Category::Retirement,
        Category::Unemployment,
        Category::CsgCrds,
        Category::Other,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SocialSecurity => "social_security",
            Self::Retirement => "retirement",
            Self::Unemployment => "unemployment",
            Self::CsgCrds => "csg_crds",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown category `{s}`"))
    }
}

/// Portion of the gross salary a contribution rate applies to.
///
/// `Unrecognized` absorbs any value the engine does not know about when
/// a definition is deserialised directly.  The calculator treats it as
/// a zero base; the catalog loader rejects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseType {
    /// The whole gross salary.
    Total,
    /// Gross salary capped at the social-security ceiling.
    Capped,
    /// Tranche A: same base as `Capped`, named for retirement schemes.
    TierA,
    /// Tranche B: the slice between 1x and 8x the ceiling.
    TierB,
    #[serde(other)]
    Unrecognized,
}

impl BaseType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Total => "total",
            Self::Capped => "capped",
            Self::TierA => "tier_a",
            Self::TierB => "tier_b",
            Self::Unrecognized => "unrecognized",
        }
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BaseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "total" => Ok(Self::Total),
            "capped" => Ok(Self::Capped),
            "tier_a" => Ok(Self::TierA),
            "tier_b" => Ok(Self::TierB),
            other => Err(format!("unknown base type `{other}`")),
        }
    }
}

/// One social contribution as it appears on a payslip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributionDefinition {
    /// Stable key such as `"agirc_arrco_t2"`.
    pub id: String,
    /// Label printed on the payslip.
    pub name: String,
    pub category: Category,
    /// Employee share, in percent of the base.
    pub employee_rate: f64,
    /// Employer share, in percent of the base.
    pub employer_rate: f64,
    pub base_type: BaseType,
    /// Whether the contribution currently applies.  Executive-only
    /// items are switched through this flag.
    pub is_required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A gross-side component of the payslip (base pay, overtime, bonus...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalaryLineItem {
    pub label: String,
    /// Quantity, e.g. hours worked.
    #[serde(default)]
    pub base: Option<f64>,
    /// Unit price, e.g. hourly rate.
    #[serde(default)]
    pub rate: Option<f64>,
    /// Monetary amount.  A missing amount counts as zero.
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default = "default_true")]
    pub is_addition: bool,
    #[serde(default)]
    pub disabled: bool,
}

fn default_true() -> bool {
    true
}

impl SalaryLineItem {
    /// An active earning line with a fixed amount.
    pub fn earning(label: impl Into<String>, amount: f64) -> Self {
        Self {
            label: label.into(),
            base: None,
            rate: None,
            amount: Some(amount),
            is_addition: true,
            disabled: false,
        }
    }

    /// An earning line priced as `base x rate`.
    pub fn priced(label: impl Into<String>, base: f64, rate: f64) -> Self {
        Self {
            label: label.into(),
            base: Some(base),
            rate: Some(rate),
            amount: Some(base * rate),
            is_addition: true,
            disabled: false,
        }
    }

    /// The amount used when summing, zero when absent.
    pub fn effective_amount(&self) -> f64 {
        self.amount.unwrap_or(0.0)
    }

    /// Whether the line counts toward gross salary.
    pub fn counts_toward_gross(&self) -> bool {
        self.is_addition && !self.disabled
    }
}

/// Dates identifying one pay period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodDates {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub payment_date: NaiveDate,
    pub fiscal_year: i32,
}

/// Year-to-date gross and net figures attached to a period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cumulative {
    pub cumulative_gross_salary: f64,
    pub cumulative_net_salary: f64,
}

/// Per-employee input of a batch pay run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeInput {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_executive: bool,
    pub line_items: Vec<SalaryLineItem>,
    /// Per-payslip rate edits applied on top of the fiscal-year catalog.
    #[serde(default)]
    pub rate_overrides: Vec<RateOverride>,
    /// Cumulative figures carried by this employee's previous payslip.
    #[serde(default)]
    pub previous: Option<Cumulative>,
}

/// An edit of one contribution's rates on a single payslip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateOverride {
    pub id: String,
    #[serde(default)]
    pub employee_rate: Option<f64>,
    #[serde(default)]
    pub employer_rate: Option<f64>,
}

/// Input to a batch pay run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayRunInput {
    pub period: PeriodDates,
    pub employees: Vec<EmployeeInput>,
}
