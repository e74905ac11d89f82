//! Payslip aggregation.
//!
//! A [`Payslip`] owns everything needed to produce the figures printed on
//! one pay period's document: the salary line items, a private copy of
//! the contribution definitions, the executive flag and the ceiling.
//! Every edit goes through a method that re-runs the full recompute
//! sequence (gross, then contributions, then net figures) before
//! returning, so the derived totals are never stale at rest.

use crate::calculator::{compute_totals, ContributionDetail, ContributionTotals};
use crate::catalog::check_rate;
use crate::error::{PayrollError, PayrollResult};
use crate::models::{ContributionDefinition, Cumulative, PeriodDates, SalaryLineItem};
use crate::rounding::round_cents;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Contributions reserved to executive ("cadre") employees.
pub const EXECUTIVE_ONLY_IDS: [&str; 3] = ["apec", "ceg_t2", "agirc_arrco_t2"];

/// Net amounts derived from gross salary and employee contributions.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NetFigures {
    pub net_before_tax: f64,
    pub net_to_pay: f64,
    pub net_social: f64,
}

/// Sum of the active earning lines.  Deduction and disabled lines count
/// zero, as do lines without an amount.
pub fn compute_gross_salary(line_items: &[SalaryLineItem]) -> f64 {
    line_items
        .iter()
        .filter(|item| item.counts_toward_gross())
        .map(SalaryLineItem::effective_amount)
        .sum()
}

/// Derives the three net figures.
///
/// The model does not separate the non-deductible CSG/CRDS from the
/// taxable base, nor add benefits in kind to the social base, so all
/// three figures are equal.
pub fn derive_net_figures(gross_salary: f64, total_employee_contributions: f64) -> NetFigures {
    let net = gross_salary - total_employee_contributions;
    NetFigures {
        net_before_tax: net,
        net_to_pay: net,
        net_social: net,
    }
}

/// Switches the executive-only contributions on or off.  Every other
/// definition is returned untouched.
pub fn toggle_executive_contributions(
    mut contributions: Vec<ContributionDefinition>,
    is_executive: bool,
) -> Vec<ContributionDefinition> {
    for contribution in contributions
        .iter_mut()
        .filter(|c| EXECUTIVE_ONLY_IDS.contains(&c.id.as_str()))
    {
        contribution.is_required = is_executive;
    }
    contributions
}

/// One employee's payslip for one period.
#[derive(Debug, Clone, Serialize)]
pub struct Payslip {
    employee_id: String,
    employee_name: String,
    #[serde(flatten)]
    dates: PeriodDates,
    is_executive: bool,
    ceiling: f64,
    line_items: Vec<SalaryLineItem>,
    /// Gross salary typed in directly instead of derived from lines.
    gross_override: Option<f64>,
    contributions: Vec<ContributionDefinition>,
    gross_salary: f64,
    totals: ContributionTotals,
    #[serde(flatten)]
    net: NetFigures,
    cumulative: Option<Cumulative>,
    cumulative_period_start: Option<NaiveDate>,
    cumulative_period_end: Option<NaiveDate>,
    locked: bool,
}

impl Payslip {
    /// Creates an empty payslip over `contributions`, an owned copy the
    /// payslip is free to edit.
    pub fn new(
        dates: PeriodDates,
        contributions: Vec<ContributionDefinition>,
        ceiling: f64,
    ) -> Self {
        let mut payslip = Self {
            employee_id: String::new(),
            employee_name: String::new(),
            dates,
            is_executive: false,
            ceiling,
            line_items: Vec::new(),
            gross_override: None,
            contributions,
            gross_salary: 0.0,
            totals: ContributionTotals::default(),
            net: NetFigures::default(),
            cumulative: None,
            cumulative_period_start: None,
            cumulative_period_end: None,
            locked: false,
        };
        payslip.recompute();
        payslip
    }

    pub fn for_employee(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.employee_id = id.into();
        self.employee_name = name.into();
        self
    }

    pub fn with_line_items(mut self, line_items: Vec<SalaryLineItem>) -> Self {
        self.line_items = line_items;
        self.recompute();
        self
    }

    /// Sets the executive status and applies the matching toggle.
    pub fn with_executive(mut self, is_executive: bool) -> Self {
        self.apply_executive(is_executive);
        self.recompute();
        self
    }

    fn apply_executive(&mut self, is_executive: bool) {
        self.is_executive = is_executive;
        let contributions = std::mem::take(&mut self.contributions);
        self.contributions = toggle_executive_contributions(contributions, is_executive);
    }

    fn recompute(&mut self) {
        self.gross_salary = self
            .gross_override
            .unwrap_or_else(|| compute_gross_salary(&self.line_items));
        self.totals = compute_totals(&self.contributions, self.gross_salary, self.ceiling);
        self.net = derive_net_figures(self.gross_salary, self.totals.total_employee);
        debug!(
            employee = %self.employee_id,
            period_start = %self.dates.period_start,
            gross = self.gross_salary,
            net_to_pay = self.net.net_to_pay,
            "payslip recomputed"
        );
    }

    /// Runs `edit` and recomputes, unless the payslip is locked.
    fn edit<T>(&mut self, edit: impl FnOnce(&mut Self) -> PayrollResult<T>) -> PayrollResult<T> {
        if self.locked {
            return Err(PayrollError::Locked(self.dates.period_start));
        }
        let out = edit(self)?;
        self.recompute();
        Ok(out)
    }

    fn line_item_mut(&mut self, index: usize) -> PayrollResult<&mut SalaryLineItem> {
        self.line_items
            .get_mut(index)
            .ok_or(PayrollError::UnknownLineItem(index))
    }

    fn contribution_mut(&mut self, id: &str) -> PayrollResult<&mut ContributionDefinition> {
        self.contributions
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| PayrollError::UnknownContribution(id.to_string()))
    }

    /// Types the gross salary in directly; line items stop driving it
    /// until one of them is edited again.
    pub fn set_gross_salary(&mut self, gross_salary: f64) -> PayrollResult<()> {
        self.edit(|p| {
            p.gross_override = Some(gross_salary);
            Ok(())
        })
    }

    pub fn push_line_item(&mut self, item: SalaryLineItem) -> PayrollResult<()> {
        self.edit(|p| {
            p.gross_override = None;
            p.line_items.push(item);
            Ok(())
        })
    }

    pub fn remove_line_item(&mut self, index: usize) -> PayrollResult<SalaryLineItem> {
        self.edit(|p| {
            if index >= p.line_items.len() {
                return Err(PayrollError::UnknownLineItem(index));
            }
            p.gross_override = None;
            Ok(p.line_items.remove(index))
        })
    }

    /// Sets the quantity of a line; the amount follows as `base x rate`
    /// when both are known.
    pub fn set_line_item_base(&mut self, index: usize, base: Option<f64>) -> PayrollResult<()> {
        self.edit(|p| {
            let item = p.line_item_mut(index)?;
            item.base = base;
            reprice(item);
            p.gross_override = None;
            Ok(())
        })
    }

    /// Sets the unit price of a line; the amount follows as `base x rate`
    /// when both are known.
    pub fn set_line_item_rate(&mut self, index: usize, rate: Option<f64>) -> PayrollResult<()> {
        self.edit(|p| {
            let item = p.line_item_mut(index)?;
            item.rate = rate;
            reprice(item);
            p.gross_override = None;
            Ok(())
        })
    }

    /// Overrides the amount of a line, even when it no longer matches
    /// `base x rate`.
    pub fn set_line_item_amount(&mut self, index: usize, amount: Option<f64>) -> PayrollResult<()> {
        self.edit(|p| {
            p.line_item_mut(index)?.amount = amount;
            p.gross_override = None;
            Ok(())
        })
    }

    pub fn set_line_item_disabled(&mut self, index: usize, disabled: bool) -> PayrollResult<()> {
        self.edit(|p| {
            p.line_item_mut(index)?.disabled = disabled;
            p.gross_override = None;
            Ok(())
        })
    }

    pub fn set_contribution_required(&mut self, id: &str, is_required: bool) -> PayrollResult<()> {
        self.edit(|p| {
            p.contribution_mut(id)?.is_required = is_required;
            Ok(())
        })
    }

    /// Edits the rates of one contribution on this payslip only.  Rates
    /// go through the same 0-100 check as catalog loading; a rejected
    /// edit leaves the payslip unchanged.
    pub fn set_contribution_rates(
        &mut self,
        id: &str,
        employee_rate: Option<f64>,
        employer_rate: Option<f64>,
    ) -> PayrollResult<()> {
        let invalid = |reason| PayrollError::InvalidDefinition {
            id: id.to_string(),
            reason,
        };
        let employee_rate = employee_rate
            .map(|rate| check_rate("employee", rate))
            .transpose()
            .map_err(invalid)?;
        let employer_rate = employer_rate
            .map(|rate| check_rate("employer", rate))
            .transpose()
            .map_err(invalid)?;
        self.edit(|p| {
            let contribution = p.contribution_mut(id)?;
            if let Some(rate) = employee_rate {
                contribution.employee_rate = rate;
            }
            if let Some(rate) = employer_rate {
                contribution.employer_rate = rate;
            }
            Ok(())
        })
    }

    pub fn set_executive(&mut self, is_executive: bool) -> PayrollResult<()> {
        self.edit(|p| {
            p.apply_executive(is_executive);
            Ok(())
        })
    }

    pub fn set_ceiling(&mut self, ceiling: f64) -> PayrollResult<()> {
        self.edit(|p| {
            p.ceiling = ceiling;
            Ok(())
        })
    }

    /// Finalizes the payslip.  Later edits fail with
    /// [`PayrollError::Locked`].
    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn employee_id(&self) -> &str {
        &self.employee_id
    }

    pub fn employee_name(&self) -> &str {
        &self.employee_name
    }

    pub fn dates(&self) -> &PeriodDates {
        &self.dates
    }

    pub fn is_executive(&self) -> bool {
        self.is_executive
    }

    pub fn ceiling(&self) -> f64 {
        self.ceiling
    }

    pub fn line_items(&self) -> &[SalaryLineItem] {
        &self.line_items
    }

    pub fn contributions(&self) -> &[ContributionDefinition] {
        &self.contributions
    }

    pub fn gross_salary(&self) -> f64 {
        self.gross_salary
    }

    pub fn totals(&self) -> &ContributionTotals {
        &self.totals
    }

    pub fn net_figures(&self) -> NetFigures {
        self.net
    }

    pub fn cumulative(&self) -> Option<Cumulative> {
        self.cumulative
    }

    pub fn cumulative_period(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.cumulative_period_start.zip(self.cumulative_period_end)
    }

    /// Stores year-to-date figures.  Cumulatives are derived data, so
    /// this is allowed on a locked payslip.
    pub(crate) fn store_cumulative(
        &mut self,
        cumulative: Cumulative,
        start: NaiveDate,
        end: NaiveDate,
    ) {
        self.cumulative = Some(cumulative);
        self.cumulative_period_start = Some(start);
        self.cumulative_period_end = Some(end);
    }

    /// Cent-rounded figures for the document renderer.
    pub fn summary(&self) -> PayslipSummary {
        PayslipSummary {
            employee_id: self.employee_id.clone(),
            employee_name: self.employee_name.clone(),
            dates: self.dates,
            is_executive: self.is_executive,
            gross_salary: round_cents(self.gross_salary),
            total_employee_contributions: round_cents(self.totals.total_employee),
            total_employer_contributions: round_cents(self.totals.total_employer),
            net_before_tax: round_cents(self.net.net_before_tax),
            net_to_pay: round_cents(self.net.net_to_pay),
            net_social: round_cents(self.net.net_social),
            cumulative_gross_salary: self
                .cumulative
                .map(|c| round_cents(c.cumulative_gross_salary)),
            cumulative_net_salary: self.cumulative.map(|c| round_cents(c.cumulative_net_salary)),
            cumulative_period_start: self.cumulative_period_start,
            cumulative_period_end: self.cumulative_period_end,
            contributions: self
                .totals
                .details
                .iter()
                .map(|d| ContributionDetail {
                    base: round_cents(d.base),
                    employee_amount: round_cents(d.employee_amount),
                    employer_amount: round_cents(d.employer_amount),
                    ..d.clone()
                })
                .collect(),
        }
    }
}

fn reprice(item: &mut SalaryLineItem) {
    if let (Some(base), Some(rate)) = (item.base, item.rate) {
        item.amount = Some(base * rate);
    }
}

/// What a payslip document prints, rounded to cents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayslipSummary {
    pub employee_id: String,
    pub employee_name: String,
    #[serde(flatten)]
    pub dates: PeriodDates,
    pub is_executive: bool,
    pub gross_salary: f64,
    pub total_employee_contributions: f64,
    pub total_employer_contributions: f64,
    pub net_before_tax: f64,
    pub net_to_pay: f64,
    pub net_social: f64,
    pub cumulative_gross_salary: Option<f64>,
    pub cumulative_net_salary: Option<f64>,
    pub cumulative_period_start: Option<NaiveDate>,
    pub cumulative_period_end: Option<NaiveDate>,
    pub contributions: Vec<ContributionDetail>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{default_contributions, SOCIAL_SECURITY_MONTHLY_CEILING};
    use crate::models::Category;

    fn march_2024() -> PeriodDates {
        PeriodDates {
            period_start: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            payment_date: NaiveDate::from_ymd_opt(2024, 3, 29).unwrap(),
            fiscal_year: 2024,
        }
    }

    fn payslip() -> Payslip {
        Payslip::new(
            march_2024(),
            default_contributions().to_vec(),
            SOCIAL_SECURITY_MONTHLY_CEILING,
        )
            .for_employee("e-1", "Camille Martin")
    }

    fn assert_consistent(p: &Payslip) {
        let expected = compute_totals(p.contributions(), p.gross_salary(), p.ceiling());
        assert_eq!(p.totals(), &expected);
        assert_eq!(p.net_figures(), derive_net_figures(p.gross_salary(), expected.total_employee));
    }

    #[test]
    fn gross_skips_disabled_and_deduction_lines() {
        let mut deduction = SalaryLineItem::earning("Absence", 80.0);
        deduction.is_addition = false;
        let mut disabled = SalaryLineItem::earning("Prime exceptionnelle", 300.0);
        disabled.disabled = true;
        let items = vec![
            SalaryLineItem::earning("Salaire de base", 1668.37),
            SalaryLineItem::earning("Heures supplémentaires", 150.0),
            disabled,
            deduction,
        ];
        assert_eq!(round_cents(compute_gross_salary(&items)), 1818.37);

        let without_disabled: Vec<_> = items.iter().filter(|i| !i.disabled).cloned().collect();
        assert_eq!(compute_gross_salary(&items), compute_gross_salary(&without_disabled));
    }

    #[test]
    fn missing_amount_counts_zero() {
        let mut item = SalaryLineItem::earning("Prime", 0.0);
        item.amount = None;
        assert_eq!(compute_gross_salary(&[item]), 0.0);
    }

    #[test]
    fn net_figures_collapse_to_gross_minus_employee_share() {
        let net = derive_net_figures(2000.0, 450.0);
        assert_eq!(net.net_before_tax, 1550.0);
        assert_eq!(net.net_to_pay, 1550.0);
        assert_eq!(net.net_social, 1550.0);
    }

    #[test]
    fn executive_toggle_only_touches_executive_items() {
        let original = default_contributions().to_vec();
        let apec_before = original.iter().find(|c| c.id == "apec").unwrap().is_required;
        assert!(!apec_before);

        let executive = toggle_executive_contributions(original.clone(), true);
        let apec = executive.iter().find(|c| c.id == "apec").unwrap();
        assert!(apec.is_required);
        for c in executive.iter().filter(|c| c.category == Category::CsgCrds) {
            assert!(c.is_required);
        }

        let back = toggle_executive_contributions(executive, false);
        assert_eq!(back, original);
    }

    #[test]
    fn executive_toggle_preserves_manual_flags_elsewhere() {
        let mut contributions = default_contributions().to_vec();
        contributions.iter_mut().find(|c| c.id == "fnal").unwrap().is_required = false;
        let round_trip = toggle_executive_contributions(
            toggle_executive_contributions(contributions.clone(), true),
            false,
        );
        for (a, b) in contributions.iter().zip(&round_trip) {
            if !EXECUTIVE_ONLY_IDS.contains(&a.id.as_str()) {
                assert_eq!(a.is_required, b.is_required, "{}", a.id);
            }
        }
    }

    #[test]
    fn every_edit_keeps_totals_consistent() {
        let base = SalaryLineItem::priced("Salaire de base", 151.67, 11.65);
        let mut p = payslip().with_line_items(vec![base]);
        assert_consistent(&p);

        p.push_line_item(SalaryLineItem::earning("Prime", 400.0)).unwrap();
        assert_consistent(&p);
        p.set_line_item_rate(0, Some(30.0)).unwrap();
        assert_eq!(p.line_items()[0].amount, Some(151.67 * 30.0));
        assert_consistent(&p);
        p.set_contribution_rates("vieillesse_plafonnee", Some(7.0), None).unwrap();
        assert_consistent(&p);
        p.set_contribution_required("crds", false).unwrap();
        assert!(p.totals().details.iter().all(|d| d.id != "crds"));
        p.set_executive(true).unwrap();
        assert!(p.totals().details.iter().any(|d| d.id == "agirc_arrco_t2"));
        assert_consistent(&p);
        p.set_gross_salary(2500.0).unwrap();
        assert_eq!(p.gross_salary(), 2500.0);
        assert_consistent(&p);
        p.set_line_item_disabled(1, true).unwrap();
        assert_eq!(p.gross_salary(), 151.67 * 30.0);
        assert_consistent(&p);
    }

    #[test]
    fn amount_override_survives_until_base_or_rate_changes() {
        let mut p = payslip().with_line_items(vec![SalaryLineItem::priced("Heures", 10.0, 20.0)]);
        p.set_line_item_amount(0, Some(250.0)).unwrap();
        assert_eq!(p.gross_salary(), 250.0);
        p.set_line_item_base(0, Some(12.0)).unwrap();
        assert_eq!(p.gross_salary(), 240.0);
    }

    #[test]
    fn executive_flag_enables_apec_on_payslip() {
        let mut p = payslip().with_executive(false);
        let required = |p: &Payslip, id: &str| {
            p.contributions().iter().find(|c| c.id == id).unwrap().is_required
        };
        let apec = |p: &Payslip| required(p, "apec");
        let csg = |p: &Payslip| required(p, "csg_deductible");
        assert!(!apec(&p));
        p.set_executive(true).unwrap();
        assert!(apec(&p));
        assert!(csg(&p));
    }

    #[test]
    fn unknown_targets_are_reported() {
        let mut p = payslip();
        assert!(matches!(
            p.set_line_item_amount(3, Some(1.0)),
            Err(PayrollError::UnknownLineItem(3))
        ));
        assert!(matches!(p.remove_line_item(0), Err(PayrollError::UnknownLineItem(0))));
        assert!(matches!(
            p.set_contribution_required("mutuelle", true),
            Err(PayrollError::UnknownContribution(_))
        ));
    }

    #[test]
    fn rate_edits_outside_percentage_range_are_rejected() {
        let mut p = payslip().with_line_items(vec![SalaryLineItem::earning("Salaire", 2000.0)]);
        let before = p.net_figures();
        let err = p
            .set_contribution_rates("csg_deductible", Some(250.0), None)
            .unwrap_err();
        assert!(matches!(
            err,
            PayrollError::InvalidDefinition { ref id, .. } if id == "csg_deductible"
        ));
        assert!(matches!(
            p.set_contribution_rates("fnal", None, Some(-1.0)),
            Err(PayrollError::InvalidDefinition { .. })
        ));
        assert!(matches!(
            p.set_contribution_rates("fnal", Some(f64::NAN), None),
            Err(PayrollError::InvalidDefinition { .. })
        ));
        let csg = p.contributions().iter().find(|c| c.id == "csg_deductible").unwrap();
        assert_eq!(csg.employee_rate, 6.8);
        assert_eq!(p.net_figures(), before);

        p.set_contribution_rates("csg_deductible", Some(100.0), Some(0.0)).unwrap();
        assert_consistent(&p);
    }

    #[test]
    fn locked_payslip_rejects_edits() {
        let mut p = payslip().with_line_items(vec![SalaryLineItem::earning("Salaire", 2000.0)]);
        p.lock();
        assert!(matches!(p.set_gross_salary(1.0), Err(PayrollError::Locked(_))));
        assert!(matches!(p.set_executive(true), Err(PayrollError::Locked(_))));
        assert_eq!(p.gross_salary(), 2000.0);
    }

    #[test]
    fn summary_rounds_to_cents() {
        let p = payslip().with_line_items(vec![SalaryLineItem::earning("Salaire", 1668.37)]);
        let summary = p.summary();
        let old_age = summary
            .contributions
            .iter()
            .find(|d| d.id == "vieillesse_plafonnee")
            .unwrap();
        assert_eq!(old_age.employee_amount, 115.12);
        assert_eq!(old_age.employer_amount, 142.65);
        assert_eq!(summary.net_to_pay, round_cents(p.net_figures().net_to_pay));
        assert!(summary.cumulative_gross_salary.is_none());
    }
}
