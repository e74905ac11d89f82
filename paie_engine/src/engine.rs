//! Batch payroll engine.
//!
//! The `engine` module turns a [`PayRunInput`] into one [`Payslip`] per
//! employee for a single pay period.  Employees are independent, so the
//! work is spread across CPU cores with [`rayon`].  Each payslip gets its
//! own copy of the fiscal year's catalog before any per-employee rate
//! edit is applied.

use crate::cumulative::{carry_forward, cumulative_start, PeriodFigures};
use crate::error::PayrollResult;
use crate::models::{EmployeeInput, PayRunInput, PeriodDates};
use crate::parameters::{ParameterRegistry, YearParameters};
use crate::payslip::{Payslip, PayslipSummary};
use crate::rounding::round_cents;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Payslips computed by one run, at full precision.
#[derive(Debug, Clone)]
pub struct PayRun {
    pub period: PeriodDates,
    pub payslips: Vec<Payslip>,
}

/// Sums over every payslip of a run.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RunTotals {
    pub gross_salary: f64,
    pub employee_contributions: f64,
    pub employer_contributions: f64,
    pub net_to_pay: f64,
}

/// The presentation form of a pay run, rounded to cents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayRunResult {
    pub period: PeriodDates,
    pub payslips: Vec<PayslipSummary>,
    pub totals: RunTotals,
}

impl PayRun {
    pub fn totals(&self) -> RunTotals {
        self.payslips.iter().fold(RunTotals::default(), |acc, p| RunTotals {
            gross_salary: acc.gross_salary + p.gross_salary(),
            employee_contributions: acc.employee_contributions + p.totals().total_employee,
            employer_contributions: acc.employer_contributions + p.totals().total_employer,
            net_to_pay: acc.net_to_pay + p.net_figures().net_to_pay,
        })
    }

    pub fn result(&self) -> PayRunResult {
        let totals = self.totals();
        PayRunResult {
            period: self.period,
            payslips: self.payslips.iter().map(Payslip::summary).collect(),
            totals: RunTotals {
                gross_salary: round_cents(totals.gross_salary),
                employee_contributions: round_cents(totals.employee_contributions),
                employer_contributions: round_cents(totals.employer_contributions),
                net_to_pay: round_cents(totals.net_to_pay),
            },
        }
    }
}

fn build_payslip(
    employee: EmployeeInput,
    period: PeriodDates,
    params: &YearParameters,
) -> PayrollResult<Payslip> {
    let mut payslip = Payslip::new(period, params.catalog.instantiate(), params.monthly_ceiling)
        .for_employee(employee.id, employee.name)
        .with_line_items(employee.line_items)
        .with_executive(employee.is_executive);
    for edit in &employee.rate_overrides {
        payslip.set_contribution_rates(&edit.id, edit.employee_rate, edit.employer_rate)?;
    }
    let cumulative = carry_forward(employee.previous, &payslip);
    let start = cumulative_start(&payslip);
    let end = payslip.period_end();
    payslip.store_cumulative(cumulative, start, end);
    Ok(payslip)
}

/// Computes the payslips of every employee in `input`.
///
/// Fails if the period's fiscal year has no registered parameters or if
/// a rate override names a contribution the catalog does not have.
pub fn run_payroll(input: PayRunInput, registry: &ParameterRegistry) -> PayrollResult<PayRun> {
    let period = input.period;
    let params = registry.resolve(period.fiscal_year)?;
    let payslips = input
        .employees
        .into_par_iter()
        .map(|employee| build_payslip(employee, period, params))
        .collect::<PayrollResult<Vec<_>>>()?;
    info!(
        fiscal_year = period.fiscal_year,
        period_start = %period.period_start,
        employees = payslips.len(),
        "pay run computed"
    );
    Ok(PayRun { period, payslips })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PayrollError;
    use crate::models::{Cumulative, RateOverride, SalaryLineItem};
    use chrono::NaiveDate;

    fn period(fiscal_year: i32) -> PeriodDates {
        PeriodDates {
            period_start: NaiveDate::from_ymd_opt(fiscal_year, 2, 1).unwrap(),
            period_end: NaiveDate::from_ymd_opt(fiscal_year, 2, 28).unwrap(),
            payment_date: NaiveDate::from_ymd_opt(fiscal_year, 2, 28).unwrap(),
            fiscal_year,
        }
    }

    fn employee(id: &str, gross: f64, is_executive: bool) -> EmployeeInput {
        EmployeeInput {
            id: id.into(),
            name: format!("Salarié {id}"),
            is_executive,
            line_items: vec![SalaryLineItem::earning("Salaire de base", gross)],
            rate_overrides: Vec::new(),
            previous: None,
        }
    }

    #[test]
    fn computes_each_employee_in_input_order() {
        let input = PayRunInput {
            period: period(2024),
            employees: vec![employee("a", 1800.0, false), employee("b", 5000.0, true)],
        };
        let run = run_payroll(input, &ParameterRegistry::builtin()).unwrap();
        let ids: Vec<_> = run.payslips.iter().map(|p| p.employee_id()).collect();
        assert_eq!(ids, ["a", "b"]);

        let executive = &run.payslips[1];
        let t2 = executive.totals().details.iter().find(|d| d.id == "agirc_arrco_t2").unwrap();
        assert_eq!(t2.base, 1136.0);
        assert!(run.payslips[0].totals().details.iter().all(|d| d.id != "apec"));

        let totals = run.totals();
        assert_eq!(totals.gross_salary, 6800.0);
        let net: f64 = run.payslips.iter().map(|p| p.net_figures().net_to_pay).sum();
        assert!((totals.net_to_pay - net).abs() < 1e-9);
    }

    #[test]
    fn carries_previous_cumulative() {
        let mut e = employee("a", 2000.0, false);
        e.previous = Some(Cumulative {
            cumulative_gross_salary: 2000.0,
            cumulative_net_salary: 1500.0,
        });
        let run = run_payroll(
            PayRunInput { period: period(2024), employees: vec![e] },
            &ParameterRegistry::builtin(),
        )
        .unwrap();
        let payslip = &run.payslips[0];
        let cumulative = payslip.cumulative().unwrap();
        assert_eq!(cumulative.cumulative_gross_salary, 4000.0);
        assert_eq!(
            cumulative.cumulative_net_salary,
            1500.0 + payslip.net_figures().net_before_tax
        );
        assert_eq!(
            payslip.cumulative_period().map(|(start, _)| start),
            NaiveDate::from_ymd_opt(2024, 1, 1)
        );
    }

    #[test]
    fn rate_overrides_stay_on_one_payslip() {
        let mut edited = employee("a", 2000.0, false);
        edited.rate_overrides.push(RateOverride {
            id: "vieillesse_plafonnee".into(),
            employee_rate: Some(0.0),
            employer_rate: None,
        });
        let run = run_payroll(
            PayRunInput {
                period: period(2024),
                employees: vec![edited, employee("b", 2000.0, false)],
            },
            &ParameterRegistry::builtin(),
        )
        .unwrap();
        let rate = |i: usize| {
            run.payslips[i]
                .contributions()
                .iter()
                .find(|c| c.id == "vieillesse_plafonnee")
                .unwrap()
                .employee_rate
        };
        assert_eq!(rate(0), 0.0);
        assert_eq!(rate(1), 6.9);
    }

    #[test]
    fn unknown_year_or_contribution_fails() {
        let err = run_payroll(
            PayRunInput { period: period(1990), employees: vec![employee("a", 1.0, false)] },
            &ParameterRegistry::builtin(),
        )
        .unwrap_err();
        assert!(matches!(err, PayrollError::UnknownFiscalYear(1990)));

        let mut e = employee("a", 1.0, false);
        e.rate_overrides.push(RateOverride {
            id: "mutuelle".into(),
            employee_rate: Some(1.0),
            employer_rate: None,
        });
        let err = run_payroll(
            PayRunInput { period: period(2024), employees: vec![e] },
            &ParameterRegistry::builtin(),
        )
        .unwrap_err();
        assert!(matches!(err, PayrollError::UnknownContribution(_)));
    }

    #[test]
    fn result_rounds_totals() {
        let run = run_payroll(
            PayRunInput { period: period(2024), employees: vec![employee("a", 1668.37, false)] },
            &ParameterRegistry::builtin(),
        )
        .unwrap();
        let result = run.result();
        assert_eq!(result.totals.gross_salary, 1668.37);
        assert_eq!(
            result.payslips[0].net_to_pay,
            round_cents(run.payslips[0].net_figures().net_to_pay)
        );
    }
}
