//! Year-to-date cumulative tracking.
//!
//! Cumulative gross and net salaries are a left fold over one
//! employee's periods of a fiscal year, oldest first.
//! [`reset_cumulatives`] is the authoritative fold; [`accumulate`] is a
//! single step of it, and [`YearToDateLedger`] memoizes the fold and
//! re-runs it from the earliest period that changed.
//!
//! Nothing here enforces fiscal-year boundaries on a plain slice.  Use
//! [`partition_by_fiscal_year`] first, or the ledger, which does.

use crate::error::{PayrollError, PayrollResult};
use crate::models::Cumulative;
use crate::payslip::Payslip;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What the cumulative fold needs to read from, and write back to, a
/// pay period.
pub trait PeriodFigures {
    fn period_start(&self) -> NaiveDate;
    fn period_end(&self) -> NaiveDate;
    fn fiscal_year(&self) -> i32;
    fn gross_salary(&self) -> f64;
    /// The net amount carried into the year-to-date total.
    fn net_salary(&self) -> f64;
    fn cumulative(&self) -> Option<Cumulative>;
    fn store_cumulative(&mut self, cumulative: Cumulative, start: NaiveDate, end: NaiveDate);
}

impl PeriodFigures for Payslip {
    fn period_start(&self) -> NaiveDate {
        self.dates().period_start
    }

    fn period_end(&self) -> NaiveDate {
        self.dates().period_end
    }

    fn fiscal_year(&self) -> i32 {
        self.dates().fiscal_year
    }

    fn gross_salary(&self) -> f64 {
        Payslip::gross_salary(self)
    }

    fn net_salary(&self) -> f64 {
        self.net_figures().net_before_tax
    }

    fn cumulative(&self) -> Option<Cumulative> {
        Payslip::cumulative(self)
    }

    fn store_cumulative(&mut self, cumulative: Cumulative, start: NaiveDate, end: NaiveDate) {
        Payslip::store_cumulative(self, cumulative, start, end)
    }
}

/// A bare period record, for callers that keep payslips elsewhere and
/// only need the year-to-date figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodRecord {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub fiscal_year: i32,
    pub gross_salary: f64,
    pub net_salary: f64,
    #[serde(default)]
    pub cumulative_gross_salary: Option<f64>,
    #[serde(default)]
    pub cumulative_net_salary: Option<f64>,
    #[serde(default)]
    pub cumulative_period_start: Option<NaiveDate>,
    #[serde(default)]
    pub cumulative_period_end: Option<NaiveDate>,
}

impl PeriodFigures for PeriodRecord {
    fn period_start(&self) -> NaiveDate {
        self.period_start
    }

    fn period_end(&self) -> NaiveDate {
        self.period_end
    }

    fn fiscal_year(&self) -> i32 {
        self.fiscal_year
    }

    fn gross_salary(&self) -> f64 {
        self.gross_salary
    }

    fn net_salary(&self) -> f64 {
        self.net_salary
    }

    fn cumulative(&self) -> Option<Cumulative> {
        self.cumulative_gross_salary
            .zip(self.cumulative_net_salary)
            .map(|(gross, net)| Cumulative {
                cumulative_gross_salary: gross,
                cumulative_net_salary: net,
            })
    }

    fn store_cumulative(&mut self, cumulative: Cumulative, start: NaiveDate, end: NaiveDate) {
        self.cumulative_gross_salary = Some(cumulative.cumulative_gross_salary);
        self.cumulative_net_salary = Some(cumulative.cumulative_net_salary);
        self.cumulative_period_start = Some(start);
        self.cumulative_period_end = Some(end);
    }
}

fn own_figures<P: PeriodFigures + ?Sized>(period: &P) -> Cumulative {
    Cumulative {
        cumulative_gross_salary: period.gross_salary(),
        cumulative_net_salary: period.net_salary(),
    }
}

/// First day of the cumulative window: 1 January of the fiscal year.
pub fn cumulative_start<P: PeriodFigures + ?Sized>(period: &P) -> NaiveDate {
    NaiveDate::from_ymd_opt(period.fiscal_year(), 1, 1).unwrap_or_else(|| period.period_start())
}

/// One step of the fold: the previous period's cumulative (or its own
/// figures, when it never had one) plus the current period.
pub fn accumulate<P: PeriodFigures + ?Sized>(previous: Option<&P>, current: &P) -> Cumulative {
    let carried = previous.map(|prev| prev.cumulative().unwrap_or_else(|| own_figures(prev)));
    carry_forward(carried, current)
}

/// Adds `current` to a cumulative carried over from elsewhere, e.g. the
/// previous payslip as stored by the calling application.
pub fn carry_forward<P: PeriodFigures + ?Sized>(
    carried: Option<Cumulative>,
    current: &P,
) -> Cumulative {
    let own = own_figures(current);
    match carried {
        None => own,
        Some(carried) => Cumulative {
            cumulative_gross_salary: carried.cumulative_gross_salary + own.cumulative_gross_salary,
            cumulative_net_salary: carried.cumulative_net_salary + own.cumulative_net_salary,
        },
    }
}

/// Folds `from..` of `periods`, assuming `periods[from - 1]` already
/// carries a correct cumulative.
fn fold_from<P: PeriodFigures>(periods: &mut [P], from: usize) {
    for i in from..periods.len() {
        let (done, rest) = periods.split_at_mut(i);
        let current = &mut rest[0];
        let cumulative = accumulate(done.last(), &*current);
        let start = cumulative_start(&*current);
        let end = current.period_end();
        current.store_cumulative(cumulative, start, end);
    }
}

/// Recomputes every cumulative from scratch over periods ordered oldest
/// first: `cum[0] = period[0]`, `cum[i] = cum[i - 1] + period[i]`.
pub fn reset_cumulatives<P: PeriodFigures>(periods: &mut [P]) {
    fold_from(periods, 0);
}

/// Groups periods by fiscal year, each group sorted by period start.
pub fn partition_by_fiscal_year<P: PeriodFigures>(periods: Vec<P>) -> BTreeMap<i32, Vec<P>> {
    let mut years: BTreeMap<i32, Vec<P>> = BTreeMap::new();
    for period in periods {
        years.entry(period.fiscal_year()).or_default().push(period);
    }
    for group in years.values_mut() {
        group.sort_by_key(|p| p.period_start());
    }
    years
}

/// One employee's periods for one fiscal year, with memoized
/// cumulatives.
///
/// `clean` counts the leading periods whose stored cumulative is known
/// to match the fold; any change at index `i` lowers it to `i`.
#[derive(Debug, Clone)]
pub struct YearToDateLedger<P> {
    fiscal_year: i32,
    periods: Vec<P>,
    clean: usize,
}

impl<P: PeriodFigures> YearToDateLedger<P> {
    pub fn new(fiscal_year: i32) -> Self {
        Self {
            fiscal_year,
            periods: Vec::new(),
            clean: 0,
        }
    }

    pub fn fiscal_year(&self) -> i32 {
        self.fiscal_year
    }

    fn check_year(&self, period: &P) -> PayrollResult<()> {
        if period.fiscal_year() != self.fiscal_year {
            return Err(PayrollError::FiscalYearMismatch {
                expected: self.fiscal_year,
                found: period.fiscal_year(),
            });
        }
        Ok(())
    }

    /// Inserts a period at its chronological place.  Returns its index.
    pub fn insert(&mut self, period: P) -> PayrollResult<usize> {
        self.check_year(&period)?;
        let index = self
            .periods
            .partition_point(|p| p.period_start() <= period.period_start());
        self.periods.insert(index, period);
        self.clean = self.clean.min(index);
        Ok(index)
    }

    /// Swaps in a corrected period; every later cumulative is refolded
    /// on the next read.
    pub fn replace(&mut self, index: usize, period: P) -> PayrollResult<P> {
        self.check_year(&period)?;
        if index >= self.periods.len() {
            return Err(PayrollError::UnknownPeriod(index));
        }
        if self.periods[index].period_start() != period.period_start() {
            let old = self.periods.remove(index);
            self.clean = self.clean.min(index);
            self.insert(period)?;
            return Ok(old);
        }
        self.clean = self.clean.min(index);
        Ok(std::mem::replace(&mut self.periods[index], period))
    }

    /// Edits one period in place.
    ///
    /// An edit that moves the period into another fiscal year is undone
    /// and reported as [`PayrollError::FiscalYearMismatch`].  An edit that
    /// moves its start date re-positions it chronologically.
    pub fn edit<T>(&mut self, index: usize, edit: impl FnOnce(&mut P) -> T) -> PayrollResult<T>
    where
        P: Clone,
    {
        let period = self
            .periods
            .get_mut(index)
            .ok_or(PayrollError::UnknownPeriod(index))?;
        let original = period.clone();
        let out = edit(period);
        if let Err(err) = self.check_year(&self.periods[index]) {
            self.periods[index] = original;
            return Err(err);
        }
        self.clean = self.clean.min(index);
        if self.periods[index].period_start() != original.period_start() {
            let moved = self.periods.remove(index);
            self.insert(moved)?;
        }
        Ok(out)
    }

    /// Periods with up-to-date cumulatives.
    pub fn periods(&mut self) -> &[P] {
        if self.clean < self.periods.len() {
            fold_from(&mut self.periods, self.clean);
            self.clean = self.periods.len();
        }
        &self.periods
    }

    /// Cumulative of the latest period, if any.
    pub fn year_to_date(&mut self) -> Option<Cumulative> {
        self.periods().last().and_then(|p| p.cumulative())
    }

    pub fn into_periods(mut self) -> Vec<P> {
        self.periods();
        self.periods
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }
}
