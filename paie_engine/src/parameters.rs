//! Fiscal-year parameters.
//!
//! The social-security ceiling and the contribution rates change every
//! year.  Each year is described by a [`FiscalYearParameters`] record,
//! normally stored as one JSON file per year:
//!
//! ```json
//! { "fiscal_year": 2025, "monthly_ceiling": 3925.0 }
//! ```
//!
//! A file without a `contributions` array uses the default catalog.
//! [`ParameterRegistry`] resolves a fiscal year to its ceiling and
//! catalog for the calculation engine.

use crate::catalog::{
    ContributionCatalog, RawContributionDefinition, SOCIAL_SECURITY_MONTHLY_CEILING,
};
use crate::error::{PayrollError, PayrollResult};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

/// Monthly ceilings shipped with the engine.
pub const BUILTIN_CEILINGS: [(i32, f64); 3] = [
    (2023, 3666.0),
    (2024, SOCIAL_SECURITY_MONTHLY_CEILING),
    (2025, 3925.0),
];

/// Parameters of one fiscal year as written on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiscalYearParameters {
    pub fiscal_year: i32,
    pub monthly_ceiling: f64,
    #[serde(default)]
    pub contributions: Option<Vec<RawContributionDefinition>>,
}

/// Resolved parameters for one year.
#[derive(Debug, Clone)]
pub struct YearParameters {
    pub monthly_ceiling: f64,
    pub catalog: ContributionCatalog,
}

/// Load all fiscal-year parameter files from a directory.
///
/// Every `.json` file is parsed as a [`FiscalYearParameters`].  Files
/// that fail to parse are logged and skipped.  A missing directory gives
/// an empty list.
pub fn load_parameters_from_dir(path: &Path) -> Result<Vec<FiscalYearParameters>> {
    let mut years = Vec::new();
    if !path.is_dir() {
        return Ok(years);
    }
    for entry in std::fs::read_dir(path).with_context(|| format!("reading {}", path.display()))? {
        let entry = entry?;
        let file = entry.path();
        if !entry.file_type()?.is_file() || file.extension().map_or(true, |ext| ext != "json") {
            continue;
        }
        let data = std::fs::read_to_string(&file)
            .with_context(|| format!("reading {}", file.display()))?;
        match serde_json::from_str::<FiscalYearParameters>(&data) {
            Ok(params) => years.push(params),
            Err(err) => warn!(
                file = %file.display(),
                error = %err,
                "failed to parse fiscal-year parameters"
            ),
        }
    }
    years.sort_by_key(|p| p.fiscal_year);
    Ok(years)
}

/// Ceiling and catalog per fiscal year.
#[derive(Debug, Clone, Default)]
pub struct ParameterRegistry {
    years: BTreeMap<i32, YearParameters>,
}

impl ParameterRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Built-in ceilings, each with the default catalog.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for (fiscal_year, monthly_ceiling) in BUILTIN_CEILINGS {
            registry.insert(
                fiscal_year,
                YearParameters {
                    monthly_ceiling,
                    catalog: ContributionCatalog::with_defaults(),
                },
            );
        }
        registry
    }

    /// Built-in years overlaid with the files found in `dir`.  A file
    /// that parses but fails validation is logged and skipped, like one
    /// that does not parse.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut registry = Self::builtin();
        for params in load_parameters_from_dir(dir)? {
            let fiscal_year = params.fiscal_year;
            if let Err(err) = registry.register(params) {
                warn!(fiscal_year, error = %err, "skipping fiscal-year parameters");
            }
        }
        Ok(registry)
    }

    pub fn insert(&mut self, fiscal_year: i32, params: YearParameters) {
        self.years.insert(fiscal_year, params);
    }

    /// Validates and registers one year, replacing any previous entry.
    /// Rejected contribution entries are skipped; their ids are returned.
    pub fn register(&mut self, params: FiscalYearParameters) -> PayrollResult<Vec<String>> {
        if !params.monthly_ceiling.is_finite() || params.monthly_ceiling <= 0.0 {
            return Err(PayrollError::Config(format!(
                "fiscal year {}: monthly ceiling must be positive, got {}",
                params.fiscal_year, params.monthly_ceiling
            )));
        }
        let (catalog, rejected) = match params.contributions {
            None => (ContributionCatalog::with_defaults(), Vec::new()),
            Some(raws) => {
                let loaded = ContributionCatalog::load(raws);
                let ids = loaded.rejected.into_iter().map(|(id, _)| id).collect();
                (loaded.catalog, ids)
            }
        };
        info!(
            fiscal_year = params.fiscal_year,
            ceiling = params.monthly_ceiling,
            contributions = catalog.len(),
            "registered fiscal-year parameters"
        );
        self.insert(
            params.fiscal_year,
            YearParameters {
                monthly_ceiling: params.monthly_ceiling,
                catalog,
            },
        );
        Ok(rejected)
    }

    pub fn resolve(&self, fiscal_year: i32) -> PayrollResult<&YearParameters> {
        self.years
            .get(&fiscal_year)
            .ok_or(PayrollError::UnknownFiscalYear(fiscal_year))
    }

    pub fn fiscal_years(&self) -> impl Iterator<Item = i32> + '_ {
        self.years.keys().copied()
    }
}
