//! Runtime configuration for the Paie Engine binary.
//!
//! Values come from the environment, after an optional `.env` file has
//! been loaded.

use crate::error::{PayrollError, PayrollResult};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding one JSON parameter file per fiscal year.
    pub parameters_dir: PathBuf,
    pub bind_addr: String,
    /// Fiscal year used when a request does not name one.
    pub default_fiscal_year: i32,
}

impl Config {
    pub fn from_env() -> PayrollResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> PayrollResult<Self> {
        let default_fiscal_year = match lookup("PAIE_DEFAULT_FISCAL_YEAR") {
            Some(raw) => raw.trim().parse().map_err(|_| {
                PayrollError::Config(format!("PAIE_DEFAULT_FISCAL_YEAR is not a year: `{raw}`"))
            })?,
            None => crate::catalog::REFERENCE_YEAR,
        };
        Ok(Self {
            parameters_dir: lookup("PAIE_PARAMETERS_DIR")
                .unwrap_or_else(|| "parameters".to_string())
                .into(),
            bind_addr: lookup("PAIE_BIND_ADDR").unwrap_or_else(|| "127.0.0.1:3000".to_string()),
            default_fiscal_year,
        })
    }
}
