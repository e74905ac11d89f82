//! HTTP API for the Paie Engine.
//!
//! This module exposes a minimal JSON API around the payroll engine
//! using the [`axum`](https://crates.io/crates/axum) framework:
//!
//! * `POST /api/payslips` runs a batch pay run and returns the rounded
//!   payslips;
//! * `GET /api/contributions` lists a fiscal year's catalog, optionally
//!   filtered by `category`;
//! * `POST /api/cumulatives` recomputes year-to-date figures over a list
//!   of periods.

use crate::config::Config;
use crate::cumulative::{partition_by_fiscal_year, reset_cumulatives, PeriodRecord};
use crate::engine::{run_payroll, PayRunResult};
use crate::error::PayrollError;
use crate::models::{Category, ContributionDefinition, PayRunInput};
use crate::parameters::ParameterRegistry;
use anyhow::Result;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};

/// Application state shared across requests.
pub struct AppState {
    pub registry: RwLock<ParameterRegistry>,
    pub default_fiscal_year: i32,
}

impl AppState {
    pub fn new(registry: ParameterRegistry, default_fiscal_year: i32) -> Self {
        Self {
            registry: RwLock::new(registry),
            default_fiscal_year,
        }
    }

    /// Loads fiscal-year parameters from the configured directory.
    pub fn from_config(config: &Config) -> Result<Self> {
        let registry = ParameterRegistry::from_dir(&config.parameters_dir)?;
        Ok(Self::new(registry, config.default_fiscal_year))
    }
}

/// Errors as JSON responses: engine errors, and request bodies or query
/// strings the extractors could not read.
pub enum ApiError {
    Payroll(PayrollError),
    Rejected { status: StatusCode, message: String },
}

impl From<PayrollError> for ApiError {
    fn from(err: PayrollError) -> Self {
        Self::Payroll(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

fn payroll_status(err: &PayrollError) -> StatusCode {
    match err {
        PayrollError::UnknownFiscalYear(_) => StatusCode::NOT_FOUND,
        PayrollError::InvalidDefinition { .. }
        | PayrollError::UnknownContribution(_)
        | PayrollError::UnknownLineItem(_)
        | PayrollError::UnknownPeriod(_)
        | PayrollError::FiscalYearMismatch { .. }
        | PayrollError::Locked(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PayrollError::Config(_) | PayrollError::Io(_) | PayrollError::Json(_) => {
            error!(error = %err, "request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Payroll(err) => (payroll_status(&err), err.to_string()),
            Self::Rejected { status, message } => (status, message),
        };
        let body = Json(serde_json::json!({"error": message}));
        (status, body).into_response()
    }
}

/// Build the API router around the given state.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/payslips", post(payslips_handler))
        .route("/api/contributions", get(contributions_handler))
        .route("/api/cumulatives", post(cumulatives_handler))
        .with_state(state)
}

/// Handler for POST /api/payslips
async fn payslips_handler(
    State(app_state): State<Arc<AppState>>,
    input: Result<Json<PayRunInput>, JsonRejection>,
) -> Result<Json<PayRunResult>, ApiError> {
    let Json(input) = input?;
    let registry = app_state.registry.read().await;
    let run = run_payroll(input, &registry)?;
    Ok(Json(run.result()))
}

#[derive(Debug, Deserialize)]
pub struct ContributionQuery {
    pub fiscal_year: Option<i32>,
    pub category: Option<String>,
}

/// Handler for GET /api/contributions
async fn contributions_handler(
    State(app_state): State<Arc<AppState>>,
    query: Result<Query<ContributionQuery>, QueryRejection>,
) -> Result<Json<Vec<ContributionDefinition>>, ApiError> {
    let Query(query) = query?;
    let registry = app_state.registry.read().await;
    let year = query.fiscal_year.unwrap_or(app_state.default_fiscal_year);
    let catalog = &registry.resolve(year)?.catalog;
    let definitions = match query.category.as_deref() {
        None => catalog.instantiate(),
        Some(name) => name
            .parse::<Category>()
            .map(|category| catalog.by_category(category))
            .unwrap_or_default(),
    };
    Ok(Json(definitions))
}

/// Handler for POST /api/cumulatives
///
/// Periods are grouped by fiscal year and folded oldest first; the
/// response lists every period, years in ascending order.
async fn cumulatives_handler(
    periods: Result<Json<Vec<PeriodRecord>>, JsonRejection>,
) -> Result<Json<Vec<PeriodRecord>>, ApiError> {
    let Json(periods) = periods?;
    let folded = partition_by_fiscal_year(periods)
        .into_values()
        .flat_map(|mut year| {
            reset_cumulatives(&mut year);
            year
        })
        .collect();
    Ok(Json(folded))
}

/// Launch the API server.  Parameters are loaded from the configured
/// directory; the call blocks until the server terminates.
pub async fn serve(config: Config) -> Result<()> {
    let state = Arc::new(AppState::from_config(&config)?);
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "server listening");
    axum::serve(listener, router).await?;
    Ok(())
}
