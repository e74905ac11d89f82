//! Paie Engine library crate.
//!
//! This crate computes French payroll contributions: per-contribution
//! employee and employer amounts over tiered social-security bases, the
//! net figures of a payslip, and year-to-date cumulatives.  External
//! applications may call [`engine::run_payroll`] directly, work with a
//! single [`payslip::Payslip`], or embed the API via
//! [`api::build_router`].

pub mod api;
pub mod calculator;
pub mod catalog;
pub mod config;
pub mod cumulative;
pub mod engine;
pub mod error;
pub mod models;
pub mod parameters;
pub mod payslip;
pub mod rounding;

pub use error::{PayrollError, PayrollResult};
