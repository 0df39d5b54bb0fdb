//! Parameter sweep module.
//!
//! Runs independent backtests over a grid of:
//! - Start levels
//! - Target vega fractions
//! - Start dates
//! - Expiry ranks

pub mod grid;
pub mod runner;

pub use grid::{ParameterSet, SweepGrid};
pub use runner::{render_table, SweepResult, SweepRunner};
