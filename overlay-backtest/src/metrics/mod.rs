//! Performance metrics module.
//!
//! Provides calculations over the strategy-level series:
//! - Total and annualized return, annualized volatility
//! - Sharpe, Sortino and Calmar ratios
//! - Maximum drawdown with peak/trough dates

pub mod calculator;

pub use calculator::{DrawdownAnalysis, MetricsCalculator, PerformanceMetrics};
