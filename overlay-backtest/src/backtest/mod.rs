//! Roll-forward backtesting for the short-vega overlay.
//!
//! This module provides:
//! - Contract, position and portfolio values with mark-to-market
//! - Per-date portfolio snapshots
//! - The roll-forward engine producing the strategy-level series

pub mod engine;
pub mod position;

pub use engine::{
    BacktestConfig, BacktestEngine, BacktestError, BacktestResult, DayAction, DayRecord,
    InvalidParameterPolicy, RollState,
};
pub use position::{
    mark_price, Contract, MarkSource, Portfolio, Position, PositionRecord, Snapshot,
};
