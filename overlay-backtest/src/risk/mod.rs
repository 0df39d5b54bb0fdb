//! Risk module.
//!
//! Provides:
//! - Vega-targeted position sizing for the call/put pair
//! - Portfolio delta/vega aggregation

pub mod portfolio_greeks;
pub mod position_sizer;

pub use portfolio_greeks::PortfolioGreeks;
pub use position_sizer::{SizingResult, VegaSizer, VegaSizerConfig};
