//! Short-vega options overlay backtester.
//!
//! Each day the engine picks the nearest-the-money call and put at the
//! third-soonest expiry, sizes both legs to a fixed fraction of the strategy
//! level in vega, and delta-hedges with the underlying. The strategy level is
//! rolled forward from the previous day's portfolio.

pub mod backtest;
pub mod config;
pub mod data;
pub mod metrics;
pub mod pricing;
pub mod report;
pub mod risk;
pub mod selection;
pub mod sweep;
pub mod validation;

// Re-export commonly used types
pub use backtest::{BacktestConfig, BacktestEngine, BacktestResult, Portfolio, Snapshot};
pub use config::AppConfig;
pub use data::{ChainRow, DataLoader, MarketData, OptionType, RawQuote};
pub use metrics::{MetricsCalculator, PerformanceMetrics};
pub use pricing::{BlackScholes, Greeks};
pub use report::{StrategyViewer, ViewerError};
pub use risk::{PortfolioGreeks, VegaSizer};
pub use selection::{PairSelector, SkipReason};
pub use sweep::{SweepGrid, SweepRunner};
pub use validation::DataIntegrityValidator;
