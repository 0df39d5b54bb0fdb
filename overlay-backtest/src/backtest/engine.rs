//! Roll-forward engine.
//!
//! Folds over the ascending as-of dates. Each day is either:
//! - REBALANCE: the held pair is marked to the day's chain, the level takes
//!   the option and delta-hedge P&L, and a freshly sized pair replaces it
//! - CARRY: no tradable pair today, so level and portfolio pass through
//!   unchanged
//!
//! level_t = level_{t-1}
//!         + Σ units × (price_t − price_t_1)
//!         + Σ (delta × units) × (underlying_t − underlying_ref)
//!
//! `underlying_ref` is the underlying at the last rebalance, so a move that
//! happens across CARRY days is recognized on the next rebalance.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::data::{ChainRow, DayChain, MarketData};
use crate::pricing::{BlackScholes, PricingError};
use crate::risk::{SizingResult, VegaSizer, VegaSizerConfig};
use crate::selection::{PairSelector, PairSelectorConfig, SelectedPair, Selection, SkipReason};

use super::position::{Contract, Portfolio, Snapshot};

/// What to do when the greeks engine rejects a selected contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidParameterPolicy {
    /// Stop the run and return the error.
    Abort,
    /// Treat the day as CARRY.
    #[default]
    SkipDay,
}

/// Configuration for backtest execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Seed strategy level.
    pub start_level: f64,

    /// First as-of date to process (inclusive).
    pub start_date: Option<NaiveDate>,

    /// Last as-of date to process (inclusive).
    pub end_date: Option<NaiveDate>,

    /// Rate used for delta/vega at selection.
    pub risk_free_rate: f64,

    /// Target pair vega as a fraction of the strategy level.
    pub target_vega_fraction: f64,

    /// Vega quote convention (100 = per vol point).
    pub vega_scale: f64,

    /// 1-based rank of the target expiry.
    pub expiry_rank: usize,

    pub invalid_parameter_policy: InvalidParameterPolicy,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        let sizer = VegaSizerConfig::default();
        Self {
            start_level: 100.0,
            start_date: None,
            end_date: None,
            risk_free_rate: 0.0,
            target_vega_fraction: sizer.target_vega_fraction,
            vega_scale: sizer.vega_scale,
            expiry_rank: PairSelectorConfig::default().expiry_rank,
            invalid_parameter_policy: InvalidParameterPolicy::default(),
        }
    }
}

impl BacktestConfig {
    /// Reject settings no day could be run with.
    pub fn validate(&self) -> Result<(), BacktestError> {
        if self.expiry_rank == 0 {
            return Err(BacktestError::InvalidExpiryRank(self.expiry_rank));
        }
        Ok(())
    }

    fn includes(&self, date: NaiveDate) -> bool {
        self.start_date.map_or(true, |s| date >= s) && self.end_date.map_or(true, |e| date <= e)
    }
}

#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("Pricing failed on {date}: {source}")]
    Pricing {
        date: NaiveDate,
        #[source]
        source: PricingError,
    },

    #[error("No as-of dates to process")]
    NoDates,

    #[error("Invalid expiry rank {0}: ranks start at 1")]
    InvalidExpiryRank(usize),
}

/// The state of the day for the roll-forward recursion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DayAction {
    Rebalance,
    Carry { reason: SkipReason },
}

/// One processed date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayRecord {
    pub date: NaiveDate,
    pub level: f64,
    pub action: DayAction,
    pub option_pnl: f64,
    pub underlying_pnl: f64,
    /// Net vega of the portfolio held after the day. Zero before the first pair.
    pub net_vega: f64,
    /// `net_vega / level`.
    pub vega_fraction: f64,
}

impl DayRecord {
    pub fn is_rebalance(&self) -> bool {
        matches!(self.action, DayAction::Rebalance)
    }
}

/// State threaded from one day to the next.
#[derive(Debug, Clone, PartialEq)]
pub struct RollState {
    pub level: f64,
    pub portfolio: Option<Portfolio>,
    /// Underlying level the held portfolio was last marked against.
    pub reference_underlying: Option<f64>,
}

impl RollState {
    pub fn seed(level: f64) -> Self {
        Self {
            level,
            portfolio: None,
            reference_underlying: None,
        }
    }
}

/// Result of a completed backtest.
#[derive(Debug, Clone)]
pub struct BacktestResult {
    /// Configuration used.
    pub config: BacktestConfig,

    /// Seed level (day 0 of the series).
    pub start_level: f64,

    /// One record per processed date, ascending.
    pub days: Vec<DayRecord>,

    /// One snapshot per processed date once a pair is held.
    pub snapshots: Vec<Snapshot>,
}

impl BacktestResult {
    /// Strategy levels: the seed followed by one value per processed date.
    pub fn levels(&self) -> Vec<f64> {
        std::iter::once(self.start_level)
            .chain(self.days.iter().map(|d| d.level))
            .collect()
    }

    /// Levels paired with their dates. The seed has no date.
    pub fn level_series(&self) -> Vec<(Option<NaiveDate>, f64)> {
        std::iter::once((None, self.start_level))
            .chain(self.days.iter().map(|d| (Some(d.date), d.level)))
            .collect()
    }

    pub fn final_level(&self) -> f64 {
        self.days.last().map_or(self.start_level, |d| d.level)
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        self.days.first().map(|d| d.date)
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.days.last().map(|d| d.date)
    }

    pub fn rebalance_days(&self) -> usize {
        self.days.iter().filter(|d| d.is_rebalance()).count()
    }

    pub fn carry_days(&self) -> usize {
        self.days.len() - self.rebalance_days()
    }

    pub fn total_return_pct(&self) -> f64 {
        if self.start_level == 0.0 {
            return 0.0;
        }
        (self.final_level() - self.start_level) / self.start_level * 100.0
    }

    pub fn snapshot(&self, date: NaiveDate) -> Option<&Snapshot> {
        self.snapshots.iter().find(|s| s.date == date)
    }

    /// Generate summary string.
    pub fn summary(&self) -> String {
        let range = match (self.start_date(), self.end_date()) {
            (Some(s), Some(e)) => format!("{} to {}", s, e),
            _ => "no dates processed".to_string(),
        };
        format!(
            "Overlay Backtest ({})\n\
             ----------------------------------------\n\
             Start Level: {:.4}\n\
             Final Level: {:.4}\n\
             Total Return: {:.2}%\n\
             Days: {} (rebalance: {}, carry: {})",
            range,
            self.start_level,
            self.final_level(),
            self.total_return_pct(),
            self.days.len(),
            self.rebalance_days(),
            self.carry_days(),
        )
    }
}

/// The roll-forward backtesting engine.
#[derive(Debug, Clone)]
pub struct BacktestEngine {
    config: BacktestConfig,
    selector: PairSelector,
    sizer: VegaSizer,
    pricer: BlackScholes,
}

impl BacktestEngine {
    /// Create a new backtest engine.
    pub fn new(config: BacktestConfig) -> Self {
        let selector = PairSelector::new(PairSelectorConfig {
            expiry_rank: config.expiry_rank,
        });
        let sizer = VegaSizer::new(VegaSizerConfig {
            target_vega_fraction: config.target_vega_fraction,
            vega_scale: config.vega_scale,
        });
        let pricer = BlackScholes::new(config.risk_free_rate);
        Self {
            config,
            selector,
            sizer,
            pricer,
        }
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Run over every as-of date present in the market data.
    pub fn run(&self, market: &MarketData) -> Result<BacktestResult, BacktestError> {
        self.run_with_calendar(&market.dates(), market)
    }

    /// Run over an explicit date set. Dates without chain rows are CARRY days.
    pub fn run_with_calendar(
        &self,
        calendar: &[NaiveDate],
        market: &MarketData,
    ) -> Result<BacktestResult, BacktestError> {
        self.config.validate()?;

        let mut dates: Vec<NaiveDate> = calendar
            .iter()
            .copied()
            .filter(|d| self.config.includes(*d))
            .collect();
        dates.sort();
        dates.dedup();

        if dates.is_empty() {
            return Err(BacktestError::NoDates);
        }

        info!(
            days = dates.len(),
            start_level = self.config.start_level,
            expiry_rank = self.config.expiry_rank,
            "Starting overlay backtest"
        );

        let mut state = RollState::seed(self.config.start_level);
        let mut days = Vec::with_capacity(dates.len());
        let mut snapshots = Vec::with_capacity(dates.len());

        for date in dates {
            let (next, record) = self.step(&state, date, market.day(date))?;
            if let Some(portfolio) = &next.portfolio {
                snapshots.push(Snapshot::of(date, portfolio));
            }
            days.push(record);
            state = next;
        }

        let result = BacktestResult {
            config: self.config.clone(),
            start_level: self.config.start_level,
            days,
            snapshots,
        };

        info!(
            final_level = result.final_level(),
            rebalance_days = result.rebalance_days(),
            carry_days = result.carry_days(),
            "Backtest complete"
        );

        Ok(result)
    }

    /// Advance the recursion by one date.
    pub fn step(
        &self,
        state: &RollState,
        date: NaiveDate,
        day: Option<&DayChain>,
    ) -> Result<(RollState, DayRecord), BacktestError> {
        let Some(day) = day else {
            return Ok(carry(state, date, SkipReason::MissingMarketData));
        };

        let pair = match self.selector.select(&day.rows, day.underlying, date) {
            Selection::Pair(pair) => pair,
            Selection::NoSelection(reason) => return Ok(carry(state, date, reason)),
        };

        let (call, put) = match self.price_pair(&pair, day.underlying) {
            Ok(contracts) => contracts,
            Err(source) => match self.config.invalid_parameter_policy {
                InvalidParameterPolicy::Abort => {
                    return Err(BacktestError::Pricing { date, source });
                }
                InvalidParameterPolicy::SkipDay => {
                    let reason = SkipReason::InvalidParameter {
                        message: source.to_string(),
                    };
                    return Ok(carry(state, date, reason));
                }
            },
        };

        let (option_pnl, underlying_pnl) = match &state.portfolio {
            Some(held) => {
                let reference = state.reference_underlying.unwrap_or(day.underlying);
                (
                    held.marked(day).option_pnl(),
                    held.underlying_delta() * (day.underlying - reference),
                )
            }
            None => (0.0, 0.0),
        };
        let level = state.level + option_pnl + underlying_pnl;

        let units = match self.sizer.size(&call, &put, level) {
            SizingResult::Sized(units) => units,
            SizingResult::Degenerate { total_vega } => {
                return Ok(carry(state, date, SkipReason::DegenerateVega { total_vega }));
            }
        };

        if state.portfolio.is_none() {
            info!(%date, expiry = %pair.expiry, units, "Initial pair established");
        }

        let portfolio = Portfolio::open(call, put, units);
        let greeks = portfolio.greeks();
        debug!(
            %date,
            level,
            option_pnl,
            underlying_pnl,
            expiry = %pair.expiry,
            call_strike = %pair.call.strike,
            put_strike = %pair.put.strike,
            units,
            underlying_delta = greeks.delta,
            net_vega = greeks.vega,
            "Rebalanced"
        );

        Ok((
            RollState {
                level,
                portfolio: Some(portfolio),
                reference_underlying: Some(day.underlying),
            },
            DayRecord {
                date,
                level,
                action: DayAction::Rebalance,
                option_pnl,
                underlying_pnl,
                net_vega: greeks.vega,
                vega_fraction: greeks.vega_fraction(level),
            },
        ))
    }

    /// Compute greeks for both selected legs.
    fn price_pair(
        &self,
        pair: &SelectedPair,
        underlying: f64,
    ) -> Result<(Contract, Contract), PricingError> {
        let price = |row: &ChainRow| {
            self.pricer
                .greeks(
                    underlying,
                    row.strike.to_f64().unwrap_or(f64::NAN),
                    row.time_to_maturity,
                    row.sigma,
                    row.option_type,
                )
                .map(|g| Contract::new(row.clone(), g))
        };
        Ok((price(&pair.call)?, price(&pair.put)?))
    }
}

fn carry(state: &RollState, date: NaiveDate, reason: SkipReason) -> (RollState, DayRecord) {
    match &reason {
        SkipReason::MissingMarketData | SkipReason::InvalidParameter { .. } => {
            warn!(%date, %reason, "Carrying previous portfolio");
        }
        _ => debug!(%date, %reason, "Carrying previous portfolio"),
    }

    let greeks = state
        .portfolio
        .as_ref()
        .map(Portfolio::greeks)
        .unwrap_or_default();

    (
        state.clone(),
        DayRecord {
            date,
            level: state.level,
            action: DayAction::Carry { reason },
            option_pnl: 0.0,
            underlying_pnl: 0.0,
            net_vega: greeks.vega,
            vega_fraction: greeks.vega_fraction(state.level),
        },
    )
}
