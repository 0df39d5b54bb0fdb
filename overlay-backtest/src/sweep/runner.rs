//! Parallel sweep execution.
//!
//! Each parameter set is an independent backtest over the same market data.
//! Sets run in parallel with rayon; the days inside one backtest stay serial.

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::backtest::{BacktestConfig, BacktestEngine};
use crate::data::MarketData;
use crate::metrics::{MetricsCalculator, PerformanceMetrics};

use super::grid::{ParameterSet, SweepGrid};

/// Outcome of one parameter set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepResult {
    pub params: ParameterSet,
    pub metrics: Option<PerformanceMetrics>,
    pub error: Option<String>,
}

impl SweepResult {
    pub fn sharpe_ratio(&self) -> Option<f64> {
        self.metrics.as_ref().map(|m| m.sharpe_ratio)
    }
}

/// Runs a grid of backtests.
pub struct SweepRunner {
    base_config: BacktestConfig,
    grid: SweepGrid,
}

impl SweepRunner {
    pub fn new(base_config: BacktestConfig, grid: SweepGrid) -> Self {
        Self { base_config, grid }
    }

    pub fn grid(&self) -> &SweepGrid {
        &self.grid
    }

    /// Run every combination and rank by Sharpe ratio.
    pub fn run(&self, market: &MarketData) -> Vec<SweepResult> {
        self.run_with_progress(market, |_, _| {})
    }

    /// Like `run`, calling `on_done(done, total)` after each backtest.
    pub fn run_with_progress<F>(&self, market: &MarketData, on_done: F) -> Vec<SweepResult>
    where
        F: Fn(usize, usize) + Sync,
    {
        let combos = self.grid.combinations();
        let total = combos.len();
        let progress = AtomicUsize::new(0);
        info!(combinations = total, days = market.len(), "Starting sweep");

        let mut results: Vec<SweepResult> = combos
            .par_iter()
            .map(|params| {
                let result = self.run_one(params, market);
                let done = progress.fetch_add(1, Ordering::Relaxed) + 1;
                on_done(done, total);
                result
            })
            .collect();

        rank(&mut results);

        if let Some(best) = results.first().filter(|r| r.metrics.is_some()) {
            info!(
                best = %best.params.key(),
                sharpe = best.sharpe_ratio().unwrap_or(0.0),
                "Sweep complete"
            );
        }

        results
    }

    fn run_one(&self, params: &ParameterSet, market: &MarketData) -> SweepResult {
        let mut config = self.base_config.clone();
        params.apply_to_config(&mut config);

        match BacktestEngine::new(config).run(market) {
            Ok(result) => SweepResult {
                params: params.clone(),
                metrics: Some(MetricsCalculator::calculate(&result)),
                error: None,
            },
            Err(e) => {
                warn!(params = %params.key(), error = %e, "Sweep backtest failed");
                SweepResult {
                    params: params.clone(),
                    metrics: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

/// Successful runs by descending Sharpe, failures last.
fn rank(results: &mut [SweepResult]) {
    results.sort_by(|a, b| match (a.sharpe_ratio(), b.sharpe_ratio()) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

/// Plain-text ranked table.
pub fn render_table(results: &[SweepResult]) -> String {
    let mut out = format!(
        "{:<4} {:<40} {:>10} {:>12} {:>10} {:>12}\n",
        "#", "params", "sharpe", "return %", "max dd %", "final level"
    );
    for (i, r) in results.iter().enumerate() {
        match &r.metrics {
            Some(m) => out.push_str(&format!(
                "{:<4} {:<40} {:>10.3} {:>12.4} {:>10.4} {:>12.4}\n",
                i + 1,
                r.params.key(),
                m.sharpe_ratio,
                m.total_return_pct,
                m.max_drawdown_pct,
                m.final_level
            )),
            None => out.push_str(&format!(
                "{:<4} {:<40} failed: {}\n",
                i + 1,
                r.params.key(),
                r.error.as_deref().unwrap_or("unknown")
            )),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{preprocess, OptionType, RawQuote};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn market() -> MarketData {
        let expiries = [(2, 16), (3, 15), (4, 19), (5, 17)];
        let mut quotes = Vec::new();
        for (i, s) in [100.0, 101.0, 100.5].iter().enumerate() {
            let as_of = NaiveDate::from_ymd_opt(2024, 1, 2 + i as u32).unwrap();
            for (m, d) in expiries {
                let expiry = NaiveDate::from_ymd_opt(2024, m, d).unwrap();
                for strike in [dec!(95), dec!(100), dec!(105)] {
                    for kind in [OptionType::Call, OptionType::Put] {
                        quotes.push(RawQuote {
                            as_of,
                            expiry,
                            option_type: kind,
                            strike,
                            underlying_price: *s,
                            implied_vol: 0.2,
                            price: 3.0,
                        });
                    }
                }
            }
        }
        MarketData::from_rows(preprocess(&quotes))
    }

    #[test]
    fn test_sweep_runs_every_combination() {
        let grid = SweepGrid {
            start_levels: vec![100.0],
            target_vega_fractions: vec![0.0001, 0.0002],
            start_dates: vec![],
            expiry_ranks: vec![2, 3],
        };
        let results = SweepRunner::new(BacktestConfig::default(), grid).run(&market());
        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|r| r.metrics.is_some()));
    }

    #[test]
    fn test_sweep_ranked_by_sharpe() {
        let results = SweepRunner::new(BacktestConfig::default(), SweepGrid::default()).run(&market());
        let sharpes: Vec<f64> = results.iter().filter_map(|r| r.sharpe_ratio()).collect();
        for w in sharpes.windows(2) {
            assert!(w[0] >= w[1]);
        }
    }

    #[test]
    fn test_failures_rank_last() {
        let grid = SweepGrid {
            start_levels: vec![],
            target_vega_fractions: vec![],
            start_dates: vec![
                NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            ],
            expiry_ranks: vec![],
        };
        let results = SweepRunner::new(BacktestConfig::default(), grid).run(&market());
        assert!(results[0].metrics.is_some());
        assert!(results[1].error.is_some());
        assert!(render_table(&results).contains("failed"));
    }

    #[test]
    fn test_rank_zero_is_a_failed_run() {
        let grid = SweepGrid {
            start_levels: vec![],
            target_vega_fractions: vec![],
            start_dates: vec![],
            expiry_ranks: vec![0, 2],
        };
        let runner = SweepRunner::new(BacktestConfig::default(), grid);
        let calls = AtomicUsize::new(0);
        let results = runner.run_with_progress(&market(), |_, _| {
            calls.fetch_add(1, Ordering::Relaxed);
        });

        assert_eq!(results.len(), runner.grid().total_combinations());
        assert_eq!(calls.load(Ordering::Relaxed), runner.grid().total_combinations());
        assert!(results[0].metrics.is_some());
        assert_eq!(results[1].params.expiry_rank, Some(0));
        assert!(results[1].error.as_deref().unwrap().contains("rank"));
    }

    #[test]
    fn test_progress_callback() {
        let calls = AtomicUsize::new(0);
        let runner = SweepRunner::new(BacktestConfig::default(), SweepGrid::default());
        let results = runner.run_with_progress(&market(), |_, total| {
            assert_eq!(total, 9);
            calls.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(results.len(), 9);
        assert_eq!(calls.load(Ordering::Relaxed), 9);
    }
}
