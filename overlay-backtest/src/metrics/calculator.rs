//! Performance metrics calculator.
//!
//! Statistics over the daily strategy-level series.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::backtest::BacktestResult;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Performance metrics for one backtest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    // Return metrics
    pub start_level: f64,
    pub final_level: f64,
    pub total_return_pct: f64,
    pub annualized_return_pct: f64,
    pub annualized_volatility_pct: f64,

    // Risk-adjusted returns
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,

    // Drawdown
    pub max_drawdown_pct: f64,
    pub peak_date: Option<NaiveDate>,
    pub trough_date: Option<NaiveDate>,

    // Exposure
    /// Mean net vega / level over days a pair was held.
    pub mean_vega_fraction: f64,

    // Day counts
    pub trading_days: usize,
    pub rebalance_days: usize,
    pub carry_days: usize,
}

impl PerformanceMetrics {
    /// Generate a summary report.
    pub fn summary(&self) -> String {
        let date = |d: Option<NaiveDate>| d.map_or("-".to_string(), |d| d.to_string());
        format!(
            "Performance Summary\n\
             ====================\n\
             \n\
             Start Level: {:.4}\n\
             Final Level: {:.4}\n\
             Total Return: {:.4}%\n\
             Annualized Return: {:.4}%\n\
             Annualized Volatility: {:.4}%\n\
             \n\
             Sharpe Ratio: {:.2}\n\
             Sortino Ratio: {:.2}\n\
             Calmar Ratio: {:.2}\n\
             \n\
             Max Drawdown: {:.4}% (peak {}, trough {})\n\
             Mean Vega / Level: {:.6}\n\
             \n\
             Days: {} (rebalance: {}, carry: {})",
            self.start_level,
            self.final_level,
            self.total_return_pct,
            self.annualized_return_pct,
            self.annualized_volatility_pct,
            self.sharpe_ratio,
            self.sortino_ratio,
            self.calmar_ratio,
            self.max_drawdown_pct,
            date(self.peak_date),
            date(self.trough_date),
            self.mean_vega_fraction,
            self.trading_days,
            self.rebalance_days,
            self.carry_days,
        )
    }
}

/// Drawdown analysis details.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DrawdownAnalysis {
    pub max_drawdown_pct: f64,
    pub peak_date: Option<NaiveDate>,
    pub trough_date: Option<NaiveDate>,
    pub drawdown_periods: usize,
}

/// Metrics calculator.
pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Calculate all metrics from a backtest result.
    pub fn calculate(result: &BacktestResult) -> PerformanceMetrics {
        let series = result.level_series();
        let levels: Vec<f64> = series.iter().map(|(_, l)| *l).collect();
        let returns = Self::daily_returns(&levels);

        let trading_days = result.days.len();
        let total_return_pct = result.total_return_pct();
        let annualized_return_pct =
            Self::annualized_return(result.start_level, result.final_level(), trading_days);
        let volatility = Self::annualized_volatility(&returns);
        let drawdown = Self::analyze_drawdown(&series);

        let calmar_ratio = if drawdown.max_drawdown_pct > 0.0 {
            annualized_return_pct / drawdown.max_drawdown_pct
        } else {
            0.0
        };

        PerformanceMetrics {
            start_level: result.start_level,
            final_level: result.final_level(),
            total_return_pct,
            annualized_return_pct,
            annualized_volatility_pct: volatility * 100.0,
            sharpe_ratio: Self::sharpe(&returns),
            sortino_ratio: Self::sortino(&returns),
            calmar_ratio,
            max_drawdown_pct: drawdown.max_drawdown_pct,
            peak_date: drawdown.peak_date,
            trough_date: drawdown.trough_date,
            mean_vega_fraction: Self::mean_vega_fraction(result),
            trading_days,
            rebalance_days: result.rebalance_days(),
            carry_days: result.carry_days(),
        }
    }

    /// Simple returns between consecutive levels.
    pub fn daily_returns(levels: &[f64]) -> Vec<f64> {
        levels
            .windows(2)
            .filter(|w| w[0] != 0.0)
            .map(|w| (w[1] - w[0]) / w[0])
            .collect()
    }

    fn mean_vega_fraction(result: &BacktestResult) -> f64 {
        let held: Vec<f64> = result
            .days
            .iter()
            .filter(|d| d.net_vega != 0.0)
            .map(|d| d.vega_fraction)
            .collect();
        Self::mean(&held)
    }

    fn mean(values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        values.iter().sum::<f64>() / values.len() as f64
    }

    fn std_dev(values: &[f64]) -> f64 {
        if values.len() < 2 {
            return 0.0;
        }
        let mean = Self::mean(values);
        let variance =
            values.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
        variance.sqrt()
    }

    fn annualized_volatility(returns: &[f64]) -> f64 {
        Self::std_dev(returns) * TRADING_DAYS_PER_YEAR.sqrt()
    }

    /// Annualized Sharpe ratio with a zero risk-free rate.
    fn sharpe(returns: &[f64]) -> f64 {
        let std = Self::std_dev(returns);
        if std == 0.0 {
            return 0.0;
        }
        Self::mean(returns) / std * TRADING_DAYS_PER_YEAR.sqrt()
    }

    /// Calculate Sortino ratio (downside deviation).
    fn sortino(returns: &[f64]) -> f64 {
        if returns.is_empty() {
            return 0.0;
        }

        let downside_variance = returns
            .iter()
            .filter(|&&r| r < 0.0)
            .map(|r| r.powi(2))
            .sum::<f64>()
            / returns.len() as f64;
        let downside_dev = downside_variance.sqrt();

        if downside_dev == 0.0 {
            return 0.0;
        }

        Self::mean(returns) / downside_dev * TRADING_DAYS_PER_YEAR.sqrt()
    }

    fn annualized_return(start: f64, end: f64, trading_days: usize) -> f64 {
        if start <= 0.0 || end <= 0.0 || trading_days == 0 {
            return 0.0;
        }
        let years = trading_days as f64 / TRADING_DAYS_PER_YEAR;
        ((end / start).powf(1.0 / years) - 1.0) * 100.0
    }

    /// Analyze drawdown from the dated level series.
    pub fn analyze_drawdown(series: &[(Option<NaiveDate>, f64)]) -> DrawdownAnalysis {
        let Some(&(first_date, first_level)) = series.first() else {
            return DrawdownAnalysis::default();
        };

        let mut peak = first_level;
        let mut peak_date = first_date;
        let mut in_drawdown = false;
        let mut analysis = DrawdownAnalysis::default();

        for &(date, level) in series {
            if level >= peak {
                if in_drawdown {
                    analysis.drawdown_periods += 1;
                }
                peak = level;
                peak_date = date;
                in_drawdown = false;
                continue;
            }

            in_drawdown = true;
            let drawdown_pct = if peak != 0.0 {
                (peak - level) / peak * 100.0
            } else {
                0.0
            };
            if drawdown_pct > analysis.max_drawdown_pct {
                analysis.max_drawdown_pct = drawdown_pct;
                analysis.peak_date = peak_date;
                analysis.trough_date = date;
            }
        }

        if in_drawdown {
            analysis.drawdown_periods += 1;
        }

        analysis
    }
}
