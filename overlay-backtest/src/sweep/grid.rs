//! Parameter grid for sweeps.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::backtest::BacktestConfig;

/// Parameter values to sweep. An empty axis keeps the base config's value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepGrid {
    pub start_levels: Vec<f64>,
    pub target_vega_fractions: Vec<f64>,
    pub start_dates: Vec<NaiveDate>,
    pub expiry_ranks: Vec<usize>,
}

impl Default for SweepGrid {
    fn default() -> Self {
        Self {
            start_levels: vec![100.0],
            target_vega_fractions: vec![0.000_079_365, 0.000_158_73, 0.000_317_46],
            start_dates: vec![],
            expiry_ranks: vec![2, 3, 4],
        }
    }
}

fn axis<T: Copy>(values: &[T]) -> Vec<Option<T>> {
    if values.is_empty() {
        vec![None]
    } else {
        values.iter().copied().map(Some).collect()
    }
}

impl SweepGrid {
    /// Number of parameter sets `combinations` yields.
    pub fn total_combinations(&self) -> usize {
        [
            self.start_levels.len(),
            self.target_vega_fractions.len(),
            self.start_dates.len(),
            self.expiry_ranks.len(),
        ]
        .iter()
        .map(|&n| n.max(1))
        .product()
    }

    /// Generate all parameter combinations.
    pub fn combinations(&self) -> Vec<ParameterSet> {
        let mut combos = Vec::with_capacity(self.total_combinations());

        for start_level in axis(&self.start_levels) {
            for target_vega_fraction in axis(&self.target_vega_fractions) {
                for start_date in axis(&self.start_dates) {
                    for expiry_rank in axis(&self.expiry_ranks) {
                        combos.push(ParameterSet {
                            start_level,
                            target_vega_fraction,
                            start_date,
                            expiry_rank,
                        });
                    }
                }
            }
        }

        combos
    }
}

/// A single parameter set. `None` keeps the base value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub start_level: Option<f64>,
    pub target_vega_fraction: Option<f64>,
    pub start_date: Option<NaiveDate>,
    pub expiry_rank: Option<usize>,
}

impl ParameterSet {
    /// Apply this parameter set to a backtest config.
    pub fn apply_to_config(&self, config: &mut BacktestConfig) {
        if let Some(level) = self.start_level {
            config.start_level = level;
        }
        if let Some(fraction) = self.target_vega_fraction {
            config.target_vega_fraction = fraction;
        }
        if let Some(date) = self.start_date {
            config.start_date = Some(date);
        }
        if let Some(rank) = self.expiry_rank {
            config.expiry_rank = rank;
        }
    }

    /// Create a unique key for this parameter set.
    pub fn key(&self) -> String {
        let mut parts = Vec::new();
        if let Some(level) = self.start_level {
            parts.push(format!("lvl{}", level));
        }
        if let Some(fraction) = self.target_vega_fraction {
            parts.push(format!("vega{:.8}", fraction));
        }
        if let Some(date) = self.start_date {
            parts.push(format!("from{}", date));
        }
        if let Some(rank) = self.expiry_rank {
            parts.push(format!("rank{}", rank));
        }
        if parts.is_empty() {
            "base".to_string()
        } else {
            parts.join("_")
        }
    }
}
