//! Vega-targeted position sizing.
//!
//! Both legs receive the same unit count:
//!
//! units = -vega_scale × target_vega_fraction × strategy_level / (vega_call + vega_put)
//!
//! The sign makes the overlay structurally short vega. Sizing is undefined
//! when the pair's combined vega is not positive.

use serde::{Deserialize, Serialize};

use crate::backtest::Contract;

/// Position sizing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VegaSizerConfig {
    /// Target vega as a fraction of the strategy level.
    pub target_vega_fraction: f64,
    /// Vega quote convention (100 = per vol point).
    pub vega_scale: f64,
}

impl Default for VegaSizerConfig {
    fn default() -> Self {
        Self {
            target_vega_fraction: 0.000_158_73,
            vega_scale: 100.0,
        }
    }
}

/// Result of a sizing attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizingResult {
    /// Units to hold on each leg.
    Sized(f64),
    /// Combined vega not positive; carries the offending total.
    Degenerate { total_vega: f64 },
}

impl SizingResult {
    pub fn units(&self) -> Option<f64> {
        match self {
            Self::Sized(u) => Some(*u),
            Self::Degenerate { .. } => None,
        }
    }
}

/// Sizer for the call/put pair.
#[derive(Debug, Clone, Default)]
pub struct VegaSizer {
    config: VegaSizerConfig,
}

impl VegaSizer {
    pub fn new(config: VegaSizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VegaSizerConfig {
        &self.config
    }

    /// Units for each leg of the pair at the given strategy level.
    pub fn size(&self, call: &Contract, put: &Contract, strategy_level: f64) -> SizingResult {
        self.units_for(call.vega + put.vega, strategy_level)
    }

    /// Units for a pair with the given combined vega.
    pub fn units_for(&self, total_vega: f64, strategy_level: f64) -> SizingResult {
        if !(total_vega.is_finite() && total_vega > 0.0) {
            return SizingResult::Degenerate { total_vega };
        }

        let units = -self.config.vega_scale * self.config.target_vega_fraction * strategy_level
            / total_vega;

        if units.is_finite() {
            SizingResult::Sized(units)
        } else {
            SizingResult::Degenerate { total_vega }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = VegaSizerConfig::default();
        assert_eq!(config.target_vega_fraction, 0.00015873);
        assert_eq!(config.vega_scale, 100.0);
    }

    #[test]
    fn test_units_formula() {
        let sizer = VegaSizer::default();
        let units = sizer.units_for(40.0, 100.0).units().unwrap();
        let expected = -100.0 * 0.00015873 * 100.0 / 40.0;
        assert!((units - expected).abs() < 1e-15);
    }

    #[test]
    fn test_units_are_short_for_positive_level() {
        let sizer = VegaSizer::default();
        for &(vega, level) in &[(0.5, 100.0), (80.0, 1.0), (12.0, 250.0)] {
            assert!(sizer.units_for(vega, level).units().unwrap() <= 0.0);
        }
    }

    #[test]
    fn test_units_scale_with_level() {
        let sizer = VegaSizer::default();
        let a = sizer.units_for(20.0, 100.0).units().unwrap();
        let b = sizer.units_for(20.0, 200.0).units().unwrap();
        assert!((b - 2.0 * a).abs() < 1e-15);
    }

    #[test]
    fn test_degenerate_vega() {
        let sizer = VegaSizer::default();
        assert_eq!(
            sizer.units_for(0.0, 100.0),
            SizingResult::Degenerate { total_vega: 0.0 }
        );
        assert!(sizer.units_for(-1.0, 100.0).units().is_none());
        assert!(sizer.units_for(f64::NAN, 100.0).units().is_none());
    }
}
