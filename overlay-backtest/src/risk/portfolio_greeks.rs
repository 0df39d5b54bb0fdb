//! Portfolio Greeks aggregation.
//!
//! - Delta: sum(leg_delta * units)
//! - Vega: sum(leg_vega * units)

use serde::{Deserialize, Serialize};

use crate::backtest::Portfolio;

/// Aggregated exposures of the held pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioGreeks {
    /// Net delta, i.e. the underlying hedge size.
    pub delta: f64,
    /// Net vega.
    pub vega: f64,
}

impl PortfolioGreeks {
    pub fn from_portfolio(portfolio: &Portfolio) -> Self {
        portfolio
            .legs()
            .iter()
            .fold(Self::default(), |acc, leg| Self {
                delta: acc.delta + leg.delta_exposure(),
                vega: acc.vega + leg.vega_exposure(),
            })
    }

    /// Net vega as a fraction of the strategy level.
    pub fn vega_fraction(&self, strategy_level: f64) -> f64 {
        if strategy_level == 0.0 {
            return 0.0;
        }
        self.vega / strategy_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::Contract;
    use crate::data::{ChainRow, OptionType};
    use crate::pricing::Greeks;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn contract(kind: OptionType, delta: f64, vega: f64) -> Contract {
        let d = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let quote = ChainRow {
            as_of: d,
            expiry: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            option_type: kind,
            strike: dec!(100),
            underlying_price: 100.0,
            sigma: 0.2,
            price: 4.0,
            time_to_maturity: 73.0 / 365.0,
            vega: Some(vega),
            strike_diff: 0.0,
        };
        Contract::new(quote, Greeks { delta, vega })
    }

    #[test]
    fn test_aggregation() {
        let pf = Portfolio::open(
            contract(OptionType::Call, 0.6, 18.0),
            contract(OptionType::Put, -0.4, 18.0),
            -0.5,
        );
        let greeks = PortfolioGreeks::from_portfolio(&pf);
        assert!((greeks.delta - (-0.1)).abs() < 1e-12);
        assert!((greeks.vega - (-18.0)).abs() < 1e-12);
        assert_eq!(greeks.delta, pf.underlying_delta());
    }

    #[test]
    fn test_vega_fraction_matches_sizing_target() {
        // Units sized for a 0.00015873 target give back that fraction per vol point.
        let level = 100.0;
        let total_vega = 36.0;
        let units = -100.0 * 0.00015873 * level / total_vega;
        let pf = Portfolio::open(
            contract(OptionType::Call, 0.5, 18.0),
            contract(OptionType::Put, -0.5, 18.0),
            units,
        );
        let greeks = PortfolioGreeks::from_portfolio(&pf);
        let per_vol_point = greeks.vega_fraction(level) / 100.0;
        assert!((per_vol_point + 0.00015873).abs() < 1e-12);
    }
}
