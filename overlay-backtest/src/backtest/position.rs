//! Contracts, positions and the two-leg portfolio.
//!
//! Positions are values: a rebalance builds a new `Portfolio` from the day's
//! selection and marking produces a marked copy. Nothing is aged in place.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::data::{ChainRow, ContractKey, DayChain, OptionType};
use crate::pricing::Greeks;
use crate::risk::PortfolioGreeks;

/// A chain row selected into the strategy, with greeks at selection time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub quote: ChainRow,
    pub delta: f64,
    pub vega: f64,
}

impl Contract {
    pub fn new(quote: ChainRow, greeks: Greeks) -> Self {
        Self {
            quote,
            delta: greeks.delta,
            vega: greeks.vega,
        }
    }

    pub fn key(&self) -> ContractKey {
        self.quote.key()
    }

    pub fn option_type(&self) -> OptionType {
        self.quote.option_type
    }

    pub fn strike(&self) -> Decimal {
        self.quote.strike
    }

    pub fn expiry(&self) -> NaiveDate {
        self.quote.expiry
    }

    /// Value at expiry against the given underlying level.
    pub fn intrinsic_value(&self, underlying: f64) -> f64 {
        let strike = self.quote.strike_f64();
        match self.quote.option_type {
            OptionType::Call => (underlying - strike).max(0.0),
            OptionType::Put => (strike - underlying).max(0.0),
        }
    }
}

/// A held contract with its unit count and last two marks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub contract: Contract,
    /// Signed unit count (negative = short).
    pub units: f64,
    /// Price at the previous mark (entry price for a fresh position).
    pub price_t_1: f64,
    /// Price at the latest mark.
    pub price_t: f64,
}

impl Position {
    /// Open a position at the contract's quoted price.
    pub fn open(contract: Contract, units: f64) -> Self {
        let price = contract.quote.price;
        Self {
            contract,
            units,
            price_t_1: price,
            price_t: price,
        }
    }

    /// Copy of this position marked at `price`.
    pub fn marked(&self, price: f64) -> Self {
        Self {
            price_t: price,
            ..self.clone()
        }
    }

    /// Option P&L between the two marks.
    pub fn pnl(&self) -> f64 {
        self.units * (self.price_t - self.price_t_1)
    }

    /// Underlying-equivalent exposure (delta × units).
    pub fn delta_exposure(&self) -> f64 {
        self.contract.delta * self.units
    }

    /// Vega exposure (vega × units).
    pub fn vega_exposure(&self) -> f64 {
        self.contract.vega * self.units
    }

    pub fn to_record(&self) -> PositionRecord {
        PositionRecord {
            strike: self.contract.strike(),
            delta: self.contract.delta,
            maturity: self.contract.expiry(),
            units: self.units,
        }
    }
}

/// How a held leg was marked on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkSource {
    /// Quoted in the day's chain.
    Quote,
    /// Expired and unquoted, marked at intrinsic value.
    Intrinsic,
    /// Unquoted before expiry, carried at its last price.
    Stale,
}

/// The live call/put pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub call: Position,
    pub put: Position,
}

impl Portfolio {
    /// Build a fresh portfolio with the same unit count on both legs.
    pub fn open(call: Contract, put: Contract, units: f64) -> Self {
        Self {
            call: Position::open(call, units),
            put: Position::open(put, units),
        }
    }

    pub fn legs(&self) -> [&Position; 2] {
        [&self.call, &self.put]
    }

    /// Net delta and vega over both legs.
    pub fn greeks(&self) -> PortfolioGreeks {
        PortfolioGreeks::from_portfolio(self)
    }

    /// Σ delta × units over both legs.
    pub fn underlying_delta(&self) -> f64 {
        self.greeks().delta
    }

    /// Σ units × (price_t − price_t_1) over both legs.
    pub fn option_pnl(&self) -> f64 {
        self.legs().iter().map(|p| p.pnl()).sum()
    }

    /// Mark both legs against a day's chain.
    pub fn marked(&self, day: &DayChain) -> Self {
        Self {
            call: mark_leg(&self.call, day),
            put: mark_leg(&self.put, day),
        }
    }
}

fn mark_leg(position: &Position, day: &DayChain) -> Position {
    let (price, source) = mark_price(position, day);
    if source == MarkSource::Stale {
        warn!(
            date = %day.date,
            strike = %position.contract.strike(),
            expiry = %position.contract.expiry(),
            option_type = position.contract.option_type().as_str(),
            "Held leg not quoted, carrying last price"
        );
    }
    position.marked(price)
}

/// Price a held leg against a day's chain.
pub fn mark_price(position: &Position, day: &DayChain) -> (f64, MarkSource) {
    if let Some(quote) = day.quote(&position.contract.key()) {
        return (quote.price, MarkSource::Quote);
    }
    if position.contract.expiry() <= day.date {
        return (
            position.contract.intrinsic_value(day.underlying),
            MarkSource::Intrinsic,
        );
    }
    (position.price_t, MarkSource::Stale)
}

/// Serialized view of one position in the decomposition table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PositionRecord {
    #[serde(with = "rust_decimal::serde::float")]
    pub strike: Decimal,
    pub delta: f64,
    pub maturity: NaiveDate,
    pub units: f64,
}

/// Per-date audit record of the held portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub date: NaiveDate,
    pub call_positions: Vec<PositionRecord>,
    pub put_positions: Vec<PositionRecord>,
    pub underlying_delta: f64,
}

impl Snapshot {
    pub fn of(date: NaiveDate, portfolio: &Portfolio) -> Self {
        Self {
            date,
            call_positions: vec![portfolio.call.to_record()],
            put_positions: vec![portfolio.put.to_record()],
            underlying_delta: portfolio.underlying_delta(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn day0() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
    }

    fn contract(kind: OptionType, price: f64, delta: f64) -> Contract {
        let quote = ChainRow {
            as_of: day0(),
            expiry: day0() + Duration::days(30),
            option_type: kind,
            strike: dec!(100),
            underlying_price: 100.0,
            sigma: 0.2,
            price,
            time_to_maturity: 30.0 / 365.0,
            vega: Some(11.0),
            strike_diff: 0.0,
        };
        Contract::new(quote, Greeks { delta, vega: 11.0 })
    }

    fn portfolio() -> Portfolio {
        Portfolio::open(
            contract(OptionType::Call, 3.0, 0.55),
            contract(OptionType::Put, 2.5, -0.45),
            -2.0,
        )
    }

    fn day_with(date: NaiveDate, underlying: f64, rows: Vec<ChainRow>) -> DayChain {
        DayChain {
            date,
            underlying,
            rows,
        }
    }

    #[test]
    fn test_fresh_position_has_no_pnl() {
        let p = Position::open(contract(OptionType::Call, 3.0, 0.55), -2.0);
        assert_eq!(p.price_t_1, 3.0);
        assert_eq!(p.price_t, 3.0);
        assert_eq!(p.pnl(), 0.0);
    }

    #[test]
    fn test_marked_is_a_copy() {
        let p = Position::open(contract(OptionType::Call, 3.0, 0.55), -2.0);
        let m = p.marked(4.0);
        assert_eq!(p.price_t, 3.0);
        assert_eq!(m.price_t_1, 3.0);
        assert_eq!(m.pnl(), -2.0);
    }

    #[test]
    fn test_portfolio_aggregates() {
        let pf = portfolio();
        assert!((pf.underlying_delta() - (-2.0 * 0.55 + -2.0 * -0.45)).abs() < 1e-12);
        assert_eq!(pf.option_pnl(), 0.0);
    }

    #[test]
    fn test_mark_from_quote() {
        let pf = portfolio();
        let next = day0() + Duration::days(1);
        let mut call_quote = pf.call.contract.quote.clone();
        call_quote.as_of = next;
        call_quote.price = 3.5;
        let mut put_quote = pf.put.contract.quote.clone();
        put_quote.as_of = next;
        put_quote.price = 2.0;

        let marked = pf.marked(&day_with(next, 101.0, vec![call_quote, put_quote]));
        assert_eq!(marked.call.price_t, 3.5);
        assert_eq!(marked.put.price_t, 2.0);
        assert!((marked.option_pnl() - (-2.0 * 0.5 + -2.0 * -0.5)).abs() < 1e-12);
    }

    #[test]
    fn test_mark_sources() {
        let pf = portfolio();

        let before_expiry = day_with(day0() + Duration::days(1), 104.0, vec![]);
        assert_eq!(
            mark_price(&pf.call, &before_expiry),
            (3.0, MarkSource::Stale)
        );

        let at_expiry = day_with(day0() + Duration::days(30), 104.0, vec![]);
        assert_eq!(
            mark_price(&pf.call, &at_expiry),
            (4.0, MarkSource::Intrinsic)
        );
        assert_eq!(
            mark_price(&pf.put, &at_expiry),
            (0.0, MarkSource::Intrinsic)
        );
    }

    #[test]
    fn test_snapshot_json_shape() {
        let snapshot = Snapshot::of(day0(), &portfolio());
        let json = serde_json::to_value(&snapshot.call_positions).unwrap();
        assert_eq!(json[0]["strike"], serde_json::json!(100.0));
        assert_eq!(json[0]["maturity"], serde_json::json!("2024-02-01"));
        assert_eq!(json[0]["units"], serde_json::json!(-2.0));
    }
}
