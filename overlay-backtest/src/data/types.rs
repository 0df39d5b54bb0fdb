//! Core data types for the overlay backtest.
//!
//! A `RawQuote` is one parsed input row exactly as the chain file carries it.
//! The preprocessor turns it into a `ChainRow` (time to maturity, canonical
//! sigma, model vega) and rows are then grouped by as-of date into
//! `DayChain`s held in a `MarketData` map.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Option type (call or put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "C" | "CALL" => Some(Self::Call),
            "P" | "PUT" => Some(Self::Put),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "Call",
            Self::Put => "Put",
        }
    }
}

/// One option quote as read from the chain file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawQuote {
    /// Quote date.
    pub as_of: NaiveDate,
    /// Option expiration date.
    pub expiry: NaiveDate,
    pub option_type: OptionType,
    pub strike: Decimal,
    /// Underlying level at quote time.
    pub underlying_price: f64,
    /// Implied volatility as a decimal (0.20 = 20%).
    pub implied_vol: f64,
    /// Traded option price.
    pub price: f64,
}

/// Identity of a listed contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContractKey {
    pub strike: Decimal,
    pub expiry: NaiveDate,
    pub option_type: OptionType,
}

/// A preprocessed chain row.
///
/// Immutable snapshot of market input plus the derived fields the selector
/// and sizer need. `strike_diff` stays at zero until the selector computes
/// the moneyness distance for a given underlying level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainRow {
    pub as_of: NaiveDate,
    pub expiry: NaiveDate,
    pub option_type: OptionType,
    pub strike: Decimal,
    pub underlying_price: f64,
    /// Implied volatility under its canonical name.
    pub sigma: f64,
    pub price: f64,
    /// Years to expiry, `(expiry - as_of).days / 365`.
    pub time_to_maturity: f64,
    /// Model vega at r = 0. Exactly zero for rows at or past expiry, `None`
    /// when the quote's inputs are outside the model's domain.
    pub vega: Option<f64>,
    /// Moneyness distance `|strike - underlying|`.
    pub strike_diff: f64,
}

impl ChainRow {
    pub fn key(&self) -> ContractKey {
        ContractKey {
            strike: self.strike,
            expiry: self.expiry,
            option_type: self.option_type,
        }
    }

    pub fn strike_f64(&self) -> f64 {
        self.strike.to_f64().unwrap_or(f64::NAN)
    }

    /// Absolute distance between strike and the given underlying level.
    pub fn moneyness(&self, underlying: f64) -> f64 {
        (self.strike_f64() - underlying).abs()
    }

    /// Copy of this row with the moneyness distance filled in.
    pub fn with_strike_diff(&self, underlying: f64) -> Self {
        Self {
            strike_diff: self.moneyness(underlying),
            ..self.clone()
        }
    }
}

/// All quotes for one as-of date.
#[derive(Debug, Clone)]
pub struct DayChain {
    pub date: NaiveDate,
    /// Underlying level for the day (first row in input order).
    pub underlying: f64,
    pub rows: Vec<ChainRow>,
}

impl DayChain {
    pub fn new(date: NaiveDate, rows: Vec<ChainRow>) -> Option<Self> {
        let underlying = rows.first()?.underlying_price;
        Some(Self {
            date,
            underlying,
            rows,
        })
    }

    /// Find the quote for a specific contract.
    pub fn quote(&self, key: &ContractKey) -> Option<&ChainRow> {
        self.rows.iter().find(|r| r.key() == *key)
    }

    /// Distinct expiries quoted on this day, ascending.
    pub fn expiries(&self) -> Vec<NaiveDate> {
        self.rows
            .iter()
            .map(|r| r.expiry)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Preprocessed chain rows grouped by as-of date.
#[derive(Debug, Clone, Default)]
pub struct MarketData {
    days: BTreeMap<NaiveDate, DayChain>,
}

impl MarketData {
    /// Group rows by as-of date, preserving input order inside each day.
    pub fn from_rows(rows: Vec<ChainRow>) -> Self {
        let mut grouped: BTreeMap<NaiveDate, Vec<ChainRow>> = BTreeMap::new();
        for row in rows {
            grouped.entry(row.as_of).or_default().push(row);
        }

        let days = grouped
            .into_iter()
            .filter_map(|(date, rows)| DayChain::new(date, rows).map(|d| (date, d)))
            .collect();

        Self { days }
    }

    /// Distinct as-of dates, ascending.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.days.keys().copied().collect()
    }

    pub fn day(&self, date: NaiveDate) -> Option<&DayChain> {
        self.days.get(&date)
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Total number of quotes across all days.
    pub fn total_quotes(&self) -> usize {
        self.days.values().map(|d| d.rows.len()).sum()
    }
}
