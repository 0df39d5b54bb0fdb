//! Call/put pair selection.
//!
//! For a given date and underlying level the selector:
//! 1. Drops rows expiring on or before the date
//! 2. Ranks the remaining distinct expiries ascending
//! 3. Targets the expiry at `expiry_rank` (3rd soonest by default)
//! 4. Picks the call and the put nearest the underlying at that expiry,
//!    lower strike first on ties
//!
//! A miss is a `Selection::NoSelection` carrying the reason. Callers hold
//! their previous portfolio on a miss.

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::{ChainRow, OptionType};

/// Why a day did not produce a tradable pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// Fewer future expiries than the rank requires.
    InsufficientExpiries { found: usize, required: usize },
    /// The target expiry has no quote on one side.
    MissingLeg {
        expiry: NaiveDate,
        option_type: OptionType,
    },
    /// Combined vega of the pair is not positive.
    DegenerateVega { total_vega: f64 },
    /// No chain rows for the date.
    MissingMarketData,
    /// The greeks engine rejected a selected contract.
    InvalidParameter { message: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientExpiries { found, required } => {
                write!(f, "{} future expiries, need {}", found, required)
            }
            Self::MissingLeg {
                expiry,
                option_type,
            } => write!(f, "no {} quoted for {}", option_type.as_str(), expiry),
            Self::DegenerateVega { total_vega } => {
                write!(f, "pair vega {:.6} is not positive", total_vega)
            }
            Self::MissingMarketData => write!(f, "no market data"),
            Self::InvalidParameter { message } => write!(f, "invalid parameter: {}", message),
        }
    }
}

/// Selector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairSelectorConfig {
    /// 1-based rank of the target expiry among future expiries.
    pub expiry_rank: usize,
}

impl Default for PairSelectorConfig {
    fn default() -> Self {
        Self { expiry_rank: 3 }
    }
}

/// The selected call and put, both at `expiry`.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedPair {
    pub expiry: NaiveDate,
    pub call: ChainRow,
    pub put: ChainRow,
}

/// Outcome of a selection attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Pair(SelectedPair),
    NoSelection(SkipReason),
}

impl Selection {
    pub fn pair(&self) -> Option<&SelectedPair> {
        match self {
            Self::Pair(p) => Some(p),
            Self::NoSelection(_) => None,
        }
    }

    pub fn is_pair(&self) -> bool {
        matches!(self, Self::Pair(_))
    }
}

/// Maturity-bucket + moneyness pair selector.
#[derive(Debug, Clone, Default)]
pub struct PairSelector {
    config: PairSelectorConfig,
}

impl PairSelector {
    pub fn new(config: PairSelectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PairSelectorConfig {
        &self.config
    }

    /// Select one call and one put from a day's chain.
    pub fn select(&self, chain: &[ChainRow], underlying: f64, date: NaiveDate) -> Selection {
        let future: Vec<ChainRow> = chain
            .iter()
            .filter(|r| r.expiry > date)
            .map(|r| r.with_strike_diff(underlying))
            .collect();

        let expiries: BTreeSet<NaiveDate> = future.iter().map(|r| r.expiry).collect();
        let required = self.config.expiry_rank;

        // Rank 0 names no expiry.
        let target = required
            .checked_sub(1)
            .and_then(|idx| expiries.iter().nth(idx).copied());
        let Some(target) = target else {
            return Selection::NoSelection(SkipReason::InsufficientExpiries {
                found: expiries.len(),
                required,
            });
        };

        let mut candidates: Vec<ChainRow> =
            future.into_iter().filter(|r| r.expiry == target).collect();
        candidates.sort_by(|a, b| {
            a.strike_diff
                .total_cmp(&b.strike_diff)
                .then_with(|| a.strike.cmp(&b.strike))
        });

        let first_of = |kind: OptionType| candidates.iter().find(|r| r.option_type == kind);

        match (first_of(OptionType::Call), first_of(OptionType::Put)) {
            (Some(call), Some(put)) => Selection::Pair(SelectedPair {
                expiry: target,
                call: call.clone(),
                put: put.clone(),
            }),
            (None, _) => Selection::NoSelection(SkipReason::MissingLeg {
                expiry: target,
                option_type: OptionType::Call,
            }),
            (_, None) => Selection::NoSelection(SkipReason::MissingLeg {
                expiry: target,
                option_type: OptionType::Put,
            }),
        }
    }
}
