//! Contract selection.
//!
//! Picks the call/put pair the overlay holds on each rebalance day.

pub mod pair_selector;

pub use pair_selector::{PairSelector, PairSelectorConfig, SelectedPair, Selection, SkipReason};
