//! Data integrity validation for raw option chains.
//!
//! Validates:
//! - Non-empty input
//! - Strike and underlying levels positive
//! - Implied vol positive, price non-negative
//! - Expiry not before as-of date
//! - One underlying level per as-of date
//! - Both calls and puts quoted on each date
//! - Enough expiries per date for the selection rank
//! - Date continuity (no gaps over a week)
//!
//! Checks are informational. The backtest itself carries on days it cannot
//! trade.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::data::{trading_dates, DataLoader, LoaderError, OptionType, RawQuote};

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Loader error: {0}")]
    Loader(#[from] LoaderError),
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Result of a single validation check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub message: String,
    pub details: Option<String>,
}

impl CheckResult {
    pub fn pass(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            message: message.to_string(),
            details: None,
        }
    }

    pub fn fail(name: &str, message: &str, details: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            message: message.to_string(),
            details,
        }
    }
}

/// Complete data integrity report for one input table.
#[derive(Debug)]
pub struct DataIntegrityReport {
    pub row_count: usize,
    pub trading_days: usize,
    pub checks: Vec<CheckResult>,
}

impl DataIntegrityReport {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failed_checks(&self) -> Vec<&CheckResult> {
        self.checks.iter().filter(|c| !c.passed).collect()
    }

    pub fn check(&self, name: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.name == name)
    }

    pub fn summary(&self) -> String {
        let passed = self.checks.iter().filter(|c| c.passed).count();
        let total = self.checks.len();
        format!(
            "{} rows, {} trading days: {}/{} checks passed",
            self.row_count, self.trading_days, passed, total
        )
    }
}

/// List at most a handful of offending items.
fn sample<T: ToString>(items: &[T]) -> String {
    const MAX: usize = 5;
    let mut out: Vec<String> = items.iter().take(MAX).map(|i| i.to_string()).collect();
    if items.len() > MAX {
        out.push(format!("... {} more", items.len() - MAX));
    }
    out.join(", ")
}

/// Validator for raw chain integrity.
pub struct DataIntegrityValidator {
    min_expiries: usize,
}

impl Default for DataIntegrityValidator {
    fn default() -> Self {
        Self { min_expiries: 3 }
    }
}

impl DataIntegrityValidator {
    /// `min_expiries` is the number of future expiries each date needs.
    pub fn new(min_expiries: usize) -> Self {
        Self { min_expiries }
    }

    /// Load a chain file and validate it.
    pub fn validate_file(&self, path: impl AsRef<Path>) -> ValidationResult<DataIntegrityReport> {
        let quotes = DataLoader::new(path.as_ref()).load_quotes()?;
        Ok(self.validate(&quotes))
    }

    /// Run all validation checks.
    pub fn validate(&self, quotes: &[RawQuote]) -> DataIntegrityReport {
        let dates = trading_dates(quotes);

        let checks = if quotes.is_empty() {
            vec![CheckResult::fail("non_empty", "No rows in input", None)]
        } else {
            vec![
                CheckResult::pass("non_empty", &format!("{} rows", quotes.len())),
                self.check_levels(quotes),
                self.check_implied_vol(quotes),
                self.check_prices(quotes),
                self.check_expiry_order(quotes),
                self.check_underlying_consistency(quotes),
                self.check_option_kinds(quotes, &dates),
                self.check_expiry_count(quotes),
                self.check_date_continuity(&dates),
            ]
        };

        DataIntegrityReport {
            row_count: quotes.len(),
            trading_days: dates.len(),
            checks,
        }
    }

    /// Strike and underlying must be positive.
    fn check_levels(&self, quotes: &[RawQuote]) -> CheckResult {
        let bad_strike = quotes.iter().filter(|q| q.strike <= Decimal::ZERO).count();
        let bad_underlying = quotes
            .iter()
            .filter(|q| !(q.underlying_price.is_finite() && q.underlying_price > 0.0))
            .count();

        if bad_strike == 0 && bad_underlying == 0 {
            CheckResult::pass("positive_levels", "All strikes and underlying levels positive")
        } else {
            CheckResult::fail(
                "positive_levels",
                "Non-positive strike or underlying",
                Some(format!(
                    "{} rows with strike <= 0; {} rows with underlying <= 0",
                    bad_strike, bad_underlying
                )),
            )
        }
    }

    fn check_implied_vol(&self, quotes: &[RawQuote]) -> CheckResult {
        let bad = quotes
            .iter()
            .filter(|q| !(q.implied_vol.is_finite() && q.implied_vol > 0.0))
            .count();

        if bad == 0 {
            CheckResult::pass("implied_vol", "All implied vols positive")
        } else {
            CheckResult::fail(
                "implied_vol",
                &format!("{} rows with non-positive implied vol", bad),
                None,
            )
        }
    }

    fn check_prices(&self, quotes: &[RawQuote]) -> CheckResult {
        let bad = quotes
            .iter()
            .filter(|q| !(q.price.is_finite() && q.price >= 0.0))
            .count();

        if bad == 0 {
            CheckResult::pass("price_validity", "All prices non-negative")
        } else {
            CheckResult::fail(
                "price_validity",
                &format!("{} rows with negative price", bad),
                None,
            )
        }
    }

    fn check_expiry_order(&self, quotes: &[RawQuote]) -> CheckResult {
        let bad: Vec<String> = quotes
            .iter()
            .filter(|q| q.expiry < q.as_of)
            .map(|q| format!("{} expiring {}", q.as_of, q.expiry))
            .collect();

        if bad.is_empty() {
            CheckResult::pass("expiry_order", "No expiry before its as-of date")
        } else {
            CheckResult::fail(
                "expiry_order",
                &format!("{} rows expire before as-of", bad.len()),
                Some(sample(&bad)),
            )
        }
    }

    /// The engine takes the first row's level; differing levels on one date
    /// make that choice order-dependent.
    fn check_underlying_consistency(&self, quotes: &[RawQuote]) -> CheckResult {
        let mut levels: BTreeMap<NaiveDate, (f64, f64)> = BTreeMap::new();
        for q in quotes {
            let entry = levels
                .entry(q.as_of)
                .or_insert((q.underlying_price, q.underlying_price));
            entry.0 = entry.0.min(q.underlying_price);
            entry.1 = entry.1.max(q.underlying_price);
        }

        let inconsistent: Vec<NaiveDate> = levels
            .iter()
            .filter(|(_, (lo, hi))| hi - lo > 1e-9)
            .map(|(d, _)| *d)
            .collect();

        if inconsistent.is_empty() {
            CheckResult::pass("underlying_consistency", "One underlying level per date")
        } else {
            CheckResult::fail(
                "underlying_consistency",
                &format!("{} dates with multiple underlying levels", inconsistent.len()),
                Some(sample(&inconsistent)),
            )
        }
    }

    fn check_option_kinds(&self, quotes: &[RawQuote], dates: &[NaiveDate]) -> CheckResult {
        let mut kinds: BTreeMap<NaiveDate, BTreeSet<OptionType>> = BTreeMap::new();
        for q in quotes {
            kinds.entry(q.as_of).or_default().insert(q.option_type);
        }

        let one_sided: Vec<NaiveDate> = dates
            .iter()
            .filter(|d| kinds.get(d).map_or(true, |k| k.len() < 2))
            .copied()
            .collect();

        if one_sided.is_empty() {
            CheckResult::pass("option_kinds", "Calls and puts quoted on every date")
        } else {
            CheckResult::fail(
                "option_kinds",
                &format!("{} dates missing calls or puts", one_sided.len()),
                Some(sample(&one_sided)),
            )
        }
    }

    fn check_expiry_count(&self, quotes: &[RawQuote]) -> CheckResult {
        let mut expiries: BTreeMap<NaiveDate, BTreeSet<NaiveDate>> = BTreeMap::new();
        for q in quotes.iter().filter(|q| q.expiry > q.as_of) {
            expiries.entry(q.as_of).or_default().insert(q.expiry);
        }

        let short: Vec<String> = trading_dates(quotes)
            .into_iter()
            .filter_map(|d| {
                let n = expiries.get(&d).map_or(0, |e| e.len());
                (n < self.min_expiries).then(|| format!("{} ({})", d, n))
            })
            .collect();

        if short.is_empty() {
            CheckResult::pass(
                "expiry_count",
                &format!("At least {} future expiries on every date", self.min_expiries),
            )
        } else {
            CheckResult::fail(
                "expiry_count",
                &format!(
                    "{} dates with fewer than {} future expiries",
                    short.len(),
                    self.min_expiries
                ),
                Some(sample(&short)),
            )
        }
    }

    /// Check that trading days are continuous (no unexpected gaps).
    fn check_date_continuity(&self, dates: &[NaiveDate]) -> CheckResult {
        let gaps: Vec<String> = dates
            .windows(2)
            .filter_map(|w| {
                let gap_days = (w[1] - w[0]).num_days();
                // More than a week gap is suspicious
                (gap_days > 7).then(|| format!("{} to {} ({} days)", w[0], w[1], gap_days))
            })
            .collect();

        if gaps.is_empty() {
            CheckResult::pass(
                "date_continuity",
                &format!("{} trading days, no major gaps", dates.len()),
            )
        } else {
            CheckResult::fail(
                "date_continuity",
                &format!("{} major gaps found", gaps.len()),
                Some(sample(&gaps)),
            )
        }
    }
}
