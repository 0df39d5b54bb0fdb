//! Chain preprocessing.
//!
//! Turns raw quotes into `ChainRow`s: time to maturity in years, the
//! implied vol under its canonical `sigma` name, model vega at r = 0 and a
//! zeroed moneyness placeholder. The input slice is never modified.
//!
//! Preprocessing is row-local. A quote the model rejects keeps its row with
//! `vega: None`; whether that matters is decided per day when the row is
//! actually selected and priced.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use tracing::warn;

use crate::pricing::BlackScholes;

use super::types::{ChainRow, RawQuote};

/// Day-count basis for time to maturity.
pub const DAYS_PER_YEAR: f64 = 365.0;

/// Years between the as-of date and expiry. Negative past expiry.
pub fn time_to_maturity(as_of: NaiveDate, expiry: NaiveDate) -> f64 {
    (expiry - as_of).num_days() as f64 / DAYS_PER_YEAR
}

/// Preprocess a single quote.
pub fn preprocess_quote(quote: &RawQuote) -> ChainRow {
    let t = time_to_maturity(quote.as_of, quote.expiry);
    let vega = match BlackScholes::vega_only(
        quote.underlying_price,
        quote.strike.to_f64().unwrap_or(f64::NAN),
        t,
        quote.implied_vol,
    ) {
        Ok(vega) => Some(vega),
        Err(e) => {
            warn!(
                as_of = %quote.as_of,
                expiry = %quote.expiry,
                strike = %quote.strike,
                option_type = quote.option_type.as_str(),
                error = %e,
                "Vega undefined for quote"
            );
            None
        }
    };

    ChainRow {
        as_of: quote.as_of,
        expiry: quote.expiry,
        option_type: quote.option_type,
        strike: quote.strike,
        underlying_price: quote.underlying_price,
        sigma: quote.implied_vol,
        price: quote.price,
        time_to_maturity: t,
        vega,
        strike_diff: 0.0,
    }
}

/// Preprocess every quote. Output rows line up with the input.
pub fn preprocess(quotes: &[RawQuote]) -> Vec<ChainRow> {
    let rows: Vec<ChainRow> = quotes.iter().map(preprocess_quote).collect();
    let rejected = rows.iter().filter(|r| r.vega.is_none()).count();
    if rejected > 0 {
        warn!(rejected, total = rows.len(), "Quotes with undefined vega kept");
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::OptionType;
    use rust_decimal_macros::dec;

    fn quote(days_to_expiry: i64, vol: f64) -> RawQuote {
        let as_of = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        RawQuote {
            as_of,
            expiry: as_of + chrono::Duration::days(days_to_expiry),
            option_type: OptionType::Call,
            strike: dec!(100),
            underlying_price: 101.0,
            implied_vol: vol,
            price: 3.0,
        }
    }

    #[test]
    fn test_time_to_maturity() {
        let as_of = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let expiry = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        assert!((time_to_maturity(as_of, expiry) - 365.0 / 365.0).abs() < 1e-12);
        assert!(time_to_maturity(expiry, as_of) < 0.0);
    }

    #[test]
    fn test_preprocess_matches_greeks_engine() {
        let row = preprocess_quote(&quote(73, 0.25));
        let greeks = BlackScholes::new(0.0)
            .greeks(101.0, 100.0, 73.0 / 365.0, 0.25, OptionType::Put)
            .unwrap();

        assert_eq!(row.sigma, 0.25);
        assert_eq!(row.strike_diff, 0.0);
        assert_eq!(row.vega, Some(greeks.vega));
    }

    #[test]
    fn test_expired_rows_have_zero_vega() {
        assert_eq!(preprocess_quote(&quote(0, 0.2)).vega, Some(0.0));
        assert_eq!(preprocess_quote(&quote(-3, 0.2)).vega, Some(0.0));
        // The T <= 0 guard applies before any parameter check.
        assert_eq!(preprocess_quote(&quote(-3, 0.0)).vega, Some(0.0));
    }

    #[test]
    fn test_invalid_quote_keeps_its_row() {
        let quotes = vec![quote(30, 0.2), quote(30, 0.0), quote(30, f64::NAN), quote(30, 0.3)];
        let rows = preprocess(&quotes);

        assert_eq!(rows.len(), 4);
        assert!(rows[0].vega.is_some());
        assert_eq!(rows[1].vega, None);
        assert_eq!(rows[1].sigma, 0.0);
        assert_eq!(rows[2].vega, None);
        assert!(rows[3].vega.is_some());
    }

    #[test]
    fn test_input_is_untouched() {
        let quotes = vec![quote(30, 0.2)];
        let before = quotes.clone();
        let rows = preprocess(&quotes);
        assert_eq!(quotes, before);
        assert_eq!(rows.len(), 1);
    }
}
