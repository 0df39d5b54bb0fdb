//! Chain file loader.
//!
//! Reads the raw option chain from CSV or Parquet with polars and converts
//! it into `RawQuote`s. The file carries one row per contract per day:
//! - UnderlyingPrice, Strike, ExpiryDate, AsOfDate
//! - ImpliedVol, OptionType (Call/Put), Price

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;

use super::types::{OptionType, RawQuote};

/// Columns the chain file must provide.
pub const EXPECTED_COLUMNS: &[&str] = &[
    "UnderlyingPrice",
    "Strike",
    "ExpiryDate",
    "AsOfDate",
    "ImpliedVol",
    "OptionType",
    "Price",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("Invalid data in row {row}, column {column}: {message}")]
    InvalidData {
        row: usize,
        column: String,
        message: String,
    },
}

/// Loader for a single chain file.
pub struct DataLoader {
    path: PathBuf,
}

impl DataLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the file as a LazyFrame, picking the reader by extension.
    pub fn load_lazy(&self) -> Result<LazyFrame, LoaderError> {
        if !self.path.exists() {
            return Err(LoaderError::FileNotFound(self.path.display().to_string()));
        }

        let ext = self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        let lf = match ext.as_deref() {
            Some("parquet") => LazyFrame::scan_parquet(&self.path, ScanArgsParquet::default())?,
            Some("csv") => LazyCsvReader::new(&self.path).with_has_header(true).finish()?,
            other => {
                return Err(LoaderError::UnsupportedFormat(
                    other.unwrap_or("<none>").to_string(),
                ))
            }
        };
        Ok(lf)
    }

    /// Load the file as a DataFrame.
    pub fn load_dataframe(&self) -> Result<DataFrame, LoaderError> {
        Ok(self.load_lazy()?.collect()?)
    }

    /// Load and parse every row into a `RawQuote`.
    pub fn load_quotes(&self) -> Result<Vec<RawQuote>, LoaderError> {
        let df = self.load_dataframe()?;
        quotes_from_dataframe(&df)
    }
}

/// Convert a chain DataFrame into quotes, in row order.
pub fn quotes_from_dataframe(df: &DataFrame) -> Result<Vec<RawQuote>, LoaderError> {
    let underlying = f64_column(df, "UnderlyingPrice")?;
    let strikes = f64_column(df, "Strike")?;
    let expiries = string_column(df, "ExpiryDate")?;
    let as_ofs = string_column(df, "AsOfDate")?;
    let vols = f64_column(df, "ImpliedVol")?;
    let types = string_column(df, "OptionType")?;
    let prices = f64_column(df, "Price")?;

    let mut quotes = Vec::with_capacity(df.height());

    for idx in 0..df.height() {
        let strike = required(strikes[idx], idx, "Strike")?;
        let strike = Decimal::from_f64(strike).ok_or_else(|| LoaderError::InvalidData {
            row: idx,
            column: "Strike".to_string(),
            message: format!("{} is not representable as a decimal", strike),
        })?;

        let type_str = required(types[idx].as_deref(), idx, "OptionType")?;
        let option_type =
            OptionType::from_str(type_str).ok_or_else(|| LoaderError::InvalidData {
                row: idx,
                column: "OptionType".to_string(),
                message: format!("unknown option type '{}'", type_str),
            })?;

        quotes.push(RawQuote {
            as_of: date_cell(as_ofs[idx].as_deref(), idx, "AsOfDate")?,
            expiry: date_cell(expiries[idx].as_deref(), idx, "ExpiryDate")?,
            option_type,
            strike,
            underlying_price: required(underlying[idx], idx, "UnderlyingPrice")?,
            implied_vol: required(vols[idx], idx, "ImpliedVol")?,
            price: required(prices[idx], idx, "Price")?,
        });
    }

    Ok(quotes)
}

/// Distinct as-of dates present in the quotes, ascending.
pub fn trading_dates(quotes: &[RawQuote]) -> Vec<NaiveDate> {
    let mut dates: Vec<_> = quotes.iter().map(|q| q.as_of).collect();
    dates.sort();
    dates.dedup();
    dates
}

/// Parse a calendar date, accepting a handful of common layouts.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
                .map(|dt| dt.date())
        })
}

/// Read a column as f64 values, casting integer columns.
pub(crate) fn f64_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, LoaderError> {
    let column = df
        .column(name)
        .map_err(|_| LoaderError::MissingColumn(name.to_string()))?;
    let cast = column.cast(&DataType::Float64)?;
    Ok(cast.f64()?.into_iter().collect())
}

/// Read a column as strings. Date columns come back in ISO form.
pub(crate) fn string_column(
    df: &DataFrame,
    name: &str,
) -> Result<Vec<Option<String>>, LoaderError> {
    let column = df
        .column(name)
        .map_err(|_| LoaderError::MissingColumn(name.to_string()))?;
    let cast = column.cast(&DataType::String)?;
    Ok(cast
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

fn required<T>(value: Option<T>, row: usize, column: &str) -> Result<T, LoaderError> {
    value.ok_or_else(|| LoaderError::InvalidData {
        row,
        column: column.to_string(),
        message: "missing value".to_string(),
    })
}

fn date_cell(value: Option<&str>, row: usize, column: &str) -> Result<NaiveDate, LoaderError> {
    let s = required(value, row, column)?;
    parse_date(s).ok_or_else(|| LoaderError::InvalidData {
        row,
        column: column.to_string(),
        message: format!("unparseable date '{}'", s),
    })
}
