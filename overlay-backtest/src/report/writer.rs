//! Output tables for a completed backtest.
//!
//! - levels: `Date, Strategy Level`, the seed first with an empty date
//! - decomposition: `date, call_positions, put_positions, underlying_delta`,
//!   position cells hold JSON arrays of `{strike, delta, maturity, units}`

use std::fs::File;
use std::path::Path;

use polars::prelude::*;
use thiserror::Error;
use tracing::info;

use crate::backtest::{BacktestResult, Snapshot};

pub const LEVELS_DATE_COLUMN: &str = "Date";
pub const LEVELS_VALUE_COLUMN: &str = "Strategy Level";
pub const DECOMPOSITION_COLUMNS: [&str; 4] =
    ["date", "call_positions", "put_positions", "underlying_delta"];

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Build the levels table.
pub fn levels_frame(result: &BacktestResult) -> Result<DataFrame, ReportError> {
    let (dates, levels): (Vec<Option<String>>, Vec<f64>) = result
        .level_series()
        .into_iter()
        .map(|(date, level)| (date.map(|d| d.to_string()), level))
        .unzip();

    Ok(df!(
        LEVELS_DATE_COLUMN => dates,
        LEVELS_VALUE_COLUMN => levels
    )?)
}

/// Build the decomposition table.
pub fn decomposition_frame(snapshots: &[Snapshot]) -> Result<DataFrame, ReportError> {
    let mut dates = Vec::with_capacity(snapshots.len());
    let mut calls = Vec::with_capacity(snapshots.len());
    let mut puts = Vec::with_capacity(snapshots.len());
    let mut deltas = Vec::with_capacity(snapshots.len());

    for snapshot in snapshots {
        dates.push(snapshot.date.to_string());
        calls.push(serde_json::to_string(&snapshot.call_positions)?);
        puts.push(serde_json::to_string(&snapshot.put_positions)?);
        deltas.push(snapshot.underlying_delta);
    }

    let [date_col, call_col, put_col, delta_col] = DECOMPOSITION_COLUMNS;
    Ok(df!(
        date_col => dates,
        call_col => calls,
        put_col => puts,
        delta_col => deltas
    )?)
}

fn write_csv(df: &mut DataFrame, path: &Path) -> Result<(), ReportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    Ok(())
}

/// Write the strategy-level series.
pub fn write_levels(result: &BacktestResult, path: impl AsRef<Path>) -> Result<(), ReportError> {
    let path = path.as_ref();
    let mut df = levels_frame(result)?;
    write_csv(&mut df, path)?;
    info!(path = %path.display(), rows = df.height(), "Wrote strategy levels");
    Ok(())
}

/// Write the per-date portfolio decomposition.
pub fn write_decomposition(
    result: &BacktestResult,
    path: impl AsRef<Path>,
) -> Result<(), ReportError> {
    let path = path.as_ref();
    let mut df = decomposition_frame(&result.snapshots)?;
    write_csv(&mut df, path)?;
    info!(path = %path.display(), rows = df.height(), "Wrote portfolio decomposition");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::{BacktestConfig, DayAction, DayRecord, PositionRecord};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn result() -> BacktestResult {
        let record = |date, level| DayRecord {
            date,
            level,
            action: DayAction::Rebalance,
            option_pnl: 0.0,
            underlying_pnl: 0.0,
            net_vega: -1.5,
            vega_fraction: -1.5 / level,
        };
        let position = |units| PositionRecord {
            strike: dec!(4750.5),
            delta: 0.52,
            maturity: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            units,
        };
        BacktestResult {
            config: BacktestConfig::default(),
            start_level: 100.0,
            days: vec![record(d(2), 100.0), record(d(3), 99.75)],
            snapshots: vec![
                Snapshot {
                    date: d(2),
                    call_positions: vec![position(-0.4)],
                    put_positions: vec![position(-0.4)],
                    underlying_delta: -0.1,
                },
                Snapshot {
                    date: d(3),
                    call_positions: vec![position(-0.41)],
                    put_positions: vec![position(-0.41)],
                    underlying_delta: -0.12,
                },
            ],
        }
    }

    #[test]
    fn test_levels_frame_has_seed_row() {
        let df = levels_frame(&result()).unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(df.get_column_names_str(), ["Date", "Strategy Level"]);

        let dates = df.column("Date").unwrap().str().unwrap();
        assert_eq!(dates.get(0), None);
        assert_eq!(dates.get(1), Some("2024-01-02"));
    }

    #[test]
    fn test_decomposition_cells_are_json() {
        let df = decomposition_frame(&result().snapshots).unwrap();
        assert_eq!(df.height(), 2);

        let calls = df.column("call_positions").unwrap().str().unwrap();
        let parsed: Vec<PositionRecord> = serde_json::from_str(calls.get(0).unwrap()).unwrap();
        assert_eq!(parsed[0].strike, dec!(4750.5));
        assert_eq!(parsed[0].units, -0.4);
    }

    #[test]
    fn test_write_files() {
        let dir = tempfile::tempdir().unwrap();
        let levels = dir.path().join("out").join("levels.csv");
        let decomposition = dir.path().join("decomposition.csv");

        write_levels(&result(), &levels).unwrap();
        write_decomposition(&result(), &decomposition).unwrap();

        let text = std::fs::read_to_string(&levels).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "Date,Strategy Level");
        assert!(lines[1].starts_with(','));
        assert!(lines[2].starts_with("2024-01-02,"));

        let text = std::fs::read_to_string(&decomposition).unwrap();
        assert!(text.starts_with("date,call_positions,put_positions,underlying_delta"));
        assert_eq!(text.lines().count(), 3);
    }
}
