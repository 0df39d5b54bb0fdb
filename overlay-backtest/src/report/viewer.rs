//! Read-only viewer over the two output tables.
//!
//! Joins levels and decomposition on date (inner, so the undated seed row and
//! dates before the first pair drop out) and looks up a single date. Position
//! payloads are decoded only when a date is viewed.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use polars::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::backtest::PositionRecord;
use crate::data::loader::{f64_column, string_column};
use crate::data::{parse_date, LoaderError};

use super::writer::{DECOMPOSITION_COLUMNS, LEVELS_DATE_COLUMN, LEVELS_VALUE_COLUMN};

#[derive(Error, Debug)]
pub enum ViewerError {
    #[error("File not found: {0}")]
    MissingFile(PathBuf),

    #[error("Malformed table {path}: {message}")]
    MalformedTable { path: PathBuf, message: String },

    #[error("Malformed position payload for {date}: {source}")]
    MalformedPayload {
        date: NaiveDate,
        #[source]
        source: serde_json::Error,
    },
}

/// Undecoded decomposition row.
#[derive(Debug, Clone)]
struct JoinedRow {
    level: f64,
    call_positions: String,
    put_positions: String,
    underlying_delta: f64,
}

/// Everything shown for one date.
#[derive(Debug, Clone, PartialEq)]
pub struct DateDetail {
    pub date: NaiveDate,
    pub level: f64,
    pub call_positions: Vec<PositionRecord>,
    pub put_positions: Vec<PositionRecord>,
    pub underlying_delta: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DateView {
    Detail(DateDetail),
    NoData,
}

/// Viewer over a levels table and a decomposition table.
#[derive(Debug, Clone, Default)]
pub struct StrategyViewer {
    rows: BTreeMap<NaiveDate, JoinedRow>,
}

fn read_csv(path: &Path) -> Result<DataFrame, ViewerError> {
    if !path.exists() {
        return Err(ViewerError::MissingFile(path.to_path_buf()));
    }
    let malformed = |e: PolarsError| ViewerError::MalformedTable {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    LazyCsvReader::new(path)
        .with_has_header(true)
        .finish()
        .map_err(malformed)?
        .collect()
        .map_err(malformed)
}

fn table_error(path: &Path) -> impl Fn(LoaderError) -> ViewerError + '_ {
    move |e| ViewerError::MalformedTable {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

fn date_key(value: Option<&str>, path: &Path, row: usize) -> Result<NaiveDate, ViewerError> {
    value
        .and_then(parse_date)
        .ok_or_else(|| ViewerError::MalformedTable {
            path: path.to_path_buf(),
            message: format!("row {}: unparseable date {:?}", row, value),
        })
}

impl StrategyViewer {
    /// Load and join both tables.
    pub fn load(
        levels_path: impl AsRef<Path>,
        decomposition_path: impl AsRef<Path>,
    ) -> Result<Self, ViewerError> {
        let levels_path = levels_path.as_ref();
        let decomposition_path = decomposition_path.as_ref();

        let levels = read_csv(levels_path)?;
        let level_dates =
            string_column(&levels, LEVELS_DATE_COLUMN).map_err(table_error(levels_path))?;
        let level_values =
            f64_column(&levels, LEVELS_VALUE_COLUMN).map_err(table_error(levels_path))?;

        let mut by_date = BTreeMap::new();
        for (idx, (date, level)) in level_dates.iter().zip(level_values.iter().copied()).enumerate() {
            // Seed row.
            let Some(date) = date.as_deref().filter(|s| !s.trim().is_empty()) else {
                continue;
            };
            let date = date_key(Some(date), levels_path, idx)?;
            let level = level.ok_or_else(|| ViewerError::MalformedTable {
                path: levels_path.to_path_buf(),
                message: format!("row {}: missing level", idx),
            })?;
            by_date.insert(date, level);
        }

        let decomposition = read_csv(decomposition_path)?;
        let [date_col, call_col, put_col, delta_col] = DECOMPOSITION_COLUMNS;
        let err = table_error(decomposition_path);
        let dates = string_column(&decomposition, date_col).map_err(&err)?;
        let calls = string_column(&decomposition, call_col).map_err(&err)?;
        let puts = string_column(&decomposition, put_col).map_err(&err)?;
        let deltas = f64_column(&decomposition, delta_col).map_err(&err)?;

        let mut rows = BTreeMap::new();
        for idx in 0..decomposition.height() {
            let date = date_key(dates[idx].as_deref(), decomposition_path, idx)?;
            let Some(&level) = by_date.get(&date) else {
                continue;
            };
            let underlying_delta = deltas[idx].ok_or_else(|| ViewerError::MalformedTable {
                path: decomposition_path.to_path_buf(),
                message: format!("row {}: missing {}", idx, delta_col),
            })?;
            rows.insert(
                date,
                JoinedRow {
                    level,
                    call_positions: calls[idx].clone().unwrap_or_default(),
                    put_positions: puts[idx].clone().unwrap_or_default(),
                    underlying_delta,
                },
            );
        }

        debug!(
            levels = by_date.len(),
            joined = rows.len(),
            "Loaded strategy tables"
        );

        Ok(Self { rows })
    }

    /// First and last joined dates.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = *self.rows.keys().next()?;
        let last = *self.rows.keys().next_back()?;
        Some((first, last))
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.rows.keys().copied().collect()
    }

    /// Detail for a date, or `NoData` if the date is not in the join.
    pub fn view(&self, date: NaiveDate) -> Result<DateView, ViewerError> {
        let Some(row) = self.rows.get(&date) else {
            return Ok(DateView::NoData);
        };

        let decode = |payload: &str| {
            serde_json::from_str::<Vec<PositionRecord>>(payload)
                .map_err(|source| ViewerError::MalformedPayload { date, source })
        };

        Ok(DateView::Detail(DateDetail {
            date,
            level: row.level,
            call_positions: decode(&row.call_positions)?,
            put_positions: decode(&row.put_positions)?,
            underlying_delta: row.underlying_delta,
        }))
    }

    /// Rendered view of a date. A payload that cannot be decoded is shown as a
    /// message in place of the detail.
    pub fn display(&self, date: NaiveDate) -> String {
        match self.view(date) {
            Ok(view) => {
                if view == DateView::NoData {
                    info!(%date, "Date not in the joined tables");
                }
                render(&view)
            }
            Err(e) => {
                warn!(%date, error = %e, "Cannot display date");
                format!("Cannot display {}: {}\n", date, e)
            }
        }
    }
}

fn position_table(title: &str, positions: &[PositionRecord]) -> String {
    let mut out = format!(
        "{}\n{:>12} {:>10} {:>12} {:>14}\n",
        title, "strike", "delta", "maturity", "units"
    );
    for p in positions {
        let _ = writeln!(
            out,
            "{:>12} {:>10.4} {:>12} {:>14.6}",
            p.strike, p.delta, p.maturity, p.units
        );
    }
    out
}

/// Plain-text rendering of a view.
pub fn render(view: &DateView) -> String {
    match view {
        DateView::NoData => "No data available for the selected date.\n".to_string(),
        DateView::Detail(detail) => {
            let mut out = format!(
                "{}\nStrategy Level: {:.2}\n\n",
                detail.date, detail.level
            );
            out.push_str(&position_table("Call Options", &detail.call_positions));
            out.push('\n');
            out.push_str(&position_table("Put Options", &detail.put_positions));
            let _ = writeln!(out, "\nUnderlying Delta: {:.2}", detail.underlying_delta);
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn write(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        path
    }

    const POSITION: &str =
        r#""[{""strike"":100.0,""delta"":0.55,""maturity"":""2024-03-15"",""units"":-0.4}]""#;

    fn tables(dir: &Path, jan3_call: &str) -> (PathBuf, PathBuf) {
        let levels = write(
            dir,
            "levels.csv",
            &[
                "Date,Strategy Level",
                ",100.0",
                "2024-01-02,100.0",
                "2024-01-03,99.5",
                "2024-01-04,99.25",
            ],
        );
        let row2 = format!("2024-01-02,{},{},-0.04", POSITION, POSITION);
        let row3 = format!("2024-01-03,{},{},-0.05", jan3_call, POSITION);
        let decomposition = write(
            dir,
            "decomposition.csv",
            &[
                "date,call_positions,put_positions,underlying_delta",
                &row2,
                &row3,
            ],
        );
        (levels, decomposition)
    }

    #[test]
    fn test_join_and_view() {
        let dir = tempfile::tempdir().unwrap();
        let (levels, decomposition) = tables(dir.path(), POSITION);
        let viewer = StrategyViewer::load(&levels, &decomposition).unwrap();

        assert_eq!(viewer.date_range(), Some((d(2), d(3))));
        assert_eq!(viewer.dates().len(), 2);

        let DateView::Detail(detail) = viewer.view(d(3)).unwrap() else {
            panic!("expected detail");
        };
        assert_eq!(detail.level, 99.5);
        assert_eq!(detail.underlying_delta, -0.05);
        assert_eq!(detail.call_positions[0].units, -0.4);
        assert_eq!(detail.put_positions[0].maturity, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());

        let text = render(&DateView::Detail(detail));
        assert!(text.contains("Strategy Level: 99.50"));
        assert!(text.contains("Underlying Delta: -0.05"));
    }

    #[test]
    fn test_unjoined_date_is_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let (levels, decomposition) = tables(dir.path(), POSITION);
        let viewer = StrategyViewer::load(&levels, &decomposition).unwrap();

        // In levels but not in decomposition.
        assert_eq!(viewer.view(d(4)).unwrap(), DateView::NoData);
        assert_eq!(viewer.view(d(20)).unwrap(), DateView::NoData);
        assert!(render(&DateView::NoData).contains("No data"));
    }

    #[test]
    fn test_malformed_payload_is_per_date() {
        let dir = tempfile::tempdir().unwrap();
        let bad = r#""[{""strike"":100.0,""gamma"":0.1}]""#;
        let (levels, decomposition) = tables(dir.path(), bad);
        let viewer = StrategyViewer::load(&levels, &decomposition).unwrap();

        assert!(matches!(
            viewer.view(d(3)),
            Err(ViewerError::MalformedPayload { date, .. }) if date == d(3)
        ));
        assert!(matches!(viewer.view(d(2)), Ok(DateView::Detail(_))));

        let shown = viewer.display(d(3));
        assert!(shown.starts_with("Cannot display 2024-01-03"));
        assert!(viewer.display(d(2)).contains("Strategy Level: 100.00"));
        assert!(viewer.display(d(4)).contains("No data"));
    }

    #[test]
    fn test_missing_delta_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let (levels, _) = tables(dir.path(), POSITION);
        let row2 = format!("2024-01-02,{},{},-0.04", POSITION, POSITION);
        let row3 = format!("2024-01-03,{},{},", POSITION, POSITION);
        let decomposition = write(
            dir.path(),
            "gappy.csv",
            &[
                "date,call_positions,put_positions,underlying_delta",
                &row2,
                &row3,
            ],
        );

        match StrategyViewer::load(&levels, &decomposition) {
            Err(ViewerError::MalformedTable { message, .. }) => {
                assert!(message.contains("row 1"));
                assert!(message.contains("underlying_delta"));
            }
            other => panic!("expected malformed table, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let (levels, _) = tables(dir.path(), POSITION);
        let err = StrategyViewer::load(&levels, dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, ViewerError::MissingFile(_)));
    }

    #[test]
    fn test_reads_writer_output() {
        use crate::backtest::{BacktestConfig, BacktestEngine};
        use crate::data::{preprocess, MarketData, OptionType, RawQuote};
        use crate::report::{write_decomposition, write_levels};
        use rust_decimal_macros::dec;

        let mut quotes = Vec::new();
        for (day, s) in [(2, 100.0), (3, 101.0)] {
            for m in [2, 3, 4] {
                for kind in [OptionType::Call, OptionType::Put] {
                    quotes.push(RawQuote {
                        as_of: d(day),
                        expiry: NaiveDate::from_ymd_opt(2024, m, 15).unwrap(),
                        option_type: kind,
                        strike: dec!(100),
                        underlying_price: s,
                        implied_vol: 0.2,
                        price: 3.0,
                    });
                }
            }
        }
        let market = MarketData::from_rows(preprocess(&quotes));
        let result = BacktestEngine::new(BacktestConfig::default())
            .run(&market)
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let levels = dir.path().join("levels.csv");
        let decomposition = dir.path().join("decomposition.csv");
        write_levels(&result, &levels).unwrap();
        write_decomposition(&result, &decomposition).unwrap();

        let viewer = StrategyViewer::load(&levels, &decomposition).unwrap();
        assert_eq!(viewer.date_range(), Some((d(2), d(3))));

        let DateView::Detail(detail) = viewer.view(d(3)).unwrap() else {
            panic!("expected detail");
        };
        assert!((detail.level - result.final_level()).abs() < 1e-9);
        assert_eq!(detail.call_positions, result.snapshots[1].call_positions);
    }
}
