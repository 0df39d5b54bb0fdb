//! Overlay Backtest CLI
//!
//! # Usage
//!
//! ```bash
//! # Run a single backtest and write both output tables
//! overlay-backtest run --input data/spx_chain.parquet --config config/default.toml
//!
//! # Sweep the parameter grid from the config
//! overlay-backtest sweep --input data/spx_chain.parquet --config config/default.toml
//!
//! # Check the raw chain before running
//! overlay-backtest validate --input data/spx_chain.csv
//!
//! # Inspect one date of a finished run
//! overlay-backtest show --date 2024-03-01
//! ```

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use overlay_backtest::backtest::{BacktestEngine, InvalidParameterPolicy};
use overlay_backtest::config::AppConfig;
use overlay_backtest::data::{parse_date, preprocess, DataLoader, MarketData};
use overlay_backtest::metrics::MetricsCalculator;
use overlay_backtest::report::{write_decomposition, write_levels, StrategyViewer};
use overlay_backtest::sweep::{render_table, SweepRunner};
use overlay_backtest::validation::DataIntegrityValidator;

const SEPARATOR: &str = "============================================================";

#[derive(Parser)]
#[command(name = "overlay-backtest")]
#[command(about = "Short-vega options overlay backtester")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single backtest and write the output tables
    Run {
        /// Raw chain file (.csv or .parquet)
        #[arg(short, long)]
        input: PathBuf,

        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// First as-of date to process (YYYY-MM-DD)
        #[arg(long, value_parser = cli_date)]
        start_date: Option<NaiveDate>,

        /// Last as-of date to process (YYYY-MM-DD)
        #[arg(long, value_parser = cli_date)]
        end_date: Option<NaiveDate>,

        /// Seed strategy level
        #[arg(long)]
        start_level: Option<f64>,

        /// Stop on the first pricing failure instead of carrying the day
        #[arg(long)]
        abort_on_invalid: bool,

        /// Levels table output path
        #[arg(long)]
        levels_out: Option<PathBuf>,

        /// Decomposition table output path
        #[arg(long)]
        decomposition_out: Option<PathBuf>,
    },

    /// Run the parameter sweep
    Sweep {
        /// Raw chain file (.csv or .parquet)
        #[arg(short, long)]
        input: PathBuf,

        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Only print the best N rows
        #[arg(long)]
        top: Option<usize>,
    },

    /// Validate the raw chain file
    Validate {
        /// Raw chain file (.csv or .parquet)
        #[arg(short, long)]
        input: PathBuf,

        /// Future expiries each date needs
        #[arg(long, default_value_t = 3)]
        min_expiries: usize,
    },

    /// View one date of a finished run
    Show {
        /// Path to configuration file (for default table paths)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Levels table
        #[arg(long)]
        levels: Option<PathBuf>,

        /// Decomposition table
        #[arg(long)]
        decomposition: Option<PathBuf>,

        /// Date to view (defaults to the first available)
        #[arg(long, value_parser = cli_date)]
        date: Option<NaiveDate>,
    },
}

fn cli_date(s: &str) -> Result<NaiveDate, String> {
    parse_date(s).ok_or_else(|| format!("invalid date '{}'", s))
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(p) => AppConfig::from_toml(p)
            .with_context(|| format!("Failed to load config {}", p.display())),
        None => Ok(AppConfig::default()),
    }
}

fn load_market(input: &Path) -> Result<MarketData> {
    let start = Instant::now();
    let quotes = DataLoader::new(input)
        .load_quotes()
        .with_context(|| format!("Failed to load {}", input.display()))?;
    let market = MarketData::from_rows(preprocess(&quotes));
    info!(
        quotes = market.total_quotes(),
        days = market.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Loaded market data"
    );
    Ok(market)
}

#[allow(clippy::too_many_arguments)]
fn cmd_run(
    input: PathBuf,
    config: Option<PathBuf>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    start_level: Option<f64>,
    abort_on_invalid: bool,
    levels_out: Option<PathBuf>,
    decomposition_out: Option<PathBuf>,
) -> Result<()> {
    let mut app = load_config(config.as_deref())?;
    if start_date.is_some() {
        app.backtest.start_date = start_date;
    }
    if end_date.is_some() {
        app.backtest.end_date = end_date;
    }
    if let Some(level) = start_level {
        app.backtest.start_level = level;
    }
    if abort_on_invalid {
        app.backtest.invalid_parameter_policy = InvalidParameterPolicy::Abort;
    }
    let levels_path = levels_out.unwrap_or(app.output.levels_path);
    let decomposition_path = decomposition_out.unwrap_or(app.output.decomposition_path);

    let market = load_market(&input)?;
    let result = BacktestEngine::new(app.backtest)
        .run(&market)
        .context("Backtest failed")?;

    write_levels(&result, &levels_path)
        .with_context(|| format!("Failed to write {}", levels_path.display()))?;
    write_decomposition(&result, &decomposition_path)
        .with_context(|| format!("Failed to write {}", decomposition_path.display()))?;

    println!("{}", SEPARATOR);
    println!("{}", result.summary());
    println!("{}", SEPARATOR);
    println!("{}", MetricsCalculator::calculate(&result).summary());
    println!("{}", SEPARATOR);
    println!("Levels:        {}", levels_path.display());
    println!("Decomposition: {}", decomposition_path.display());

    Ok(())
}

fn cmd_sweep(input: PathBuf, config: Option<PathBuf>, top: Option<usize>) -> Result<()> {
    let app = load_config(config.as_deref())?;
    let market = load_market(&input)?;

    let runner = SweepRunner::new(app.backtest, app.sweep);
    let total = runner.grid().total_combinations();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );
    pb.set_message("backtests");

    let results = runner.run_with_progress(&market, |_, _| pb.inc(1));
    pb.finish_and_clear();

    let shown = top.map_or(results.len(), |n| n.min(results.len()));
    println!("{}", SEPARATOR);
    println!("Sweep: {} parameter sets", results.len());
    println!("{}", SEPARATOR);
    print!("{}", render_table(&results[..shown]));

    Ok(())
}

fn cmd_validate(input: PathBuf, min_expiries: usize) -> Result<()> {
    let report = DataIntegrityValidator::new(min_expiries)
        .validate_file(&input)
        .with_context(|| format!("Failed to validate {}", input.display()))?;

    println!("{}", SEPARATOR);
    println!("{}", input.display());
    println!("{}", report.summary());
    println!("{}", SEPARATOR);
    for check in &report.checks {
        let mark = if check.passed { "PASS" } else { "FAIL" };
        println!("[{}] {}: {}", mark, check.name, check.message);
        if let Some(details) = &check.details {
            println!("       {}", details);
        }
    }

    Ok(())
}

fn cmd_show(
    config: Option<PathBuf>,
    levels: Option<PathBuf>,
    decomposition: Option<PathBuf>,
    date: Option<NaiveDate>,
) -> Result<()> {
    let app = load_config(config.as_deref())?;
    let levels = levels.unwrap_or(app.output.levels_path);
    let decomposition = decomposition.unwrap_or(app.output.decomposition_path);

    let viewer = StrategyViewer::load(&levels, &decomposition).context("Failed to load tables")?;

    let Some((first, last)) = viewer.date_range() else {
        println!("No dated rows in {} and {}", levels.display(), decomposition.display());
        return Ok(());
    };
    println!("Available dates: {} to {}", first, last);
    println!("{}", SEPARATOR);

    let date = date.unwrap_or(first);
    print!("{}", viewer.display(date));

    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("overlay_backtest=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            input,
            config,
            start_date,
            end_date,
            start_level,
            abort_on_invalid,
            levels_out,
            decomposition_out,
        } => cmd_run(
            input,
            config,
            start_date,
            end_date,
            start_level,
            abort_on_invalid,
            levels_out,
            decomposition_out,
        ),
        Commands::Sweep { input, config, top } => cmd_sweep(input, config, top),
        Commands::Validate {
            input,
            min_expiries,
        } => cmd_validate(input, min_expiries),
        Commands::Show {
            config,
            levels,
            decomposition,
            date,
        } => cmd_show(config, levels, decomposition, date),
    }
}
