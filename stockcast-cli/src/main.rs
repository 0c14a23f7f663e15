//! Stockcast CLI: one-shot forecasts and an interactive session.
//!
//! Commands:
//! - `forecast`: load one ticker, print its history and forecast, optionally export
//! - `session`: interactive loop with a price cache that lives for the session
//! - `tickers`: list the configured ticker set

mod logging;
mod session;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use stockcast_core::domain::Ticker;
use stockcast_runner::{
    build_fetcher, export_json, render_text, run, save_outputs, AppConfig, ForecastReport,
    PipelineRequest, PriceCache, SourceKind,
};

use crate::session::Session;

#[derive(Parser)]
#[command(
    name = "stockcast",
    about = "Stockcast CLI: stock price history and multi-year forecasts"
)]
struct Cli {
    /// Path to a TOML config file. Every field has a default.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides for the `[data]` config section.
#[derive(Args, Debug, Default)]
struct DataArgs {
    /// Start of the history window (YYYY-MM-DD).
    #[arg(long)]
    start: Option<NaiveDate>,

    /// End of the history window, exclusive (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Data source: yahoo, csv or synthetic.
    #[arg(long)]
    source: Option<SourceKind>,

    /// CSV file for the csv source.
    #[arg(long)]
    csv: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load one ticker and forecast it.
    Forecast {
        /// Ticker symbol. Defaults to the first configured ticker.
        #[arg(long)]
        ticker: Option<String>,

        /// Years of forecast (1-4 by default).
        #[arg(long)]
        years: Option<u32>,

        #[command(flatten)]
        data: DataArgs,

        /// Print the report as JSON instead of text.
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Write history and forecast tables (`.parquet` or CSV).
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Interactive session reading commands from stdin.
    Session {
        /// Initially selected ticker.
        #[arg(long)]
        ticker: Option<String>,

        /// Initial forecast horizon in years.
        #[arg(long)]
        years: Option<u32>,

        #[command(flatten)]
        data: DataArgs,
    },
    /// List the configured tickers.
    Tickers,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Forecast {
            ticker,
            years,
            data,
            json,
            export,
        } => {
            let config = load_config(cli.config.as_deref(), &data)?;
            logging::init(&config.logging.level);
            run_forecast(&config, ticker, years, json, export.as_deref())
        }
        Commands::Session {
            ticker,
            years,
            data,
        } => {
            let config = load_config(cli.config.as_deref(), &data)?;
            logging::init(&config.logging.level);
            run_session(&config, ticker, years)
        }
        Commands::Tickers => {
            let config = load_config(cli.config.as_deref(), &DataArgs::default())?;
            for ticker in &config.data.tickers {
                println!("{ticker}");
            }
            Ok(())
        }
    }
}

/// Config from file (or defaults) with command-line overrides applied, then validated.
fn load_config(path: Option<&Path>, args: &DataArgs) -> Result<AppConfig> {
    let mut config = match path {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    if let Some(start) = args.start {
        config.data.start_date = start;
    }
    if let Some(end) = args.end {
        config.data.end_date = Some(end);
    }
    if let Some(source) = args.source {
        config.data.source = source;
    }
    if let Some(csv) = &args.csv {
        config.data.csv_path = Some(csv.clone());
    }
    config.validate()?;
    Ok(config)
}

fn select_ticker(config: &AppConfig, ticker: Option<String>) -> Result<Ticker> {
    match ticker {
        Some(raw) => Ok(Ticker::new(&raw)?),
        None => config
            .data
            .tickers
            .first()
            .cloned()
            .context("no ticker given and none configured"),
    }
}

fn run_forecast(
    config: &AppConfig,
    ticker: Option<String>,
    years: Option<u32>,
    json: bool,
    export: Option<&Path>,
) -> Result<()> {
    let ticker = select_ticker(config, ticker)?;
    let horizon = config.forecast.horizon(years)?;
    let fetcher = build_fetcher(config, config.data.source)?;
    let engine = config.forecast.engine();
    let cache = PriceCache::new();

    let request = PipelineRequest {
        ticker,
        start_date: config.data.start_date,
        end_date: config.end_date(),
        horizon_days: horizon.days(),
    };

    let output = match run(&request, &cache, fetcher.as_ref(), &engine) {
        Ok(output) => output,
        Err(e) => {
            eprintln!("{e}");
            eprintln!("{}", e.hint());
            std::process::exit(1);
        }
    };

    if json {
        println!("{}", export_json(&ForecastReport::from_output(&output))?);
    } else {
        print!("{}", render_text(&output));
    }

    if let Some(path) = export {
        for written in save_outputs(&output, path)? {
            println!("Saved: {}", written.display());
        }
    }
    Ok(())
}

fn run_session(config: &AppConfig, ticker: Option<String>, years: Option<u32>) -> Result<()> {
    let ticker = select_ticker(config, ticker)?;
    let horizon = config.forecast.horizon(years)?;
    let fetcher = build_fetcher(config, config.data.source)?;

    let mut session = Session::new(config, fetcher.as_ref(), ticker, horizon);
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    session
        .run_loop(stdin.lock(), &mut stdout)
        .context("session I/O failed")
}
