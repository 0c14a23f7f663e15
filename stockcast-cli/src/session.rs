//! Interactive session: a line-oriented loop sharing one price cache.
//!
//! The session holds the selected ticker and horizon. `run` loads the history
//! (through the cache) and prints the forecast; `clear-cache` drops every
//! cached series so the next `run` refetches.

use std::io::{self, BufRead, Write};

use stockcast_core::data::MarketDataFetcher;
use stockcast_core::domain::{Horizon, Ticker};
use stockcast_core::forecast::DecompositionForecaster;
use stockcast_runner::{render_text, run, AppConfig, PipelineRequest, PriceCache};

const HELP: &str = "\
Commands:
  ticker <T>    select a ticker
  years <N>     forecast horizon in years
  run           load history and forecast the selected ticker
  clear-cache   drop cached price data
  status        show the current selection and cache counters
  tickers       list the configured tickers
  help          show this message
  quit          leave the session";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ticker(String),
    Years(String),
    Run,
    ClearCache,
    Status,
    Tickers,
    Help,
    Quit,
}

impl Command {
    /// Parse one input line. Blank lines are `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut parts = line.split_whitespace();
        let Some(word) = parts.next() else {
            return Ok(None);
        };
        let arg = parts.next();
        let command = match (word.to_ascii_lowercase().as_str(), arg) {
            ("ticker", Some(t)) => Command::Ticker(t.to_string()),
            ("years", Some(n)) => Command::Years(n.to_string()),
            ("ticker" | "years", None) => return Err(format!("'{word}' needs a value")),
            ("run", _) => Command::Run,
            ("clear-cache", _) => Command::ClearCache,
            ("status", _) => Command::Status,
            ("tickers", _) => Command::Tickers,
            ("help" | "?", _) => Command::Help,
            ("quit" | "exit", _) => Command::Quit,
            _ => return Err(format!("unknown command '{word}' (try 'help')")),
        };
        Ok(Some(command))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Session<'a> {
    config: &'a AppConfig,
    fetcher: &'a dyn MarketDataFetcher,
    engine: DecompositionForecaster,
    cache: PriceCache,
    ticker: Ticker,
    horizon: Horizon,
}

impl<'a> Session<'a> {
    pub fn new(
        config: &'a AppConfig,
        fetcher: &'a dyn MarketDataFetcher,
        ticker: Ticker,
        horizon: Horizon,
    ) -> Self {
        Self {
            config,
            fetcher,
            engine: config.forecast.engine(),
            cache: PriceCache::new(),
            ticker,
            horizon,
        }
    }

    pub fn cache(&self) -> &PriceCache {
        &self.cache
    }

    /// Read commands from `input` until `quit` or end of input.
    pub fn run_loop(&mut self, input: impl BufRead, out: &mut impl Write) -> io::Result<()> {
        writeln!(out, "stockcast session. Type 'help' for commands.")?;
        self.prompt(out)?;
        for line in input.lines() {
            let line = line?;
            match Command::parse(&line) {
                Ok(Some(command)) => {
                    if self.handle(command, out)? == Flow::Quit {
                        return Ok(());
                    }
                }
                Ok(None) => {}
                Err(msg) => writeln!(out, "{msg}")?,
            }
            self.prompt(out)?;
        }
        writeln!(out)
    }

    fn prompt(&self, out: &mut impl Write) -> io::Result<()> {
        write!(out, "[{} {}y]> ", self.ticker, self.horizon.years())?;
        out.flush()
    }

    pub fn handle(&mut self, command: Command, out: &mut impl Write) -> io::Result<Flow> {
        match command {
            Command::Ticker(raw) => match Ticker::new(&raw) {
                Ok(ticker) => {
                    writeln!(out, "Selected {ticker}")?;
                    self.ticker = ticker;
                }
                Err(e) => writeln!(out, "{e}")?,
            },
            Command::Years(raw) => {
                let years = raw.parse::<u32>().ok();
                match years.map(|y| self.config.forecast.horizon(Some(y))) {
                    Some(Ok(horizon)) => {
                        writeln!(out, "Horizon {} years ({} days)", horizon.years(), horizon.days())?;
                        self.horizon = horizon;
                    }
                    Some(Err(e)) => writeln!(out, "{e}")?,
                    None => writeln!(out, "'{raw}' is not a number of years")?,
                }
            }
            Command::Run => self.forecast(out)?,
            Command::ClearCache => {
                self.cache.invalidate_all();
                writeln!(out, "Cleared cached stock data")?;
            }
            Command::Status => {
                let stats = self.cache.stats();
                let cached: Vec<String> =
                    self.cache.tickers().iter().map(Ticker::to_string).collect();
                writeln!(out, "Ticker:  {}", self.ticker)?;
                writeln!(out, "Horizon: {} years", self.horizon.years())?;
                writeln!(out, "Source:  {}", self.fetcher.name())?;
                writeln!(
                    out,
                    "Cache:   {} series [{}], {} hits, {} misses",
                    self.cache.len(),
                    cached.join(", "),
                    stats.hits,
                    stats.misses
                )?;
            }
            Command::Tickers => {
                for ticker in &self.config.data.tickers {
                    writeln!(out, "{ticker}")?;
                }
            }
            Command::Help => writeln!(out, "{HELP}")?,
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    fn forecast(&mut self, out: &mut impl Write) -> io::Result<()> {
        let request = PipelineRequest {
            ticker: self.ticker.clone(),
            start_date: self.config.data.start_date,
            end_date: self.config.end_date(),
            horizon_days: self.horizon.days(),
        };
        match run(&request, &self.cache, self.fetcher, &self.engine) {
            Ok(output) => write!(out, "{}", render_text(&output)),
            Err(e) => {
                tracing::error!(ticker = %e.ticker(), error = %e, "forecast failed");
                writeln!(out, "{e}")?;
                writeln!(out, "{}", e.hint())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use stockcast_core::data::SyntheticProvider;

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.data.start_date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        config.data.end_date = NaiveDate::from_ymd_opt(2025, 1, 1);
        config
    }

    fn drive(script: &str) -> (String, usize) {
        let config = config();
        let fetcher = SyntheticProvider::new();
        let mut session = Session::new(
            &config,
            &fetcher,
            Ticker::new("AAPL").unwrap(),
            Horizon::from_years(1).unwrap(),
        );
        let mut out = Vec::new();
        session.run_loop(script.as_bytes(), &mut out).unwrap();
        (String::from_utf8(out).unwrap(), session.cache().len())
    }

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse("  "), Ok(None));
        assert_eq!(Command::parse("ticker msft"), Ok(Some(Command::Ticker("msft".into()))));
        assert_eq!(Command::parse("RUN"), Ok(Some(Command::Run)));
        assert_eq!(Command::parse("exit"), Ok(Some(Command::Quit)));
        assert!(Command::parse("years").is_err());
        assert!(Command::parse("plot").is_err());
    }

    #[test]
    fn run_then_clear_cache() {
        let (out, cached) = drive("run\nrun\nclear-cache\nquit\n");
        assert_eq!(out.matches("=== AAPL (synthetic) ===").count(), 2);
        assert_eq!(out.matches("(from cache)").count(), 1);
        assert!(out.contains("2025-12-31"));
        assert!(out.contains("Cleared cached stock data"));
        assert_eq!(cached, 0);
    }

    #[test]
    fn rejects_out_of_range_years() {
        let (out, _) = drive("years 5\nyears two\nyears 4\nstatus\n");
        assert!(out.contains("outside the allowed range 1..=4"));
        assert!(out.contains("'two' is not a number of years"));
        assert!(out.contains("Horizon 4 years (1460 days)"));
        assert!(out.contains("Horizon: 4 years"));
    }

    #[test]
    fn switching_ticker_caches_both() {
        let (out, cached) = drive("run\nticker gme\nrun\nstatus\ntickers\n");
        assert!(out.contains("Selected GME"));
        assert!(out.contains("Cache:   2 series [AAPL, GME]"));
        assert!(out.contains("MSFT"));
        assert_eq!(cached, 2);
    }
}
