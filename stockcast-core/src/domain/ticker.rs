//! Ticker symbols and forecast horizons.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Longest ticker we accept (index symbols like `^GSPC` and share classes
/// like `BRK-B` fit comfortably).
pub const MAX_TICKER_LEN: usize = 12;

/// Days per forecast year. Leap days are not counted.
pub const DAYS_PER_YEAR: u32 = 365;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TickerError {
    #[error("ticker is empty")]
    Empty,

    #[error("ticker '{0}' is longer than {max} characters", max = MAX_TICKER_LEN)]
    TooLong(String),

    #[error("ticker '{ticker}' contains invalid character '{ch}'")]
    InvalidChar { ticker: String, ch: char },
}

/// A validated, upper-cased ticker symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    pub fn new(raw: &str) -> Result<Self, TickerError> {
        let symbol = raw.trim().to_ascii_uppercase();
        if symbol.is_empty() {
            return Err(TickerError::Empty);
        }
        if symbol.len() > MAX_TICKER_LEN {
            return Err(TickerError::TooLong(symbol));
        }
        if let Some(ch) = symbol
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '=')))
        {
            return Err(TickerError::InvalidChar { ticker: symbol, ch });
        }
        Ok(Self(symbol))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Ticker {
    type Err = TickerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Ticker {
    type Error = TickerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Ticker> for String {
    fn from(ticker: Ticker) -> Self {
        ticker.0
    }
}

impl AsRef<str> for Ticker {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("forecast horizon of {years} year(s) is outside the allowed range {min}..={max}")]
pub struct HorizonError {
    pub years: u32,
    pub min: u32,
    pub max: u32,
}

/// Forecast horizon expressed in whole years, bounded by the caller's range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Horizon {
    years: u32,
}

impl Horizon {
    pub const MIN_YEARS: u32 = 1;
    pub const MAX_YEARS: u32 = 4;
    /// Hard upper bound for any configured range.
    pub const CEILING_YEARS: u32 = 100;

    /// Horizon within the default 1..=4 year range.
    pub fn from_years(years: u32) -> Result<Self, HorizonError> {
        Self::bounded(years, Self::MIN_YEARS, Self::MAX_YEARS)
    }

    /// Horizon within a configured range. `max` is clamped to [`Self::CEILING_YEARS`].
    pub fn bounded(years: u32, min: u32, max: u32) -> Result<Self, HorizonError> {
        let max = max.min(Self::CEILING_YEARS);
        if years < min || years > max {
            return Err(HorizonError { years, min, max });
        }
        Ok(Self { years })
    }

    pub fn years(&self) -> u32 {
        self.years
    }

    pub fn days(&self) -> u32 {
        self.years.saturating_mul(DAYS_PER_YEAR)
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plural = if self.years > 1 { "s" } else { "" };
        write!(f, "{} year{plural}", self.years)
    }
}
