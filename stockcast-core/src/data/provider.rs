//! Market data fetcher trait and structured error types.
//!
//! The MarketDataFetcher trait abstracts over data sources (Yahoo Finance,
//! CSV exports, synthetic data) so the pipeline can swap implementations and
//! tests can count calls.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::raw::RawTable;
use crate::domain::Ticker;

/// Structured error types for data acquisition.
///
/// These are designed to be displayable in both one-shot and session contexts.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("csv import error: {0}")]
    Csv(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("data error: {0}")]
    Other(String),
}

/// Where a table came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    YahooFinance,
    CsvImport,
    Synthetic,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataSource::YahooFinance => "yahoo_finance",
            DataSource::CsvImport => "csv_import",
            DataSource::Synthetic => "synthetic",
        };
        f.write_str(name)
    }
}

/// Result of a successful fetch for a single ticker.
///
/// The table may still be empty: some upstream clients report "no data"
/// that way instead of failing.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub ticker: Ticker,
    pub table: RawTable,
    pub source: DataSource,
}

/// Trait for market data fetchers (Yahoo Finance, CSV import, etc).
///
/// Implementations handle the specifics of one source. The price cache sits
/// above this trait, so fetchers don't know about it.
pub trait MarketDataFetcher: Send + Sync {
    /// Human-readable name of this fetcher.
    fn name(&self) -> &str;

    /// Fetch the daily price table for a ticker over a date range.
    fn fetch(
        &self,
        ticker: &Ticker,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError>;

    /// Check if the fetcher is currently usable (not rate-limited, not blocked).
    fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_source_display_is_snake_case() {
        assert_eq!(DataSource::YahooFinance.to_string(), "yahoo_finance");
        assert_eq!(DataSource::CsvImport.to_string(), "csv_import");
    }

    #[test]
    fn errors_render_detail() {
        let err = DataError::SymbolNotFound {
            symbol: "ZZZZ".into(),
        };
        assert_eq!(err.to_string(), "symbol not found: ZZZZ");
        assert!(DataError::CircuitBreakerTripped
            .to_string()
            .contains("circuit breaker"));
    }
}
