//! Yahoo Finance market data fetcher.
//!
//! Fetches daily prices from Yahoo's v8 chart API and returns them in the
//! shape the upstream Python client produces: the trading date as the row
//! index and `(field, ticker)` column labels. Handles retries with
//! exponential backoff and the circuit breaker.
//!
//! Yahoo Finance has no official API and is subject to unannounced format
//! changes. The CSV fetcher is the fallback when Yahoo is unavailable.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, DataSource, FetchResult, MarketDataFetcher};
use super::raw::{ColumnLabel, RawTable, RawValue};
use crate::domain::Ticker;
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

/// Longest single wait between attempts, including a server's `Retry-After`.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Wait before retry number `attempt` (1-based). Exponential backoff from
/// `base`, raised to the server's `Retry-After` after a 429, capped at
/// [`MAX_RETRY_DELAY`].
fn retry_delay(base: Duration, attempt: u32, previous: Option<&DataError>) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    let backoff = base.saturating_mul(factor);
    let delay = match previous {
        Some(DataError::RateLimited { retry_after_secs }) => {
            backoff.max(Duration::from_secs(*retry_after_secs))
        }
        _ => backoff,
    };
    delay.min(MAX_RETRY_DELAY)
}

/// Network settings for the Yahoo fetcher.
#[derive(Debug, Clone)]
pub struct YahooSettings {
    pub timeout: Duration,
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for YahooSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    settings: YahooSettings,
}

impl YahooProvider {
    pub fn new(
        circuit_breaker: Arc<CircuitBreaker>,
        settings: YahooSettings,
    ) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            settings,
        })
    }

    /// Build the chart API URL for a ticker and date range.
    fn chart_url(ticker: &Ticker, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        // The end date is exclusive, matching the upstream client.
        let end_ts = end.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        let symbol = ticker.as_str().replace('^', "%5E").replace('=', "%3D");
        format!(
            "https://query2.finance.yahoo.com/v8/finance/chart/{symbol}\
             ?period1={start_ts}&period2={end_ts}&interval=1d\
             &includeAdjustedClose=true&events=div%2Csplits"
        )
    }

    /// Parse the chart API response into a raw table.
    fn parse_response(ticker: &Ticker, resp: ChartResponse) -> Result<RawTable, DataError> {
        let result = match resp.chart.result {
            Some(result) => result,
            None => {
                return Err(match resp.chart.error {
                    Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
                        symbol: ticker.to_string(),
                    },
                    Some(err) => DataError::ResponseFormatChanged(format!(
                        "{}: {}",
                        err.code, err.description
                    )),
                    None => DataError::ResponseFormatChanged("empty result with no error".into()),
                })
            }
        };

        let Some(data) = result.into_iter().next() else {
            return Ok(RawTable::new());
        };

        // No timestamps means no trading days in range: an empty table, not an error.
        let Some(timestamps) = data.timestamp else {
            return Ok(RawTable::new());
        };

        let quote = data.indicators.quote.into_iter().next().unwrap_or_default();
        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose)
            .unwrap_or_default();

        let cell = |values: &[Option<f64>], i: usize| values.get(i).copied().flatten();

        let mut dates = Vec::with_capacity(timestamps.len());
        let mut open = Vec::with_capacity(timestamps.len());
        let mut high = Vec::with_capacity(timestamps.len());
        let mut low = Vec::with_capacity(timestamps.len());
        let mut close = Vec::with_capacity(timestamps.len());
        let mut adj_close = Vec::with_capacity(timestamps.len());
        let mut volume = Vec::with_capacity(timestamps.len());

        for (i, &ts) in timestamps.iter().enumerate() {
            let row = [
                cell(&quote.open, i),
                cell(&quote.high, i),
                cell(&quote.low, i),
                cell(&quote.close, i),
                cell(&quote.volume, i),
            ];

            // Skip rows where all fields are missing (holidays/non-trading days)
            if row.iter().all(Option::is_none) {
                continue;
            }

            // An unrepresentable timestamp stays in the table as a null date;
            // the cleaner counts and drops it.
            dates.push(
                chrono::DateTime::from_timestamp(ts, 0)
                    .map(|dt| RawValue::Date(dt.date_naive()))
                    .unwrap_or(RawValue::Null),
            );
            open.push(RawValue::from(row[0]));
            high.push(RawValue::from(row[1]));
            low.push(RawValue::from(row[2]));
            close.push(RawValue::from(row[3]));
            volume.push(RawValue::from(row[4]));
            adj_close.push(RawValue::from(cell(&adj_closes, i)));
        }

        let symbol = ticker.as_str();
        Ok(RawTable::new()
            .with_index(Some("Date"), dates)
            .with_column(ColumnLabel::pair("Adj Close", symbol), adj_close)
            .with_column(ColumnLabel::pair("Close", symbol), close)
            .with_column(ColumnLabel::pair("High", symbol), high)
            .with_column(ColumnLabel::pair("Low", symbol), low)
            .with_column(ColumnLabel::pair("Open", symbol), open)
            .with_column(ColumnLabel::pair("Volume", symbol), volume))
    }

    /// Execute the HTTP request with retry and circuit breaker logic.
    fn fetch_with_retry(
        &self,
        ticker: &Ticker,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RawTable, DataError> {
        if !self.circuit_breaker.is_allowed() {
            tracing::warn!(
                %ticker,
                cooldown_remaining_secs = self.circuit_breaker.remaining_cooldown().as_secs(),
                "yahoo request blocked by circuit breaker"
            );
            return Err(DataError::CircuitBreakerTripped);
        }

        let url = Self::chart_url(ticker, start, end);
        let mut last_error = None;

        for attempt in 0..=self.settings.max_retries {
            if attempt > 0 {
                let delay = retry_delay(self.settings.base_delay, attempt, last_error.as_ref());
                tracing::debug!(%ticker, attempt, delay_ms = delay.as_millis() as u64, "retrying yahoo request");
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            let resp = match self.client.get(&url).send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                    continue;
                }
                Err(e) => return Err(DataError::NetworkUnreachable(e.to_string())),
            };

            let status = resp.status();

            if status == reqwest::StatusCode::FORBIDDEN {
                self.circuit_breaker.trip();
                return Err(DataError::CircuitBreakerTripped);
            }

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                self.circuit_breaker.record_failure();
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                last_error = Some(DataError::RateLimited {
                    retry_after_secs: retry_after,
                });
                continue;
            }

            if status == reqwest::StatusCode::UNAUTHORIZED {
                return Err(DataError::AuthenticationRequired(
                    "Yahoo Finance requires authentication".into(),
                ));
            }

            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(DataError::SymbolNotFound {
                    symbol: ticker.to_string(),
                });
            }

            if !status.is_success() {
                self.circuit_breaker.record_failure();
                last_error = Some(DataError::Other(format!("HTTP {status} for {ticker}")));
                continue;
            }

            let chart: ChartResponse = resp.json().map_err(|e| {
                DataError::ResponseFormatChanged(format!(
                    "failed to parse response for {ticker}: {e}"
                ))
            })?;

            let table = Self::parse_response(ticker, chart)?;
            self.circuit_breaker.record_success();
            return Ok(table);
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

impl MarketDataFetcher for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(
        &self,
        ticker: &Ticker,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        tracing::info!(%ticker, %start, %end, "fetching from yahoo finance");
        let table = self.fetch_with_retry(ticker, start, end)?;
        tracing::info!(%ticker, rows = table.row_count(), "yahoo fetch complete");
        Ok(FetchResult {
            ticker: ticker.clone(),
            table,
            source: DataSource::YahooFinance,
        })
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}
