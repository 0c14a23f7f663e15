//! Pipeline entry point: ticker -> clean history -> forecast.
//!
//! `run()` loads the clean series through the caller's [`PriceCache`],
//! prepares the training points, fits the engine and predicts over the
//! history plus `horizon_days`. Any failure aborts the request; there is no
//! partial output.

use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use polars::prelude::PolarsError;
use thiserror::Error;

use stockcast_core::data::{prepare, CleanError, CleanSeries, MarketDataFetcher, SchemaError};
use stockcast_core::domain::{ForecastPoint, Ticker};
use stockcast_core::forecast::{ForecastEngine, ForecastError};

use crate::cache::PriceCache;
use crate::data_loader::load_series;

/// Errors from a pipeline run. Every variant names the ticker.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The provider failed or returned nothing.
    #[error("Failed to load data for {ticker}: {detail}")]
    EmptyResult { ticker: Ticker, detail: String },

    #[error("Failed to load data for {ticker}: no valid rows after cleaning")]
    NoValidData { ticker: Ticker },

    #[error("Failed to load data for {ticker}: {source}")]
    Schema { ticker: Ticker, source: SchemaError },

    #[error("Failed to load data for {ticker}: {source}")]
    Frame { ticker: Ticker, source: PolarsError },

    #[error("Failed to load data for {ticker}: {source}")]
    Forecast { ticker: Ticker, source: ForecastError },

    #[error("Failed to load data for {ticker}: {detail}")]
    InvalidRequest { ticker: Ticker, detail: String },
}

impl PipelineError {
    /// Annotate a cleaner error with the ticker it was cleaning.
    pub fn from_clean(ticker: &Ticker, err: CleanError) -> Self {
        let ticker = ticker.clone();
        match err {
            CleanError::EmptyResult { .. } => PipelineError::EmptyResult {
                ticker,
                detail: "no data returned".into(),
            },
            CleanError::NoValidData { .. } => PipelineError::NoValidData { ticker },
            CleanError::Schema(source) => PipelineError::Schema { ticker, source },
            CleanError::Frame(source) => PipelineError::Frame { ticker, source },
        }
    }

    pub fn ticker(&self) -> &Ticker {
        match self {
            PipelineError::EmptyResult { ticker, .. }
            | PipelineError::NoValidData { ticker }
            | PipelineError::Schema { ticker, .. }
            | PipelineError::Frame { ticker, .. }
            | PipelineError::Forecast { ticker, .. }
            | PipelineError::InvalidRequest { ticker, .. } => ticker,
        }
    }

    /// Suggestion shown to the user under the error.
    pub fn hint(&self) -> &'static str {
        match self {
            PipelineError::InvalidRequest { .. } => {
                "Check the ticker, date range and horizon, then try again."
            }
            _ => "Try clearing the cached stock data and reloading.",
        }
    }
}

/// One forecast request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineRequest {
    pub ticker: Ticker,
    pub start_date: NaiveDate,
    /// Exclusive.
    pub end_date: NaiveDate,
    pub horizon_days: u32,
}

impl PipelineRequest {
    fn validate(&self) -> Result<(), PipelineError> {
        if self.start_date >= self.end_date {
            return Err(PipelineError::InvalidRequest {
                ticker: self.ticker.clone(),
                detail: format!(
                    "start date {} is not before end date {}",
                    self.start_date, self.end_date
                ),
            });
        }
        Ok(())
    }
}

/// History and forecast for one request. Neither is modified after return.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub history: Arc<CleanSeries>,
    /// Fitted history followed by the extrapolated horizon.
    pub forecast: Vec<ForecastPoint>,
    pub cache_hit: bool,
}

impl PipelineOutput {
    /// Forecast points strictly after the latest observed date. The forecast
    /// is in date order even when the history rows are not.
    pub fn future(&self) -> &[ForecastPoint] {
        let Some(last) = self.history.last_date() else {
            return &self.forecast;
        };
        let split = self.forecast.partition_point(|p| p.ds <= last);
        &self.forecast[split..]
    }

    pub fn forecast_tail(&self, n: usize) -> &[ForecastPoint] {
        &self.forecast[self.forecast.len().saturating_sub(n)..]
    }
}

/// Run one request: load (cached), prepare, fit, predict.
pub fn run(
    request: &PipelineRequest,
    cache: &PriceCache,
    fetcher: &dyn MarketDataFetcher,
    engine: &dyn ForecastEngine,
) -> Result<PipelineOutput, PipelineError> {
    request.validate()?;
    let ticker = &request.ticker;

    let started = Instant::now();
    let lookup = cache.get_or_load(ticker, || {
        load_series(fetcher, ticker, request.start_date, request.end_date)
    })?;
    tracing::debug!(
        %ticker,
        rows = lookup.series.len(),
        cache_hit = lookup.hit,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "history ready"
    );

    let fit_started = Instant::now();
    let points = prepare(&lookup.series.rows);
    let forecast_err = |source| PipelineError::Forecast {
        ticker: ticker.clone(),
        source,
    };
    let fitted = engine.fit(&points).map_err(forecast_err)?;
    let dates = fitted.make_future_dates(request.horizon_days);
    let forecast = fitted.predict(&dates).map_err(forecast_err)?;
    tracing::debug!(
        %ticker,
        engine = engine.name(),
        points = points.len(),
        horizon_days = request.horizon_days,
        elapsed_ms = fit_started.elapsed().as_millis() as u64,
        "forecast ready"
    );

    Ok(PipelineOutput {
        history: lookup.series,
        forecast,
        cache_hit: lookup.hit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aapl() -> Ticker {
        Ticker::new("AAPL").unwrap()
    }

    #[test]
    fn errors_are_labelled_with_ticker() {
        let err = PipelineError::EmptyResult {
            ticker: aapl(),
            detail: "symbol not found: AAPL".into(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to load data for AAPL: symbol not found: AAPL"
        );
        assert!(err.hint().contains("clearing"));

        let err = PipelineError::from_clean(&aapl(), CleanError::Schema(SchemaError::MissingColumn("date".into())));
        assert_eq!(err.to_string(), "Failed to load data for AAPL: Missing required column: date");
        assert_eq!(err.ticker(), &aapl());
    }

    #[test]
    fn clean_errors_map_to_matching_variants() {
        let t = aapl();
        assert!(matches!(
            PipelineError::from_clean(&t, CleanError::EmptyResult { ticker: t.clone() }),
            PipelineError::EmptyResult { .. }
        ));
        assert!(matches!(
            PipelineError::from_clean(&t, CleanError::NoValidData { ticker: t.clone() }),
            PipelineError::NoValidData { .. }
        ));
    }

    #[test]
    fn inverted_range_is_invalid_request() {
        let request = PipelineRequest {
            ticker: aapl(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            horizon_days: 365,
        };
        let err = request.validate().unwrap_err();
        assert!(matches!(err, PipelineError::InvalidRequest { .. }));
        assert!(err.hint().contains("date range"));
    }
}
