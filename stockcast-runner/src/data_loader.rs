//! Fetcher selection and the fetch-and-clean step behind the price cache.

use std::sync::Arc;

use chrono::NaiveDate;
use stockcast_core::data::{
    clean_fetch, CleanSeries, CsvProvider, MarketDataFetcher, SyntheticProvider, YahooProvider,
};
use stockcast_core::domain::Ticker;

use crate::config::{AppConfig, ConfigError, SourceKind};
use crate::pipeline::PipelineError;

/// Build the fetcher for `source`, using the provider and data settings in `config`.
pub fn build_fetcher(
    config: &AppConfig,
    source: SourceKind,
) -> Result<Box<dyn MarketDataFetcher>, ConfigError> {
    match source {
        SourceKind::Yahoo => {
            let breaker = Arc::new(config.provider.circuit_breaker());
            let provider = YahooProvider::new(breaker, config.provider.yahoo_settings())
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
            Ok(Box::new(provider))
        }
        SourceKind::Csv => {
            let path = config.data.csv_path.as_ref().ok_or_else(|| {
                ConfigError::Invalid("a CSV path is required for the csv source".into())
            })?;
            Ok(Box::new(CsvProvider::new(path)))
        }
        SourceKind::Synthetic => Ok(Box::new(SyntheticProvider::new())),
    }
}

/// Fetch one ticker and clean it. Provider failures and empty tables both
/// surface as `EmptyResult` carrying the provider's detail.
pub fn load_series(
    fetcher: &dyn MarketDataFetcher,
    ticker: &Ticker,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<CleanSeries, PipelineError> {
    if !fetcher.is_available() {
        return Err(PipelineError::EmptyResult {
            ticker: ticker.clone(),
            detail: format!("{} is not accepting requests right now", fetcher.name()),
        });
    }

    let fetch = fetcher
        .fetch(ticker, start, end)
        .map_err(|e| PipelineError::EmptyResult {
            ticker: ticker.clone(),
            detail: e.to_string(),
        })?;

    if fetch.table.is_empty() {
        return Err(PipelineError::EmptyResult {
            ticker: ticker.clone(),
            detail: "no data returned".into(),
        });
    }

    let series = clean_fetch(&fetch).map_err(|e| PipelineError::from_clean(ticker, e))?;
    tracing::info!(
        %ticker,
        source = %series.source,
        rows = series.len(),
        dropped = series.report.dropped(),
        hash = series.dataset_hash.short(),
        "loaded price history"
    );
    Ok(series)
}
