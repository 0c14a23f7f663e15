//! Integration tests for the pipeline and its price cache.
//!
//! A counting stub fetcher wraps the synthetic provider so tests can assert
//! exactly how many upstream fetches a sequence of requests caused.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Barrier;
use std::time::Duration;

use chrono::NaiveDate;
use stockcast_core::data::{
    ColumnLabel, DataError, DataSource, FetchResult, MarketDataFetcher, RawTable, RawValue,
    SyntheticProvider,
};
use stockcast_core::domain::{Horizon, Ticker};
use stockcast_core::forecast::{DecompositionForecaster, ForecastConfig};
use stockcast_runner::{
    load_summary, render_text, run, ForecastReport, PipelineError, PipelineRequest, PriceCache,
};

struct CountingFetcher {
    inner: SyntheticProvider,
    calls: AtomicUsize,
    delay: Duration,
}

impl CountingFetcher {
    fn new() -> Self {
        Self {
            inner: SyntheticProvider::new(),
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MarketDataFetcher for CountingFetcher {
    fn name(&self) -> &str {
        "counting"
    }

    fn fetch(
        &self,
        ticker: &Ticker,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.inner.fetch(ticker, start, end)
    }
}

/// Returns a table whose closes are all unparseable.
struct BadCloses {
    calls: AtomicUsize,
}

impl MarketDataFetcher for BadCloses {
    fn name(&self) -> &str {
        "bad_closes"
    }

    fn fetch(&self, ticker: &Ticker, _: NaiveDate, _: NaiveDate) -> Result<FetchResult, DataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let table = RawTable::new()
            .with_index(
                Some("Date"),
                vec![d(2024, 1, 2).into(), d(2024, 1, 3).into()],
            )
            .with_column(
                ColumnLabel::pair("Close", ticker.as_str()),
                vec![RawValue::Null, "n/a".into()],
            );
        Ok(FetchResult {
            ticker: ticker.clone(),
            table,
            source: DataSource::CsvImport,
        })
    }
}

/// Daily closes listed newest first, with one date repeated.
struct NewestFirst;

impl MarketDataFetcher for NewestFirst {
    fn name(&self) -> &str {
        "newest_first"
    }

    fn fetch(&self, ticker: &Ticker, _: NaiveDate, _: NaiveDate) -> Result<FetchResult, DataError> {
        let mut dates: Vec<NaiveDate> = (0..100)
            .rev()
            .map(|i| d(2024, 1, 1) + chrono::Duration::days(i))
            .collect();
        dates.push(d(2024, 2, 1));
        let closes: Vec<RawValue> = dates
            .iter()
            .map(|date| (100.0 + (*date - d(2024, 1, 1)).num_days() as f64).into())
            .collect();
        let table = RawTable::new()
            .with_index(Some("Date"), dates.into_iter().map(RawValue::from).collect())
            .with_column(ColumnLabel::pair("Close", ticker.as_str()), closes);
        Ok(FetchResult {
            ticker: ticker.clone(),
            table,
            source: DataSource::CsvImport,
        })
    }
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn request(ticker: &str, years: u32) -> PipelineRequest {
    PipelineRequest {
        ticker: Ticker::new(ticker).unwrap(),
        start_date: d(2023, 1, 1),
        end_date: d(2025, 1, 1),
        horizon_days: Horizon::from_years(years).unwrap().days(),
    }
}

fn engine() -> DecompositionForecaster {
    DecompositionForecaster::new(ForecastConfig::default())
}

#[test]
fn one_year_horizon_from_last_trading_day() {
    let cache = PriceCache::new();
    let fetcher = CountingFetcher::new();

    let output = run(&request("AAPL", 1), &cache, &fetcher, &engine()).unwrap();

    assert_eq!(output.history.last_date(), Some(d(2024, 12, 31)));
    assert_eq!(output.forecast.last().unwrap().ds, d(2025, 12, 31));
    assert_eq!(output.future().len(), 365);
    assert!(output.forecast.iter().all(|p| p.is_bracketed()));
    assert!(!output.cache_hit);
}

#[test]
fn repeat_request_is_served_from_cache() {
    let cache = PriceCache::new();
    let fetcher = CountingFetcher::new();

    let first = run(&request("MSFT", 1), &cache, &fetcher, &engine()).unwrap();
    let second = run(&request("MSFT", 2), &cache, &fetcher, &engine()).unwrap();

    assert_eq!(fetcher.calls(), 1);
    assert!(second.cache_hit);
    assert!(std::sync::Arc::ptr_eq(&first.history, &second.history));
    assert_eq!(second.future().len(), 730);
    assert_eq!(cache.stats().hits, 1);
}

#[test]
fn clearing_cache_forces_refetch() {
    let cache = PriceCache::new();
    let fetcher = CountingFetcher::new();

    run(&request("GOOG", 1), &cache, &fetcher, &engine()).unwrap();
    cache.invalidate_all();
    assert!(cache.is_empty());

    let output = run(&request("GOOG", 1), &cache, &fetcher, &engine()).unwrap();
    assert_eq!(fetcher.calls(), 2);
    assert!(!output.cache_hit);
}

#[test]
fn failed_load_is_not_cached() {
    let cache = PriceCache::new();
    let fetcher = BadCloses {
        calls: AtomicUsize::new(0),
    };

    for _ in 0..2 {
        let err = run(&request("GME", 1), &cache, &fetcher, &engine()).unwrap_err();
        assert!(matches!(err, PipelineError::NoValidData { .. }));
        assert_eq!(
            err.to_string(),
            "Failed to load data for GME: no valid rows after cleaning"
        );
    }
    assert!(cache.is_empty());
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn concurrent_requests_fetch_once() {
    let cache = PriceCache::new();
    let fetcher = CountingFetcher::slow(Duration::from_millis(50));
    let engine = engine();
    let threads = 6;
    let barrier = Barrier::new(threads);

    let hits: Vec<bool> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    run(&request("AAPL", 1), &cache, &fetcher, &engine)
                        .unwrap()
                        .cache_hit
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(fetcher.calls(), 1);
    assert_eq!(hits.iter().filter(|hit| !**hit).count(), 1);
    assert_eq!(cache.stats().loads, 1);
}

#[test]
fn tickers_are_cached_independently() {
    let cache = PriceCache::new();
    let fetcher = CountingFetcher::new();

    run(&request("AAPL", 1), &cache, &fetcher, &engine()).unwrap();
    run(&request("GME", 1), &cache, &fetcher, &engine()).unwrap();
    assert_eq!(cache.len(), 2);

    assert!(cache.invalidate(&Ticker::new("GME").unwrap()));
    assert!(cache.contains(&Ticker::new("AAPL").unwrap()));
    assert!(!cache.contains(&Ticker::new("GME").unwrap()));
}

#[test]
fn newest_first_history_reports_true_range_and_horizon() {
    let cache = PriceCache::new();
    let request = PipelineRequest {
        ticker: Ticker::new("AAPL").unwrap(),
        start_date: d(2024, 1, 1),
        end_date: d(2024, 6, 1),
        horizon_days: 30,
    };

    let output = run(&request, &cache, &NewestFirst, &engine()).unwrap();

    assert_eq!(output.history.len(), 101);
    assert_eq!(output.history.first_date(), Some(d(2024, 1, 1)));
    assert_eq!(output.history.last_date(), Some(d(2024, 4, 9)));
    assert_eq!(
        load_summary(&output.history),
        "Loaded 101 rows: 2024-01-01 → 2024-04-09"
    );

    let future = output.future();
    assert_eq!(future.len(), 30);
    assert_eq!(future[0].ds, d(2024, 4, 10));
    assert_eq!(future[29].ds, d(2024, 5, 9));

    let report = ForecastReport::from_output(&output);
    assert_eq!(report.horizon_days, 30);
    assert_eq!(report.last_date, Some(d(2024, 4, 9)));
    assert!(render_text(&output).contains("30 days ahead, 2024-05-09"));
}
