//! In-memory price cache keyed by ticker.
//!
//! Holds cleaned series for the lifetime of the owner (a CLI run or an
//! interactive session). There is no eviction and no TTL; the operator clears
//! it explicitly. The key is the ticker alone, so a request with a different
//! date range is served the series loaded first.
//!
//! Population takes a per-ticker load lock, so concurrent callers for the same
//! ticker run the loader at most once and later callers get the stored series.
//! Failed loads are not stored.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use stockcast_core::data::CleanSeries;
use stockcast_core::domain::Ticker;

/// Counters since the cache was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Loader calls that succeeded and were stored.
    pub loads: u64,
}

/// Result of a cache lookup.
#[derive(Debug, Clone)]
pub struct CacheLookup {
    pub series: Arc<CleanSeries>,
    pub hit: bool,
}

#[derive(Debug, Default)]
struct Entries {
    series: HashMap<Ticker, Arc<CleanSeries>>,
    /// Bumped by every invalidation; a load that started under an older
    /// generation is not stored.
    generation: u64,
}

#[derive(Debug, Default)]
pub struct PriceCache {
    entries: Mutex<Entries>,
    load_locks: Mutex<HashMap<Ticker, Arc<Mutex<()>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached series for `ticker`, or run `loader` and store its result.
    pub fn get_or_load<E>(
        &self,
        ticker: &Ticker,
        loader: impl FnOnce() -> Result<CleanSeries, E>,
    ) -> Result<CacheLookup, E> {
        if let Some(series) = self.get(ticker) {
            return Ok(self.hit(ticker, series));
        }

        let key_lock = Arc::clone(lock(&self.load_locks).entry(ticker.clone()).or_default());
        let _loading = lock(&key_lock);

        // Another caller may have stored it while we waited.
        if let Some(series) = self.get(ticker) {
            return Ok(self.hit(ticker, series));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let generation = lock(&self.entries).generation;
        tracing::debug!(%ticker, "price cache miss, loading");

        let series = Arc::new(loader()?);

        let mut entries = lock(&self.entries);
        if entries.generation == generation {
            entries.series.insert(ticker.clone(), Arc::clone(&series));
            self.loads.fetch_add(1, Ordering::Relaxed);
        } else {
            tracing::debug!(%ticker, "cache invalidated during load, result not stored");
        }
        Ok(CacheLookup { series, hit: false })
    }

    pub fn get(&self, ticker: &Ticker) -> Option<Arc<CleanSeries>> {
        lock(&self.entries).series.get(ticker).cloned()
    }

    fn hit(&self, ticker: &Ticker, series: Arc<CleanSeries>) -> CacheLookup {
        self.hits.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(%ticker, rows = series.len(), "price cache hit");
        CacheLookup { series, hit: true }
    }

    /// Drop every cached series.
    pub fn invalidate_all(&self) {
        let mut entries = lock(&self.entries);
        let dropped = entries.series.len();
        entries.series.clear();
        entries.generation += 1;
        tracing::info!(dropped, "price cache cleared");
    }

    /// Drop one ticker. Returns true if it was cached.
    pub fn invalidate(&self, ticker: &Ticker) -> bool {
        let mut entries = lock(&self.entries);
        entries.generation += 1;
        let removed = entries.series.remove(ticker).is_some();
        tracing::info!(%ticker, removed, "price cache entry invalidated");
        removed
    }

    pub fn contains(&self, ticker: &Ticker) -> bool {
        lock(&self.entries).series.contains_key(ticker)
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached tickers, sorted.
    pub fn tickers(&self) -> Vec<Ticker> {
        let mut tickers: Vec<Ticker> = lock(&self.entries).series.keys().cloned().collect();
        tickers.sort();
        tickers
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use stockcast_core::data::{CleanOutput, CleaningReport, DataSource};
    use stockcast_core::domain::CleanPriceRow;

    fn ticker(s: &str) -> Ticker {
        Ticker::new(s).unwrap()
    }

    fn series(t: &Ticker, close: f64) -> CleanSeries {
        let rows = vec![CleanPriceRow::new(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), close)];
        CleanSeries::new(
            t.clone(),
            DataSource::Synthetic,
            CleanOutput {
                rows,
                report: CleaningReport {
                    input_rows: 1,
                    invalid_dates: 0,
                    invalid_closes: 0,
                    output_rows: 1,
                },
            },
        )
    }

    #[test]
    fn second_lookup_hits() {
        let cache = PriceCache::new();
        let t = ticker("AAPL");
        let first = cache
            .get_or_load(&t, || Ok::<_, String>(series(&t, 1.0)))
            .unwrap();
        assert!(!first.hit);

        let second = cache
            .get_or_load(&t, || -> Result<CleanSeries, String> { panic!("loader ran twice") })
            .unwrap();
        assert!(second.hit);
        assert!(Arc::ptr_eq(&first.series, &second.series));
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1, loads: 1 });
    }

    #[test]
    fn failed_load_is_not_stored() {
        let cache = PriceCache::new();
        let t = ticker("GME");
        let err = cache.get_or_load(&t, || Err::<CleanSeries, _>("boom")).unwrap_err();
        assert_eq!(err, "boom");
        assert!(cache.is_empty());
        assert!(!cache.contains(&t));

        let ok = cache.get_or_load(&t, || Ok::<_, &str>(series(&t, 2.0))).unwrap();
        assert!(!ok.hit);
        assert_eq!(cache.stats().loads, 1);
    }

    #[test]
    fn invalidate_all_forces_reload() {
        let cache = PriceCache::new();
        let a = ticker("AAPL");
        let m = ticker("MSFT");
        cache.get_or_load(&a, || Ok::<_, ()>(series(&a, 1.0))).unwrap();
        cache.get_or_load(&m, || Ok::<_, ()>(series(&m, 1.0))).unwrap();
        assert_eq!(cache.tickers(), vec![a.clone(), m.clone()]);

        cache.invalidate_all();
        assert!(cache.is_empty());
        let again = cache.get_or_load(&a, || Ok::<_, ()>(series(&a, 3.0))).unwrap();
        assert!(!again.hit);
        assert_eq!(again.series.rows[0].close, 3.0);
    }

    #[test]
    fn invalidate_one_ticker() {
        let cache = PriceCache::new();
        let a = ticker("AAPL");
        let g = ticker("GOOG");
        cache.get_or_load(&a, || Ok::<_, ()>(series(&a, 1.0))).unwrap();
        cache.get_or_load(&g, || Ok::<_, ()>(series(&g, 1.0))).unwrap();
        assert!(cache.invalidate(&a));
        assert!(!cache.invalidate(&a));
        assert!(!cache.contains(&a));
        assert!(cache.contains(&g));
    }

    #[test]
    fn load_racing_an_invalidation_is_dropped() {
        let cache = PriceCache::new();
        let t = ticker("AAPL");
        let lookup = cache
            .get_or_load(&t, || {
                cache.invalidate_all();
                Ok::<_, ()>(series(&t, 1.0))
            })
            .unwrap();
        assert!(!lookup.hit);
        assert!(!cache.contains(&t));
    }
}
