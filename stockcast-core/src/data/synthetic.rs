//! Synthetic price data for offline runs and demos.
//!
//! Produces a seeded random walk from a starting price of 100.0 on weekdays.
//! The seed is derived from the ticker, so the same ticker always yields the
//! same table. Results are tagged `DataSource::Synthetic`.

use super::provider::{DataError, DataSource, FetchResult, MarketDataFetcher};
use super::raw::{ColumnLabel, RawTable, RawValue};
use crate::domain::Ticker;
use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, Default)]
pub struct SyntheticProvider;

impl SyntheticProvider {
    pub fn new() -> Self {
        Self
    }
}

impl MarketDataFetcher for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(
        &self,
        ticker: &Ticker,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        tracing::warn!(%ticker, "generating synthetic data, results are not real prices");
        Ok(FetchResult {
            ticker: ticker.clone(),
            table: generate_table(ticker, start, end),
            source: DataSource::Synthetic,
        })
    }
}

/// Random-walk table with the date as index and single-level labels.
pub fn generate_table(ticker: &Ticker, start: NaiveDate, end: NaiveDate) -> RawTable {
    // Deterministic seed from ticker name
    let seed = *blake3::hash(ticker.as_str().as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut dates = Vec::new();
    let mut open = Vec::new();
    let mut high = Vec::new();
    let mut low = Vec::new();
    let mut close = Vec::new();
    let mut volume = Vec::new();

    let mut price = 100.0_f64;
    let mut current = start;
    while current < end {
        if matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            current += chrono::Duration::days(1);
            continue;
        }

        let daily_return: f64 = rng.gen_range(-0.02..0.0205);
        let o = price;
        let c = price * (1.0 + daily_return);
        let h = o.max(c) * (1.0 + rng.gen_range(0.0..0.01));
        let l = o.min(c) * (1.0 - rng.gen_range(0.0..0.01));

        dates.push(RawValue::Date(current));
        open.push(RawValue::Number(o));
        high.push(RawValue::Number(h));
        low.push(RawValue::Number(l));
        close.push(RawValue::Number(c));
        volume.push(RawValue::Number(rng.gen_range(500_000..5_000_000u64) as f64));

        price = c;
        current += chrono::Duration::days(1);
    }

    RawTable::new()
        .with_index(Some("Date"), dates)
        .with_column(ColumnLabel::single("Open"), open)
        .with_column(ColumnLabel::single("High"), high)
        .with_column(ColumnLabel::single("Low"), low)
        .with_column(ColumnLabel::single("Close"), close)
        .with_column(ColumnLabel::single("Volume"), volume)
}
