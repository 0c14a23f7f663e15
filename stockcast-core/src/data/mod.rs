//! Data acquisition and cleaning

pub mod circuit_breaker;
pub mod clean;
pub mod csv_import;
pub mod prepare;
pub mod provider;
pub mod raw;
pub mod schema;
pub mod synthetic;
pub mod yahoo;

pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use clean::{clean_fetch, CleanError, CleanOutput, CleanSeries, CleaningReport, DataCleaner};
pub use csv_import::CsvProvider;
pub use prepare::prepare;
pub use provider::{DataError, DataSource, FetchResult, MarketDataFetcher};
pub use raw::{ColumnLabel, RawColumn, RawTable, RawValue, RowIndex};
pub use schema::{date_from_epoch_days, epoch_days, PriceSchema, SchemaError};
pub use synthetic::SyntheticProvider;
pub use yahoo::{YahooProvider, YahooSettings};
