//! Domain types shared by the providers, the cleaner, and the forecaster.

pub mod ids;
pub mod price;
pub mod ticker;

pub use ids::DatasetHash;
pub use price::{CleanPriceRow, ForecastPoint, TrainingPoint};
pub use ticker::{Horizon, HorizonError, Ticker, TickerError, DAYS_PER_YEAR};
