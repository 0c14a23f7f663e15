//! Forecasting: a fit step over `(ds, y)` points and a predict step over dates.
//!
//! The pipeline only sees the [`ForecastEngine`] and [`FittedForecast`]
//! traits. [`DecompositionForecaster`] is the engine shipped here.

pub mod decomposition;
mod linalg;

pub use decomposition::DecompositionForecaster;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{ForecastPoint, TrainingPoint};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForecastError {
    #[error("insufficient data: need at least {need} points, got {got}")]
    InsufficientData { got: usize, need: usize },

    #[error("training data spans a single day")]
    ZeroSpan,

    #[error("non-finite value in training data at {0}")]
    NonFiniteInput(NaiveDate),

    #[error("model fit failed: singular system")]
    Singular,

    #[error("invalid forecast config: {0}")]
    InvalidConfig(String),
}

/// Settings for the decomposition forecaster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Fourier order of the yearly seasonality.
    pub yearly_order: usize,
    /// Fourier order of the weekly seasonality.
    pub weekly_order: usize,
    /// Probability mass inside the uncertainty band.
    pub interval_width: f64,
    /// Ridge penalty on everything but the intercept.
    pub ridge: f64,
    pub min_points: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            yearly_order: 10,
            weekly_order: 3,
            interval_width: 0.80,
            ridge: 1e-6,
            min_points: 2,
        }
    }
}

impl ForecastConfig {
    pub fn validate(&self) -> Result<(), ForecastError> {
        if !(self.interval_width > 0.0 && self.interval_width < 1.0) {
            return Err(ForecastError::InvalidConfig(format!(
                "interval_width must be in (0, 1), got {}",
                self.interval_width
            )));
        }
        if !(self.ridge >= 0.0 && self.ridge.is_finite()) {
            return Err(ForecastError::InvalidConfig(format!(
                "ridge must be finite and non-negative, got {}",
                self.ridge
            )));
        }
        if self.min_points < 2 {
            return Err(ForecastError::InvalidConfig(format!(
                "min_points must be at least 2, got {}",
                self.min_points
            )));
        }
        Ok(())
    }
}

/// A forecasting model that can be fitted to a training series.
pub trait ForecastEngine: Send + Sync {
    fn name(&self) -> &str;

    fn fit(&self, points: &[TrainingPoint]) -> Result<Box<dyn FittedForecast>, ForecastError>;
}

/// A fitted model, ready to predict.
pub trait FittedForecast: Send + Sync {
    /// History dates followed by `horizon_days` daily dates past the last one.
    fn make_future_dates(&self, horizon_days: u32) -> Vec<NaiveDate>;

    fn predict(&self, dates: &[NaiveDate]) -> Result<Vec<ForecastPoint>, ForecastError>;
}
