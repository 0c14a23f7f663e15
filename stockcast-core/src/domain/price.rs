//! Price rows at each stage of the pipeline: cleaned history, model input,
//! and model output.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One trading day after cleaning.
///
/// `date` and `close` are guaranteed present and valid. The remaining fields
/// are carried through for display and may be missing if the source had
/// unparseable values there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanPriceRow {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: f64,
    pub volume: Option<f64>,
}

impl CleanPriceRow {
    /// Row with only the required fields set.
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            open: None,
            high: None,
            low: None,
            close,
            volume: None,
        }
    }
}

/// Forecaster input: `(ds, y)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingPoint {
    pub ds: NaiveDate,
    pub y: f64,
}

/// Forecaster output for one date.
///
/// `yhat = trend + yearly + weekly`, bracketed by `yhat_lower <= yhat <= yhat_upper`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub ds: NaiveDate,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
    pub trend: f64,
    pub yearly: f64,
    pub weekly: f64,
}

impl ForecastPoint {
    /// True when the point estimate sits inside its band.
    pub fn is_bracketed(&self) -> bool {
        self.yhat_lower <= self.yhat && self.yhat <= self.yhat_upper
    }
}
