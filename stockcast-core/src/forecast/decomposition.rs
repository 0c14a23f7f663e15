//! Additive trend + seasonality forecaster.
//!
//! `y(d) = trend(d) + yearly(d) + weekly(d)` where the trend is linear in time
//! scaled to `[0, 1]` over the training span and each seasonality is a Fourier
//! series on calendar days. Coefficients come from one ridge least-squares
//! solve on `y` scaled by its largest magnitude.
//!
//! A seasonality is only modelled when the history covers at least two of its
//! periods. The uncertainty band is the in-sample residual spread scaled by
//! the normal quantile for `interval_width`, widening with the square root of
//! the distance past the last observation.

use chrono::{Duration, NaiveDate};
use std::f64::consts::TAU;

use super::linalg::{normal_quantile, ridge_least_squares};
use super::{FittedForecast, ForecastConfig, ForecastEngine, ForecastError};
use crate::data::schema::epoch_days;
use crate::domain::{ForecastPoint, TrainingPoint, DAYS_PER_YEAR};

const YEARLY_PERIOD: f64 = 365.25;
const WEEKLY_PERIOD: f64 = 7.0;

#[derive(Debug, Clone, Default)]
pub struct DecompositionForecaster {
    config: ForecastConfig,
}

impl DecompositionForecaster {
    pub fn new(config: ForecastConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Fit and return the concrete model.
    pub fn fit_model(&self, points: &[TrainingPoint]) -> Result<DecompositionModel, ForecastError> {
        self.config.validate()?;
        if points.len() < self.config.min_points {
            return Err(ForecastError::InsufficientData {
                got: points.len(),
                need: self.config.min_points,
            });
        }
        if let Some(bad) = points.iter().find(|p| !p.y.is_finite()) {
            return Err(ForecastError::NonFiniteInput(bad.ds));
        }

        let mut history: Vec<NaiveDate> = points.iter().map(|p| p.ds).collect();
        history.sort_unstable();
        history.dedup();
        let (start, last) = match (history.first(), history.last()) {
            (Some(&s), Some(&l)) => (s, l),
            _ => {
                return Err(ForecastError::InsufficientData {
                    got: 0,
                    need: self.config.min_points,
                })
            }
        };
        let span_days = (last - start).num_days() as f64;
        if span_days <= 0.0 {
            return Err(ForecastError::ZeroSpan);
        }

        let yearly_order = seasonal_order(self.config.yearly_order, YEARLY_PERIOD, span_days);
        let weekly_order = seasonal_order(self.config.weekly_order, WEEKLY_PERIOD, span_days);

        let y_scale = points
            .iter()
            .map(|p| p.y.abs())
            .fold(0.0_f64, f64::max);
        let y_scale = if y_scale > 0.0 { y_scale } else { 1.0 };

        let mut model = DecompositionModel {
            history,
            start,
            last,
            span_days,
            y_scale,
            yearly_order,
            weekly_order,
            coef: Vec::new(),
            sigma: 0.0,
            z: normal_quantile(0.5 + self.config.interval_width / 2.0),
        };

        let design: Vec<Vec<f64>> = points.iter().map(|p| model.features(p.ds)).collect();
        let scaled: Vec<f64> = points.iter().map(|p| p.y / y_scale).collect();
        model.coef = ridge_least_squares(&design, &scaled, self.config.ridge, 1)
            .ok_or(ForecastError::Singular)?;

        let ss: f64 = design
            .iter()
            .zip(&scaled)
            .map(|(row, y)| {
                let fitted: f64 = row.iter().zip(&model.coef).map(|(x, c)| x * c).sum();
                (y - fitted).powi(2)
            })
            .sum();
        let dof = points.len().saturating_sub(model.coef.len()).max(1);
        model.sigma = (ss / dof as f64).sqrt() * y_scale;

        tracing::debug!(
            points = points.len(),
            span_days,
            yearly_order,
            weekly_order,
            sigma = model.sigma,
            "fitted decomposition model"
        );
        Ok(model)
    }
}

impl ForecastEngine for DecompositionForecaster {
    fn name(&self) -> &str {
        "decomposition"
    }

    fn fit(&self, points: &[TrainingPoint]) -> Result<Box<dyn FittedForecast>, ForecastError> {
        Ok(Box::new(self.fit_model(points)?))
    }
}

/// Order actually used for a seasonality: zero unless the span covers two periods.
fn seasonal_order(order: usize, period: f64, span_days: f64) -> usize {
    if span_days >= 2.0 * period {
        order
    } else {
        0
    }
}

#[derive(Debug, Clone)]
pub struct DecompositionModel {
    history: Vec<NaiveDate>,
    start: NaiveDate,
    last: NaiveDate,
    span_days: f64,
    y_scale: f64,
    yearly_order: usize,
    weekly_order: usize,
    /// `[intercept, slope, yearly (sin, cos) * order, weekly (sin, cos) * order]`
    coef: Vec<f64>,
    sigma: f64,
    z: f64,
}

impl DecompositionModel {
    pub fn includes_yearly(&self) -> bool {
        self.yearly_order > 0
    }

    pub fn includes_weekly(&self) -> bool {
        self.weekly_order > 0
    }

    /// Residual standard deviation in price units.
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn last_date(&self) -> NaiveDate {
        self.last
    }

    fn features(&self, date: NaiveDate) -> Vec<f64> {
        let t = (date - self.start).num_days() as f64 / self.span_days;
        let day = f64::from(epoch_days(date));

        let mut row = Vec::with_capacity(2 + 2 * (self.yearly_order + self.weekly_order));
        row.push(1.0);
        row.push(t);
        push_fourier(&mut row, day, YEARLY_PERIOD, self.yearly_order);
        push_fourier(&mut row, day, WEEKLY_PERIOD, self.weekly_order);
        row
    }

    fn point(&self, date: NaiveDate) -> ForecastPoint {
        let row = self.features(date);
        let term = |range: std::ops::Range<usize>| -> f64 {
            range.map(|i| row[i] * self.coef[i]).sum::<f64>() * self.y_scale
        };
        let yearly_end = 2 + 2 * self.yearly_order;
        let trend = term(0..2);
        let yearly = term(2..yearly_end);
        let weekly = term(yearly_end..row.len());
        let yhat = trend + yearly + weekly;

        let days_past = (date - self.last).num_days().max(0) as f64;
        let half_width =
            self.z * self.sigma * (1.0 + days_past / f64::from(DAYS_PER_YEAR)).sqrt();

        ForecastPoint {
            ds: date,
            yhat,
            yhat_lower: yhat - half_width,
            yhat_upper: yhat + half_width,
            trend,
            yearly,
            weekly,
        }
    }
}

fn push_fourier(row: &mut Vec<f64>, day: f64, period: f64, order: usize) {
    for k in 1..=order {
        let angle = TAU * k as f64 * day / period;
        row.push(angle.sin());
        row.push(angle.cos());
    }
}

impl FittedForecast for DecompositionModel {
    fn make_future_dates(&self, horizon_days: u32) -> Vec<NaiveDate> {
        let mut dates = Vec::with_capacity(self.history.len() + horizon_days as usize);
        dates.extend_from_slice(&self.history);
        dates.extend((1..=i64::from(horizon_days)).map(|k| self.last + Duration::days(k)));
        dates
    }

    fn predict(&self, dates: &[NaiveDate]) -> Result<Vec<ForecastPoint>, ForecastError> {
        Ok(dates.iter().map(|&d| self.point(d)).collect())
    }
}
