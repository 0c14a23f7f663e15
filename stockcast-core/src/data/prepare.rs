use crate::domain::{CleanPriceRow, TrainingPoint};

/// Project clean rows to forecaster input `(ds, y)`.
///
/// Points with a non-finite value are dropped again here since the forecaster
/// cannot recover from them.
pub fn prepare(rows: &[CleanPriceRow]) -> Vec<TrainingPoint> {
    let points: Vec<TrainingPoint> = rows
        .iter()
        .filter(|r| r.close.is_finite())
        .map(|r| TrainingPoint {
            ds: r.date,
            y: r.close,
        })
        .collect();

    if points.len() < rows.len() {
        tracing::warn!(
            dropped = rows.len() - points.len(),
            "dropped non-finite points before fitting"
        );
    }
    points
}
