//! Text summaries and tail previews of a pipeline run.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use stockcast_core::data::{CleanSeries, CleaningReport, DataSource};
use stockcast_core::domain::{CleanPriceRow, ForecastPoint, Ticker};

use crate::pipeline::PipelineOutput;

/// Rows shown in each tail preview.
pub const PREVIEW_ROWS: usize = 5;

/// Serializable summary of one run, used for `--json` output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastReport {
    pub ticker: Ticker,
    pub source: DataSource,
    pub dataset_hash: String,
    pub cleaning: CleaningReport,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub cache_hit: bool,
    pub horizon_days: usize,
    pub history_tail: Vec<CleanPriceRow>,
    pub forecast_tail: Vec<ForecastPoint>,
    /// Last point of the horizon, if any was requested.
    pub final_point: Option<ForecastPoint>,
}

impl ForecastReport {
    pub fn from_output(output: &PipelineOutput) -> Self {
        let history = &output.history;
        Self {
            ticker: history.ticker.clone(),
            source: history.source,
            dataset_hash: history.dataset_hash.to_string(),
            cleaning: history.report,
            first_date: history.first_date(),
            last_date: history.last_date(),
            cache_hit: output.cache_hit,
            horizon_days: output.future().len(),
            history_tail: history.tail(PREVIEW_ROWS).to_vec(),
            forecast_tail: output.forecast_tail(PREVIEW_ROWS).to_vec(),
            final_point: output.future().last().copied(),
        }
    }
}

/// `Loaded N rows: first → last`
pub fn load_summary(series: &CleanSeries) -> String {
    match (series.first_date(), series.last_date()) {
        (Some(first), Some(last)) => {
            format!("Loaded {} rows: {} → {}", series.len(), first, last)
        }
        _ => format!("Loaded {} rows", series.len()),
    }
}

fn cell(value: Option<f64>, width: usize, precision: usize) -> String {
    match value {
        Some(v) => format!("{:>width$.precision$}", v),
        None => format!("{:>width$}", "-"),
    }
}

/// Fixed-width table of the last [`PREVIEW_ROWS`] history rows.
pub fn history_table(series: &CleanSeries) -> String {
    let mut out = format!(
        "{:<12} {:>10} {:>10} {:>10} {:>10} {:>14}\n",
        "date", "open", "high", "low", "close", "volume"
    );
    out.push_str(&"-".repeat(71));
    out.push('\n');
    for row in series.tail(PREVIEW_ROWS) {
        out.push_str(&format!(
            "{:<12} {} {} {} {:>10.2} {}\n",
            row.date,
            cell(row.open, 10, 2),
            cell(row.high, 10, 2),
            cell(row.low, 10, 2),
            row.close,
            cell(row.volume, 14, 0),
        ));
    }
    out
}

/// Fixed-width table of forecast points: `ds, yhat, yhat_lower, yhat_upper`.
pub fn forecast_table(points: &[ForecastPoint]) -> String {
    let mut out = format!(
        "{:<12} {:>12} {:>12} {:>12}\n",
        "ds", "yhat", "yhat_lower", "yhat_upper"
    );
    out.push_str(&"-".repeat(51));
    out.push('\n');
    for p in points {
        out.push_str(&format!(
            "{:<12} {:>12.2} {:>12.2} {:>12.2}\n",
            p.ds, p.yhat, p.yhat_lower, p.yhat_upper
        ));
    }
    out
}

fn cleaning_line(report: &CleaningReport) -> Option<String> {
    if report.dropped() == 0 {
        return None;
    }
    Some(format!(
        "Dropped {} of {} rows ({} invalid dates, {} invalid closes)",
        report.dropped(),
        report.input_rows,
        report.invalid_dates,
        report.invalid_closes
    ))
}

/// Full text report: load summary, history preview, forecast preview.
pub fn render_text(output: &PipelineOutput) -> String {
    let history = &output.history;
    let mut out = String::with_capacity(2048);

    out.push_str(&format!("=== {} ({}) ===\n", history.ticker, history.source));
    out.push_str(&load_summary(history));
    out.push('\n');
    if let Some(line) = cleaning_line(&history.report) {
        out.push_str(&line);
        out.push('\n');
    }
    if history.source == DataSource::Synthetic {
        out.push_str("Data is SYNTHETIC\n");
    }
    if output.cache_hit {
        out.push_str("(from cache)\n");
    }

    out.push_str("\nRaw data (tail)\n");
    out.push_str(&history_table(history));

    out.push_str("\nForecast data (tail)\n");
    out.push_str(&forecast_table(output.forecast_tail(PREVIEW_ROWS)));

    if let Some(last) = output.future().last() {
        out.push_str(&format!(
            "\n{} days ahead, {}: {:.2} [{:.2}, {:.2}]\n",
            output.future().len(),
            last.ds,
            last.yhat,
            last.yhat_lower,
            last.yhat_upper
        ));
    }
    out
}
