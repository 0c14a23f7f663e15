//! Export of history and forecast tables.
//!
//! - **CSV**: via the `csv` crate, one file per table
//! - **Parquet**: via polars, chosen when the target path ends in `.parquet`
//! - **JSON**: the [`ForecastReport`] summary
//!
//! `save_outputs(path)` writes `{stem}_history.{ext}` and
//! `{stem}_forecast.{ext}` next to `path`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use polars::prelude::*;

use stockcast_core::data::{epoch_days, CleanSeries};
use stockcast_core::domain::{CleanPriceRow, ForecastPoint};

use crate::pipeline::PipelineOutput;
use crate::report::ForecastReport;

/// Output format, picked from the export path's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Parquet,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("parquet") => ExportFormat::Parquet,
            _ => ExportFormat::Csv,
        }
    }

    fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Parquet => "parquet",
        }
    }
}

// ─── JSON ───────────────────────────────────────────────────────────

pub fn export_json(report: &ForecastReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize forecast report to JSON")
}

// ─── CSV ────────────────────────────────────────────────────────────

fn opt(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.6}")).unwrap_or_default()
}

/// History rows as CSV: date, open, high, low, close, volume.
/// Missing optional fields are empty cells.
pub fn export_history_csv(rows: &[CleanPriceRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "open", "high", "low", "close", "volume"])?;
    for row in rows {
        wtr.write_record([
            &row.date.to_string(),
            &opt(row.open),
            &opt(row.high),
            &opt(row.low),
            &format!("{:.6}", row.close),
            &opt(row.volume),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Forecast points as CSV: ds, yhat, yhat_lower, yhat_upper, trend, yearly, weekly.
pub fn export_forecast_csv(points: &[ForecastPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "ds",
        "yhat",
        "yhat_lower",
        "yhat_upper",
        "trend",
        "yearly",
        "weekly",
    ])?;
    for p in points {
        wtr.write_record([
            &p.ds.to_string(),
            &format!("{:.6}", p.yhat),
            &format!("{:.6}", p.yhat_lower),
            &format!("{:.6}", p.yhat_upper),
            &format!("{:.6}", p.trend),
            &format!("{:.6}", p.yearly),
            &format!("{:.6}", p.weekly),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Parquet ────────────────────────────────────────────────────────

fn date_column(name: &str, dates: impl Iterator<Item = chrono::NaiveDate>) -> Result<Column> {
    let days: Vec<i32> = dates.map(epoch_days).collect();
    Column::new(name.into(), days)
        .cast(&DataType::Date)
        .with_context(|| format!("failed to cast {name} to Date"))
}

pub fn history_frame(series: &CleanSeries) -> Result<DataFrame> {
    let rows = &series.rows;
    let field = |f: fn(&CleanPriceRow) -> Option<f64>| -> Vec<Option<f64>> {
        rows.iter().map(f).collect()
    };
    DataFrame::new(vec![
        date_column("date", rows.iter().map(|r| r.date))?,
        Column::new("open".into(), field(|r| r.open)),
        Column::new("high".into(), field(|r| r.high)),
        Column::new("low".into(), field(|r| r.low)),
        Column::new("close".into(), rows.iter().map(|r| r.close).collect::<Vec<f64>>()),
        Column::new("volume".into(), field(|r| r.volume)),
    ])
    .context("failed to build history frame")
}

pub fn forecast_frame(points: &[ForecastPoint]) -> Result<DataFrame> {
    let field = |f: fn(&ForecastPoint) -> f64| -> Vec<f64> { points.iter().map(f).collect() };
    DataFrame::new(vec![
        date_column("ds", points.iter().map(|p| p.ds))?,
        Column::new("yhat".into(), field(|p| p.yhat)),
        Column::new("yhat_lower".into(), field(|p| p.yhat_lower)),
        Column::new("yhat_upper".into(), field(|p| p.yhat_upper)),
        Column::new("trend".into(), field(|p| p.trend)),
        Column::new("yearly".into(), field(|p| p.yearly)),
        Column::new("weekly".into(), field(|p| p.weekly)),
    ])
    .context("failed to build forecast frame")
}

fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<()> {
    let file = fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    ParquetWriter::new(file)
        .finish(df)
        .with_context(|| format!("failed to write parquet to {}", path.display()))?;
    Ok(())
}

// ─── Bundle ─────────────────────────────────────────────────────────

/// Paths `save_outputs` writes for `path`: `(history, forecast)`.
pub fn output_paths(path: &Path) -> (PathBuf, PathBuf) {
    let ext = ExportFormat::from_path(path).extension();
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("forecast");
    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    (
        dir.join(format!("{stem}_history.{ext}")),
        dir.join(format!("{stem}_forecast.{ext}")),
    )
}

/// Write the history and forecast tables for one run. Returns the paths written.
pub fn save_outputs(output: &PipelineOutput, path: &Path) -> Result<Vec<PathBuf>> {
    let (history_path, forecast_path) = output_paths(path);
    if let Some(dir) = history_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create export dir: {}", dir.display()))?;
    }

    match ExportFormat::from_path(path) {
        ExportFormat::Parquet => {
            write_parquet(&mut history_frame(&output.history)?, &history_path)?;
            write_parquet(&mut forecast_frame(&output.forecast)?, &forecast_path)?;
        }
        ExportFormat::Csv => {
            fs::write(&history_path, export_history_csv(&output.history.rows)?)
                .with_context(|| format!("failed to write {}", history_path.display()))?;
            fs::write(&forecast_path, export_forecast_csv(&output.forecast)?)
                .with_context(|| format!("failed to write {}", forecast_path.display()))?;
        }
    }

    tracing::info!(
        ticker = %output.history.ticker,
        history = %history_path.display(),
        forecast = %forecast_path.display(),
        "exported forecast tables"
    );
    Ok(vec![history_path, forecast_path])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::Arc;
    use stockcast_core::data::{CleanOutput, CleaningReport, DataSource};
    use stockcast_core::domain::Ticker;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn output() -> PipelineOutput {
        let mut first = CleanPriceRow::new(d(2024, 12, 30), 250.5);
        first.open = Some(249.0);
        first.volume = Some(1_000_000.0);
        let rows = vec![first, CleanPriceRow::new(d(2024, 12, 31), 251.25)];
        let report = CleaningReport {
            input_rows: 2,
            invalid_dates: 0,
            invalid_closes: 0,
            output_rows: 2,
        };
        let history = CleanSeries::new(
            Ticker::new("AAPL").unwrap(),
            DataSource::CsvImport,
            CleanOutput { rows, report },
        );
        let forecast = [d(2024, 12, 30), d(2024, 12, 31), d(2025, 1, 1)]
            .into_iter()
            .map(|ds| ForecastPoint {
                ds,
                yhat: 251.0,
                yhat_lower: 240.0,
                yhat_upper: 262.0,
                trend: 250.0,
                yearly: 0.0,
                weekly: 1.0,
            })
            .collect();
        PipelineOutput {
            history: Arc::new(history),
            forecast,
            cache_hit: false,
        }
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(ExportFormat::from_path(Path::new("out.parquet")), ExportFormat::Parquet);
        assert_eq!(ExportFormat::from_path(Path::new("out.PARQUET")), ExportFormat::Parquet);
        assert_eq!(ExportFormat::from_path(Path::new("out.csv")), ExportFormat::Csv);
        assert_eq!(ExportFormat::from_path(Path::new("out")), ExportFormat::Csv);
    }

    #[test]
    fn output_paths_share_stem() {
        let (h, f) = output_paths(Path::new("exports/aapl.csv"));
        assert_eq!(h, Path::new("exports/aapl_history.csv"));
        assert_eq!(f, Path::new("exports/aapl_forecast.csv"));

        let (h, _) = output_paths(Path::new("aapl"));
        assert_eq!(h, Path::new("aapl_history.csv"));
    }

    #[test]
    fn history_csv_leaves_missing_fields_empty() {
        let csv = export_history_csv(&output().history.rows).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "date,open,high,low,close,volume");
        assert_eq!(lines[1], "2024-12-30,249.000000,,,250.500000,1000000.000000");
        assert_eq!(lines[2], "2024-12-31,,,,251.250000,");
    }

    #[test]
    fn forecast_csv_has_band_columns() {
        let csv = export_forecast_csv(&output().forecast).unwrap();
        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[1], "yhat");
        assert_eq!(&headers[3], "yhat_upper");
        assert_eq!(reader.records().count(), 3);
    }

    #[test]
    fn json_report_includes_final_point() {
        let json = export_json(&ForecastReport::from_output(&output())).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["ticker"], "AAPL");
        assert_eq!(value["horizon_days"], 1);
        assert_eq!(value["final_point"]["ds"], "2025-01-01");
    }

    #[test]
    fn saves_csv_pair() {
        let dir = tempfile::tempdir().unwrap();
        let written = save_outputs(&output(), &dir.path().join("run.csv")).unwrap();
        assert_eq!(written.len(), 2);
        let forecast = fs::read_to_string(&written[1]).unwrap();
        assert!(forecast.starts_with("ds,yhat,yhat_lower,yhat_upper"));
        assert!(forecast.contains("2025-01-01"));
    }

    #[test]
    fn saves_parquet_pair() {
        let dir = tempfile::tempdir().unwrap();
        let written = save_outputs(&output(), &dir.path().join("nested/run.parquet")).unwrap();

        let file = fs::File::open(&written[0]).unwrap();
        let history = ParquetReader::new(file).finish().unwrap();
        assert_eq!(history.height(), 2);
        assert_eq!(history.column("date").unwrap().dtype(), &DataType::Date);
        assert_eq!(history.column("open").unwrap().null_count(), 1);

        let file = fs::File::open(&written[1]).unwrap();
        let forecast = ParquetReader::new(file).finish().unwrap();
        assert_eq!(forecast.height(), 3);
        assert_eq!(forecast.get_column_names().len(), 7);
    }
}
