//! Raw table -> canonical price rows.
//!
//! Cleaning runs in a fixed order, each step a pass over the whole table:
//!
//! 1. reject an empty table
//! 2. flatten `(field, ticker)` labels to normalized field names
//! 3. materialize the date axis (row index wins over a date column)
//! 4. coerce dates, drop rows whose date does not parse
//! 5. coerce closes, drop rows whose close is not a finite number
//! 6. reject a table with nothing left
//!
//! Optional OHLV fields are coerced the same way, but a bad cell there becomes
//! `None` instead of dropping the row.

use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::provider::{DataSource, FetchResult};
use super::raw::{RawTable, RawValue};
use super::schema::{
    date_from_epoch_days, epoch_days, flatten_labels, is_date_field, PriceSchema, SchemaError,
    CLOSE, DATE, OPTIONAL_NUMERIC,
};
use crate::domain::{CleanPriceRow, DatasetHash, Ticker};

#[derive(Debug, Error)]
pub enum CleanError {
    #[error("no data returned")]
    EmptyResult { ticker: Ticker },

    #[error("no valid rows after cleaning")]
    NoValidData { ticker: Ticker },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("frame error: {0}")]
    Frame(#[from] PolarsError),
}

/// Row counts from one cleaning pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningReport {
    pub input_rows: usize,
    pub invalid_dates: usize,
    /// Counted among rows whose date was valid.
    pub invalid_closes: usize,
    pub output_rows: usize,
}

impl CleaningReport {
    pub fn dropped(&self) -> usize {
        self.input_rows - self.output_rows
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleanOutput {
    pub rows: Vec<CleanPriceRow>,
    pub report: CleaningReport,
}

/// A cleaned price history, shared read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanSeries {
    pub ticker: Ticker,
    pub source: DataSource,
    pub rows: Vec<CleanPriceRow>,
    pub report: CleaningReport,
    pub dataset_hash: DatasetHash,
}

impl CleanSeries {
    pub fn new(ticker: Ticker, source: DataSource, output: CleanOutput) -> Self {
        let dataset_hash = DatasetHash::of_rows(&output.rows);
        Self {
            ticker,
            source,
            rows: output.rows,
            report: output.report,
            dataset_hash,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Earliest date. Rows keep the provider's order, so this is not
    /// necessarily the first row.
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.rows.iter().map(|r| r.date).min()
    }

    /// Latest date, wherever it sits in `rows`.
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rows.iter().map(|r| r.date).max()
    }

    /// The last `n` rows (all of them if there are fewer).
    pub fn tail(&self, n: usize) -> &[CleanPriceRow] {
        &self.rows[self.rows.len().saturating_sub(n)..]
    }
}

/// Cleaner for provider tables
pub struct DataCleaner;

impl DataCleaner {
    /// Clean a raw table into canonical rows plus a report of what was dropped.
    pub fn clean(table: &RawTable, ticker: &Ticker) -> Result<CleanOutput, CleanError> {
        let input_rows = table.row_count();
        if input_rows == 0 {
            return Err(CleanError::EmptyResult {
                ticker: ticker.clone(),
            });
        }

        let names = flatten_labels(table)?;
        tracing::debug!(
            %ticker,
            rows = input_rows,
            columns = ?table.column_labels(),
            indexed = table.index.is_some(),
            two_level = table.has_pair_labels(),
            "cleaning raw table"
        );

        for (name, column) in names.iter().zip(&table.columns) {
            if column.values.len() != input_rows {
                return Err(SchemaError::LengthMismatch {
                    column: name.clone(),
                    expected: input_rows,
                    actual: column.values.len(),
                }
                .into());
            }
        }

        let df = Self::to_frame(table, &names)?;

        let dated = df
            .lazy()
            .filter(col(DATE).is_not_null())
            .collect()?;
        let invalid_dates = input_rows - dated.height();

        let priced = dated
            .lazy()
            .filter(col(CLOSE).is_not_null())
            .collect()?;
        let output_rows = priced.height();
        let invalid_closes = input_rows - invalid_dates - output_rows;

        if invalid_dates > 0 {
            tracing::warn!(%ticker, count = invalid_dates, "dropped rows with invalid dates");
        }
        if invalid_closes > 0 {
            tracing::warn!(%ticker, count = invalid_closes, "dropped rows with invalid close prices");
        }

        PriceSchema::validate(&priced)?;

        if output_rows == 0 {
            return Err(CleanError::NoValidData {
                ticker: ticker.clone(),
            });
        }

        let rows = Self::extract_rows(&priced)?;
        Ok(CleanOutput {
            rows,
            report: CleaningReport {
                input_rows,
                invalid_dates,
                invalid_closes,
                output_rows,
            },
        })
    }

    /// Build the typed frame: `date` (Date), `close` and any optional fields
    /// (Float64). Cells that fail coercion are null.
    fn to_frame(table: &RawTable, names: &[String]) -> Result<DataFrame, CleanError> {
        let date_cells: &[RawValue] = match &table.index {
            Some(index) => {
                if index.values.len() != table.row_count() {
                    return Err(SchemaError::LengthMismatch {
                        column: DATE.to_string(),
                        expected: table.row_count(),
                        actual: index.values.len(),
                    }
                    .into());
                }
                &index.values
            }
            None => names
                .iter()
                .position(|n| is_date_field(n))
                .map(|i| table.columns[i].values.as_slice())
                .ok_or_else(|| SchemaError::MissingColumn(DATE.to_string()))?,
        };

        let close_idx = names
            .iter()
            .position(|n| n == CLOSE)
            .ok_or_else(|| SchemaError::MissingColumn(CLOSE.to_string()))?;

        let days: Vec<Option<i32>> = date_cells.iter().map(coerce_date).collect();
        let mut columns = vec![
            Column::new(DATE.into(), days).cast(&DataType::Date)?,
            numeric_column(CLOSE, &table.columns[close_idx].values),
        ];
        for field in OPTIONAL_NUMERIC {
            if let Some(i) = names.iter().position(|n| n == field) {
                columns.push(numeric_column(field, &table.columns[i].values));
            }
        }

        Ok(DataFrame::new(columns)?)
    }

    fn extract_rows(df: &DataFrame) -> Result<Vec<CleanPriceRow>, CleanError> {
        let days = df.column(DATE)?.cast(&DataType::Int32)?;
        let days = days.i32()?;
        let closes = df.column(CLOSE)?.f64()?;
        let open = optional_f64(df, OPTIONAL_NUMERIC[0])?;
        let high = optional_f64(df, OPTIONAL_NUMERIC[1])?;
        let low = optional_f64(df, OPTIONAL_NUMERIC[2])?;
        let volume = optional_f64(df, OPTIONAL_NUMERIC[3])?;

        let field = |ca: Option<&Float64Chunked>, i: usize| ca.and_then(|ca| ca.get(i));

        let mut rows = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let (Some(day), Some(close)) = (days.get(i), closes.get(i)) else {
                continue;
            };
            let Some(date) = date_from_epoch_days(day) else {
                continue;
            };
            rows.push(CleanPriceRow {
                date,
                open: field(open, i),
                high: field(high, i),
                low: field(low, i),
                close,
                volume: field(volume, i),
            });
        }
        Ok(rows)
    }
}

/// Clean a fetch result into a shareable series.
pub fn clean_fetch(fetch: &FetchResult) -> Result<CleanSeries, CleanError> {
    let output = DataCleaner::clean(&fetch.table, &fetch.ticker)?;
    Ok(CleanSeries::new(fetch.ticker.clone(), fetch.source, output))
}

fn optional_f64<'a>(df: &'a DataFrame, name: &str) -> PolarsResult<Option<&'a Float64Chunked>> {
    match df.get_column_index(name) {
        Some(_) => Ok(Some(df.column(name)?.f64()?)),
        None => Ok(None),
    }
}

fn numeric_column(name: &str, cells: &[RawValue]) -> Column {
    let values: Vec<Option<f64>> = cells.iter().map(coerce_number).collect();
    Column::new(name.into(), values)
}

/// Non-strict numeric coercion. Text is parsed, anything non-finite is null.
fn coerce_number(cell: &RawValue) -> Option<f64> {
    let value = match cell {
        RawValue::Number(v) => *v,
        RawValue::Text(text) => text.trim().parse::<f64>().ok()?,
        RawValue::Null | RawValue::Date(_) => return None,
    };
    value.is_finite().then_some(value)
}

/// Date coercion to days since the Unix epoch.
///
/// Accepts date cells and `YYYY-MM-DD` text, optionally followed by a time
/// part (`2020-01-01 00:00:00`, `2020-01-01T09:30:00Z`).
fn coerce_date(cell: &RawValue) -> Option<i32> {
    let date = match cell {
        RawValue::Date(d) => *d,
        RawValue::Text(text) => parse_date_prefix(text.trim())?,
        RawValue::Null | RawValue::Number(_) => return None,
    };
    Some(epoch_days(date))
}

fn parse_date_prefix(text: &str) -> Option<NaiveDate> {
    let prefix = text.get(..10)?;
    let rest = &text[10..];
    if !(rest.is_empty() || rest.starts_with(' ') || rest.starts_with('T')) {
        return None;
    }
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}
