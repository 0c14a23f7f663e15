use chrono::{Datelike, NaiveDate};
use polars::prelude::*;

use super::raw::RawTable;

/// Canonical field names after cleaning.
pub const DATE: &str = "date";
pub const OPEN: &str = "open";
pub const HIGH: &str = "high";
pub const LOW: &str = "low";
pub const CLOSE: &str = "close";
pub const VOLUME: &str = "volume";

/// Optional numeric fields carried through cleaning without filtering rows.
pub const OPTIONAL_NUMERIC: [&str; 4] = [OPEN, HIGH, LOW, VOLUME];

/// Names a date axis may go by when it arrives as a column.
const DATE_ALIASES: [&str; 3] = [DATE, "datetime", "timestamp"];

/// Days from 0001-01-01 (CE) to 1970-01-01, the epoch of polars `Date`.
const UNIX_EPOCH_FROM_CE: i32 = 719_163;

/// Physical value of a polars `Date`: days since the Unix epoch.
pub fn epoch_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_FROM_CE
}

pub fn date_from_epoch_days(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_FROM_CE)?)
}

/// Expected schema for cleaned price data
pub struct PriceSchema;

impl PriceSchema {
    /// Schema of the frame the cleaner produces
    pub fn schema() -> Schema {
        Schema::from_iter(vec![
            Field::new(DATE.into(), DataType::Date),
            Field::new(CLOSE.into(), DataType::Float64),
        ])
    }

    /// Validate a cleaned DataFrame against the schema. Optional columns are
    /// not required, but must be Float64 when present.
    pub fn validate(df: &DataFrame) -> Result<(), SchemaError> {
        let expected = Self::schema();
        let actual = df.schema();

        for field in expected.iter_fields() {
            let actual_dtype = actual
                .get(field.name())
                .ok_or_else(|| SchemaError::MissingColumn(field.name().to_string()))?;
            if actual_dtype != field.dtype() {
                return Err(SchemaError::TypeMismatch {
                    column: field.name().to_string(),
                    expected: field.dtype().clone(),
                    actual: actual_dtype.clone(),
                });
            }
        }

        for name in OPTIONAL_NUMERIC {
            if let Some(dtype) = actual.get(name) {
                if dtype != &DataType::Float64 {
                    return Err(SchemaError::TypeMismatch {
                        column: name.to_string(),
                        expected: DataType::Float64,
                        actual: dtype.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Normalize a provider field name: `Adj Close` -> `adj_close`.
pub fn normalize_field(field: &str) -> String {
    field
        .trim()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

/// True if a normalized field name denotes the date axis.
pub fn is_date_field(normalized: &str) -> bool {
    DATE_ALIASES.contains(&normalized)
}

/// Flatten column labels to normalized single-level field names.
///
/// Two-level `(field, ticker)` labels lose their ticker part. A table that
/// mixes label levels, or that ends up with the same field twice (several
/// tickers in one table), is rejected.
pub fn flatten_labels(table: &RawTable) -> Result<Vec<String>, SchemaError> {
    let pairs = table.columns.iter().filter(|c| c.label.is_pair()).count();
    if pairs > 0 && pairs != table.columns.len() {
        return Err(SchemaError::MixedLabelLevels {
            pairs,
            total: table.columns.len(),
        });
    }

    let mut names: Vec<String> = Vec::with_capacity(table.columns.len());
    for column in &table.columns {
        let name = normalize_field(column.label.field());
        if names.contains(&name) {
            return Err(SchemaError::DuplicateField(name));
        }
        names.push(name);
    }
    Ok(names)
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Duplicate field '{0}' after flattening column labels (more than one ticker in the table?)")]
    DuplicateField(String),

    #[error("Mixed column label levels: {pairs} of {total} columns are ticker-qualified")]
    MixedLabelLevels { pairs: usize, total: usize },

    #[error("Column {column} has {actual} values, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Type mismatch in column {column}: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        actual: DataType,
    },
}
