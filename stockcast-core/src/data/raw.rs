//! Raw price tables as providers hand them over, before any cleaning.
//!
//! The shape mirrors what upstream market-data clients return: a row index
//! (usually the trading date) plus labelled columns, where a label is either
//! a plain field name (`Close`) or a `(field, ticker)` pair such as
//! `("Close", "AAPL")`. Cells are loosely typed because providers and CSV
//! exports disagree on what they put in them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single untyped cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawValue {
    Null,
    Number(f64),
    Text(String),
    Date(NaiveDate),
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        RawValue::Number(v)
    }
}

impl From<Option<f64>> for RawValue {
    fn from(v: Option<f64>) -> Self {
        v.map_or(RawValue::Null, RawValue::Number)
    }
}

impl From<&str> for RawValue {
    fn from(v: &str) -> Self {
        RawValue::Text(v.to_string())
    }
}

impl From<String> for RawValue {
    fn from(v: String) -> Self {
        RawValue::Text(v)
    }
}

impl From<NaiveDate> for RawValue {
    fn from(v: NaiveDate) -> Self {
        RawValue::Date(v)
    }
}

/// Column label: single-level, or a two-level `(field, ticker)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnLabel {
    Single(String),
    Pair { field: String, ticker: String },
}

impl ColumnLabel {
    pub fn single(field: impl Into<String>) -> Self {
        ColumnLabel::Single(field.into())
    }

    pub fn pair(field: impl Into<String>, ticker: impl Into<String>) -> Self {
        ColumnLabel::Pair {
            field: field.into(),
            ticker: ticker.into(),
        }
    }

    /// The field part of the label, ignoring any ticker qualifier.
    pub fn field(&self) -> &str {
        match self {
            ColumnLabel::Single(field) => field,
            ColumnLabel::Pair { field, .. } => field,
        }
    }

    pub fn is_pair(&self) -> bool {
        matches!(self, ColumnLabel::Pair { .. })
    }
}

impl fmt::Display for ColumnLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnLabel::Single(field) => f.write_str(field),
            ColumnLabel::Pair { field, ticker } => write!(f, "({field}, {ticker})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawColumn {
    pub label: ColumnLabel,
    pub values: Vec<RawValue>,
}

/// Row labels. Upstream clients put the trading date here rather than in a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowIndex {
    pub name: Option<String>,
    pub values: Vec<RawValue>,
}

/// Untyped price table straight from a provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub index: Option<RowIndex>,
    pub columns: Vec<RawColumn>,
}

impl RawTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the row index (builder style).
    pub fn with_index(mut self, name: Option<&str>, values: Vec<RawValue>) -> Self {
        self.index = Some(RowIndex {
            name: name.map(str::to_string),
            values,
        });
        self
    }

    /// Append a column (builder style).
    pub fn with_column(mut self, label: ColumnLabel, values: Vec<RawValue>) -> Self {
        self.push_column(label, values);
        self
    }

    pub fn push_column(&mut self, label: ColumnLabel, values: Vec<RawValue>) {
        self.columns.push(RawColumn { label, values });
    }

    /// Number of rows, taken from the index when present.
    pub fn row_count(&self) -> usize {
        match &self.index {
            Some(index) => index.values.len(),
            None => self
                .columns
                .iter()
                .map(|c| c.values.len())
                .max()
                .unwrap_or(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    /// True when any column carries a two-level label.
    pub fn has_pair_labels(&self) -> bool {
        self.columns.iter().any(|c| c.label.is_pair())
    }

    /// Labels rendered for diagnostics.
    pub fn column_labels(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.label.to_string()).collect()
    }
}
