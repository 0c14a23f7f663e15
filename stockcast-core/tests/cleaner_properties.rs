//! Property tests for cleaner invariants.
//!
//! Uses proptest to verify:
//! 1. Every output row has a real date and a finite close
//! 2. Drop accounting: invalid dates + invalid closes = input - output
//! 3. Two-level labels clean to the same rows as single-level ones
//! 4. Preparation never grows the series

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use stockcast_core::data::{
    prepare, CleanError, ColumnLabel, DataCleaner, RawTable, RawValue,
};
use stockcast_core::domain::Ticker;

// ── Strategies (proptest) ────────────────────────────────────────────

#[derive(Debug, Clone)]
enum DateCell {
    Date(i64),
    Iso(i64),
    IsoWithTime(i64),
    Garbage(String),
    Null,
}

#[derive(Debug, Clone)]
enum CloseCell {
    Number(f64),
    NumericText(f64),
    Garbage(String),
    NaN,
    Null,
}

fn base() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()
}

fn arb_date_cell() -> impl Strategy<Value = DateCell> {
    prop_oneof![
        4 => (0..9000i64).prop_map(DateCell::Date),
        2 => (0..9000i64).prop_map(DateCell::Iso),
        1 => (0..9000i64).prop_map(DateCell::IsoWithTime),
        1 => "[a-z]{1,8}".prop_map(DateCell::Garbage),
        1 => Just(DateCell::Null),
    ]
}

fn arb_close_cell() -> impl Strategy<Value = CloseCell> {
    prop_oneof![
        4 => (0.01..5000.0_f64).prop_map(CloseCell::Number),
        2 => (0.01..5000.0_f64).prop_map(|v| CloseCell::NumericText((v * 100.0).round() / 100.0)),
        1 => "[a-z]{1,6}".prop_map(CloseCell::Garbage),
        1 => Just(CloseCell::NaN),
        1 => Just(CloseCell::Null),
    ]
}

impl DateCell {
    fn is_valid(&self) -> bool {
        matches!(self, DateCell::Date(_) | DateCell::Iso(_) | DateCell::IsoWithTime(_))
    }

    fn raw(&self) -> RawValue {
        match self {
            DateCell::Date(off) => RawValue::Date(base() + Duration::days(*off)),
            DateCell::Iso(off) => RawValue::Text((base() + Duration::days(*off)).to_string()),
            DateCell::IsoWithTime(off) => {
                RawValue::Text(format!("{} 00:00:00", base() + Duration::days(*off)))
            }
            // Letters only, so never a date
            DateCell::Garbage(s) => RawValue::Text(s.clone()),
            DateCell::Null => RawValue::Null,
        }
    }
}

impl CloseCell {
    fn is_valid(&self) -> bool {
        matches!(self, CloseCell::Number(_) | CloseCell::NumericText(_))
    }

    fn raw(&self) -> RawValue {
        match self {
            CloseCell::Number(v) => RawValue::Number(*v),
            CloseCell::NumericText(v) => RawValue::Text(format!("{v:.2}")),
            // Letters only; "inf" and "nan" parse as floats but are not finite
            CloseCell::Garbage(s) => RawValue::Text(s.clone()),
            CloseCell::NaN => RawValue::Number(f64::NAN),
            CloseCell::Null => RawValue::Null,
        }
    }
}

fn arb_rows() -> impl Strategy<Value = Vec<(DateCell, CloseCell)>> {
    prop::collection::vec((arb_date_cell(), arb_close_cell()), 1..60)
}

fn single_level(rows: &[(DateCell, CloseCell)]) -> RawTable {
    RawTable::new()
        .with_column(
            ColumnLabel::single("Date"),
            rows.iter().map(|(d, _)| d.raw()).collect(),
        )
        .with_column(
            ColumnLabel::single("Close"),
            rows.iter().map(|(_, c)| c.raw()).collect(),
        )
}

fn two_level(rows: &[(DateCell, CloseCell)]) -> RawTable {
    RawTable::new()
        .with_index(Some("Date"), rows.iter().map(|(d, _)| d.raw()).collect())
        .with_column(
            ColumnLabel::pair("Close", "GME"),
            rows.iter().map(|(_, c)| c.raw()).collect(),
        )
}

fn ticker() -> Ticker {
    Ticker::new("GME").unwrap()
}

// ── 1 + 2. Row validity and drop accounting ──────────────────────────

proptest! {
    #[test]
    fn output_rows_are_valid_and_counted(rows in arb_rows()) {
        let expected_dates = rows.iter().filter(|(d, _)| !d.is_valid()).count();
        let expected_closes = rows
            .iter()
            .filter(|(d, c)| d.is_valid() && !c.is_valid())
            .count();
        let expected_out = rows.len() - expected_dates - expected_closes;

        match DataCleaner::clean(&single_level(&rows), &ticker()) {
            Ok(out) => {
                prop_assert_eq!(out.rows.len(), expected_out);
                prop_assert!(out.rows.iter().all(|r| r.close.is_finite()));
                prop_assert_eq!(out.report.input_rows, rows.len());
                prop_assert_eq!(out.report.invalid_dates, expected_dates);
                prop_assert_eq!(out.report.invalid_closes, expected_closes);
                prop_assert_eq!(
                    out.report.invalid_dates + out.report.invalid_closes,
                    out.report.input_rows - out.report.output_rows
                );
            }
            Err(CleanError::NoValidData { .. }) => prop_assert_eq!(expected_out, 0),
            Err(other) => prop_assert!(false, "unexpected error: {other}"),
        }
    }

    /// Surviving rows keep their relative order.
    #[test]
    fn order_is_preserved(rows in arb_rows()) {
        let expected: Vec<NaiveDate> = rows
            .iter()
            .filter(|(d, c)| d.is_valid() && c.is_valid())
            .map(|(d, _)| match d.raw() {
                RawValue::Date(date) => date,
                RawValue::Text(text) => text[..10].parse().unwrap(),
                _ => unreachable!(),
            })
            .collect();

        if let Ok(out) = DataCleaner::clean(&single_level(&rows), &ticker()) {
            let dates: Vec<NaiveDate> = out.rows.iter().map(|r| r.date).collect();
            prop_assert_eq!(dates, expected);
        }
    }
}

// ── 3. Label levels ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn two_level_labels_clean_like_single_level(rows in arb_rows()) {
        let single = DataCleaner::clean(&single_level(&rows), &ticker());
        let paired = DataCleaner::clean(&two_level(&rows), &ticker());
        match (single, paired) {
            (Ok(a), Ok(b)) => prop_assert_eq!(a, b),
            (Err(CleanError::NoValidData { .. }), Err(CleanError::NoValidData { .. })) => {}
            (a, b) => prop_assert!(false, "diverged: {a:?} vs {b:?}"),
        }
    }
}

// ── 4. Preparation ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn prepare_never_grows(rows in arb_rows()) {
        if let Ok(out) = DataCleaner::clean(&single_level(&rows), &ticker()) {
            let points = prepare(&out.rows);
            prop_assert_eq!(points.len(), out.rows.len());
            for (p, r) in points.iter().zip(&out.rows) {
                prop_assert_eq!(p.ds, r.date);
                prop_assert_eq!(p.y, r.close);
            }
        }
    }
}

#[test]
fn empty_table_is_empty_result() {
    let result = DataCleaner::clean(&single_level(&[]), &ticker());
    assert!(matches!(result, Err(CleanError::EmptyResult { .. })));
}
