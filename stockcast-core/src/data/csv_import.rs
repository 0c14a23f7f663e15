//! CSV fetcher for price tables exported by the upstream Python client.
//!
//! Two layouts are understood:
//!
//! ```text
//! Date,Open,High,Low,Close,Adj Close,Volume        single header, date is a column
//! 2015-01-02,27.84,27.86,26.84,27.33,24.43,212818400
//!
//! Price,Close,High,Low,Open,Volume                 three header rows, (field, ticker)
//! Ticker,AAPL,AAPL,AAPL,AAPL,AAPL                  labels and the date as row index
//! Date,,,,,
//! 2015-01-02,24.26,24.72,23.80,24.71,212818400
//! ```
//!
//! The file is returned as written; the requested date range is not applied
//! because the export already reflects the range it was downloaded for.

use super::provider::{DataError, DataSource, FetchResult, MarketDataFetcher};
use super::raw::{ColumnLabel, RawTable, RawValue};
use crate::domain::Ticker;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

/// Reads `{dir}/{TICKER}.csv`, or a single file for every ticker.
#[derive(Debug, Clone)]
pub struct CsvProvider {
    path: PathBuf,
}

impl CsvProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Resolve the file for a ticker.
    fn file_for(&self, ticker: &Ticker) -> PathBuf {
        if self.path.is_dir() {
            self.path.join(format!("{ticker}.csv"))
        } else {
            self.path.clone()
        }
    }
}

impl MarketDataFetcher for CsvProvider {
    fn name(&self) -> &str {
        "csv_import"
    }

    fn fetch(
        &self,
        ticker: &Ticker,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        let path = self.file_for(ticker);
        if !path.exists() {
            return Err(DataError::SymbolNotFound {
                symbol: ticker.to_string(),
            });
        }
        tracing::info!(%ticker, path = %path.display(), "importing csv");
        let table = read_table(&path)?;
        Ok(FetchResult {
            ticker: ticker.clone(),
            table,
            source: DataSource::CsvImport,
        })
    }
}

/// Parse a CSV export into a raw table.
pub fn read_table(path: &Path) -> Result<RawTable, DataError> {
    let file = std::fs::File::open(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| DataError::Csv(format!("{}: {e}", path.display())))?;
        records.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }

    parse_records(records)
}

fn parse_records(records: Vec<Vec<String>>) -> Result<RawTable, DataError> {
    let mut rows = records.into_iter();
    let Some(header) = rows.next() else {
        return Ok(RawTable::new());
    };
    if header.is_empty() {
        return Err(DataError::Csv("empty header row".into()));
    }

    let rest: Vec<Vec<String>> = rows.collect();
    let is_multi_level = header[0].eq_ignore_ascii_case("price")
        && rest
            .first()
            .is_some_and(|r| r.first().is_some_and(|c| c.eq_ignore_ascii_case("ticker")));

    if is_multi_level {
        parse_multi_level(&header, rest)
    } else {
        Ok(parse_single_level(&header, rest))
    }
}

fn parse_single_level(header: &[String], data: Vec<Vec<String>>) -> RawTable {
    let mut columns: Vec<Vec<RawValue>> = vec![Vec::with_capacity(data.len()); header.len()];
    for row in &data {
        for (i, column) in columns.iter_mut().enumerate() {
            column.push(parse_cell(row.get(i).map(String::as_str)));
        }
    }

    let mut table = RawTable::new();
    for (name, values) in header.iter().zip(columns) {
        table.push_column(ColumnLabel::single(name.as_str()), values);
    }
    table
}

fn parse_multi_level(header: &[String], rest: Vec<Vec<String>>) -> Result<RawTable, DataError> {
    let mut rows = rest.into_iter();
    let tickers = rows
        .next()
        .ok_or_else(|| DataError::Csv("missing ticker header row".into()))?;

    // Optional third header row naming the index: "Date,,,,".
    let mut data: Vec<Vec<String>> = rows.collect();
    let mut index_name = None;
    if let Some(first) = data.first() {
        if first.iter().skip(1).all(String::is_empty)
            && first.first().is_some_and(|c| c.parse::<f64>().is_err() && !looks_like_date(c))
        {
            index_name = first.first().cloned();
            data.remove(0);
        }
    }

    let width = header.len();
    let mut index = Vec::with_capacity(data.len());
    let mut columns: Vec<Vec<RawValue>> = vec![Vec::with_capacity(data.len()); width - 1];
    for row in &data {
        index.push(parse_cell(row.first().map(String::as_str)));
        for (i, column) in columns.iter_mut().enumerate() {
            column.push(parse_cell(row.get(i + 1).map(String::as_str)));
        }
    }

    let mut table = RawTable::new().with_index(index_name.as_deref(), index);
    for (i, values) in columns.into_iter().enumerate() {
        let field = header[i + 1].as_str();
        let ticker = tickers.get(i + 1).map(String::as_str).unwrap_or_default();
        table.push_column(ColumnLabel::pair(field, ticker), values);
    }
    Ok(table)
}

fn looks_like_date(cell: &str) -> bool {
    cell.get(..10)
        .is_some_and(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").is_ok())
}

fn parse_cell(cell: Option<&str>) -> RawValue {
    match cell {
        None | Some("") => RawValue::Null,
        Some(text) => match text.parse::<f64>() {
            Ok(v) => RawValue::Number(v),
            Err(_) => RawValue::Text(text.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn reads_single_header_layout() {
        let file = write_csv(
            "Date,Open,High,Low,Close,Adj Close,Volume\n\
             2015-01-02,27.84,27.86,26.84,27.33,24.43,212818400\n\
             2015-01-05,27.07,27.16,26.35,26.56,23.74,257142000\n",
        );
        let table = read_table(file.path()).unwrap();
        assert!(table.index.is_none());
        assert!(!table.has_pair_labels());
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.columns[0].values[0], RawValue::Text("2015-01-02".into()));
        assert_eq!(table.columns[4].values[1], RawValue::Number(26.56));
    }

    #[test]
    fn reads_multi_level_layout() {
        let file = write_csv(
            "Price,Close,High,Low,Open,Volume\n\
             Ticker,AAPL,AAPL,AAPL,AAPL,AAPL\n\
             Date,,,,,\n\
             2015-01-02,24.26,24.72,23.80,24.71,212818400\n\
             2015-01-05,23.57,24.08,23.36,24.00,257142000\n",
        );
        let table = read_table(file.path()).unwrap();
        let index = table.index.as_ref().unwrap();
        assert_eq!(index.name.as_deref(), Some("Date"));
        assert_eq!(index.values.len(), 2);
        assert_eq!(table.columns[0].label, ColumnLabel::pair("Close", "AAPL"));
        assert_eq!(table.columns[0].values[1], RawValue::Number(23.57));
    }

    #[test]
    fn multi_level_without_index_name_row() {
        let file = write_csv(
            "Price,Close\n\
             Ticker,MSFT\n\
             2015-01-02,46.76\n",
        );
        let table = read_table(file.path()).unwrap();
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.index.as_ref().unwrap().name, None);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_table(Path::new("/nonexistent/prices.csv")).unwrap_err();
        assert!(matches!(err, DataError::Io(_)));
        assert!(err.to_string().starts_with("i/o error:"));
    }

    #[test]
    fn empty_and_text_cells() {
        let file = write_csv("Date,Close\n2020-01-01,\n2020-01-02,bad\n");
        let table = read_table(file.path()).unwrap();
        assert_eq!(table.columns[1].values[0], RawValue::Null);
        assert_eq!(table.columns[1].values[1], RawValue::Text("bad".into()));
    }

    #[test]
    fn empty_file_is_empty_table() {
        let file = write_csv("");
        assert!(read_table(file.path()).unwrap().is_empty());
    }

    #[test]
    fn provider_resolves_per_ticker_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("GME.csv"), "Date,Close\n2021-01-04,17.25\n").unwrap();
        let provider = CsvProvider::new(dir.path());
        let start = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2021, 2, 1).unwrap();

        let found = provider
            .fetch(&Ticker::new("GME").unwrap(), start, end)
            .unwrap();
        assert_eq!(found.source, DataSource::CsvImport);
        assert_eq!(found.table.row_count(), 1);

        let missing = provider.fetch(&Ticker::new("AAPL").unwrap(), start, end);
        assert!(matches!(missing, Err(DataError::SymbolNotFound { .. })));
    }
}
