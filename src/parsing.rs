//! Tolerant parsers for the raw CSV inputs.
//!
//! Parse failures are never errors here. Every parser returns `None` for a
//! value it cannot read and the column helpers count those misses so the
//! loaders can report how much data was lost.

use crate::error::{PipelineError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use std::io::Read;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parses a crash-report date in any of the formats seen in the crash
/// exports: ISO dates, US `MM/DD/YYYY`, or a full timestamp.
#[must_use]
pub fn parse_flexible_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| parse_timestamp(s).map(|dt| dt.date()))
}

/// Parses a day-first `DD/MM/YYYY` date.
#[must_use]
pub fn parse_day_first_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%d/%m/%Y").ok()
}

/// Parses an ISO 8601 timestamp with or without seconds. A bare date is
/// read as midnight.
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Parses a finite decimal number. Blanks, markers such as `T` or `M`,
/// and `NaN`/`inf` all become `None`.
#[must_use]
pub fn parse_numeric(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// A column after coercion, with the number of entries that failed to parse.
#[derive(Debug, Clone, PartialEq)]
pub struct Coerced<T> {
    pub values: Vec<Option<T>>,
    pub discarded: usize,
}

/// Applies `parse` to every raw value, keeping `None` for failures.
pub fn coerce_column<T, S, F>(raw: &[S], parse: F) -> Coerced<T>
where
    S: AsRef<str>,
    F: Fn(&str) -> Option<T>,
{
    let values: Vec<Option<T>> = raw.iter().map(|s| parse(s.as_ref())).collect();
    let discarded = values.iter().filter(|v| v.is_none()).count();
    Coerced { values, discarded }
}

/// Lower-cases and trims a header so differently styled files line up.
pub fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase()
}

/// A CSV file held fully in memory as header names plus raw string rows.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub source_name: String,
    pub headers: Vec<String>,
    pub rows: Vec<csv::StringRecord>,
}

impl RawTable {
    /// Reads every row from `reader`. Short or long rows are accepted.
    pub fn read<R: Read>(reader: R, source_name: &str) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);
        let headers = csv_reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();
        let rows = csv_reader.records().collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            source_name: source_name.to_string(),
            headers,
            rows,
        })
    }

    /// Replaces every header with its normalized form.
    pub fn normalize_headers(&mut self) {
        self.headers = self.headers.iter().map(|h| normalize_header(h)).collect();
    }

    /// Raw values of column `name` (matched after trimming). Missing cells
    /// read as empty strings.
    pub fn column(&self, name: &str) -> Result<Vec<&str>> {
        let index = self
            .headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| PipelineError::MissingColumn {
                source_name: self.source_name.clone(),
                column: name.to_string(),
            })?;
        Ok(self
            .rows
            .iter()
            .map(|row| row.get(index).unwrap_or(""))
            .collect())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_us_and_iso_dates() {
        assert_eq!(parse_flexible_date("09/11/2021"), Some(date(2021, 9, 11)));
        assert_eq!(parse_flexible_date("2021-09-11"), Some(date(2021, 9, 11)));
        assert_eq!(
            parse_flexible_date("2021-09-11T00:00:00.000"),
            Some(date(2021, 9, 11))
        );
    }

    #[test]
    fn rejects_garbage_dates() {
        assert!(parse_flexible_date("").is_none());
        assert!(parse_flexible_date("not-a-date").is_none());
        assert!(parse_flexible_date("13/45/2021").is_none());
    }

    #[test]
    fn parses_day_first() {
        assert_eq!(parse_day_first_date("02/01/2019"), Some(date(2019, 1, 2)));
        assert!(parse_day_first_date("2019-01-02").is_none());
    }

    #[test]
    fn parses_timestamps() {
        let ts = parse_timestamp("2020-03-04T13:00").unwrap();
        assert_eq!(ts.date(), date(2020, 3, 4));
        assert_eq!(ts.to_string(), "2020-03-04 13:00:00");
        assert!(parse_timestamp("2020-03-04 13:00:00").is_some());
        assert_eq!(
            parse_timestamp("2020-03-04").unwrap().to_string(),
            "2020-03-04 00:00:00"
        );
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn numeric_coercion() {
        assert_eq!(parse_numeric(" 3.5 "), Some(3.5));
        assert_eq!(parse_numeric("-2"), Some(-2.0));
        assert!(parse_numeric("T").is_none());
        assert!(parse_numeric("").is_none());
        assert!(parse_numeric("NaN").is_none());
    }

    #[test]
    fn coerce_counts_discards() {
        let raw = vec!["1.0", "x", "", "4"];
        let coerced = coerce_column(&raw, parse_numeric);
        assert_eq!(coerced.values, vec![Some(1.0), None, None, Some(4.0)]);
        assert_eq!(coerced.discarded, 2);
    }

    #[test]
    fn reads_ragged_table() {
        let data = "Date, TAVG ,extra\n01/01/2019,1.5\n02/01/2019,2.5,x,y\n";
        let mut table = RawTable::read(data.as_bytes(), "test").unwrap();
        table.normalize_headers();
        assert_eq!(table.headers, vec!["date", "tavg", "extra"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.column("extra").unwrap(), vec!["", "x"]);
        assert_eq!(table.column("tavg").unwrap(), vec!["1.5", "2.5"]);
    }

    #[test]
    fn missing_column_is_reported() {
        let table = RawTable::read("a,b\n1,2\n".as_bytes(), "weather").unwrap();
        let err = table.column("tavg").unwrap_err();
        assert_eq!(err.to_string(), "Missing column 'tavg' in weather");
    }

    #[test]
    fn header_normalization() {
        assert_eq!(normalize_header("  TAVG "), "tavg");
        assert_eq!(normalize_header("Precipitation"), "precipitation");
    }
}
