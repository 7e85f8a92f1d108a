use chrono::{Datelike, NaiveDate, Weekday};
use log::{Log, Metadata, Record as LogRecord};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Simple logger implementation
///
/// Writes to stderr so stdout only carries the analysis report.
pub struct SimpleLogger;

impl Log for SimpleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &LogRecord) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

/// Number of crashes recorded on one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrashDailyCount {
    pub date: NaiveDate,
    pub num_crashes: u32,
}

/// Daily mean weather for one calendar day. Either reading may be missing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherDailyObservation {
    pub date: NaiveDate,
    pub tavg: Option<f64>,
    pub precipitation: Option<f64>,
}

/// A crash day joined with its weather and the derived features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub date: NaiveDate,
    pub num_crashes: u32,
    pub tavg: f64,
    pub precipitation: f64,
    pub bad_weather: bool,
    pub temp_category: TempCategory,
    pub is_weekend: bool,
    pub month: String,
    pub weekday: String,
}

/// Temperature bands, ordered coldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TempCategory {
    #[serde(rename = "Very Cold")]
    VeryCold,
    Cold,
    Mild,
    Warm,
}

impl TempCategory {
    pub const ALL: [TempCategory; 4] = [
        TempCategory::VeryCold,
        TempCategory::Cold,
        TempCategory::Mild,
        TempCategory::Warm,
    ];

    /// Classifies `tavg` against ascending half-open bounds `[b0, b1, b2]`:
    /// `< b0` Very Cold, `< b1` Cold, `< b2` Mild, otherwise Warm.
    pub fn classify(tavg: f64, bounds: &[f64; 3]) -> Self {
        if tavg < bounds[0] {
            TempCategory::VeryCold
        } else if tavg < bounds[1] {
            TempCategory::Cold
        } else if tavg < bounds[2] {
            TempCategory::Mild
        } else {
            TempCategory::Warm
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TempCategory::VeryCold => "Very Cold",
            TempCategory::Cold => "Cold",
            TempCategory::Mild => "Mild",
            TempCategory::Warm => "Warm",
        }
    }
}

impl fmt::Display for TempCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// English day name, Monday first.
pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// English month name for a 1-based month number.
pub fn month_name(month: u32) -> &'static str {
    u8::try_from(month)
        .ok()
        .and_then(|m| chrono::Month::try_from(m).ok())
        .map(|m| m.name())
        .unwrap_or("Unknown")
}

/// Inclusive calendar-day window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Window covering whole calendar years `first..=last`.
    pub fn years(first: i32, last: i32) -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(first, 1, 1).unwrap_or(NaiveDate::MIN),
            end: NaiveDate::from_ymd_opt(last, 12, 31).unwrap_or(NaiveDate::MAX),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn years_label(&self) -> String {
        format!("{}-{}", self.start.year(), self.end.year())
    }
}

/// Cut-offs used by the feature derivations.
#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds {
    /// Precipitation strictly above this (mm) marks a bad-weather day.
    pub bad_weather_precipitation_mm: f64,
    /// Mean temperature strictly below this (°C) marks a bad-weather day.
    pub freezing_c: f64,
    /// Ascending temperature category bounds (°C).
    pub temp_bounds: [f64; 3],
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            bad_weather_precipitation_mm: 3.0,
            freezing_c: 0.0,
            temp_bounds: [0.0, 10.0, 20.0],
        }
    }
}

/// How missing numeric values are handled after the crash/weather join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ImputationStrategy {
    /// Fill every missing numeric value with its column mean.
    #[default]
    ColumnMean,
    /// Leave gaps in place; incomplete rows are dropped.
    None,
}

/// Configuration for the whole pipeline run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub crash_window: DateWindow,
    pub weather_2019_window: DateWindow,
    pub weather_2020_window: DateWindow,
    pub thresholds: Thresholds,
    pub imputation: ImputationStrategy,
    pub alpha: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            crash_window: DateWindow::years(2019, 2021),
            weather_2019_window: DateWindow::years(2019, 2019),
            weather_2020_window: DateWindow::years(2020, 2021),
            thresholds: Thresholds::default(),
            imputation: ImputationStrategy::ColumnMean,
            alpha: 0.05,
        }
    }
}

/// Data-quality counters collected while loading one input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseReport {
    pub rows_read: usize,
    pub unparseable_dates: usize,
    pub out_of_window: usize,
    pub null_values: usize,
}

impl ParseReport {
    /// Rows that made it past date parsing and window filtering.
    pub fn rows_kept(&self) -> usize {
        self.rows_read - self.unparseable_dates - self.out_of_window
    }

    pub fn merge(&self, other: &ParseReport) -> ParseReport {
        ParseReport {
            rows_read: self.rows_read + other.rows_read,
            unparseable_dates: self.unparseable_dates + other.unparseable_dates,
            out_of_window: self.out_of_window + other.out_of_window,
            null_values: self.null_values + other.null_values,
        }
    }
}

/// Rows produced by a loader together with what was discarded on the way.
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub rows: Vec<T>,
    pub report: ParseReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDS: [f64; 3] = [0.0, 10.0, 20.0];

    #[test]
    fn temp_category_boundaries() {
        assert_eq!(TempCategory::classify(-1.0, &BOUNDS), TempCategory::VeryCold);
        assert_eq!(TempCategory::classify(0.0, &BOUNDS), TempCategory::Cold);
        assert_eq!(TempCategory::classify(9.99, &BOUNDS), TempCategory::Cold);
        assert_eq!(TempCategory::classify(10.0, &BOUNDS), TempCategory::Mild);
        assert_eq!(TempCategory::classify(19.99, &BOUNDS), TempCategory::Mild);
        assert_eq!(TempCategory::classify(20.0, &BOUNDS), TempCategory::Warm);
    }

    #[test]
    fn temp_category_labels() {
        assert_eq!(TempCategory::VeryCold.to_string(), "Very Cold");
        assert_eq!(
            serde_json::to_string(&TempCategory::VeryCold).unwrap(),
            "\"Very Cold\""
        );
        assert_eq!(serde_json::to_string(&TempCategory::Warm).unwrap(), "\"Warm\"");
    }

    #[test]
    fn window_is_inclusive() {
        let window = DateWindow::years(2019, 2021);
        assert!(window.contains(NaiveDate::from_ymd_opt(2019, 1, 1).unwrap()));
        assert!(window.contains(NaiveDate::from_ymd_opt(2021, 12, 31).unwrap()));
        assert!(!window.contains(NaiveDate::from_ymd_opt(2018, 12, 31).unwrap()));
        assert!(!window.contains(NaiveDate::from_ymd_opt(2022, 1, 1).unwrap()));
        assert_eq!(window.years_label(), "2019-2021");
    }

    #[test]
    fn names() {
        assert_eq!(weekday_name(Weekday::Sat), "Saturday");
        assert_eq!(month_name(1), "January");
        assert_eq!(month_name(12), "December");
        assert_eq!(month_name(13), "Unknown");
        assert_eq!(month_name(257), "Unknown");
        assert_eq!(month_name(0), "Unknown");
    }

    #[test]
    fn report_counts() {
        let a = ParseReport {
            rows_read: 10,
            unparseable_dates: 2,
            out_of_window: 3,
            null_values: 1,
        };
        assert_eq!(a.rows_kept(), 5);
        let merged = a.merge(&a);
        assert_eq!(merged.rows_read, 20);
        assert_eq!(merged.rows_kept(), 10);
    }
}
