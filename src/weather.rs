//! Weather loaders.
//!
//! Each upstream provider gets its own [`WeatherSource`] adapter that maps
//! its headers, date format and units onto [`WeatherDailyObservation`]. The
//! daily series from all sources are merged only at the end by
//! [`union_daily`].

use crate::error::{PipelineError, Result};
use crate::parsing::{
    RawTable, coerce_column, parse_day_first_date, parse_numeric, parse_timestamp,
};
use crate::structs::{DateWindow, Loaded, ParseReport, WeatherDailyObservation};
use chrono::NaiveDate;
use log::debug;
use std::collections::{BTreeMap, HashSet};
use std::{fs::File, io::Read, path::Path};

/// Canonical column names every adapter produces.
pub const TAVG: &str = "tavg";
pub const PRECIPITATION: &str = "precipitation";

/// An upstream weather provider normalized to the daily schema.
pub trait WeatherSource {
    /// Short label used in logs and errors.
    fn name(&self) -> &str;

    /// Parses one provider file into daily mean observations.
    fn read_daily<R: Read>(&self, reader: R) -> Result<Loaded<WeatherDailyObservation>>;

    /// Opens `path` and parses it with [`WeatherSource::read_daily`].
    fn load_daily(&self, path: &Path) -> Result<Loaded<WeatherDailyObservation>> {
        debug!("Reading {} weather file: {}", self.name(), path.display());
        let file = File::open(path)?;
        self.read_daily(file)
    }
}

/// Daily station export with `DD/MM/YYYY` dates and free-styled headers
/// (`date`, `tavg`, `precipitation` after trimming and lower-casing).
#[derive(Debug, Clone)]
pub struct DayFirstStationSource {
    pub window: DateWindow,
}

impl WeatherSource for DayFirstStationSource {
    fn name(&self) -> &str {
        "station"
    }

    fn read_daily<R: Read>(&self, reader: R) -> Result<Loaded<WeatherDailyObservation>> {
        let mut table = RawTable::read(reader, self.name())?;
        table.normalize_headers();
        let dates = coerce_column(&table.column("date")?, parse_day_first_date);
        let readings = Readings::from_table(&table, TAVG, PRECIPITATION)?;
        Ok(collect_daily(
            self.name(),
            table.len(),
            dates.values,
            dates.discarded,
            readings,
            &self.window,
        ))
    }
}

/// Hourly reanalysis export with ISO timestamps in `time` and unit-suffixed
/// headers `temperature_2m (°C)` and `precipitation (mm)`.
#[derive(Debug, Clone)]
pub struct HourlyReanalysisSource {
    pub window: DateWindow,
}

impl HourlyReanalysisSource {
    pub const TIME_COLUMN: &'static str = "time";
    pub const TEMPERATURE_COLUMN: &'static str = "temperature_2m (°C)";
    pub const PRECIPITATION_COLUMN: &'static str = "precipitation (mm)";
}

impl WeatherSource for HourlyReanalysisSource {
    fn name(&self) -> &str {
        "reanalysis"
    }

    fn read_daily<R: Read>(&self, reader: R) -> Result<Loaded<WeatherDailyObservation>> {
        let table = RawTable::read(reader, self.name())?;
        let stamps = coerce_column(&table.column(Self::TIME_COLUMN)?, parse_timestamp);
        let days = stamps.values.iter().map(|ts| ts.map(|t| t.date())).collect();
        let readings = Readings::from_table(
            &table,
            Self::TEMPERATURE_COLUMN,
            Self::PRECIPITATION_COLUMN,
        )?;
        Ok(collect_daily(
            self.name(),
            table.len(),
            days,
            stamps.discarded,
            readings,
            &self.window,
        ))
    }
}

/// Coerced temperature and precipitation columns of one file.
struct Readings {
    tavg: Vec<Option<f64>>,
    precipitation: Vec<Option<f64>>,
    nulls: usize,
}

impl Readings {
    fn from_table(table: &RawTable, tavg_column: &str, precipitation_column: &str) -> Result<Self> {
        let tavg = coerce_column(&table.column(tavg_column)?, parse_numeric);
        let precipitation = coerce_column(&table.column(precipitation_column)?, parse_numeric);
        Ok(Self {
            nulls: tavg.discarded + precipitation.discarded,
            tavg: tavg.values,
            precipitation: precipitation.values,
        })
    }
}

fn collect_daily(
    source_name: &str,
    rows_read: usize,
    dates: Vec<Option<NaiveDate>>,
    unparseable_dates: usize,
    readings: Readings,
    window: &DateWindow,
) -> Loaded<WeatherDailyObservation> {
    let mut report = ParseReport {
        rows_read,
        unparseable_dates,
        null_values: readings.nulls,
        ..ParseReport::default()
    };

    let mut kept = Vec::with_capacity(dates.len());
    for ((date, tavg), precipitation) in dates
        .into_iter()
        .zip(readings.tavg)
        .zip(readings.precipitation)
    {
        let Some(date) = date else { continue };
        if !window.contains(date) {
            report.out_of_window += 1;
            continue;
        }
        kept.push(WeatherDailyObservation {
            date,
            tavg,
            precipitation,
        });
    }

    let rows = aggregate_daily_mean(kept);
    debug!(
        "{}: {} rows, {} unparseable dates, {} outside {}, {} null readings, {} days",
        source_name,
        report.rows_read,
        report.unparseable_dates,
        report.out_of_window,
        window.years_label(),
        report.null_values,
        rows.len()
    );
    Loaded { rows, report }
}

#[derive(Default)]
struct MeanAccumulator {
    sum: f64,
    count: usize,
}

impl MeanAccumulator {
    fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.count += 1;
        }
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Groups readings by date and averages each column, skipping missing
/// values. A day with no reading for a column keeps `None` there. Output is
/// sorted by date.
pub fn aggregate_daily_mean<I>(readings: I) -> Vec<WeatherDailyObservation>
where
    I: IntoIterator<Item = WeatherDailyObservation>,
{
    let mut by_date: BTreeMap<NaiveDate, (MeanAccumulator, MeanAccumulator)> = BTreeMap::new();
    for reading in readings {
        let (tavg, precipitation) = by_date.entry(reading.date).or_default();
        tavg.push(reading.tavg);
        precipitation.push(reading.precipitation);
    }

    by_date
        .into_iter()
        .map(|(date, (tavg, precipitation))| WeatherDailyObservation {
            date,
            tavg: tavg.mean(),
            precipitation: precipitation.mean(),
        })
        .collect()
}

/// Concatenates daily series in the given order.
///
/// # Errors
/// Returns `PipelineError::DuplicateDate` if any date occurs in more than
/// one series, since a silent duplicate would skew the join.
pub fn union_daily(
    series: Vec<Vec<WeatherDailyObservation>>,
) -> Result<Vec<WeatherDailyObservation>> {
    let total = series.iter().map(Vec::len).sum();
    let mut seen = HashSet::with_capacity(total);
    let mut combined = Vec::with_capacity(total);
    for rows in series {
        for row in rows {
            if !seen.insert(row.date) {
                return Err(PipelineError::DuplicateDate(row.date));
            }
            combined.push(row);
        }
    }
    debug!("Combined weather series: {} days", combined.len());
    Ok(combined)
}
