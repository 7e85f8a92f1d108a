//! The four stages composed in order: crash loading, weather loading,
//! alignment/enrichment and correlation analysis.

use crate::analysis::{Analysis, precipitation_crash_correlation};
use crate::crashes::{load_crashes, read_crashes};
use crate::error::Result;
use crate::structs::{
    CrashDailyCount, EnrichedRecord, Loaded, ParseReport, PipelineConfig,
    WeatherDailyObservation,
};
use crate::transform::{Enriched, align_and_enrich};
use crate::weather::{DayFirstStationSource, HourlyReanalysisSource, WeatherSource, union_daily};
use log::{debug, info};
use std::io::Read;
use std::path::PathBuf;

/// Locations of the three input tables.
#[derive(Debug, Clone)]
pub struct InputPaths {
    pub crashes: PathBuf,
    pub weather_2019: PathBuf,
    pub weather_2020: PathBuf,
}

/// File names the analysis reads when no paths are given.
pub const DEFAULT_CRASHES_PATH: &str = "NYC Vehicle Crashes 2012 - 2023.csv";
pub const DEFAULT_WEATHER_2019_PATH: &str = "nyc_temperature.csv";
pub const DEFAULT_WEATHER_2020_PATH: &str = "NYC_Weather_2016_2022.csv";

/// Everything produced before the statistical test.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub crash_report: ParseReport,
    pub weather_report: ParseReport,
    pub crash_days: usize,
    pub weather_days: usize,
    pub enriched: Enriched,
}

impl Prepared {
    pub fn records(&self) -> &[EnrichedRecord] {
        &self.enriched.records
    }
}

fn station_source(config: &PipelineConfig) -> DayFirstStationSource {
    DayFirstStationSource {
        window: config.weather_2019_window,
    }
}

fn reanalysis_source(config: &PipelineConfig) -> HourlyReanalysisSource {
    HourlyReanalysisSource {
        window: config.weather_2020_window,
    }
}

/// Runs the loading and enrichment stages against files on disk.
///
/// # Errors
/// Returns error if an input cannot be read, lacks a required column, or the
/// two weather sources share a date.
pub fn prepare(paths: &InputPaths, config: &PipelineConfig) -> Result<Prepared> {
    let crashes = load_crashes(&paths.crashes, &config.crash_window)?;
    let station = station_source(config).load_daily(&paths.weather_2019)?;
    let reanalysis = reanalysis_source(config).load_daily(&paths.weather_2020)?;
    assemble(crashes, station, reanalysis, config)
}

/// Same as [`prepare`] but reads each table from an in-memory reader.
pub fn prepare_from_readers<C: Read, A: Read, B: Read>(
    crashes: C,
    weather_2019: A,
    weather_2020: B,
    config: &PipelineConfig,
) -> Result<Prepared> {
    let crashes = read_crashes(crashes, "crashes", &config.crash_window)?;
    let station = station_source(config).read_daily(weather_2019)?;
    let reanalysis = reanalysis_source(config).read_daily(weather_2020)?;
    assemble(crashes, station, reanalysis, config)
}

fn assemble(
    crashes: Loaded<CrashDailyCount>,
    station: Loaded<WeatherDailyObservation>,
    reanalysis: Loaded<WeatherDailyObservation>,
    config: &PipelineConfig,
) -> Result<Prepared> {
    info!(
        "Loaded {} crash days from {} rows",
        crashes.rows.len(),
        crashes.report.rows_read
    );
    let weather_report = station.report.merge(&reanalysis.report);
    let weather = union_daily(vec![station.rows, reanalysis.rows])?;
    info!(
        "Loaded {} weather days from {} rows",
        weather.len(),
        weather_report.rows_read
    );

    let enriched = align_and_enrich(
        &crashes.rows,
        &weather,
        config.imputation,
        &config.thresholds,
    );
    info!(
        "Enriched {} records ({} imputed values, {} rows dropped)",
        enriched.records.len(),
        enriched.imputed_values,
        enriched.dropped_rows
    );

    Ok(Prepared {
        crash_report: crashes.report,
        weather_report,
        crash_days: crashes.rows.len(),
        weather_days: weather.len(),
        enriched,
    })
}

/// Runs the correlation test on the prepared table.
///
/// # Errors
/// Fails when the test is undefined: too few rows or a constant column.
pub fn analyze(prepared: &Prepared, config: &PipelineConfig) -> Result<Analysis> {
    let correlation = precipitation_crash_correlation(prepared.records())?;
    let analysis = Analysis::new(correlation, config.alpha);
    debug!(
        "r={} p={} n={} -> {:?}",
        correlation.coefficient, correlation.p_value, correlation.n, analysis.significance
    );
    Ok(analysis)
}
