use crate::structs::{
    CrashDailyCount, EnrichedRecord, ImputationStrategy, TempCategory, Thresholds,
    WeatherDailyObservation, month_name, weekday_name,
};
use chrono::{Datelike, NaiveDate, Weekday};
use log::debug;
use std::collections::HashMap;

/// One crash day after the left join, before cleanup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JoinedRow {
    pub date: NaiveDate,
    pub num_crashes: u32,
    /// Date of the matched weather row, `None` when nothing matched.
    pub weather_date: Option<NaiveDate>,
    pub tavg: Option<f64>,
    pub precipitation: Option<f64>,
}

/// Column means used to fill gaps, as computed over the joined table.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ColumnMeans {
    pub num_crashes: Option<f64>,
    pub tavg: Option<f64>,
    pub precipitation: Option<f64>,
}

/// Outcome of [`align_and_enrich`].
#[derive(Debug, Clone)]
pub struct Enriched {
    pub records: Vec<EnrichedRecord>,
    pub means: ColumnMeans,
    pub unmatched_days: usize,
    pub imputed_values: usize,
    pub dropped_rows: usize,
}

/// Left-joins crash counts onto the weather series by date. Every crash day
/// produces exactly one row, in crash order.
pub fn left_join(
    crashes: &[CrashDailyCount],
    weather: &[WeatherDailyObservation],
) -> Vec<JoinedRow> {
    let by_date: HashMap<NaiveDate, &WeatherDailyObservation> =
        weather.iter().map(|w| (w.date, w)).collect();

    crashes
        .iter()
        .map(|crash| {
            let matched = by_date.get(&crash.date);
            JoinedRow {
                date: crash.date,
                num_crashes: crash.num_crashes,
                weather_date: matched.map(|w| w.date),
                tavg: matched.and_then(|w| w.tavg),
                precipitation: matched.and_then(|w| w.precipitation),
            }
        })
        .collect()
}

fn mean_of<I: Iterator<Item = Option<f64>>>(values: I) -> Option<f64> {
    let (sum, count) = values
        .flatten()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Means of every numeric column over the whole joined table, ignoring gaps.
pub fn column_means(rows: &[JoinedRow]) -> ColumnMeans {
    ColumnMeans {
        num_crashes: mean_of(rows.iter().map(|r| Some(f64::from(r.num_crashes)))),
        tavg: mean_of(rows.iter().map(|r| r.tavg)),
        precipitation: mean_of(rows.iter().map(|r| r.precipitation)),
    }
}

/// Fills every missing numeric value with its column mean. The means are
/// computed once, up front, from the unfilled table.
///
/// `num_crashes` takes part in the pass as well but can never be missing,
/// since the join is driven by crash days. Returns the number of values
/// filled.
pub fn impute_column_means(rows: &mut [JoinedRow], means: &ColumnMeans) -> usize {
    let mut filled = 0;
    for row in rows.iter_mut() {
        if row.tavg.is_none() && means.tavg.is_some() {
            row.tavg = means.tavg;
            filled += 1;
        }
        if row.precipitation.is_none() && means.precipitation.is_some() {
            row.precipitation = means.precipitation;
            filled += 1;
        }
    }
    filled
}

/// Precipitation above the cut-off or mean temperature below freezing.
pub fn is_bad_weather(tavg: f64, precipitation: f64, thresholds: &Thresholds) -> bool {
    precipitation > thresholds.bad_weather_precipitation_mm || tavg < thresholds.freezing_c
}

/// Saturday or Sunday.
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Derives the feature columns for one complete row.
pub fn enrich_row(
    date: NaiveDate,
    num_crashes: u32,
    tavg: f64,
    precipitation: f64,
    thresholds: &Thresholds,
) -> EnrichedRecord {
    EnrichedRecord {
        date,
        num_crashes,
        tavg,
        precipitation,
        bad_weather: is_bad_weather(tavg, precipitation, thresholds),
        temp_category: TempCategory::classify(tavg, &thresholds.temp_bounds),
        is_weekend: is_weekend(date),
        month: month_name(date.month()).to_string(),
        weekday: weekday_name(date.weekday()).to_string(),
    }
}

/// Joins, imputes, purges incomplete rows and derives features.
pub fn align_and_enrich(
    crashes: &[CrashDailyCount],
    weather: &[WeatherDailyObservation],
    imputation: ImputationStrategy,
    thresholds: &Thresholds,
) -> Enriched {
    let mut joined = left_join(crashes, weather);
    let unmatched_days = joined.iter().filter(|r| r.weather_date.is_none()).count();
    debug!(
        "Joined {} crash days, {} without weather",
        joined.len(),
        unmatched_days
    );

    let means = column_means(&joined);
    let imputed_values = match imputation {
        ImputationStrategy::ColumnMean => impute_column_means(&mut joined, &means),
        ImputationStrategy::None => 0,
    };
    debug!(
        "Imputed {} values | means: crashes={:?} tavg={:?} precipitation={:?}",
        imputed_values, means.num_crashes, means.tavg, means.precipitation
    );

    // The weather join key is not carried past this point.
    let total = joined.len();
    let records: Vec<EnrichedRecord> = joined
        .into_iter()
        .filter_map(|row| match (row.tavg, row.precipitation) {
            (Some(tavg), Some(precipitation)) => Some(enrich_row(
                row.date,
                row.num_crashes,
                tavg,
                precipitation,
                thresholds,
            )),
            _ => None,
        })
        .collect();
    let dropped_rows = total - records.len();
    if dropped_rows > 0 {
        debug!("Dropped {} incomplete rows", dropped_rows);
    }

    Enriched {
        records,
        means,
        unmatched_days,
        imputed_values,
        dropped_rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn crash(date: NaiveDate, num_crashes: u32) -> CrashDailyCount {
        CrashDailyCount { date, num_crashes }
    }

    fn obs(date: NaiveDate, tavg: Option<f64>, precipitation: Option<f64>) -> WeatherDailyObservation {
        WeatherDailyObservation {
            date,
            tavg,
            precipitation,
        }
    }

    #[test]
    fn left_join_keeps_every_crash_day() {
        let crashes = vec![crash(date(2020, 1, 1), 5), crash(date(2020, 1, 2), 7)];
        let weather = vec![
            obs(date(2020, 1, 1), Some(1.0), Some(2.0)),
            obs(date(2020, 1, 3), Some(9.0), Some(9.0)),
        ];
        let joined = left_join(&crashes, &weather);
        assert_eq!(joined.len(), 2);
        assert_eq!(joined[0].weather_date, Some(date(2020, 1, 1)));
        assert_eq!(joined[0].tavg, Some(1.0));
        assert_eq!(joined[1].weather_date, None);
        assert_eq!(joined[1].precipitation, None);
    }

    #[test]
    fn imputes_from_means_over_joined_table() {
        let crashes = vec![
            crash(date(2020, 1, 1), 10),
            crash(date(2020, 1, 2), 20),
            crash(date(2020, 1, 3), 30),
        ];
        let weather = vec![
            obs(date(2020, 1, 1), Some(2.0), Some(1.0)),
            obs(date(2020, 1, 2), Some(4.0), None),
            // Not a crash day, so it must not influence the means.
            obs(date(2020, 1, 9), Some(100.0), Some(100.0)),
        ];
        let enriched = align_and_enrich(
            &crashes,
            &weather,
            ImputationStrategy::ColumnMean,
            &Thresholds::default(),
        );
        assert_eq!(enriched.means.tavg, Some(3.0));
        assert_eq!(enriched.means.precipitation, Some(1.0));
        assert_eq!(enriched.means.num_crashes, Some(20.0));
        assert_eq!(enriched.unmatched_days, 1);
        assert_eq!(enriched.imputed_values, 3);
        assert_eq!(enriched.dropped_rows, 0);

        let third = &enriched.records[2];
        assert_eq!(third.date, date(2020, 1, 3));
        assert_eq!(third.num_crashes, 30);
        assert_eq!(third.tavg, 3.0);
        assert_eq!(third.precipitation, 1.0);
        assert_eq!(enriched.records[1].precipitation, 1.0);
    }

    #[test]
    fn rows_without_any_weather_are_dropped() {
        let crashes = vec![crash(date(2020, 1, 1), 1), crash(date(2020, 1, 2), 2)];
        let enriched = align_and_enrich(
            &crashes,
            &[],
            ImputationStrategy::ColumnMean,
            &Thresholds::default(),
        );
        assert!(enriched.records.is_empty());
        assert_eq!(enriched.dropped_rows, 2);
        assert_eq!(enriched.means.tavg, None);
    }

    #[test]
    fn no_imputation_drops_incomplete_rows() {
        let crashes = vec![crash(date(2020, 1, 1), 1), crash(date(2020, 1, 2), 2)];
        let weather = vec![obs(date(2020, 1, 1), Some(1.0), Some(0.0))];
        let enriched = align_and_enrich(
            &crashes,
            &weather,
            ImputationStrategy::None,
            &Thresholds::default(),
        );
        assert_eq!(enriched.records.len(), 1);
        assert_eq!(enriched.imputed_values, 0);
        assert_eq!(enriched.dropped_rows, 1);
    }

    #[test]
    fn empty_crash_table_produces_no_rows() {
        let weather = vec![obs(date(2020, 1, 1), Some(1.0), Some(0.0))];
        let enriched = align_and_enrich(
            &[],
            &weather,
            ImputationStrategy::ColumnMean,
            &Thresholds::default(),
        );
        assert!(enriched.records.is_empty());
        assert_eq!(enriched.means, ColumnMeans::default());
    }

    #[test]
    fn bad_weather_rule() {
        let t = Thresholds::default();
        assert!(!is_bad_weather(5.0, 3.0, &t));
        assert!(is_bad_weather(5.0, 3.01, &t));
        assert!(is_bad_weather(-0.1, 0.0, &t));
        assert!(!is_bad_weather(0.0, 0.0, &t));
    }

    #[test]
    fn weekend_detection() {
        assert!(is_weekend(date(2021, 1, 2)));
        assert!(is_weekend(date(2021, 1, 3)));
        assert!(!is_weekend(date(2021, 1, 4)));
        assert!(!is_weekend(date(2021, 1, 1)));
    }

    #[test]
    fn enrich_row_derives_all_features() {
        let record = enrich_row(date(2021, 1, 2), 400, -2.0, 0.0, &Thresholds::default());
        assert!(record.bad_weather);
        assert_eq!(record.temp_category, TempCategory::VeryCold);
        assert!(record.is_weekend);
        assert_eq!(record.month, "January");
        assert_eq!(record.weekday, "Saturday");
    }
}
