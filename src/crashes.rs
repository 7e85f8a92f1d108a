use crate::error::Result;
use crate::parsing::{RawTable, coerce_column, parse_flexible_date};
use crate::structs::{CrashDailyCount, DateWindow, Loaded, ParseReport};
use log::debug;
use std::collections::BTreeMap;
use std::{fs::File, io::Read, path::Path};

/// Header of the crash date column in the NYC collision export.
pub const CRASH_DATE_COLUMN: &str = "CRASH DATE";

/// Loads per-event crash rows from a CSV file and counts crashes per day.
///
/// # Errors
/// Returns error if the file cannot be read or has no crash date column.
pub fn load_crashes(path: &Path, window: &DateWindow) -> Result<Loaded<CrashDailyCount>> {
    debug!("Reading crash file: {}", path.display());
    let file = File::open(path)?;
    read_crashes(file, &path.display().to_string(), window)
}

/// Reads crash rows from any reader. See [`load_crashes`].
///
/// Rows whose date cannot be parsed or that fall outside `window` are
/// dropped and counted. An entirely unparseable date column gives an empty
/// result rather than an error.
pub fn read_crashes<R: Read>(
    reader: R,
    source_name: &str,
    window: &DateWindow,
) -> Result<Loaded<CrashDailyCount>> {
    let table = RawTable::read(reader, source_name)?;
    let dates = coerce_column(&table.column(CRASH_DATE_COLUMN)?, parse_flexible_date);

    let mut report = ParseReport {
        rows_read: table.len(),
        unparseable_dates: dates.discarded,
        ..ParseReport::default()
    };

    let mut daily: BTreeMap<_, u32> = BTreeMap::new();
    for date in dates.values.into_iter().flatten() {
        if window.contains(date) {
            *daily.entry(date).or_default() += 1;
        } else {
            report.out_of_window += 1;
        }
    }

    let rows: Vec<CrashDailyCount> = daily
        .into_iter()
        .map(|(date, num_crashes)| CrashDailyCount { date, num_crashes })
        .collect();

    debug!(
        "{}: {} rows, {} unparseable dates, {} outside {}, {} crash days",
        source_name,
        report.rows_read,
        report.unparseable_dates,
        report.out_of_window,
        window.years_label(),
        rows.len()
    );
    Ok(Loaded { rows, report })
}
