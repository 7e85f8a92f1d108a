use crate::error::Result;
use crate::structs::EnrichedRecord;
use arrow_array::{BooleanArray, Date32Array, Float64Array, RecordBatch, StringArray, UInt32Array};
use arrow_schema::{DataType, Field, Schema};
use chrono::NaiveDate;
use csv::Writer;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use std::io::Write;
use std::{fs::File, path::Path, sync::Arc};

const DATE_FORMAT: &str = "%Y-%m-%d";

const HEADERS: [&str; 9] = [
    "date",
    "num_crashes",
    "tavg",
    "precipitation",
    "bad_weather",
    "temp_category",
    "is_weekend",
    "month",
    "weekday",
];

/// Writes the enriched table to a CSV file.
///
/// # Arguments
/// * `records` - Enriched crash/weather rows
/// * `output_path` - Path where the CSV file will be created
///
/// # Errors
/// Returns error if file cannot be created or written to.
pub fn write_csv(records: &[EnrichedRecord], output_path: &Path) -> Result<()> {
    let file = File::create(output_path)?;
    write_csv_to(records, file)
}

/// Writes the enriched table as CSV to any writer. Booleans are written as
/// `1`/`0`.
pub fn write_csv_to<W: Write>(records: &[EnrichedRecord], out: W) -> Result<()> {
    let mut writer = Writer::from_writer(out);
    writer.write_record(HEADERS)?;

    for r in records {
        writer.write_record(&[
            r.date.format(DATE_FORMAT).to_string(),
            r.num_crashes.to_string(),
            format!("{:.2}", r.tavg),
            format!("{:.2}", r.precipitation),
            u8::from(r.bad_weather).to_string(),
            r.temp_category.label().to_string(),
            u8::from(r.is_weekend).to_string(),
            r.month.clone(),
            r.weekday.clone(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Writes the enriched table to a pretty-formatted JSON file.
///
/// # Errors
/// Returns error if file cannot be created or serialization fails.
pub fn write_json(records: &[EnrichedRecord], output_path: &Path) -> Result<()> {
    let file = File::create(output_path)?;
    serde_json::to_writer_pretty(file, records)?;
    Ok(())
}

fn days_since_epoch(date: NaiveDate) -> i32 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    (date - epoch).num_days() as i32
}

/// Builds the Arrow batch behind [`write_parquet`].
pub fn to_record_batch(records: &[EnrichedRecord]) -> Result<RecordBatch> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("date", DataType::Date32, false),
        Field::new("num_crashes", DataType::UInt32, false),
        Field::new("tavg", DataType::Float64, false),
        Field::new("precipitation", DataType::Float64, false),
        Field::new("bad_weather", DataType::Boolean, false),
        Field::new("temp_category", DataType::Utf8, false),
        Field::new("is_weekend", DataType::Boolean, false),
        Field::new("month", DataType::Utf8, false),
        Field::new("weekday", DataType::Utf8, false),
    ]));

    let dates: Date32Array = records
        .iter()
        .map(|r| Some(days_since_epoch(r.date)))
        .collect();
    let crashes: UInt32Array = records.iter().map(|r| r.num_crashes).collect();
    let tavgs: Float64Array = records.iter().map(|r| r.tavg).collect();
    let precipitation: Float64Array = records.iter().map(|r| r.precipitation).collect();
    let bad_weather: BooleanArray = records.iter().map(|r| Some(r.bad_weather)).collect();
    let categories =
        StringArray::from_iter_values(records.iter().map(|r| r.temp_category.label()));
    let weekends: BooleanArray = records.iter().map(|r| Some(r.is_weekend)).collect();
    let months = StringArray::from_iter_values(records.iter().map(|r| r.month.as_str()));
    let weekdays = StringArray::from_iter_values(records.iter().map(|r| r.weekday.as_str()));

    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(dates),
            Arc::new(crashes),
            Arc::new(tavgs),
            Arc::new(precipitation),
            Arc::new(bad_weather),
            Arc::new(categories),
            Arc::new(weekends),
            Arc::new(months),
            Arc::new(weekdays),
        ],
    )?;
    Ok(batch)
}

/// Writes the enriched table to a Parquet file.
///
/// # Errors
/// Returns error if file cannot be created or Arrow operations fail.
pub fn write_parquet(records: &[EnrichedRecord], output_path: &Path) -> Result<()> {
    let batch = to_record_batch(records)?;
    let file = File::create(output_path)?;
    let props = WriterProperties::builder().build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::Thresholds;
    use crate::transform::enrich_row;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use std::path::PathBuf;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("crash_weather_{}_{}", std::process::id(), name))
    }

    fn sample() -> Vec<EnrichedRecord> {
        vec![
            enrich_row(
                NaiveDate::from_ymd_opt(2021, 1, 2).unwrap(),
                512,
                -1.25,
                0.0,
                &Thresholds::default(),
            ),
            enrich_row(
                NaiveDate::from_ymd_opt(2021, 7, 5).unwrap(),
                640,
                24.0,
                1.5,
                &Thresholds::default(),
            ),
        ]
    }

    #[test]
    fn csv_output() {
        let mut buf = Vec::new();
        write_csv_to(&sample(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "date,num_crashes,tavg,precipitation,bad_weather,temp_category,is_weekend,month,weekday"
        );
        assert_eq!(lines[1], "2021-01-02,512,-1.25,0.00,1,Very Cold,1,January,Saturday");
        assert_eq!(lines[2], "2021-07-05,640,24.00,1.50,0,Warm,0,July,Monday");
    }

    #[test]
    fn json_shape() {
        let value = serde_json::to_value(&sample()[0]).unwrap();
        assert_eq!(value["date"], "2021-01-02");
        assert_eq!(value["temp_category"], "Very Cold");
        assert_eq!(value["is_weekend"], true);
    }

    #[test]
    fn record_batch_columns() {
        let batch = to_record_batch(&sample()).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 9);
        let dates = batch
            .column(0)
            .as_any()
            .downcast_ref::<Date32Array>()
            .unwrap();
        assert_eq!(dates.value(0), 18629);
    }

    #[test]
    fn json_file_reads_back() {
        let path = scratch_path("enriched.json");
        let records = sample();
        write_json(&records, &path).unwrap();
        let file = File::open(&path).unwrap();
        let read: Vec<EnrichedRecord> = serde_json::from_reader(file).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(read, records);
    }

    #[test]
    fn parquet_file_reads_back() {
        let path = scratch_path("enriched.parquet");
        write_parquet(&sample(), &path).unwrap();

        let file = File::open(&path).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();
        let batches: Vec<RecordBatch> = reader.collect::<std::result::Result<_, _>>().unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(batches.iter().map(|b| b.num_rows()).sum::<usize>(), 2);
        let batch = &batches[0];
        let dates = batch
            .column_by_name("date")
            .unwrap()
            .as_any()
            .downcast_ref::<Date32Array>()
            .unwrap();
        assert_eq!(dates.value(1), 18813);
        let categories = batch
            .column_by_name("temp_category")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(categories.value(0), "Very Cold");
        assert_eq!(categories.value(1), "Warm");
    }
}
