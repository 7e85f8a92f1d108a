use clap::Parser;
use crash_weather::{
    DEFAULT_CRASHES_PATH, DEFAULT_WEATHER_2019_PATH, DEFAULT_WEATHER_2020_PATH,
    ImputationStrategy, InputPaths, PipelineConfig, PipelineError, SimpleLogger, analyze,
    chart_tables, correlation_report, prepare, write_csv, write_json, write_parquet,
};
use log::{debug, info};
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

static LOGGER: SimpleLogger = SimpleLogger;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Crash events CSV (one row per crash, with a CRASH DATE column)
    #[arg(long, default_value = DEFAULT_CRASHES_PATH)]
    crashes: PathBuf,

    /// 2019 daily weather CSV (DD/MM/YYYY dates, tavg and precipitation columns)
    #[arg(long, default_value = DEFAULT_WEATHER_2019_PATH)]
    weather_2019: PathBuf,

    /// 2020-2021 hourly weather CSV (time, temperature_2m (°C), precipitation (mm))
    #[arg(long, default_value = DEFAULT_WEATHER_2020_PATH)]
    weather_2020: PathBuf,

    /// Significance level for the correlation test
    #[arg(long, default_value_t = 0.05)]
    alpha: f64,

    /// How missing weather values are filled after the join
    #[arg(long, value_enum, default_value = "column-mean")]
    impute: ImputationStrategy,

    /// Print the monthly, weekday/month and temperature category tables
    #[arg(long, default_value_t = false)]
    report: bool,

    /// Write the enriched table to ./output/<NAME>/ as .csv, .json and .parquet
    #[arg(long, value_name = "NAME")]
    export: Option<String>,

    /// Log level for output
    #[arg(long, default_value = "false")]
    debug: bool,
}

fn main() -> Result<(), PipelineError> {
    let total_start = Instant::now();
    log::set_logger(&LOGGER)
        .map_err(|e| PipelineError::Data(format!("Logger already set: {}", e)))?;

    let args = Args::parse();
    if args.debug {
        log::set_max_level(log::LevelFilter::Debug);
    } else {
        log::set_max_level(log::LevelFilter::Info);
    }

    let paths = InputPaths {
        crashes: args.crashes,
        weather_2019: args.weather_2019,
        weather_2020: args.weather_2020,
    };
    let config = PipelineConfig {
        imputation: args.impute,
        alpha: args.alpha,
        ..PipelineConfig::default()
    };
    debug!(
        "Inputs: crashes={} | weather_2019={} | weather_2020={}",
        paths.crashes.display(),
        paths.weather_2019.display(),
        paths.weather_2020.display()
    );
    debug!(
        "Windows: crashes {} | weather {} + {} | imputation={:?} alpha={}",
        config.crash_window.years_label(),
        config.weather_2019_window.years_label(),
        config.weather_2020_window.years_label(),
        config.imputation,
        config.alpha
    );

    let processing_start = Instant::now();
    let prepared = prepare(&paths, &config)?;
    info!(
        "Data preparation completed in {:.2?} | {} records",
        processing_start.elapsed(),
        prepared.records().len()
    );
    debug!(
        "Crash rows: {} read, {} unparseable, {} outside window",
        prepared.crash_report.rows_read,
        prepared.crash_report.unparseable_dates,
        prepared.crash_report.out_of_window
    );
    debug!(
        "Weather rows: {} read, {} unparseable, {} outside window, {} null readings",
        prepared.weather_report.rows_read,
        prepared.weather_report.unparseable_dates,
        prepared.weather_report.out_of_window,
        prepared.weather_report.null_values
    );

    if let Some(name) = &args.export {
        let output_dir = PathBuf::from(format!("./output/{}", name));
        fs::create_dir_all(&output_dir)?;
        let output_name = name.split(['/', '\\']).next_back().unwrap_or(name);
        let csv_path = output_dir.join(format!("{}.csv", output_name));
        let json_path = output_dir.join(format!("{}.json", output_name));
        let parquet_path = output_dir.join(format!("{}.parquet", output_name));

        let io_start = Instant::now();
        write_csv(prepared.records(), &csv_path)?;
        write_json(prepared.records(), &json_path)?;
        write_parquet(prepared.records(), &parquet_path)?;
        info!(
            "Wrote enriched table to {} in {:.2?}",
            output_dir.display(),
            io_start.elapsed()
        );
    }

    let analysis = analyze(&prepared, &config)?;
    println!("{}", correlation_report(&analysis));

    if args.report {
        println!("\n{}", chart_tables(prepared.records()));
    }

    debug!("Total runtime: {:.2?}", total_start.elapsed());
    Ok(())
}
