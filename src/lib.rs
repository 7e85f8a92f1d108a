pub mod analysis;
pub mod crashes;
pub mod error;
pub mod load;
pub mod parsing;
pub mod pipeline;
pub mod structs;
pub mod transform;
pub mod weather;

// Re-export public API
pub use analysis::{Analysis, Correlation, Significance, chart_tables, correlation_report};
pub use error::{PipelineError, Result};
pub use load::{write_csv, write_json, write_parquet};
pub use pipeline::{
    DEFAULT_CRASHES_PATH, DEFAULT_WEATHER_2019_PATH, DEFAULT_WEATHER_2020_PATH, InputPaths,
    Prepared, analyze, prepare, prepare_from_readers,
};
pub use structs::{
    CrashDailyCount, DateWindow, EnrichedRecord, ImputationStrategy, PipelineConfig,
    SimpleLogger, TempCategory, Thresholds, WeatherDailyObservation,
};
