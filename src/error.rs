use arrow_schema::ArrowError;
use chrono::NaiveDate;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parquet Error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("Arrow Error: {0}")]
    Arrow(#[from] ArrowError),
    #[error("CSV Error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Missing column '{column}' in {source_name}")]
    MissingColumn {
        source_name: String,
        column: String,
    },
    #[error("Date {0} appears in more than one weather source")]
    DuplicateDate(NaiveDate),
    #[error("undefined correlation: zero-variance input ({0})")]
    ZeroVariance(&'static str),
    #[error("Insufficient data for correlation: need {needed} paired rows, found {found}")]
    InsufficientData { needed: usize, found: usize },
    #[error("Data Error: {0}")]
    Data(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
