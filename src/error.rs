use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum GeodataError {
    #[error("invalid dataset specifier: {0}")]
    InvalidSpecifier(String),

    #[error("unknown dataset: {0}")]
    UnknownDataset(String),

    #[error("invalid TIGER year: {0}")]
    InvalidYear(String),

    #[error("invalid county FIPS code: {0}")]
    InvalidCountyFips(String),

    #[error("unknown state abbreviation: {0}")]
    UnknownState(String),

    #[error("state not present in crosswalk: {0}")]
    StateNotFound(String),

    #[error("county not found: {name} ({state})")]
    CountyNotFound { state: String, name: String },

    #[error("dataset {dataset} requires parameter `{parameter}`")]
    MissingParameter { dataset: String, parameter: String },

    #[error("unsupported data format: {0}")]
    UnsupportedFormat(String),

    #[error("frame is missing column: {0}")]
    MissingColumn(String),

    #[error("download failed: {0}")]
    Http(String),

    #[error("server returned status {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("frame error: {0}")]
    Frame(String),

    #[error("missing config file geodata.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),
}

impl From<arrow::error::ArrowError> for GeodataError {
    fn from(err: arrow::error::ArrowError) -> Self {
        GeodataError::Frame(err.to_string())
    }
}

impl From<parquet::errors::ParquetError> for GeodataError {
    fn from(err: parquet::errors::ParquetError) -> Self {
        GeodataError::Frame(err.to_string())
    }
}
