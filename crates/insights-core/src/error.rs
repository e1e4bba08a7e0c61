use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the insights pipeline.
#[derive(Error, Debug)]
pub enum InsightsError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The CSV reader rejected the input (bad quoting, invalid UTF-8, ...).
    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A column the pipeline cannot work without is absent from the header row.
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// A date string did not match any recognised format.
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// An aggregation period name is not one of day / week / month.
    #[error("Invalid aggregation period: {0}")]
    InvalidPeriod(String),

    /// A filter is internally inconsistent (e.g. start after end).
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// The input path does not exist.
    #[error("Data path not found: {0}")]
    DataPathNotFound(PathBuf),

    /// No CSV files were found under the given directory.
    #[error("No CSV files found in {0}")]
    NoDataFiles(PathBuf),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Command-line arguments were rejected, or help / version was requested.
    #[error(transparent)]
    Cli(#[from] clap::Error),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the insights crates.
pub type Result<T> = std::result::Result<T, InsightsError>;
