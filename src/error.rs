use std::path::PathBuf;
use thiserror::Error;

/// Why a single workbook sheet could not be read.
///
/// The loader never lets these escape: every variant degrades to an empty
/// table and a logged warning, so callers cannot tell them apart.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("workbook not found: {0}")]
    MissingFile(PathBuf),

    #[error("sheet '{sheet}' not found in {path}")]
    MissingSheet { path: PathBuf, sheet: String },

    #[error("failed to read {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid date '{0}' (expected YYYY-MM-DD)")]
    InvalidDate(String),

    #[error("start date {start} is after end date {end}")]
    InvalidRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },
}

#[derive(Error, Debug)]
pub enum DashboardError {
    /// Neither planning nor execution data could be loaded.
    #[error("no planning or execution data found; check the workbook paths")]
    NoData,

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("export failed for {path}: {message}")]
    Export { path: PathBuf, message: String },
}
