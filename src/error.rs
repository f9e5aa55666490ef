//! Error types for each pipeline stage.
//!
//! Download, extract and schema failures abort a run. Per-batch insert
//! failures never surface here; they are recorded in [`crate::writer::LoadStats`].

use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by the storage collaborator.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{0}")]
    Other(String),
}

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Invalid archive URL {0:?}: no file name in final path segment")]
    InvalidUrl(String),

    #[error("HTTP error fetching {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Download produced no file at {0:?}")]
    MissingOutput(PathBuf),
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to read archive {path:?}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Failed to list extracted files in {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Expected exactly one payload directory in {dir:?}, found {found}")]
    PayloadDirectory { dir: PathBuf, found: usize },

    #[error("Payload file missing after extraction: {0:?}")]
    MissingPayload(PathBuf),

    #[error("Unsupported locale {0:?}")]
    UnsupportedLocale(String),
}

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to create table {table}: {source}")]
    Create {
        table: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("Failed to truncate table {table}: {source}")]
    Truncate {
        table: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("Table {table} exists with unexpected columns {found:?}")]
    ColumnMismatch {
        table: &'static str,
        found: Vec<String>,
    },
}

/// File-level load failure. Batch failures are not represented here.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to open {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("Working directory error at {path:?}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Another import is already running for this identity (lock file {0:?})")]
    Busy(PathBuf),

    #[error("Failed to adjust store time limit: {0}")]
    TimeLimit(#[source] StoreError),
}
