use std::path::PathBuf;
use thiserror::Error;

/// Failures of the sales store itself.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("failed to open sales database {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to decode sales row: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("query worker failed: {0}")]
    Worker(String),
}

/// Failures while loading years, sales rows or geometry on the client side.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse GeoJSON from {origin}: {source}")]
    GeoJson {
        origin: String,
        #[source]
        source: geojson::Error,
    },
    #[error("GeoJSON from {0} must be a FeatureCollection")]
    NotFeatureCollection(String),
    #[error(transparent)]
    Store(#[from] QueryError),
}

/// A fetch failure tagged with what was being loaded, as reported by the orchestrators.
#[derive(Debug, Error)]
#[error("failed to load {what}{}: {source}", .year.map(|y| format!(" for {}", y)).unwrap_or_default())]
pub struct LoadError {
    pub what: &'static str,
    pub year: Option<i32>,
    #[source]
    pub source: FetchError,
}

impl LoadError {
    pub fn new(what: &'static str, year: Option<i32>) -> impl FnOnce(FetchError) -> Self {
        move |source| Self { what, year, source }
    }
}
