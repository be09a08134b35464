use std::path::PathBuf;

use thiserror::Error;

/// Failure of a call to an external source (recipe site, USDA, Google).
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("not found (404): {url}")]
    NotFound { url: String },

    #[error("upstream unavailable for {url}: {reason}")]
    UpstreamUnavailable { url: String, reason: String },
}

impl FetchError {
    pub fn unavailable(url: &str, reason: impl Into<String>) -> Self {
        FetchError::UpstreamUnavailable {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("nutrition data for {what}: {source}")]
    Blob {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that abort the ingestion of one recipe.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("store failed: {0}")]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum PlacesError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("places API returned {status}: {message}")]
    Api { status: String, message: String },

    #[error("geolocation returned no coordinates")]
    NoLocation,
}
