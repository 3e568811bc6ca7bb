//! Error kinds shared by the fetchers, the stores and the HTTP layer

use thiserror::Error;

/// Failure to obtain usable data from an upstream source.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request error for {source_name}: {message}")]
    Request {
        source_name: String,
        message: String,
    },
    #[error("HTTP error: {status} for {source_name}")]
    Status { source_name: String, status: u16 },
    #[error("Failed to parse response from {source_name}: {message}")]
    Parse {
        source_name: String,
        message: String,
    },
    #[error("Upstream {source_name} reported an error: {message}")]
    Upstream {
        source_name: String,
        message: String,
    },
    #[error("No usable rates from {source_name}")]
    Empty { source_name: String },
}

impl FetchError {
    pub fn request(source_name: &str, err: impl std::fmt::Display) -> Self {
        Self::Request {
            source_name: source_name.to_string(),
            message: err.to_string(),
        }
    }

    pub fn parse(source_name: &str, err: impl std::fmt::Display) -> Self {
        Self::Parse {
            source_name: source_name.to_string(),
            message: err.to_string(),
        }
    }

    pub fn empty(source_name: &str) -> Self {
        Self::Empty {
            source_name: source_name.to_string(),
        }
    }
}

/// Failure reported by a rate store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The write was rejected because the input is malformed.
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    /// The store could not be reached or could not complete the write.
    #[error("persistence failed: {0}")]
    Persistence(String),
}

impl From<fjall::Error> for StoreError {
    fn from(e: fjall::Error) -> Self {
        Self::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Persistence(format!("corrupt record: {e}"))
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        Self::Persistence(e.to_string())
    }
}
