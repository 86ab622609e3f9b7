//! Error types for genbank-dl
//!
//! This module provides error handling for the library:
//! - A top-level [`Error`] returned by every fallible public operation
//! - Domain-specific error types for the listing, fetch and filter stages
//! - Context information (URL, identifier, file path) carried on each variant

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for genbank-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for genbank-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "concurrency")
        key: Option<String>,
    },

    /// The remote release listing could not be retrieved
    #[error("listing error: {0}")]
    Listing(#[from] ListingError),

    /// The fetch tool could not be driven at all
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// A single archive file could not be filtered
    #[error("filter error: {0}")]
    Filter(#[from] FilterError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A dispatched worker panicked or was cancelled
    #[error("worker task failed: {0}")]
    Worker(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a [`Error::Config`] tied to a configuration key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_panic() {
            Error::Worker(format!("worker panicked: {}", err))
        } else {
            Error::Worker(format!("worker cancelled: {}", err))
        }
    }
}

/// Errors reaching the remote release listing
#[derive(Debug, Error)]
pub enum ListingError {
    /// Transport-level failure (DNS, connect, timeout, body read)
    #[error("failed to fetch listing from {url}: {source}")]
    Request {
        /// The listing URL
        url: String,
        /// Underlying HTTP client error
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status
    #[error("listing request to {url} returned HTTP {status}")]
    Status {
        /// The listing URL
        url: String,
        /// HTTP status code
        status: u16,
    },
}

/// Errors driving the external fetch tool
#[derive(Debug, Error)]
pub enum FetchError {
    /// No fetch tool binary could be located
    #[error("fetch tool '{0}' not found in PATH")]
    ToolNotFound(String),

    /// The fetch tool process could not be started
    #[error("failed to run fetch tool for {identifier}: {reason}")]
    Spawn {
        /// Remote identifier being fetched
        identifier: String,
        /// Why the process could not be spawned
        reason: String,
    },
}

/// Errors processing one local archive file
#[derive(Debug, Error)]
pub enum FilterError {
    /// The archive content is not a well-formed record stream
    #[error("malformed archive {path}: {reason}")]
    Malformed {
        /// The archive file
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// Reading, decompressing or writing failed
    #[error("I/O failure on {path}: {source}")]
    Io {
        /// The file being read or written
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl FilterError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FilterError::Io {
            path: path.into(),
            source,
        }
    }

    /// The file this error is about
    pub fn path(&self) -> &PathBuf {
        match self {
            FilterError::Malformed { path, .. } | FilterError::Io { path, .. } => path,
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_helper_records_key() {
        let err = Error::config("concurrency", "must be at least 1");
        match &err {
            Error::Config { key, message } => {
                assert_eq!(key.as_deref(), Some("concurrency"));
                assert_eq!(message, "must be at least 1");
            }
            other => panic!("expected Config, got {:?}", other),
        }
        assert_eq!(
            err.to_string(),
            "configuration error: must be at least 1"
        );
    }

    #[test]
    fn status_error_mentions_url_and_code() {
        let err = Error::from(ListingError::Status {
            url: "https://example.com/genbank/".into(),
            status: 503,
        });
        let msg = err.to_string();
        assert!(msg.contains("https://example.com/genbank/"));
        assert!(msg.contains("503"));
    }

    #[test]
    fn filter_error_exposes_path() {
        let malformed = FilterError::Malformed {
            path: PathBuf::from("/data/gbbct1.seq.gz"),
            reason: "unterminated record".into(),
        };
        assert_eq!(malformed.path(), &PathBuf::from("/data/gbbct1.seq.gz"));

        let io = FilterError::io(
            "/data/gbbct2.seq.gz",
            std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof"),
        );
        assert_eq!(io.path(), &PathBuf::from("/data/gbbct2.seq.gz"));
        assert!(io.to_string().contains("gbbct2.seq.gz"));
    }

    #[tokio::test]
    async fn join_error_from_panic_becomes_worker_error() {
        let handle = tokio::spawn(async { panic!("boom") });
        let join_err = handle.await.unwrap_err();
        let err = Error::from(join_err);
        assert!(matches!(err, Error::Worker(ref m) if m.contains("panicked")));
    }
}
