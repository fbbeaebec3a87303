//! Error types for learnhub-client.

use thiserror::Error;

/// Errors returned by learnhub-client operations.
///
/// Note that neither polling-cycle failures nor local-storage failures show up
/// here: poll errors are absorbed by the verification machine (counted against
/// the attempt budget) and storage errors are swallowed by the progress store.
/// This enum covers the surfaces that do propagate: configuration loading and
/// gateway requests.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration file could not be parsed or written.
    #[error("Config error: {0}")]
    Config(String),

    /// A gateway or backend request failed.
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// A gateway response could not be decoded.
    #[error("Bad gateway response: {0}")]
    BadResponse(String),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Gateway(e.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
