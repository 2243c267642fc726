//! Error types for the preference core

use thiserror::Error;

/// Result type for preference core operations
pub type Result<T> = std::result::Result<T, PrefsError>;

/// Preference core error types
#[derive(Error, Debug)]
pub enum PrefsError {
    /// Mutation attempted with no active user scope.
    ///
    /// Never surfaced to the presentation layer: mutation entry points
    /// convert this into a logged no-op.
    #[error("no authenticated user")]
    NotAuthenticated,

    /// Compare set already at capacity. The only failure a human sees.
    #[error("comparison set full: limit of {limit} reached")]
    QuotaExceeded { limit: usize },

    /// Remote fetch failed (network, timeout, or a response that does not
    /// describe the requested entity). Recovered inside enrichment by
    /// deterministic synthesis.
    #[error("remote fetch failed: {0}")]
    RemoteFetch(String),

    /// Caller passed an empty or whitespace-only identifier.
    #[error("invalid brand reference: {0}")]
    InvalidReference(String),

    /// Persistent store write failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for PrefsError {
    fn from(err: serde_json::Error) -> Self {
        PrefsError::Serialization(err.to_string())
    }
}

#[cfg(all(feature = "http", not(target_arch = "wasm32")))]
impl From<reqwest::Error> for PrefsError {
    fn from(err: reqwest::Error) -> Self {
        PrefsError::RemoteFetch(err.to_string())
    }
}
