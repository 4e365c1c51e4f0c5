//! Client error types.

use thiserror::Error;

/// Client error type.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API server returned an error status.
    #[error("API error ({status}): {reason}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Machine-readable reason from the `Status` body.
        reason: String,
        /// Human-readable message from the `Status` body.
        message: String,
    },

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists.
    #[error("Already exists: {0}")]
    Conflict(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_)) || matches!(self, Error::Api { status: 404, .. })
    }

    /// Check if this is an already-exists error.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_)) || matches!(self, Error::Api { status: 409, .. })
    }

    /// Check if the API server rejected the request as malformed.
    pub fn is_bad_request(&self) -> bool {
        matches!(self, Error::Api { status: 400, .. })
    }

    /// Check if the API server rejected the credentials.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::Api { status: 401 | 403, .. })
    }

    /// Check if this is a server error.
    pub fn is_server_error(&self) -> bool {
        matches!(self, Error::Api { status, .. } if *status >= 500)
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
