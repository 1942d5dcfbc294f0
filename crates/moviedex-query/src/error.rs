//! Fetch failures as stored on cache entries.

use moviedex_api::tmdb::TmdbError;

/// Classification of a failed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No response was received.
    Network,
    /// Non-2xx response.
    Http {
        /// HTTP status code.
        status_code: u16,
    },
    /// Malformed response body.
    Decode,
}

/// Fetch failure kept on a cache entry and handed to views as data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ErrorInfo {
    /// Error classification.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
}

impl ErrorInfo {
    /// Creates a new error description.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<&TmdbError> for ErrorInfo {
    fn from(err: &TmdbError) -> Self {
        let kind = match err {
            TmdbError::Network { .. } => ErrorKind::Network,
            TmdbError::Http { status_code, .. } => ErrorKind::Http {
                status_code: *status_code,
            },
            TmdbError::Decode { .. } => ErrorKind::Decode,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<TmdbError> for ErrorInfo {
    fn from(err: TmdbError) -> Self {
        Self::from(&err)
    }
}
