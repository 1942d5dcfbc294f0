//! TMDB client error types.

/// Failure of a single TMDB request.
///
/// Cloneable so that a cache can keep it on an entry and hand copies to
/// every observer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[allow(clippy::module_name_repetitions)]
pub enum TmdbError {
    /// No response was received (connection, TLS, timeout).
    #[error("request failed: {path}: {message}")]
    Network {
        /// Request path relative to the base URL.
        path: String,
        /// Underlying transport error.
        message: String,
    },

    /// The server answered with a non-2xx status.
    #[error("TMDB API error (HTTP {status_code}): {message}")]
    Http {
        /// HTTP status code.
        status_code: u16,
        /// TMDB `status_message`, or the raw body when it is not TMDB-shaped.
        message: String,
    },

    /// The response body was not the expected JSON shape.
    #[error("failed to decode JSON response: {path}: {message}")]
    Decode {
        /// Request path relative to the base URL.
        path: String,
        /// Deserializer error.
        message: String,
    },
}

impl TmdbError {
    /// Returns the HTTP status code for [`TmdbError::Http`].
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status_code, .. } => Some(*status_code),
            Self::Network { .. } | Self::Decode { .. } => None,
        }
    }
}

/// Invalid client configuration, detected when the client is built.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No (or a blank) bearer token was supplied.
    #[error("api_token is required")]
    MissingApiToken,

    /// No User-Agent was supplied.
    #[error("user_agent is required")]
    MissingUserAgent,

    /// The base URL could not be parsed.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    /// The base URL cannot be joined with relative paths.
    #[error("base URL must end with '/': {0}")]
    BaseUrlNotADirectory(String),

    /// The underlying HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}
