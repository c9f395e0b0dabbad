// src/error.rs

//! Unified error handling for the crawler.

use std::fmt;

use thiserror::Error;

/// Result type alias for crawler operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Outbound request failure, classified so callers can tell a dead mirror
/// apart from a page that merely returned an error status.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request exceeded its deadline
    #[error("request timed out")]
    Timeout,

    /// TCP/TLS connection could not be established
    #[error("connection failed: {0}")]
    Connect(String),

    /// The server answered with a non-success status
    #[error("HTTP status {0}")]
    Status(u16),

    /// The response body could not be read
    #[error("failed to read response body: {0}")]
    Body(String),

    /// The global request throttle was shut down
    #[error("request throttle closed")]
    Closed,

    /// Anything reqwest reports that does not fit above
    #[error("transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Status codes worth retrying with backoff.
    pub fn is_retryable_status(status: u16) -> bool {
        matches!(status, 429 | 500 | 502 | 503 | 504)
    }

    /// Whether a retry policy should try the request again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Connect(_) => true,
            Self::Status(code) => Self::is_retryable_status(*code),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status(status.as_u16())
        } else if err.is_body() || err.is_decode() {
            Self::Body(err.to_string())
        } else {
            Self::Other(err.to_string())
        }
    }
}

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be built
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Regex compilation failed
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Outbound request failed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Every mirror failed its probe, or the failure backoff is still active
    #[error("No reachable mirror found (or mirror check is in backoff cooldown)")]
    NoMirrorAvailable,

    /// The caller passed something that is not a usable URL
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The URL points outside the mirror allow-list
    #[error("Invalid domain: {host}. Only configured mirrors are allowed")]
    SsrfRejected { host: String },

    /// A single page fetch failed
    #[error("Failed to fetch {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: TransportError,
    },

    /// The details page carries no recognisable info hash
    #[error("Info Hash could not be found on the page: {url}")]
    HashNotFound { url: String },

    /// Markup could not be interpreted
    #[error("Parse error: {0}")]
    Parse(String),

    /// The worker pool no longer accepts tasks
    #[error("Worker pool is shut down")]
    PoolClosed,

    /// Download client operation failed
    #[error("Download client error: {0}")]
    Client(String),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an invalid URL error.
    pub fn invalid_url(url: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a download client error.
    pub fn client(message: impl fmt::Display) -> Self {
        Self::Client(message.to_string())
    }

    /// True for the "temporarily unreachable" condition the web layer shows
    /// as a retry-later message instead of a hard failure.
    pub fn is_user_facing_unavailable(&self) -> bool {
        matches!(self, Self::NoMirrorAvailable)
    }
}
