//! Error types for Gate client operations.
//!
//! The client only reports failures that happen below the HTTP status line:
//! connection problems, unreadable bodies and bad configuration. Any status
//! code the server sends back is returned to the caller as a [`RawResponse`]
//! so that interpretation stays with the caller.
//!
//! [`RawResponse`]: crate::types::RawResponse

use std::fmt;

/// Result type alias for Gate client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of client errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network-related errors (transient, retryable).
    Network,
    /// The response arrived but could not be decoded.
    Format,
    /// The client handle was configured incorrectly.
    Config,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::Format => "Unreadable response",
            Self::Config => "Invalid client configuration",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check that Gate is reachable and try again",
            Self::Format => "Gate returned a body that is not valid JSON, check its logs",
            Self::Config => "Check gate_endpoint and default_headers in your config",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to Gate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request never produced a response (DNS, TLS, connect, timeout).
    #[error("request to {url} failed: {message}")]
    Transport {
        /// Target URL.
        url: String,
        /// Error message from the HTTP library.
        message: String,
    },

    /// The response body could not be read or decoded.
    #[error("invalid response body: {0}")]
    InvalidBody(String),

    /// The client configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create a transport error.
    pub fn transport(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Get the error category for retry logic.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Transport { .. } => ErrorCategory::Network,
            Error::InvalidBody(_) => ErrorCategory::Format,
            Error::InvalidConfig(_) => ErrorCategory::Config,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidBody(err.to_string())
    }
}
