//! HTTP error taxonomy.

use relay_core::text::truncate_str;

/// Failure of one HTTP attempt or logical call.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// The request never produced a response (DNS, connect, TLS, reset).
    #[error("network error: {message}")]
    Network {
        /// Error description.
        message: String,
    },

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {}", truncate_str(.body, 200))]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// The attempt did not settle within its deadline.
    #[error("request timed out after {timeout_ms} ms")]
    Timeout {
        /// Deadline that was exceeded.
        timeout_ms: u64,
    },

    /// A payment challenge could not be satisfied.
    #[error("payment failed: {message}")]
    Payment {
        /// Error description.
        message: String,
    },

    /// Response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// The request could not be built.
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// Error description.
        message: String,
    },

    /// The call was cancelled by its owner.
    #[error("request cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for HttpError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network {
            message: e.to_string(),
        }
    }
}

impl HttpError {
    /// Build a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Build an invalid-request error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Whether another attempt could plausibly succeed.
    ///
    /// Local, deterministic failures are never worth repeating.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidRequest { .. } | Self::Cancelled)
    }

    /// HTTP status, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Error category string for log fields and metrics labels.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Network { .. } => "network",
            Self::Status { .. } => "status",
            Self::Timeout { .. } => "timeout",
            Self::Payment { .. } => "payment",
            Self::Decode(_) => "decode",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::Cancelled => "cancelled",
        }
    }
}
