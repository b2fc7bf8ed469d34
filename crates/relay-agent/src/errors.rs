//! Agent invocation errors.

use relay_http::HttpError;

/// Failure talking to a remote agent.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Transport-level failure (status, timeout, network, payment).
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The stream ended with an error event.
    #[error("stream error: {reason}")]
    Stream {
        /// Reason carried by the terminal event.
        reason: String,
    },

    /// The agent answered a JSON-RPC call with an error object.
    #[error("agent rejected {method}: {message} (code {code})")]
    Rpc {
        /// JSON-RPC method.
        method: String,
        /// JSON-RPC error code.
        code: i64,
        /// JSON-RPC error message.
        message: String,
    },

    /// A request was rejected before it was sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl AgentError {
    /// Error category string for log fields.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Http(e) => e.category(),
            Self::Stream { .. } => "stream",
            Self::Rpc { .. } => "rpc",
            Self::InvalidRequest(_) => "invalid_request",
        }
    }
}
