//! Error types for generative engine calls

use thiserror::Error;

/// Errors raised by the generative engine client.
#[derive(Debug, Error)]
pub enum EngineError {
    /// API-level failure: network, server error, quota.
    #[error("engine API call failed: {0}")]
    Api(String),

    /// Missing or rejected credentials.
    #[error("engine authentication failed: {0}")]
    Auth(String),

    /// The call exceeded its deadline.
    #[error("engine call timed out")]
    Timeout,

    /// The engine responded but no text could be extracted.
    #[error("engine returned an empty response")]
    EmptyResponse,

    /// The engine responded but the payload violates the expected schema.
    #[error("engine response violates expected schema: {0}")]
    Schema(String),

    /// A stream failed mid-flight. Carries how much arrived before the
    /// failure for diagnostics.
    #[error("engine stream failed after {chunks} chunks / {chars} chars: {message}")]
    Stream {
        chunks: usize,
        chars: usize,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// Whether a retry has any chance of succeeding. Schema violations
    /// recur for the same prompt, so they are not retried blindly.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, EngineError::Schema(_) | EngineError::Auth(_))
    }
}
