//! Provider-side failures and their retry classification.

use std::time::Duration;

use pipeline::{PitchError, RetryPolicy};

/// Failures talking to an LLM provider.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LlmError {
    /// The request never produced an HTTP response (connect, TLS, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// HTTP 429. `retry_after` comes from the `retry-after` header.
    #[error("rate limited: {message}")]
    RateLimited {
        retry_after: Option<Duration>,
        message: String,
    },

    /// Any other non-success status.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// A success response whose body could not be read.
    #[error("response decode error: {0}")]
    Decode(String),

    /// A success response with no text content.
    #[error("response contained no text")]
    EmptyResponse,

    /// The provider is misconfigured (e.g. missing API key).
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl LlmError {
    /// 429, 5xx and transport failures are worth retrying; nothing else is.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Transport(_) => RetryPolicy::Retryable { after: None },
            Self::RateLimited { retry_after, .. } => RetryPolicy::Retryable {
                after: *retry_after,
            },
            Self::Status { status, .. } if *status >= 500 => RetryPolicy::Retryable { after: None },
            Self::Status { .. }
            | Self::Decode(_)
            | Self::EmptyResponse
            | Self::Configuration(_) => RetryPolicy::NonRetryable,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<LlmError> for PitchError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Configuration(message) => PitchError::configuration(message),
            other => PitchError::external(format!("LLM call failed: {other}")),
        }
    }
}
