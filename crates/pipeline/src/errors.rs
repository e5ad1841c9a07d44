//! Top-level error and retry-policy types for the pitch generation domain.
//!
//! [`PitchError`] is the failure taxonomy every stage reports in. Component
//! errors (HTTP transport, snapshot I/O) live in their infrastructure crates
//! and convert into [`PitchError::ExternalCall`] at the port boundary.
//!
//! [`RetryPolicy`] is a cross-cutting concern: any error type that participates
//! in retry decisions must be able to produce a [`RetryPolicy`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// Returned by infrastructure error types to let the caller decide whether to
/// re-invoke an operation.
///
/// - `Retryable` errors: timeouts, rate-limit responses, server errors.
/// - `NonRetryable` errors: authentication failures, malformed requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable {
        /// Minimum back-off before the next attempt. `None` means apply the
        /// caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried.
    NonRetryable,
}

// ---------------------------------------------------------------------------
// Pipeline errors
// ---------------------------------------------------------------------------

/// Failure taxonomy for both generation pipelines.
///
/// Whether a variant is fatal depends on where it is raised: a
/// [`PitchError::ContentParse`] aborts one slide during fan-out but only
/// falls back to a default during review.
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
pub enum PitchError {
    /// Required input is missing (client identifier, slide outlines, pitch
    /// context). Always fatal to the run.
    #[error("Validation error: {message}")]
    Validation {
        /// What was missing or malformed.
        message: String,
    },

    /// A best-effort lookup returned nothing. Never fatal.
    #[error("Lookup failure: {collection}/{id} not found")]
    LookupFailure {
        /// Collection that was searched.
        collection: String,
        /// Key or query value that found no record.
        id: String,
    },

    /// Model output could not be parsed into the expected JSON shape.
    #[error("Content parse error: {message}")]
    ContentParse {
        /// Parser message, including a short excerpt of the offending text.
        message: String,
    },

    /// An LLM or document-store call failed (transport, quota, timeout).
    #[error("External call failed: {message}")]
    ExternalCall {
        /// Description of the failed call.
        message: String,
    },

    /// The terminal stage found nothing to aggregate. Always fatal.
    #[error("Aggregation failure: {message}")]
    Aggregation {
        /// What was missing.
        message: String,
    },

    /// A pipeline graph or runtime configuration is invalid.
    ///
    /// Produced when a graph is compiled or configuration is loaded; a run
    /// never starts with an invalid configuration.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },
}

impl PitchError {
    /// Creates a [`PitchError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a [`PitchError::ContentParse`].
    pub fn content_parse(message: impl Into<String>) -> Self {
        Self::ContentParse {
            message: message.into(),
        }
    }

    /// Creates a [`PitchError::ExternalCall`].
    pub fn external(message: impl Into<String>) -> Self {
        Self::ExternalCall {
            message: message.into(),
        }
    }

    /// Creates a [`PitchError::Aggregation`].
    pub fn aggregation(message: impl Into<String>) -> Self {
        Self::Aggregation {
            message: message.into(),
        }
    }

    /// Creates a [`PitchError::Configuration`].
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}
