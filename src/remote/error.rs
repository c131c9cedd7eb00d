//! Error types shared by the remote API client.

use reqwest::StatusCode;
use thiserror::Error;

/// Convenient result alias returning [`ApiError`] failures.
pub type ApiResult<T> = Result<T, ApiError>;

/// Failures that can occur while talking to the backend.
///
/// Timeouts are surfaced separately from other transport failures: both are
/// transient and retryable, but callers (the poller in particular) must never
/// fold either into a "no results yet" answer.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build API client")]
    ClientBuilder {
        /// Underlying client failure.
        #[source]
        source: reqwest::Error,
    },
    /// The request exceeded the configured deadline.
    #[error("request to `{path}` timed out")]
    Timeout {
        /// Endpoint path the request targeted.
        path: String,
    },
    /// The request could not be sent or the connection failed mid-flight.
    #[error("failed to send request to `{path}`")]
    Transport {
        /// Endpoint path the request targeted.
        path: String,
        /// Underlying transport failure.
        #[source]
        source: reqwest::Error,
    },
    /// The backend answered with a non-success status code.
    #[error("unexpected response status {status} from `{path}`")]
    Status {
        /// Endpoint path the request targeted.
        path: String,
        /// Status code returned.
        status: StatusCode,
    },
    /// The response body did not match the expected schema.
    #[error("failed to decode response from `{path}`")]
    Decode {
        /// Endpoint path the request targeted.
        path: String,
        /// Underlying decode failure.
        #[source]
        source: reqwest::Error,
    },
    /// A success-shaped response whose embedded status field reports failure.
    #[error("`{path}` rejected the request: {message}")]
    Rejected {
        /// Endpoint path the request targeted.
        path: String,
        /// Backend-provided failure message.
        message: String,
    },
}

impl ApiError {
    /// Whether retrying later is reasonable (timeouts and transport faults).
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Timeout { .. } | ApiError::Transport { .. })
    }
}
