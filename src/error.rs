//! Error types for the resilience layer
//!
//! Failures are modeled as tagged unions rather than property bags:
//! [`ApiFailure`] describes why a single wrapped call failed (HTTP response,
//! transport fault, or local setup error), and [`RetryError`] describes the
//! outcome of the retry driver as a whole (circuit open, rejected without
//! retrying, or retries exhausted). The original [`ApiFailure`] always rides
//! along as a `source`, so downstream classification can still inspect status
//! codes after the retry loop has given up.

use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Result type alias for wrapped API calls.
pub type ApiResult<T> = Result<T, ApiFailure>;

/// Transport-level fault codes reported by an HTTP client when no response
/// was received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCode {
    /// Connection could not be established or was lost mid-flight.
    Network,
    /// The client aborted the request.
    ConnectionAborted,
    /// No response arrived before the client-side deadline.
    Timeout,
}

/// Failure of a single wrapped API call.
#[derive(Error, Debug, Clone)]
pub enum ApiFailure {
    /// The backend answered with an error status.
    #[error("server responded {status}: {message}")]
    Response {
        /// HTTP status code.
        status: u16,
        /// Server-provided detail text from the error payload, when present.
        detail: Option<String>,
        /// Client-side summary of the failure.
        message: String,
    },

    /// The request left the client but no response arrived.
    #[error("transport failure: {message}")]
    Transport {
        /// Fault code when the client reported one.
        code: Option<TransportCode>,
        message: String,
    },

    /// The call failed before any request was made (bad input, serialization,
    /// client setup).
    #[error("{0}")]
    Local(String),
}

impl ApiFailure {
    /// Convenience constructor for an HTTP error response.
    pub fn response(
        status: u16,
        detail: impl Into<Option<String>>,
        message: impl Into<String>,
    ) -> Self {
        Self::Response {
            status,
            detail: detail.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for a transport fault.
    pub fn transport(code: TransportCode, message: impl Into<String>) -> Self {
        Self::Transport {
            code: Some(code),
            message: message.into(),
        }
    }

    /// HTTP status code, when the backend actually responded.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Response { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(feature = "reqwest-impl")]
impl From<reqwest::Error> for ApiFailure {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            ApiFailure::Response {
                status: status.as_u16(),
                detail: None,
                message: err.to_string(),
            }
        } else if err.is_timeout() {
            ApiFailure::transport(TransportCode::Timeout, err.to_string())
        } else if err.is_connect() || err.is_request() {
            ApiFailure::transport(TransportCode::Network, err.to_string())
        } else {
            ApiFailure::Local(err.to_string())
        }
    }
}

/// Outcome of the retry driver when the wrapped call did not succeed.
#[derive(Error, Debug, Clone)]
pub enum RetryError {
    /// The circuit breaker for the service is open; no call was attempted.
    #[error("circuit breaker is open for service '{service}'; next attempt allowed in {}s", .retry_after.as_secs())]
    CircuitOpen {
        /// Logical service name whose breaker rejected the call.
        service: String,
        /// When the breaker will admit its next probe.
        next_attempt_time: Instant,
        /// How long the caller should wait, measured at rejection time.
        retry_after: Duration,
    },

    /// The failure was not worth retrying and is surfaced on first occurrence.
    #[error("request failed and will not be retried")]
    Rejected {
        #[source]
        source: ApiFailure,
    },

    /// Every attempt failed with a retryable error.
    #[error("request failed after {attempts} attempts")]
    Exhausted {
        /// Number of attempts actually made.
        attempts: u32,
        #[source]
        source: ApiFailure,
    },
}

impl RetryError {
    /// The underlying call failure, when one exists (absent for circuit-open
    /// rejections, which never invoked the call).
    pub fn failure(&self) -> Option<&ApiFailure> {
        match self {
            Self::CircuitOpen { .. } => None,
            Self::Rejected { source } | Self::Exhausted { source, .. } => Some(source),
        }
    }
}

impl From<ApiFailure> for RetryError {
    /// Lets call sites that bypass the retry driver feed a raw call failure
    /// straight into the classifier.
    fn from(source: ApiFailure) -> Self {
        Self::Rejected { source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_display_includes_status() {
        let err = ApiFailure::response(503, None, "service unavailable");
        assert_eq!(err.to_string(), "server responded 503: service unavailable");
        assert_eq!(err.status(), Some(503));
    }

    #[test]
    fn transport_has_no_status() {
        let err = ApiFailure::transport(TransportCode::Timeout, "deadline exceeded");
        assert_eq!(err.status(), None);
    }

    #[tokio::test]
    async fn circuit_open_display_reports_wait() {
        let err = RetryError::CircuitOpen {
            service: "appointments".to_string(),
            next_attempt_time: Instant::now() + Duration::from_secs(30),
            retry_after: Duration::from_secs(30),
        };
        let text = err.to_string();
        assert!(text.contains("appointments"));
        assert!(text.contains("30s"));
    }

    #[test]
    fn raw_failure_converts_to_rejected() {
        let err: RetryError = ApiFailure::response(404, None, "not found").into();
        assert!(matches!(err, RetryError::Rejected { .. }));
        assert_eq!(err.failure().and_then(ApiFailure::status), Some(404));
    }
}
