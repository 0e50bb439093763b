//! Error taxonomy for generative requests.
//!
//! Every transport-level problem is classified at the
//! [`TransportInvoker`](crate::transport::TransportInvoker) boundary into one
//! of the closed sets below. Raw status codes and client errors never travel
//! further than that.

use thiserror::Error;

/// Generic wording shown to end users for any failure.
pub const SERVICE_UNAVAILABLE_MESSAGE: &str = "Service unavailable, please try again.";

/// Returned synchronously by `submit` when the request cannot start.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The raw input was empty after trimming whitespace.
    #[error("input must not be empty")]
    EmptyInput,
}

/// A transient failure worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum RetryableCause {
    /// HTTP 429.
    #[error("rate limited by the service")]
    RateLimited,
    /// HTTP 5xx.
    #[error("service returned a server error")]
    ServerError,
    /// Connection or timeout failure before any status was obtained.
    #[error("network error before a response was received")]
    NetworkError,
}

/// A failure that retrying cannot fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum TerminalCause {
    /// Any non-2xx status that is neither 429 nor 5xx.
    #[error("service rejected the request")]
    ClientError,
    /// 2xx response without `candidates[0].content.parts[0].text`.
    #[error("service response did not contain generated text")]
    MalformedResponse,
}

/// The cause a failed session settles with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum FailureCause {
    /// Settled on a non-retryable cause.
    #[error(transparent)]
    Terminal(#[from] TerminalCause),
    /// Every allowed attempt failed with a retryable cause.
    #[error("service at capacity after exhausting retries")]
    CapacityExceeded,
}

impl FailureCause {
    /// The message to render for end users. Identical for every cause.
    pub fn user_message(&self) -> &'static str {
        SERVICE_UNAVAILABLE_MESSAGE
    }

    /// Returns true for [`FailureCause::CapacityExceeded`].
    pub fn is_capacity_exceeded(&self) -> bool {
        matches!(self, Self::CapacityExceeded)
    }
}

/// Raw failure reported by an [`HttpTransport`](crate::transport::HttpTransport).
///
/// Only the invoker sees this; it is folded into
/// [`RetryableCause::NetworkError`] before leaving the transport layer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),
    /// The request did not complete in time.
    #[error("request timed out")]
    Timeout,
    /// Any other I/O level failure.
    #[error("transport failure: {0}")]
    Other(String),
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable was not set.
    #[error("environment variable `{0}` is not set")]
    MissingVar(&'static str),
    /// An environment variable held a value that could not be parsed.
    #[error("environment variable `{name}` has invalid value `{value}`")]
    InvalidVar {
        /// Variable name.
        name: &'static str,
        /// Offending value.
        value: String,
    },
    /// The endpoint is not a valid URL.
    #[error("invalid endpoint `{endpoint}`: {reason}")]
    InvalidEndpoint {
        /// The configured endpoint.
        endpoint: String,
        /// Why it failed to parse.
        reason: String,
    },
    /// The TOML document could not be parsed.
    #[error("invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),
    /// The HTTP client could not be built from the configuration.
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}
