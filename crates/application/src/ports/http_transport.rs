//! HTTP transport port

use aisle_domain::{ApiRequest, ApiResponse};
use async_trait::async_trait;
use thiserror::Error;

/// Errors raised when no response was received.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The URL could not be parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The request body could not be encoded.
    #[error("invalid body: {0}")]
    InvalidBody(String),

    /// The request timed out.
    #[error("request timed out after {timeout_ms}ms")]
    Timeout {
        /// The timeout that elapsed.
        timeout_ms: u64,
    },

    /// The host name could not be resolved.
    #[error("DNS resolution failed for {host}: {message}")]
    DnsError {
        /// Host that failed to resolve.
        host: String,
        /// Underlying message.
        message: String,
    },

    /// The server refused the connection.
    #[error("connection refused by {host}:{port}")]
    ConnectionRefused {
        /// Target host.
        host: String,
        /// Target port.
        port: u16,
    },

    /// Any other connection failure.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The redirect limit was exceeded.
    #[error("too many redirects (max {max})")]
    TooManyRedirects {
        /// Redirect limit.
        max: usize,
    },

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

/// Port for executing HTTP requests.
///
/// Any HTTP status, including 401, is a successful `ApiResponse`; only
/// failures to obtain a response are errors. Status interpretation belongs
/// to the request pipeline.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Executes a request and returns the response.
    ///
    /// # Errors
    ///
    /// Returns an error if no response could be obtained.
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError>;
}
