//! Application error types

use aisle_domain::{ApiResponse, DomainError, StatusCode};
use thiserror::Error;

use crate::ports::TransportError;

/// Failure of a refresh exchange.
///
/// Cloned to every caller queued behind the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    /// The identity service answered with a non-success status.
    #[error("refresh rejected with {status}: {body}")]
    Rejected {
        /// Response status.
        status: StatusCode,
        /// Response body.
        body: String,
    },

    /// The exchange never got a response.
    #[error("refresh transport error: {0}")]
    Transport(TransportError),

    /// The exchange did not settle in time.
    #[error("refresh timed out after {timeout_ms}ms")]
    Timeout {
        /// The configured bound.
        timeout_ms: u64,
    },

    /// The identity service answered with an unusable body.
    #[error("malformed refresh response: {0}")]
    MalformedResponse(String),

    /// The refresh token was cleared before the exchange could start.
    #[error("no refresh token stored")]
    MissingToken,

    /// The caller driving the exchange went away before it settled.
    #[error("refresh abandoned before completion")]
    Abandoned,
}

/// Errors surfaced by the API client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// No response was received.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The API answered 401 and the client could not recover.
    #[error("unauthorized: {body}")]
    Unauthorized {
        /// Response body.
        body: String,
    },

    /// The API answered with a non-success status other than a recoverable 401.
    #[error("request failed with {status}: {body}")]
    Status {
        /// Response status.
        status: StatusCode,
        /// Response body.
        body: String,
    },

    /// Token refresh failed; the session is gone.
    #[error("token refresh failed: {0}")]
    Refresh(#[from] RefreshError),

    /// The response payload did not match the expected schema.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The request body could not be serialized.
    #[error("failed to encode request body: {0}")]
    Encode(String),

    /// A domain validation error occurred.
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
}

impl ApiError {
    /// Builds the error for a non-success response.
    #[must_use]
    pub fn from_response(response: &ApiResponse) -> Self {
        if response.status.is_unauthorized() {
            Self::Unauthorized {
                body: response.text(),
            }
        } else {
            Self::Status {
                status: response.status,
                body: response.text(),
            }
        }
    }

    /// Returns true if the error means the caller must log in again.
    #[must_use]
    pub const fn requires_login(&self) -> bool {
        matches!(self, Self::Unauthorized { .. } | Self::Refresh(_))
    }
}

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;
