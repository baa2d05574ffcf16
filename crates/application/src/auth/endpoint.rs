//! Token endpoint client.
//!
//! Performs the login and refresh exchanges directly on the transport:
//! no bearer credential is attached and a 401 never triggers recovery.

use std::fmt;
use std::sync::Arc;

use aisle_domain::{
    ApiRequest, ApiResponse, Credentials, RefreshRequest, RefreshResponse, TokenPair,
    TokenResponse, join_url,
};

use crate::error::{ApiError, ApiResult, RefreshError};
use crate::ports::HttpTransport;

/// Login path, relative to the API base.
const LOGIN_PATH: &str = "/token/";
/// Refresh path, relative to the API base.
const REFRESH_PATH: &str = "/token/refresh/";

/// Client for `POST {base}/token/` and `POST {base}/token/refresh/`.
#[derive(Clone)]
pub struct TokenEndpoint {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
}

impl fmt::Debug for TokenEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenEndpoint")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl TokenEndpoint {
    /// Creates an endpoint client for the API at `base_url`.
    #[must_use]
    pub fn new(transport: Arc<dyn HttpTransport>, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
        }
    }

    /// Exchanges credentials for a token response.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-success status or an
    /// unparsable body.
    pub async fn login(&self, credentials: &Credentials) -> ApiResult<TokenResponse> {
        let body = serde_json::to_value(credentials.to_request())
            .map_err(|e| ApiError::Encode(e.to_string()))?;
        let request = ApiRequest::post(join_url(&self.base_url, LOGIN_PATH), body);

        let response = self.transport.execute(&request).await?;
        if !response.is_success() {
            return Err(ApiError::from_response(&response));
        }

        let tokens: TokenResponse = response
            .json_payload()
            .map_err(|e| ApiError::Decode(format!("login response: {e}")))?;
        if tokens.access.is_empty() {
            return Err(ApiError::Decode(
                "login response carries an empty access token".to_string(),
            ));
        }
        Ok(tokens)
    }

    /// Exchanges `refresh_token` for a new pair.
    ///
    /// A response without `refresh` keeps `refresh_token`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-success status or an
    /// unusable body.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, RefreshError> {
        let body = serde_json::to_value(RefreshRequest {
            refresh: refresh_token.to_string(),
        })
        .map_err(|e| RefreshError::MalformedResponse(e.to_string()))?;
        let request = ApiRequest::post(join_url(&self.base_url, REFRESH_PATH), body);

        let response = self
            .transport
            .execute(&request)
            .await
            .map_err(RefreshError::Transport)?;

        Self::parse_refresh(&response, refresh_token)
    }

    fn parse_refresh(response: &ApiResponse, prior: &str) -> Result<TokenPair, RefreshError> {
        if !response.is_success() {
            return Err(RefreshError::Rejected {
                status: response.status,
                body: response.text(),
            });
        }

        let parsed: RefreshResponse = response
            .json_payload()
            .map_err(|e| RefreshError::MalformedResponse(e.to_string()))?;
        if parsed.access.is_empty() {
            return Err(RefreshError::MalformedResponse(
                "empty access token".to_string(),
            ));
        }
        Ok(parsed.into_pair(prior))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use aisle_domain::StatusCode;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_refresh_defaults_refresh() {
        let response = ApiResponse::json(200, &serde_json::json!({"access": "a2"}));
        let pair = TokenEndpoint::parse_refresh(&response, "r1").unwrap();
        assert_eq!(pair, TokenPair::new("a2", "r1"));
    }

    #[test]
    fn test_parse_refresh_rejected() {
        let response = ApiResponse::json(401, &serde_json::json!({"detail": "invalid"}));
        let error = TokenEndpoint::parse_refresh(&response, "r1").unwrap_err();
        assert!(matches!(
            error,
            RefreshError::Rejected {
                status: StatusCode(401),
                ..
            }
        ));
    }

    #[test]
    fn test_parse_refresh_malformed() {
        let response = ApiResponse::json(200, &serde_json::json!({"token": "a2"}));
        assert!(matches!(
            TokenEndpoint::parse_refresh(&response, "r1"),
            Err(RefreshError::MalformedResponse(_))
        ));

        let response = ApiResponse::json(200, &serde_json::json!({"access": ""}));
        assert!(matches!(
            TokenEndpoint::parse_refresh(&response, "r1"),
            Err(RefreshError::MalformedResponse(_))
        ));
    }
}
