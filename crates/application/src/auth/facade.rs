//! Login/logout facade.

use aisle_domain::{Credentials, TokenResponse, token_preview};

use super::{TokenEndpoint, TokenStore};
use crate::error::ApiResult;

/// Populates and clears the token store.
#[derive(Debug, Clone)]
pub struct Authenticator {
    endpoint: TokenEndpoint,
    store: TokenStore,
}

impl Authenticator {
    /// Creates a facade over `endpoint` writing to `store`.
    #[must_use]
    pub const fn new(endpoint: TokenEndpoint, store: TokenStore) -> Self {
        Self { endpoint, store }
    }

    /// Exchanges credentials for a token pair and stores it.
    ///
    /// Both tokens are replaced in one transition. When the service issues
    /// no refresh token, the prior refresh token is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails; the store is left untouched.
    pub async fn login(&self, identifier: &str, secret: &str) -> ApiResult<TokenResponse> {
        let credentials = Credentials::new(identifier, secret);
        let tokens = self.endpoint.login(&credentials).await?;

        let refresh = tokens.refresh.clone().or_else(|| self.store.refresh());
        self.store
            .replace(Some(&tokens.access), refresh.as_deref())
            .await;
        tracing::info!(
            identifier,
            access = %token_preview(&tokens.access),
            refreshable = tokens.refresh.is_some(),
            "Logged in"
        );
        Ok(tokens)
    }

    /// Clears both tokens. Local only: nothing is sent to the server.
    pub async fn logout(&self) {
        self.store.clear_all().await;
        tracing::info!("Logged out");
    }
}
