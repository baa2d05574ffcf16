//! Authenticated API client.
//!
//! Wires the token store, the refresh coordinator and the request pipeline
//! together, and exposes typed JSON helpers on top of them.

use std::sync::Arc;
use std::time::Duration;

use aisle_domain::{ApiRequest, ApiResponse, HttpMethod, TokenResponse, join_url};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::auth::{Authenticator, RefreshCoordinator, TokenEndpoint, TokenStatus, TokenStore};
use crate::error::{ApiError, ApiResult};
use crate::pipeline::RequestPipeline;
use crate::ports::HttpTransport;

/// Base URL used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api";

/// Upper bound on a single refresh exchange.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

/// Client construction options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// API base URL, e.g. `http://127.0.0.1:8000/api`.
    pub base_url: String,
    /// Bound on the refresh exchange.
    pub refresh_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
        }
    }
}

/// Client for the wedding-event API.
///
/// Every call carries the current access token. A 401 triggers at most one
/// shared refresh and a single replay of the original request.
pub struct ApiClient {
    base_url: String,
    store: TokenStore,
    pipeline: RequestPipeline,
    auth: Authenticator,
}

impl ApiClient {
    /// Creates a client over `transport`, reading and writing `store`.
    #[must_use]
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        store: TokenStore,
        options: ClientOptions,
    ) -> Self {
        let endpoint = TokenEndpoint::new(transport.clone(), options.base_url.clone());
        let coordinator = Arc::new(RefreshCoordinator::new(
            store.clone(),
            endpoint.clone(),
            options.refresh_timeout,
        ));
        let pipeline = RequestPipeline::new(transport, store.clone(), coordinator);
        let auth = Authenticator::new(endpoint, store.clone());

        Self {
            base_url: options.base_url,
            store,
            pipeline,
            auth,
        }
    }

    /// Returns the configured base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the shared token store.
    #[must_use]
    pub const fn token_store(&self) -> &TokenStore {
        &self.store
    }

    /// Returns the stored session status.
    #[must_use]
    pub fn status(&self) -> TokenStatus {
        self.store.status()
    }

    /// Logs in and stores the issued pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the token exchange fails.
    pub async fn login(&self, identifier: &str, secret: &str) -> ApiResult<TokenResponse> {
        self.auth.login(identifier, secret).await
    }

    /// Forgets both tokens.
    pub async fn logout(&self) {
        self.auth.logout().await;
    }

    /// Sends a raw request through the pipeline.
    ///
    /// # Errors
    ///
    /// See [`RequestPipeline::send`].
    pub async fn send(&self, request: ApiRequest) -> ApiResult<ApiResponse> {
        self.pipeline.send(request).await
    }

    /// `GET {base}{path}`, decoding the JSON payload.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, an unrecovered 401, a non-2xx
    /// status or a payload that does not decode as `T`.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.call(HttpMethod::Get, path, None).await
    }

    /// `POST {base}{path}` with a JSON body.
    ///
    /// # Errors
    ///
    /// As [`ApiClient::get`], plus `ApiError::Encode` if `body` fails to serialize.
    pub async fn post<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        self.call(HttpMethod::Post, path, Some(encode(body)?)).await
    }

    /// `PATCH {base}{path}` with a JSON body.
    ///
    /// # Errors
    ///
    /// As [`ApiClient::post`].
    pub async fn patch<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        self.call(HttpMethod::Patch, path, Some(encode(body)?)).await
    }

    /// `PUT {base}{path}` with a JSON body.
    ///
    /// # Errors
    ///
    /// As [`ApiClient::post`].
    pub async fn put<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        self.call(HttpMethod::Put, path, Some(encode(body)?)).await
    }

    /// `DELETE {base}{path}`. An empty response decodes as `null`.
    ///
    /// # Errors
    ///
    /// As [`ApiClient::get`].
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.call(HttpMethod::Delete, path, None).await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> ApiResult<T> {
        let mut request = ApiRequest::new(method, join_url(&self.base_url, path));
        request.body = body;

        let response = self.pipeline.send(request).await?;
        if !response.is_success() {
            tracing::debug!(status = %response.status, path, "API call failed");
            return Err(ApiError::from_response(&response));
        }
        response
            .json_payload()
            .map_err(|e| ApiError::Decode(format!("{method} {path}: {e}")))
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

fn encode<B: Serialize + ?Sized>(body: &B) -> ApiResult<serde_json::Value> {
    serde_json::to_value(body).map_err(|e| ApiError::Encode(e.to_string()))
}
