//! Request pipeline.
//!
//! Attaches the current access token to every outbound request and hands
//! 401 responses to the [`RefreshCoordinator`]. Anything else, including
//! transport errors and non-401 statuses, passes through untouched.

use std::sync::Arc;

use aisle_domain::{ApiRequest, ApiResponse};

use crate::auth::{RefreshCoordinator, TokenStore};
use crate::error::ApiResult;
use crate::ports::HttpTransport;

/// Sends requests with bearer authentication and 401 recovery.
#[derive(Clone)]
pub struct RequestPipeline {
    transport: Arc<dyn HttpTransport>,
    store: TokenStore,
    coordinator: Arc<RefreshCoordinator>,
}

impl RequestPipeline {
    /// Creates a pipeline.
    #[must_use]
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        store: TokenStore,
        coordinator: Arc<RefreshCoordinator>,
    ) -> Self {
        Self {
            transport,
            store,
            coordinator,
        }
    }

    /// Sends `request`, replaying it at most once after a token refresh.
    ///
    /// The returned response may carry any status except a recovered 401.
    ///
    /// # Errors
    ///
    /// Transport errors propagate immediately. A 401 that cannot be
    /// recovered surfaces as `ApiError::Unauthorized` or `ApiError::Refresh`.
    pub async fn send(&self, mut request: ApiRequest) -> ApiResult<ApiResponse> {
        loop {
            let epoch = self.authorize(&mut request);
            tracing::debug!(
                method = %request.method,
                url = %request.url,
                retried = request.is_retried(),
                "Sending request"
            );

            let response = self.transport.execute(&request).await?;
            if !response.status.is_unauthorized() {
                return Ok(response);
            }

            // Terminates: recover() fails on a request already marked retried.
            self.coordinator
                .recover(&mut request, epoch, &response)
                .await?;
        }
    }

    /// Attaches the current access token, or strips a stale one.
    ///
    /// Returns the refresh epoch observed before the token was read.
    fn authorize(&self, request: &mut ApiRequest) -> u64 {
        let epoch = self.coordinator.epoch();
        let token = self.store.access();
        request.set_bearer(token.as_deref());
        epoch
    }
}
