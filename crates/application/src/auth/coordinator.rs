//! Single-flight token refresh.
//!
//! The coordinator owns the refresh state machine:
//!
//! ```text
//!            401, not retried, refresh token present
//!   Idle ───────────────────────────────────────────────▶ Refreshing
//!    ▲                                                   │  further 401s queue (FIFO)
//!    └──────────── exchange settled: release waiters ◀───┘
//! ```
//!
//! At most one exchange is in flight. Callers that hit a 401 while it runs
//! wait on a oneshot channel and are released, in enqueue order, only after
//! the new pair is persisted (or the store is cleared on failure). Every
//! settled exchange, successful or not, bumps an epoch. A 401 for a request
//! sent under an older epoch never leads: it is replayed after a success and
//! fails with the same error after a failure.
//!
//! The state lock is never held across an `.await`.

use std::collections::VecDeque;
use std::time::Duration;

use aisle_domain::{ApiRequest, ApiResponse, token_preview};
use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::{TokenEndpoint, TokenStore};
use crate::error::{ApiError, ApiResult, RefreshError};

type Waiter = oneshot::Sender<Result<(), RefreshError>>;

enum Phase {
    Idle,
    Refreshing { waiters: VecDeque<Waiter> },
}

struct RefreshState {
    phase: Phase,
    epoch: u64,
    // Outcome of the exchange that produced `epoch`, if it failed.
    last_failure: Option<RefreshError>,
}

/// What a caller that observed a 401 must do.
enum Role {
    /// Tokens changed since the request was sent; resubmit it.
    Replay,
    /// The session the request was sent under already failed to refresh.
    Fail(RefreshError),
    /// An exchange is in flight; wait for it.
    Wait(oneshot::Receiver<Result<(), RefreshError>>),
    /// No exchange is in flight; run one.
    Lead,
}

/// Coordinates token refresh across concurrent requests.
pub struct RefreshCoordinator {
    store: TokenStore,
    endpoint: TokenEndpoint,
    timeout: Duration,
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    /// Creates an idle coordinator.
    #[must_use]
    pub fn new(store: TokenStore, endpoint: TokenEndpoint, timeout: Duration) -> Self {
        Self {
            store,
            endpoint,
            timeout,
            state: Mutex::new(RefreshState {
                phase: Phase::Idle,
                epoch: 0,
                last_failure: None,
            }),
        }
    }

    /// Returns the number of settled exchanges so far.
    ///
    /// Abandoned exchanges do not count. The pipeline captures the epoch
    /// before attaching a token.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.state.lock().epoch
    }

    /// Returns true while an exchange is in flight.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        matches!(self.state.lock().phase, Phase::Refreshing { .. })
    }

    #[cfg(test)]
    fn queued(&self) -> usize {
        match &self.state.lock().phase {
            Phase::Refreshing { waiters } => waiters.len(),
            Phase::Idle => 0,
        }
    }

    /// Handles a 401 for `request`, sent under `epoch`.
    ///
    /// `Ok(())` means the request must be resubmitted. The request is marked
    /// retried, so a second 401 on the replay is terminal.
    ///
    /// # Errors
    ///
    /// - `ApiError::Unauthorized` if the request was already retried, or if
    ///   no refresh token is stored (the store is cleared first).
    /// - `ApiError::Refresh` if the exchange this caller led or waited on
    ///   failed, or if the exchange that ended its epoch failed.
    pub async fn recover(
        &self,
        request: &mut ApiRequest,
        epoch: u64,
        response: &ApiResponse,
    ) -> ApiResult<()> {
        if !request.mark_retried() {
            tracing::debug!(url = %request.url, "401 on a replayed request");
            return Err(ApiError::from_response(response));
        }

        if self.store.refresh().is_none() {
            tracing::warn!(url = %request.url, "401 without a refresh token, clearing session");
            self.store.clear_all().await;
            return Err(ApiError::from_response(response));
        }

        let role = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if state.epoch != epoch {
                state
                    .last_failure
                    .clone()
                    .map_or(Role::Replay, Role::Fail)
            } else if let Phase::Refreshing { waiters } = &mut state.phase {
                let (tx, rx) = oneshot::channel();
                waiters.push_back(tx);
                Role::Wait(rx)
            } else {
                state.phase = Phase::Refreshing {
                    waiters: VecDeque::new(),
                };
                Role::Lead
            }
        };

        match role {
            Role::Replay => {
                tracing::debug!(url = %request.url, "Tokens refreshed since send, replaying");
                Ok(())
            }
            Role::Fail(e) => {
                tracing::debug!(url = %request.url, error = %e, "Session failed since send");
                Err(ApiError::Refresh(e))
            }
            Role::Wait(rx) => {
                tracing::debug!(url = %request.url, "Queued behind in-flight refresh");
                match rx.await {
                    Ok(outcome) => outcome.map_err(ApiError::Refresh),
                    Err(_) => Err(ApiError::Refresh(RefreshError::Abandoned)),
                }
            }
            Role::Lead => self.lead(response).await,
        }
    }

    /// Runs the exchange as the single leader, then releases the queue.
    ///
    /// Must be entered with the phase already set to `Refreshing`.
    async fn lead(&self, response: &ApiResponse) -> ApiResult<()> {
        let mut session = Session::new(self);

        let Some(refresh_token) = self.store.refresh() else {
            tracing::warn!("Refresh token cleared before the exchange, clearing session");
            self.store.stage(None, None);
            self.store.flush().await;
            session.settle(Err(RefreshError::MissingToken));
            return Err(ApiError::from_response(response));
        };
        tracing::info!(refresh = %token_preview(&refresh_token), "Refreshing access token");

        let exchange = self.endpoint.refresh(&refresh_token);
        let outcome = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(outcome) => outcome,
            Err(_) => Err(RefreshError::Timeout {
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        };

        match outcome {
            Ok(pair) => {
                self.store.stage(Some(&pair.access), Some(&pair.refresh));
                session.commit();
                self.store.flush().await;
                tracing::info!(access = %token_preview(&pair.access), "Access token refreshed");
                session.settle(Ok(()));
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed, clearing session");
                self.store.stage(None, None);
                self.store.flush().await;
                session.settle(Err(e.clone()));
                Err(ApiError::Refresh(e))
            }
        }
    }

    /// Returns to `Idle` and wakes every waiter in FIFO order.
    fn release(&self, outcome: &Result<(), RefreshError>) {
        let waiters = {
            let mut state = self.state.lock();
            match outcome {
                // The store is untouched, so the next 401 may lead again.
                Err(RefreshError::Abandoned) => {}
                Ok(()) => {
                    state.epoch += 1;
                    state.last_failure = None;
                }
                Err(e) => {
                    state.epoch += 1;
                    state.last_failure = Some(e.clone());
                }
            }
            match std::mem::replace(&mut state.phase, Phase::Idle) {
                Phase::Refreshing { waiters } => waiters,
                Phase::Idle => VecDeque::new(),
            }
        };

        tracing::debug!(
            count = waiters.len(),
            ok = outcome.is_ok(),
            "Releasing queued requests"
        );
        for waiter in waiters {
            // A waiter whose caller went away has nothing left to resume.
            let _ = waiter.send(outcome.clone());
        }
    }
}

/// The leader's claim on the `Refreshing` phase.
///
/// Dropping it unsettled (the leader's future was cancelled) releases the
/// queue so waiters never hang: with success once the new pair is in
/// memory, with `RefreshError::Abandoned` before that.
struct Session<'a> {
    coordinator: Option<&'a RefreshCoordinator>,
    committed: bool,
}

impl<'a> Session<'a> {
    const fn new(coordinator: &'a RefreshCoordinator) -> Self {
        Self {
            coordinator: Some(coordinator),
            committed: false,
        }
    }

    /// Records that the new pair is visible to readers.
    const fn commit(&mut self) {
        self.committed = true;
    }

    fn settle(mut self, outcome: Result<(), RefreshError>) {
        if let Some(coordinator) = self.coordinator.take() {
            coordinator.release(&outcome);
        }
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        let Some(coordinator) = self.coordinator.take() else {
            return;
        };
        if self.committed {
            tracing::warn!("Token refresh cancelled while persisting");
            coordinator.release(&Ok(()));
        } else {
            tracing::warn!("Token refresh abandoned mid-flight");
            coordinator.release(&Err(RefreshError::Abandoned));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::ports::{HttpTransport, StorageError, TokenStorage, TransportError};
    use aisle_domain::{TokenKey, TokenPair};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Refresh endpoint that blocks until released.
    struct GatedRefresh {
        gate: Notify,
        calls: AtomicUsize,
        reply: Result<serde_json::Value, TransportError>,
    }

    #[async_trait]
    impl HttpTransport for GatedRefresh {
        async fn execute(&self, _request: &ApiRequest) -> Result<ApiResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            self.reply
                .clone()
                .map(|body| ApiResponse::json(200, &body))
        }
    }

    fn setup(
        reply: Result<serde_json::Value, TransportError>,
        timeout: Duration,
    ) -> (Arc<RefreshCoordinator>, Arc<GatedRefresh>, TokenStore) {
        setup_with_store(reply, timeout, TokenStore::in_memory())
    }

    fn setup_with_store(
        reply: Result<serde_json::Value, TransportError>,
        timeout: Duration,
        store: TokenStore,
    ) -> (Arc<RefreshCoordinator>, Arc<GatedRefresh>, TokenStore) {
        let transport = Arc::new(GatedRefresh {
            gate: Notify::new(),
            calls: AtomicUsize::new(0),
            reply,
        });
        let endpoint = TokenEndpoint::new(transport.clone(), "http://api.test/api");
        let coordinator = Arc::new(RefreshCoordinator::new(store.clone(), endpoint, timeout));
        (coordinator, transport, store)
    }

    fn unauthorized() -> ApiResponse {
        ApiResponse::json(401, &serde_json::json!({"detail": "token expired"}))
    }

    async fn wait_until_refreshing(coordinator: &RefreshCoordinator) {
        while !coordinator.is_refreshing() {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_retried_request_is_terminal() {
        let (coordinator, transport, store) =
            setup(Ok(serde_json::json!({"access": "a2"})), Duration::from_secs(5));
        store.set_pair(&TokenPair::new("a1", "r1")).await;

        let mut request = ApiRequest::get("http://api.test/api/gifts/");
        request.mark_retried();

        let result = coordinator.recover(&mut request, 0, &unauthorized()).await;
        assert!(matches!(result, Err(ApiError::Unauthorized { .. })));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
        // Pass-through: the session is left alone.
        assert_eq!(store.pair(), Some(TokenPair::new("a1", "r1")));
    }

    #[tokio::test]
    async fn test_stale_epoch_replays_without_refresh() {
        let (coordinator, transport, store) =
            setup(Ok(serde_json::json!({"access": "a2"})), Duration::from_secs(5));
        store.set_pair(&TokenPair::new("a2", "r1")).await;
        coordinator.state.lock().epoch = 1;

        let mut request = ApiRequest::get("http://api.test/api/gifts/");
        coordinator
            .recover(&mut request, 0, &unauthorized())
            .await
            .unwrap();

        assert!(request.is_retried());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_waiters_share_one_exchange() {
        let (coordinator, transport, store) =
            setup(Ok(serde_json::json!({"access": "a2"})), Duration::from_secs(5));
        store.set_pair(&TokenPair::new("a1", "r1")).await;

        let leader = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                let mut request = ApiRequest::get("http://api.test/api/a/");
                coordinator.recover(&mut request, 0, &unauthorized()).await
            })
        };
        wait_until_refreshing(&coordinator).await;

        let waiters: Vec<_> = (0..3)
            .map(|i| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move {
                    let mut request = ApiRequest::get(format!("http://api.test/api/{i}/"));
                    coordinator.recover(&mut request, 0, &unauthorized()).await
                })
            })
            .collect();

        while coordinator.queued() < 3 {
            tokio::task::yield_now().await;
        }
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        transport.gate.notify_one();

        leader.await.unwrap().unwrap();
        for waiter in waiters {
            waiter.await.unwrap().unwrap();
        }

        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.epoch(), 1);
        assert!(!coordinator.is_refreshing());
        assert_eq!(store.pair(), Some(TokenPair::new("a2", "r1")));
    }

    #[tokio::test]
    async fn test_timeout_follows_failure_path() {
        let (coordinator, _transport, store) = setup(
            Ok(serde_json::json!({"access": "a2"})),
            Duration::from_millis(20),
        );
        store.set_pair(&TokenPair::new("a1", "r1")).await;

        let mut request = ApiRequest::get("http://api.test/api/gifts/");
        let result = coordinator.recover(&mut request, 0, &unauthorized()).await;

        assert_eq!(
            result,
            Err(ApiError::Refresh(RefreshError::Timeout { timeout_ms: 20 }))
        );
        assert_eq!(store.pair(), None);
        assert!(!coordinator.is_refreshing());
        assert_eq!(coordinator.epoch(), 1);
    }

    #[tokio::test]
    async fn test_leader_without_refresh_token_never_exchanges() {
        let (coordinator, transport, store) =
            setup(Ok(serde_json::json!({"access": "a3"})), Duration::from_secs(5));
        // The token was read by this caller, then cleared by a failed refresh.
        store.set_access(Some("a1")).await;
        coordinator.state.lock().phase = Phase::Refreshing {
            waiters: VecDeque::new(),
        };

        let result = coordinator.lead(&unauthorized()).await;

        assert!(matches!(result, Err(ApiError::Unauthorized { .. })));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.pair(), None);
        assert_eq!(store.access(), None);
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn test_stale_401_after_failed_refresh_does_not_lead() {
        let (coordinator, transport, store) = setup(
            Err(TransportError::ConnectionRefused {
                host: "api.test".to_string(),
                port: 80,
            }),
            Duration::from_secs(5),
        );
        store.set_pair(&TokenPair::new("a1", "r1")).await;
        transport.gate.notify_one();

        let mut first = ApiRequest::get("http://api.test/api/a/");
        let failed = coordinator.recover(&mut first, 0, &unauthorized()).await;
        let Err(ApiError::Refresh(cause)) = failed else {
            panic!("expected a refresh failure, got {failed:?}");
        };
        assert_eq!(store.pair(), None);

        // A late 401 from the failed session, racing a token it read earlier.
        store.set_refresh(Some("r1")).await;
        let mut late = ApiRequest::get("http://api.test/api/b/");
        let result = coordinator.recover(&mut late, 0, &unauthorized()).await;

        assert_eq!(result, Err(ApiError::Refresh(cause)));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn test_abandoned_leader_releases_waiters() {
        let (coordinator, _transport, store) =
            setup(Ok(serde_json::json!({"access": "a2"})), Duration::from_secs(5));
        store.set_pair(&TokenPair::new("a1", "r1")).await;

        let leader = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                let mut request = ApiRequest::get("http://api.test/api/a/");
                coordinator.recover(&mut request, 0, &unauthorized()).await
            })
        };
        wait_until_refreshing(&coordinator).await;

        let waiter = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                let mut request = ApiRequest::get("http://api.test/api/b/");
                coordinator.recover(&mut request, 0, &unauthorized()).await
            })
        };
        while coordinator.queued() < 1 {
            tokio::task::yield_now().await;
        }

        leader.abort();
        let _ = leader.await;

        let result = waiter.await.unwrap();
        assert_eq!(result, Err(ApiError::Refresh(RefreshError::Abandoned)));
        assert!(!coordinator.is_refreshing());
        assert_eq!(coordinator.epoch(), 0);
        assert_eq!(store.pair(), Some(TokenPair::new("a1", "r1")));
    }

    /// Persists normally until `stall` is set, then never completes a write.
    #[derive(Default)]
    struct StallingStorage {
        stall: AtomicBool,
    }

    #[async_trait]
    impl TokenStorage for StallingStorage {
        async fn read(&self, _key: TokenKey) -> Result<Option<String>, StorageError> {
            Ok(None)
        }

        async fn write(&self, _key: TokenKey, _value: &str) -> Result<(), StorageError> {
            Ok(())
        }

        async fn remove(&self, _key: TokenKey) -> Result<(), StorageError> {
            Ok(())
        }

        async fn put_pair(
            &self,
            _access: Option<&str>,
            _refresh: Option<&str>,
        ) -> Result<(), StorageError> {
            if self.stall.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_leader_cancelled_while_persisting_releases_success() {
        let storage = Arc::new(StallingStorage::default());
        let (coordinator, transport, store) = setup_with_store(
            Ok(serde_json::json!({"access": "a2"})),
            Duration::from_secs(5),
            TokenStore::with_storage(storage.clone()),
        );
        store.set_pair(&TokenPair::new("a1", "r1")).await;
        storage.stall.store(true, Ordering::SeqCst);

        let leader = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                let mut request = ApiRequest::get("http://api.test/api/a/");
                coordinator.recover(&mut request, 0, &unauthorized()).await
            })
        };
        wait_until_refreshing(&coordinator).await;

        let waiter = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                let mut request = ApiRequest::get("http://api.test/api/b/");
                coordinator.recover(&mut request, 0, &unauthorized()).await
            })
        };
        while coordinator.queued() < 1 {
            tokio::task::yield_now().await;
        }

        transport.gate.notify_one();
        while store.access().as_deref() != Some("a2") {
            tokio::task::yield_now().await;
        }
        leader.abort();
        let _ = leader.await;

        assert_eq!(waiter.await.unwrap(), Ok(()));
        assert_eq!(coordinator.epoch(), 1);
        assert!(!coordinator.is_refreshing());
        assert_eq!(store.pair(), Some(TokenPair::new("a2", "r1")));
    }
}
