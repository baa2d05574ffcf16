//! Scripted identity service and resource API for integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use aisle_application::{ApiClient, ClientOptions, HttpTransport, TokenStore, TransportError};
use aisle_domain::{ApiRequest, ApiResponse};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

pub const BASE_URL: &str = "http://api.test/api";

/// How the refresh endpoint answers.
#[derive(Debug, Clone)]
pub enum RefreshReply {
    /// 200 with the given access token and optional rotated refresh token.
    Issue(&'static str, Option<&'static str>),
    /// Non-success status.
    Reject(u16),
}

/// One request as the server saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seen {
    pub path: String,
    pub bearer: Option<String>,
    pub body: Option<serde_json::Value>,
}

/// In-process stand-in for the wedding API.
///
/// Resource paths answer 200 only to the currently valid bearer token.
/// A successful refresh makes the issued token valid unless `sticky` is set.
pub struct MockApi {
    valid: Mutex<String>,
    login: Mutex<serde_json::Value>,
    refresh: Mutex<RefreshReply>,
    sticky: bool,
    gate: Option<Semaphore>,
    refresh_calls: AtomicUsize,
    seen: Mutex<Vec<Seen>>,
}

impl MockApi {
    pub fn new(valid: &str, refresh: RefreshReply) -> Self {
        Self {
            valid: Mutex::new(valid.to_string()),
            login: Mutex::new(serde_json::json!({"access": "a1", "refresh": "r1"})),
            refresh: Mutex::new(refresh),
            sticky: false,
            gate: None,
            refresh_calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Holds every refresh exchange until [`MockApi::open_gate`].
    #[must_use]
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    /// Keeps rejecting even the freshly issued token.
    #[must_use]
    pub const fn sticky(mut self) -> Self {
        self.sticky = true;
        self
    }

    pub fn set_login(&self, body: serde_json::Value) {
        *self.login.lock() = body;
    }

    pub fn open_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1024);
        }
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().clone()
    }

    /// Requests to `path`, in arrival order.
    pub fn seen_at(&self, path: &str) -> Vec<Seen> {
        self.seen().into_iter().filter(|s| s.path == path).collect()
    }

    pub async fn wait_for_refresh(&self) {
        while self.refresh_calls() == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    async fn answer_refresh(&self) -> ApiResponse {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        let reply = self.refresh.lock().clone();
        match reply {
            RefreshReply::Issue(access, refresh) => {
                if !self.sticky {
                    *self.valid.lock() = access.to_string();
                }
                let mut body = serde_json::json!({"access": access});
                if let Some(refresh) = refresh {
                    body["refresh"] = serde_json::json!(refresh);
                }
                ApiResponse::json(200, &body)
            }
            RefreshReply::Reject(status) => ApiResponse::json(
                status,
                &serde_json::json!({"detail": "Token is invalid or expired"}),
            ),
        }
    }
}

#[async_trait]
impl HttpTransport for MockApi {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let path = request
            .url
            .strip_prefix(BASE_URL)
            .unwrap_or(&request.url)
            .to_string();
        self.seen.lock().push(Seen {
            path: path.clone(),
            bearer: request.bearer().map(str::to_string),
            body: request.body.clone(),
        });

        match path.as_str() {
            "/token/" => Ok(ApiResponse::json(200, &self.login.lock().clone())),
            "/token/refresh/" => Ok(self.answer_refresh().await),
            "/down/" => Err(TransportError::ConnectionRefused {
                host: "api.test".to_string(),
                port: 80,
            }),
            _ if request.bearer() == Some(self.valid.lock().as_str()) => {
                Ok(ApiResponse::json(200, &serde_json::json!({"ok": true})))
            }
            _ => Ok(ApiResponse::json(
                401,
                &serde_json::json!({"detail": "Given token not valid for any token type"}),
            )),
        }
    }
}

pub fn client(api: &Arc<MockApi>, store: &TokenStore) -> Arc<ApiClient> {
    let options = ClientOptions {
        base_url: BASE_URL.to_string(),
        refresh_timeout: Duration::from_secs(5),
    };
    Arc::new(ApiClient::new(api.clone(), store.clone(), options))
}
