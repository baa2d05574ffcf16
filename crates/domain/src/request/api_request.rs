//! Outbound API request

use serde::{Deserialize, Serialize};

use super::{Headers, HttpMethod};

/// Header carrying the bearer credential.
pub const AUTHORIZATION: &str = "Authorization";

/// A fully described outbound request.
///
/// Requests are replayable: the pipeline may resubmit the same value once
/// after a token refresh. The `retried` marker is one-shot and can only be
/// set, never cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiRequest {
    /// HTTP method
    pub method: HttpMethod,
    /// Absolute target URL
    pub url: String,
    /// HTTP headers
    #[serde(default)]
    pub headers: Headers,
    /// JSON body, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    #[serde(skip)]
    retried: bool,
}

impl ApiRequest {
    /// Creates a request without body.
    #[must_use]
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Headers::new(),
            body: None,
            retried: false,
        }
    }

    /// Creates a GET request.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    /// Creates a POST request with a JSON body.
    #[must_use]
    pub fn post(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(HttpMethod::Post, url).with_body(body)
    }

    /// Sets the JSON body.
    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Sets or removes the bearer credential.
    pub fn set_bearer(&mut self, token: Option<&str>) {
        match token {
            Some(token) => self.headers.set(AUTHORIZATION, format!("Bearer {token}")),
            None => {
                self.headers.remove(AUTHORIZATION);
            }
        }
    }

    /// Returns the bearer token currently attached, if any.
    #[must_use]
    pub fn bearer(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)
            .and_then(|v| v.strip_prefix("Bearer "))
    }

    /// Returns true once the request has been replayed after a 401.
    #[must_use]
    pub const fn is_retried(&self) -> bool {
        self.retried
    }

    /// Marks the request as retried.
    ///
    /// Returns `false` if it was already marked.
    pub const fn mark_retried(&mut self) -> bool {
        let first = !self.retried;
        self.retried = true;
        first
    }

    /// Serializes the body, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the body cannot be serialized.
    pub fn body_bytes(&self) -> Result<Option<Vec<u8>>, serde_json::Error> {
        self.body.as_ref().map(serde_json::to_vec).transpose()
    }
}

/// Joins an API base URL and a path.
///
/// Absolute `http(s)://` paths are returned as-is.
#[must_use]
pub fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        format!("{base}/")
    } else {
        format!("{base}/{path}")
    }
}
