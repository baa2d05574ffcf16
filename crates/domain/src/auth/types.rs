//! Bearer token types and the token endpoint wire schemas

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed persistence keys for the two tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TokenKey {
    /// Short-lived access token.
    Access,
    /// Longer-lived refresh token.
    Refresh,
}

impl TokenKey {
    /// Both keys, in the order they are written.
    pub const ALL: [Self; 2] = [Self::Access, Self::Refresh];

    /// Returns the storage key.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access_token",
            Self::Refresh => "refresh_token",
        }
    }
}

impl fmt::Display for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An access/refresh token pair produced by a completed login or refresh.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    /// The access token presented as a bearer credential.
    pub access: String,
    /// The refresh token exchanged for the next pair.
    pub refresh: String,
}

impl TokenPair {
    /// Creates a new token pair.
    #[must_use]
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }

    /// Returns the `Authorization` header value for the access token.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.access)
    }
}

// Tokens never show up in logs or panics in full.
impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access", &token_preview(&self.access))
            .field("refresh", &token_preview(&self.refresh))
            .finish()
    }
}

/// Login credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Username or e-mail.
    pub identifier: String,
    /// Password.
    pub secret: String,
}

impl Credentials {
    /// Creates a new set of credentials.
    #[must_use]
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: secret.into(),
        }
    }

    /// Returns the login request body for these credentials.
    #[must_use]
    pub fn to_request(&self) -> LoginRequest {
        LoginRequest {
            username: self.identifier.clone(),
            password: self.secret.clone(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Body of `POST {base}/token/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Account identifier.
    pub username: String,
    /// Account password.
    pub password: String,
}

/// Response of `POST {base}/token/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// New access token.
    pub access: String,
    /// New refresh token, if the service issued one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
}

/// Body of `POST {base}/token/refresh/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshRequest {
    /// The refresh token being exchanged.
    pub refresh: String,
}

/// Response of `POST {base}/token/refresh/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshResponse {
    /// New access token.
    pub access: String,
    /// Rotated refresh token. Absent when the service reuses the prior one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
}

impl RefreshResponse {
    /// Resolves the response into a full pair.
    ///
    /// A missing or empty `refresh` field keeps `prior_refresh`.
    #[must_use]
    pub fn into_pair(self, prior_refresh: &str) -> TokenPair {
        let refresh = self
            .refresh
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| prior_refresh.to_string());
        TokenPair {
            access: self.access,
            refresh,
        }
    }
}

/// Get a preview of a token (first 8 chars + ...).
#[must_use]
pub fn token_preview(token: &str) -> String {
    if token.chars().count() > 12 {
        let head: String = token.chars().take(8).collect();
        format!("{head}...")
    } else {
        token.to_string()
    }
}
