//! Process-wide access/refresh token store.
//!
//! Reads are served from an in-process cache that is authoritative; every
//! write goes through to a [`TokenStorage`] backend. Both slots are updated
//! under one write guard, so readers never see half of a pair. The cache is
//! updated before the first suspension point of a write, so a cancelled
//! writer never leaves memory behind the caller's intent.

use std::fmt;
use std::sync::Arc;

use aisle_domain::{TokenKey, TokenPair};
use parking_lot::RwLock;
use tokio::sync::Mutex;

use super::MemoryTokenStorage;
use crate::ports::TokenStorage;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct Slots {
    access: Option<String>,
    refresh: Option<String>,
}

impl Slots {
    const fn slot_mut(&mut self, key: TokenKey) -> &mut Option<String> {
        match key {
            TokenKey::Access => &mut self.access,
            TokenKey::Refresh => &mut self.refresh,
        }
    }
}

/// Thread-safe token store shared by the pipeline, the coordinator and the
/// auth facade. Cloning shares the same slots.
#[derive(Clone)]
pub struct TokenStore {
    slots: Arc<RwLock<Slots>>,
    storage: Arc<dyn TokenStorage>,
    // Serializes backend writes; each write persists the latest snapshot.
    persist_lock: Arc<Mutex<()>>,
}

impl TokenStore {
    /// Creates an empty store backed by process memory only.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::with_storage(Arc::new(MemoryTokenStorage::new()))
    }

    /// Creates an empty store that writes through to `storage`.
    ///
    /// Nothing is read from `storage`; use [`TokenStore::load`] to resume
    /// a persisted session.
    #[must_use]
    pub fn with_storage(storage: Arc<dyn TokenStorage>) -> Self {
        Self::from_slots(Slots::default(), storage)
    }

    /// Creates a store hydrated from `storage`.
    ///
    /// Unreadable entries are treated as absent.
    pub async fn load(storage: Arc<dyn TokenStorage>) -> Self {
        let mut slots = Slots::default();
        for key in TokenKey::ALL {
            *slots.slot_mut(key) = match storage.read(key).await {
                Ok(value) => normalize(value.as_deref()),
                Err(e) => {
                    tracing::warn!(%key, error = %e, "Failed to read persisted token");
                    None
                }
            };
        }
        Self::from_slots(slots, storage)
    }

    fn from_slots(slots: Slots, storage: Arc<dyn TokenStorage>) -> Self {
        Self {
            slots: Arc::new(RwLock::new(slots)),
            storage,
            persist_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Returns the access token, if any.
    #[must_use]
    pub fn access(&self) -> Option<String> {
        self.slots.read().access.clone()
    }

    /// Returns the refresh token, if any.
    #[must_use]
    pub fn refresh(&self) -> Option<String> {
        self.slots.read().refresh.clone()
    }

    /// Returns both tokens if both are present.
    #[must_use]
    pub fn pair(&self) -> Option<TokenPair> {
        let slots = self.slots.read();
        match (&slots.access, &slots.refresh) {
            (Some(access), Some(refresh)) => Some(TokenPair::new(access, refresh)),
            _ => None,
        }
    }

    /// Sets or removes the access token. Empty strings remove.
    pub async fn set_access(&self, token: Option<&str>) {
        self.set(TokenKey::Access, token).await;
    }

    /// Sets or removes the refresh token. Empty strings remove.
    pub async fn set_refresh(&self, token: Option<&str>) {
        self.set(TokenKey::Refresh, token).await;
    }

    /// Replaces both tokens with `pair`.
    pub async fn set_pair(&self, pair: &TokenPair) {
        self.replace(Some(&pair.access), Some(&pair.refresh)).await;
    }

    /// Replaces both tokens in one transition.
    pub async fn replace(&self, access: Option<&str>, refresh: Option<&str>) {
        self.stage(access, refresh);
        self.flush().await;
    }

    /// Replaces both tokens in memory without persisting them.
    ///
    /// Readers observe the new pair immediately; [`TokenStore::flush`]
    /// writes it through.
    pub(crate) fn stage(&self, access: Option<&str>, refresh: Option<&str>) {
        let mut slots = self.slots.write();
        slots.access = normalize(access);
        slots.refresh = normalize(refresh);
    }

    /// Removes both tokens.
    pub async fn clear_all(&self) {
        self.replace(None, None).await;
    }

    /// Get token status for display.
    #[must_use]
    pub fn status(&self) -> TokenStatus {
        let slots = self.slots.read();
        match (slots.access.is_some(), slots.refresh.is_some()) {
            (true, true) => TokenStatus::Authenticated,
            (true, false) => TokenStatus::AccessOnly,
            (false, true) => TokenStatus::RefreshOnly,
            (false, false) => TokenStatus::NotAuthenticated,
        }
    }

    async fn set(&self, key: TokenKey, token: Option<&str>) {
        *self.slots.write().slot_mut(key) = normalize(token);
        self.flush().await;
    }

    /// Writes the current pair through to storage.
    pub(crate) async fn flush(&self) {
        let _guard = self.persist_lock.lock().await;
        let snapshot = self.slots.read().clone();
        if let Err(e) = self
            .storage
            .put_pair(snapshot.access.as_deref(), snapshot.refresh.as_deref())
            .await
        {
            tracing::warn!(error = %e, "Failed to persist tokens");
        }
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenStore").finish_non_exhaustive()
    }
}

fn normalize(token: Option<&str>) -> Option<String> {
    token.filter(|t| !t.is_empty()).map(str::to_string)
}

/// Status of the stored session for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    /// No token stored.
    NotAuthenticated,
    /// Both tokens stored.
    Authenticated,
    /// Access token only; a 401 cannot be recovered.
    AccessOnly,
    /// Refresh token only; the next 401 triggers a refresh.
    RefreshOnly,
}

impl TokenStatus {
    /// Returns true if requests will carry a bearer credential.
    #[must_use]
    pub const fn is_authenticated(self) -> bool {
        matches!(self, Self::Authenticated | Self::AccessOnly)
    }

    /// Returns true if a 401 can be recovered by a refresh.
    #[must_use]
    pub const fn can_refresh(self) -> bool {
        matches!(self, Self::Authenticated | Self::RefreshOnly)
    }

    /// Get a user-friendly display message.
    #[must_use]
    pub const fn display_message(self) -> &'static str {
        match self {
            Self::NotAuthenticated => "Not authenticated",
            Self::Authenticated => "Authenticated (will auto-refresh)",
            Self::AccessOnly => "Authenticated (cannot refresh)",
            Self::RefreshOnly => "Session pending refresh",
        }
    }
}
