//! In-memory token storage.

use std::collections::HashMap;

use aisle_domain::TokenKey;
use async_trait::async_trait;
use parking_lot::RwLock;

use crate::ports::{StorageError, TokenStorage};

/// Token storage that lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryTokenStorage {
    values: RwLock<HashMap<TokenKey, String>>,
}

impl MemoryTokenStorage {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStorage for MemoryTokenStorage {
    async fn read(&self, key: TokenKey) -> Result<Option<String>, StorageError> {
        Ok(self.values.read().get(&key).cloned())
    }

    async fn write(&self, key: TokenKey, value: &str) -> Result<(), StorageError> {
        self.values.write().insert(key, value.to_string());
        Ok(())
    }

    async fn remove(&self, key: TokenKey) -> Result<(), StorageError> {
        self.values.write().remove(&key);
        Ok(())
    }
}
