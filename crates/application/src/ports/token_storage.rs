//! Token storage port
//!
//! Durable key/value persistence for the two tokens.

use aisle_domain::TokenKey;
use async_trait::async_trait;

/// Errors that can occur during token persistence.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Repository trait for token persistence.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// # Returns
    /// `None` if nothing is stored.
    async fn read(&self, key: TokenKey) -> Result<Option<String>, StorageError>;

    /// Stores `value` under `key`, overwriting any previous value.
    ///
    /// # Errors
    /// Returns an error if the value cannot be persisted.
    async fn write(&self, key: TokenKey, value: &str) -> Result<(), StorageError>;

    /// Removes the value stored under `key`. Removing a missing key succeeds.
    ///
    /// # Errors
    /// Returns an error if the backing store cannot be updated.
    async fn remove(&self, key: TokenKey) -> Result<(), StorageError>;

    /// Writes or removes `key` depending on `value`.
    async fn put(&self, key: TokenKey, value: Option<&str>) -> Result<(), StorageError> {
        match value {
            Some(value) => self.write(key, value).await,
            None => self.remove(key).await,
        }
    }

    /// Replaces both tokens.
    ///
    /// Backends that can write both values in one operation should override
    /// this so a crash never leaves a mismatched pair behind.
    ///
    /// # Errors
    /// Returns an error if either value cannot be persisted.
    async fn put_pair(
        &self,
        access: Option<&str>,
        refresh: Option<&str>,
    ) -> Result<(), StorageError> {
        self.put(TokenKey::Access, access).await?;
        self.put(TokenKey::Refresh, refresh).await
    }
}
