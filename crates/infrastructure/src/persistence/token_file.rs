//! File-based token storage.
//!
//! Tokens are stored in a single JSON file, by default
//! `<data dir>/aisle/tokens.json`:
//!
//! ```json
//! {
//!   "schema_version": 1,
//!   "tokens": {
//!     "access_token": "eyJhbGciOi...",
//!     "refresh_token": "eyJhbGciOi..."
//!   }
//! }
//! ```
//!
//! Every update rewrites the whole file through a sibling temp file and a
//! rename, so a crash never leaves a truncated file behind. A pair update
//! writes both tokens in a single rename.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use aisle_application::ports::{StorageError, TokenStorage};
use aisle_domain::TokenKey;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;

use crate::serialization::{from_json_bytes, to_json_stable_bytes};

/// Current file format version.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct TokenFile {
    schema_version: u32,
    #[serde(default)]
    tokens: BTreeMap<String, String>,
}

impl Default for TokenFile {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            tokens: BTreeMap::new(),
        }
    }
}

/// Token storage backed by a JSON file.
#[derive(Debug)]
pub struct FileTokenStorage {
    path: PathBuf,
    // Serializes read-modify-write cycles within the process.
    write_lock: Mutex<()>,
}

impl FileTokenStorage {
    /// Creates a storage for `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the default token file path, if the platform has a data dir.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("aisle").join("tokens.json"))
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<TokenFile, StorageError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(TokenFile::default()),
            Err(e) => return Err(e.into()),
        };

        let file: TokenFile =
            from_json_bytes(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))?;
        if file.schema_version != SCHEMA_VERSION {
            return Err(StorageError::Serialization(format!(
                "unsupported token file schema version {}",
                file.schema_version
            )));
        }
        Ok(file)
    }

    async fn save(&self, file: &TokenFile) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content =
            to_json_stable_bytes(file).map_err(|e| StorageError::Serialization(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &content).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Applies `edits` in one read-modify-rename cycle.
    async fn update(&self, edits: &[(TokenKey, Option<&str>)]) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        // A corrupt file is replaced rather than blocking every future write.
        let mut file = match self.load().await {
            Ok(file) => file,
            Err(StorageError::Serialization(reason)) => {
                tracing::warn!(path = %self.path.display(), %reason, "Replacing unreadable token file");
                TokenFile::default()
            }
            Err(e) => return Err(e),
        };

        let mut changed = false;
        for &(key, value) in edits {
            let name = key.as_str();
            let previous = match value {
                Some(value) => file.tokens.insert(name.to_string(), value.to_string()),
                None => file.tokens.remove(name),
            };
            changed |= previous.as_deref() != value;
        }
        if !changed {
            return Ok(());
        }
        self.save(&file).await
    }
}

#[async_trait]
impl TokenStorage for FileTokenStorage {
    async fn read(&self, key: TokenKey) -> Result<Option<String>, StorageError> {
        let mut file = self.load().await?;
        Ok(file
            .tokens
            .remove(key.as_str())
            .filter(|value| !value.is_empty()))
    }

    async fn write(&self, key: TokenKey, value: &str) -> Result<(), StorageError> {
        self.update(&[(key, Some(value))]).await
    }

    async fn remove(&self, key: TokenKey) -> Result<(), StorageError> {
        self.update(&[(key, None)]).await
    }

    async fn put_pair(
        &self,
        access: Option<&str>,
        refresh: Option<&str>,
    ) -> Result<(), StorageError> {
        let access = access.filter(|v| !v.is_empty());
        let refresh = refresh.filter(|v| !v.is_empty());
        self.update(&[(TokenKey::Access, access), (TokenKey::Refresh, refresh)])
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let storage = FileTokenStorage::new(dir.path().join("tokens.json"));

        assert_eq!(storage.read(TokenKey::Access).await.unwrap(), None);
        storage.remove(TokenKey::Refresh).await.unwrap();
        assert!(!storage.path().exists());
    }

    #[tokio::test]
    async fn test_write_creates_parent_dirs_and_file_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("tokens.json");
        let storage = FileTokenStorage::new(&path);

        storage.write(TokenKey::Refresh, "r1").await.unwrap();
        storage.write(TokenKey::Access, "a1").await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "{\n  \"schema_version\": 1,\n  \"tokens\": {\n    \"access_token\": \"a1\",\n    \"refresh_token\": \"r1\"\n  }\n}\n"
        );
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_unknown_schema_version_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tokens.json");
        std::fs::write(&path, r#"{"schema_version": 9, "tokens": {}}"#).unwrap();

        let result = FileTokenStorage::new(&path).read(TokenKey::Access).await;
        assert!(matches!(result, Err(StorageError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_put_pair_writes_both_tokens_at_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tokens.json");
        let storage = FileTokenStorage::new(&path);
        storage.write(TokenKey::Access, "a0").await.unwrap();
        storage.write(TokenKey::Refresh, "r0").await.unwrap();

        storage.put_pair(Some("a1"), Some("r1")).await.unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"access_token\": \"a1\""));
        assert!(content.contains("\"refresh_token\": \"r1\""));

        storage.put_pair(Some("a2"), None).await.unwrap();
        assert_eq!(
            storage.read(TokenKey::Access).await.unwrap().as_deref(),
            Some("a2")
        );
        assert_eq!(storage.read(TokenKey::Refresh).await.unwrap(), None);

        storage.put_pair(None, Some("")).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "{\n  \"schema_version\": 1,\n  \"tokens\": {}\n}\n"
        );
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_replaced_on_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tokens.json");
        std::fs::write(&path, "not json").unwrap();
        let storage = FileTokenStorage::new(&path);

        storage.write(TokenKey::Access, "a1").await.unwrap();
        assert_eq!(
            storage.read(TokenKey::Access).await.unwrap().as_deref(),
            Some("a1")
        );
    }
}
