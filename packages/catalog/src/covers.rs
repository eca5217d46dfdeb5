//! Cover image stores.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;
use uuid::Uuid;

use crate::error::{CatalogError, Result};
use crate::traits::cover::CoverStore;
use crate::types::{config::CatalogConfig, id_type::IdType};

/// Relative path for a new cover: `item/{id_type}/{YYYY/MM/DD}/{uuid}.{ext}`.
pub fn cover_path(id_type: IdType, extension: &str) -> String {
    format!(
        "item/{}/{}/{}.{}",
        id_type,
        Utc::now().format("%Y/%m/%d"),
        Uuid::new_v4().simple(),
        extension.trim_start_matches('.')
    )
}

/// In-memory cover store, for tests and ephemeral catalogs.
#[derive(Default)]
pub struct MemoryCoverStore {
    files: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryCoverStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.files.read().ok()?.get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.files.read().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CoverStore for MemoryCoverStore {
    async fn save(&self, path: &str, bytes: &[u8]) -> Result<String> {
        self.files
            .write()
            .map_err(|e| CatalogError::storage(format!("cover store lock poisoned: {e}")))?
            .insert(path.to_string(), bytes.to_vec());
        Ok(path.to_string())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self
            .files
            .read()
            .map_err(|e| CatalogError::storage(format!("cover store lock poisoned: {e}")))?
            .contains_key(path))
    }
}

/// Cover store writing under a root directory.
pub struct FsCoverStore {
    root: PathBuf,
}

impl FsCoverStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store rooted at the configured cover directory.
    pub fn from_config(config: &CatalogConfig) -> Self {
        Self::new(config.cover_root.clone())
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

#[async_trait]
impl CoverStore for FsCoverStore {
    async fn save(&self, path: &str, bytes: &[u8]) -> Result<String> {
        let full = self.root.join(path);
        if let Some(dir) = full.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| CatalogError::Storage(Box::new(e)))?;
        }
        tokio::fs::write(&full, bytes)
            .await
            .map_err(|e| CatalogError::Storage(Box::new(e)))?;
        Ok(path.to_string())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        tokio::fs::try_exists(self.root.join(path))
            .await
            .map_err(|e| CatalogError::Storage(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cover_path_layout() {
        let path = cover_path(IdType::Goodreads, ".jpg");
        let parts: Vec<&str> = path.split('/').collect();
        assert_eq!(parts[0], "item");
        assert_eq!(parts[1], "goodreads");
        assert_eq!(parts.len(), 6);
        assert!(parts[5].ends_with(".jpg"));
        assert!(!parts[5].contains(".."));
    }

    #[tokio::test]
    async fn test_fs_cover_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCoverStore::from_config(&CatalogConfig::default().with_cover_root(dir.path()));
        assert_eq!(store.root(), dir.path());
        let path = cover_path(IdType::Imdb, "png");

        assert!(!store.exists(&path).await.unwrap());
        store.save(&path, b"png-bytes").await.unwrap();
        assert!(store.exists(&path).await.unwrap());
        assert_eq!(std::fs::read(dir.path().join(&path)).unwrap(), b"png-bytes");
    }
}
