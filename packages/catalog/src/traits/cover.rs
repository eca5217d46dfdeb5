//! Cover image storage.

use async_trait::async_trait;

use crate::error::Result;

/// Stores downloaded cover images and returns their relative path.
#[async_trait]
pub trait CoverStore: Send + Sync {
    /// Save `bytes` at `path`. Returns the stored path.
    async fn save(&self, path: &str, bytes: &[u8]) -> Result<String>;

    async fn exists(&self, path: &str) -> Result<bool>;
}
