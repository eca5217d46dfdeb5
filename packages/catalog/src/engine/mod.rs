//! The Catalog - main entry point of the engine.
//!
//! `Catalog` ties a store, the provider registry, the metadata merge step,
//! cover storage and an optional crawl queue together. Operations are split
//! by concern:
//!
//! - [`identity`] - merge-chain resolution, soft delete, identity clearing
//! - [`resources`] - resource stubs, content, unlinking
//! - [`matching`] - resource to item matching and creation
//! - [`merge`] - merge and unmerge
//! - [`recast`] - subtype changes
//! - [`ready`] - fetch, match and fan out
//! - [`integrity`] - offline maintenance pass
//!
//! The engine holds no in-process locks across operations; correctness
//! comes from store uniqueness constraints and the atomic composite writes
//! of [`CatalogStore`].

pub mod identity;
pub mod integrity;
pub mod matching;
pub mod merge;
pub mod metadata;
pub mod ready;
pub mod recast;
pub mod resources;

use std::sync::Arc;
use tracing::warn;

use crate::covers::MemoryCoverStore;
use crate::error::Result;
use crate::providers::ProviderRegistry;
use crate::traits::{
    cover::CoverStore, merger::MetadataMerger, queue::CrawlQueue, store::CatalogStore,
};
use crate::types::{
    audit::{AuditAction, AuditEntry},
    config::CatalogConfig,
    item::ItemId,
};

pub use integrity::{IntegrityIssue, IntegrityReport};
pub use metadata::DefaultMetadataMerger;
pub use ready::{CrawlSummary, ReadyOutcome};

/// The catalog engine.
///
/// # Example
///
/// ```rust,ignore
/// let registry = ProviderRegistry::builder()
///     .with_provider(Arc::new(my_imdb_adapter))?
///     .build();
/// let catalog = Catalog::new(MemoryStore::new(), registry);
///
/// let site = catalog.registry().site_for_url(url).await.unwrap();
/// let outcome = catalog.get_resource_ready(&site, ReadyOptions::default()).await?;
/// ```
pub struct Catalog<S: CatalogStore> {
    store: Arc<S>,
    registry: Arc<ProviderRegistry>,
    merger: Arc<dyn MetadataMerger>,
    covers: Arc<dyn CoverStore>,
    queue: Option<Arc<dyn CrawlQueue>>,
    config: CatalogConfig,
}

impl<S: CatalogStore> Clone for Catalog<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            merger: Arc::clone(&self.merger),
            covers: Arc::clone(&self.covers),
            queue: self.queue.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: CatalogStore> Catalog<S> {
    /// Create a catalog with the default merge step and in-memory covers.
    pub fn new(store: S, registry: ProviderRegistry) -> Self {
        Self::with_config(store, registry, CatalogConfig::default())
    }

    /// Create with custom configuration.
    pub fn with_config(store: S, registry: ProviderRegistry, config: CatalogConfig) -> Self {
        Self {
            store: Arc::new(store),
            registry: Arc::new(registry),
            merger: Arc::new(DefaultMetadataMerger),
            covers: Arc::new(MemoryCoverStore::new()),
            queue: None,
            config,
        }
    }

    /// Replace the metadata merge step.
    pub fn with_merger(mut self, merger: Arc<dyn MetadataMerger>) -> Self {
        self.merger = merger;
        self
    }

    /// Replace the cover store.
    pub fn with_cover_store(mut self, covers: Arc<dyn CoverStore>) -> Self {
        self.covers = covers;
        self
    }

    /// Queue related-resource crawls here instead of dropping them.
    pub fn with_crawl_queue(mut self, queue: Arc<dyn CrawlQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn crawl_queue(&self) -> Option<&Arc<dyn CrawlQueue>> {
        self.queue.as_ref()
    }

    /// Append an audit entry. Failures are logged, not returned; the audit
    /// log is not needed for correctness.
    pub(crate) async fn audit(
        &self,
        item: ItemId,
        action: AuditAction,
        before: Option<String>,
        after: Option<String>,
    ) {
        let entry = AuditEntry::new(item, action)
            .change(before, after)
            .with_actor(self.config.actor.clone());
        if let Err(e) = self.store.append(entry).await {
            warn!(item = %item, action = %action, error = %e, "failed to append audit entry");
        }
    }

    /// Audit entries for `item`, oldest first.
    pub async fn history(&self, item: ItemId) -> Result<Vec<AuditEntry>> {
        self.store.entries_for_item(item).await
    }
}
