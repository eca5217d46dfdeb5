//! Catalog Identity Resolution & Merge Engine
//!
//! Decides when scraped provider artifacts (external resources) denote the
//! same canonical catalog item, keeps item identity stable while metadata,
//! identifiers and even the item's concrete subtype change, and merges
//! duplicates without losing history.
//!
//! # Usage
//!
//! ```rust,ignore
//! use catalog::{Catalog, MemoryStore, ProviderRegistry, ReadyOptions};
//!
//! let registry = ProviderRegistry::builder()
//!     .with_provider(Arc::new(my_adapter))?
//!     .build();
//! let catalog = Catalog::new(MemoryStore::new(), registry);
//!
//! let site = catalog.registry().site_for_url(url).await.expect("known provider");
//! let outcome = catalog.get_resource_ready(&site, ReadyOptions::default()).await?;
//! if let Some(item) = outcome.item() {
//!     println!("{} -> {}", site.url(), item.url());
//! }
//! ```
//!
//! # Modules
//!
//! - [`engine`] - The `Catalog` facade: matching, merge, recast, readiness, integrity
//! - [`types`] - Items, external resources, identifier kinds, audit entries, config
//! - [`traits`] - Store, provider, queue, cover and merge-step seams
//! - [`stores`] - Storage implementations (MemoryStore, SqliteStore)
//! - [`providers`] - Provider registry, short-link resolution, mock adapter
//! - [`queue`] - In-memory crawl queue and the crawl worker
//! - [`covers`] - Cover image stores
//! - [`testing`] - Test fixtures

pub mod covers;
pub mod engine;
pub mod error;
pub mod providers;
pub mod queue;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use covers::{FsCoverStore, MemoryCoverStore};
pub use engine::{
    Catalog, CrawlSummary, DefaultMetadataMerger, IntegrityIssue, IntegrityReport, ReadyOutcome,
};
pub use error::{CatalogError, ProviderError, ProviderResult, Result};
pub use providers::{HttpShortLinkResolver, ProviderRegistry, ProviderRegistryBuilder, Site};
pub use queue::{CrawlWorker, CrawlWorkerConfig, MemoryCrawlQueue};
pub use stores::MemoryStore;
pub use traits::{
    cover::CoverStore,
    merger::MetadataMerger,
    provider::{Provider, UrlResolver},
    queue::{CrawlJob, CrawlJobStatus, CrawlQueue, EnqueueResult},
    store::{AuditLog, CatalogStore, ItemStore, ResourceStore},
};
pub use types::{
    audit::{AuditAction, AuditEntry},
    config::{CatalogConfig, ReadyOptions, MAX_MERGE_HOPS},
    id_type::{get_best_lookup_id, IdType, LookupIds, IDEAL_ID_TYPES},
    item::{Item, ItemCategory, ItemId, ItemModel, NewItem},
    resource::{ExternalResource, NewResource, ResourceContent, ResourceId, ResourceLink},
};

#[cfg(feature = "sqlite")]
pub use stores::SqliteStore;
