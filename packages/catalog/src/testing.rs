//! Testing utilities.
//!
//! `TestCatalog` wires a [`MemoryStore`], an in-memory cover store and three
//! mock providers into a [`Catalog`], plus fixture builders for items and
//! resources. Useful for testing code built on the catalog without network
//! access or a database.

use std::sync::Arc;

pub use crate::providers::MockProvider;

use crate::engine::Catalog;
use crate::covers::MemoryCoverStore;
use crate::providers::{ProviderRegistry, Site};
use crate::queue::MemoryCrawlQueue;
use crate::stores::MemoryStore;
use crate::traits::store::{ItemStore, ResourceStore};
use crate::types::{
    config::CatalogConfig,
    id_type::IdType,
    item::{Item, ItemId, ItemModel, NewItem},
    resource::{ExternalResource, NewResource},
};

/// A catalog over in-memory collaborators.
///
/// Providers:
/// - `imdb`: `IdType::Imdb`, movies, `https://imdb.test/item/{id}`
/// - `goodreads`: `IdType::Goodreads`, editions, `https://goodreads.test/item/{id}`
/// - `tmdb`: `IdType::TmdbTv`, tv shows, `https://tmdb.test/item/{id}`
pub struct TestCatalog {
    pub catalog: Catalog<MemoryStore>,
    pub imdb: MockProvider,
    pub goodreads: MockProvider,
    pub tmdb: MockProvider,
    pub covers: Arc<MemoryCoverStore>,
    /// Present when built with [`TestCatalog::with_queue`]
    pub queue: Option<Arc<MemoryCrawlQueue>>,
}

impl TestCatalog {
    pub fn new() -> Self {
        Self::build(false)
    }

    /// Like [`new`](Self::new), with a crawl queue attached.
    pub fn with_queue() -> Self {
        Self::build(true)
    }

    fn build(with_queue: bool) -> Self {
        let imdb = MockProvider::new(IdType::Imdb, ItemModel::Movie, "imdb.test");
        let goodreads = MockProvider::new(IdType::Goodreads, ItemModel::Edition, "goodreads.test");
        let tmdb = MockProvider::new(IdType::TmdbTv, ItemModel::TvShow, "tmdb.test");

        let config = CatalogConfig::default().with_actor("test");
        let mut builder = ProviderRegistry::builder().with_config(&config);
        for provider in [&imdb, &goodreads, &tmdb] {
            // Kinds are distinct, registration cannot collide
            let _ = builder.register(Arc::new(provider.clone()));
        }

        let covers = Arc::new(MemoryCoverStore::new());
        let queue = with_queue.then(|| Arc::new(MemoryCrawlQueue::from_config(&config)));
        let mut catalog = Catalog::with_config(MemoryStore::new(), builder.build(), config)
            .with_cover_store(covers.clone());
        if let Some(queue) = &queue {
            catalog = catalog.with_crawl_queue(queue.clone());
        }

        Self {
            catalog,
            imdb,
            goodreads,
            tmdb,
            covers,
            queue,
        }
    }

    pub fn store(&self) -> &MemoryStore {
        self.catalog.store()
    }

    pub fn imdb_site(&self, id: &str) -> Site {
        Site::from_id(Arc::new(self.imdb.clone()), id)
    }

    pub fn goodreads_site(&self, id: &str) -> Site {
        Site::from_id(Arc::new(self.goodreads.clone()), id)
    }

    pub fn tmdb_site(&self, id: &str) -> Site {
        Site::from_id(Arc::new(self.tmdb.clone()), id)
    }

    /// Create a bare item of `model`.
    pub async fn item(&self, model: ItemModel) -> Item {
        self.store()
            .create_item(NewItem::new(model).with_title(format!("{} fixture", model)))
            .await
            .expect("create item")
    }

    /// Create a resource stub at `https://{id_type}.test/item/{value}`.
    pub async fn resource(&self, id_type: IdType, value: &str) -> ExternalResource {
        let url = format!("https://{}.test/item/{}", id_type, value);
        self.store()
            .insert_resource(NewResource::new(id_type, value, url))
            .await
            .expect("insert resource")
    }

    /// Create an IMDb resource linked to `item`.
    pub async fn attach_resource(&self, item: ItemId, value: &str) -> ExternalResource {
        let mut resource = self.resource(IdType::Imdb, value).await;
        resource.item = Some(item);
        self.store()
            .update_resource(&resource)
            .await
            .expect("link resource");
        resource
    }

    /// Overwrite `merged_to_item` directly, bypassing merge validation.
    pub async fn set_merged(&self, item: ItemId, target: Option<ItemId>) {
        let mut current = self
            .store()
            .get_item(item)
            .await
            .expect("get item")
            .expect("item exists");
        current.merged_to_item = target;
        self.store().update_item(&current).await.expect("update item");
    }

    /// Create `len` items of `model`, each merged into the next.
    ///
    /// Returns the ids head first; the last one is terminal.
    pub async fn merge_chain(&self, model: ItemModel, len: usize) -> Vec<ItemId> {
        let mut ids = Vec::with_capacity(len);
        for _ in 0..len {
            ids.push(self.item(model).await.id);
        }
        for pair in ids.windows(2) {
            self.set_merged(pair[0], Some(pair[1])).await;
        }
        ids
    }
}

impl Default for TestCatalog {
    fn default() -> Self {
        Self::new()
    }
}
