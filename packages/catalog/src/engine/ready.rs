//! Getting a resource ready: fetch, match, fold metadata, fan out.

use serde::Serialize;
use tracing::{debug, info, warn};

use super::Catalog;
use crate::error::Result;
use crate::providers::Site;
use crate::traits::store::CatalogStore;
use crate::types::{
    config::ReadyOptions,
    item::Item,
    resource::{ExternalResource, ResourceId, ResourceLink},
};

/// Result of [`Catalog::get_resource_ready`].
#[derive(Debug, Clone)]
pub enum ReadyOutcome {
    /// Content is present. `item` is the linked item, if any.
    Ready {
        resource: ExternalResource,
        item: Option<Item>,
    },
    /// The fetch failed or returned nothing; the stub exists but is not ready.
    NotReady { resource: ExternalResource },
}

impl ReadyOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, ReadyOutcome::Ready { .. })
    }

    pub fn resource(&self) -> &ExternalResource {
        match self {
            ReadyOutcome::Ready { resource, .. } | ReadyOutcome::NotReady { resource } => resource,
        }
    }

    pub fn item(&self) -> Option<&Item> {
        match self {
            ReadyOutcome::Ready { item, .. } => item.as_ref(),
            ReadyOutcome::NotReady { .. } => None,
        }
    }

    pub fn into_item(self) -> Option<Item> {
        match self {
            ReadyOutcome::Ready { item, .. } => item,
            ReadyOutcome::NotReady { .. } => None,
        }
    }
}

/// Counts from one related-resource crawl.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CrawlSummary {
    pub crawled: usize,
    pub failed: usize,
}

impl<S: CatalogStore> Catalog<S> {
    /// Make the resource behind `site` ready and, depending on `options`,
    /// match it, fold its metadata into the item and fan out to linked
    /// resources.
    ///
    /// Provider failures do not error; they come back as
    /// [`ReadyOutcome::NotReady`]. Required resources are fetched before
    /// this returns. Related and prematched resources are handed to the
    /// crawl queue and not awaited.
    pub async fn get_resource_ready(
        &self,
        site: &Site,
        options: ReadyOptions,
    ) -> Result<ReadyOutcome> {
        let options = options.normalized();
        let outcome = self.ready_resource(site, &options).await?;
        if !options.auto_link {
            return Ok(outcome);
        }
        let (resource, item) = match outcome {
            ReadyOutcome::Ready {
                resource,
                item: Some(item),
            } => (resource, item),
            other => return Ok(other),
        };

        for link in &resource.required_resources {
            let Some(linked) = self.site_for_link(link).await else {
                warn!(resource = %resource.url, link = %link.url, "no provider for required resource");
                continue;
            };
            let mut link_options = ReadyOptions {
                auto_link: false,
                ..ReadyOptions::default()
            };
            link_options.preloaded_content = link.content.clone();
            let linked_outcome = self.ready_resource(&linked, &link_options.normalized()).await?;
            if !linked_outcome.is_ready() {
                warn!(resource = %resource.url, link = %link.url, "required resource not ready");
            }
        }

        if !resource.related_resources.is_empty() || !resource.prematched_resources.is_empty() {
            self.enqueue_crawl(resource.id).await;
        }

        let item = self.link_parent(item, &resource).await?;
        Ok(ReadyOutcome::Ready {
            resource,
            item: Some(item),
        })
    }

    /// Fetch-or-reuse, then optionally match and fold metadata. Never fans
    /// out.
    async fn ready_resource(&self, site: &Site, options: &ReadyOptions) -> Result<ReadyOutcome> {
        let mut resource = self
            .get_or_create_stub(site.id_type(), site.id_value(), site.url())
            .await?;

        if !resource.ready() || options.ignore_existing_content {
            let content = match &options.preloaded_content {
                Some(content) => Ok(content.clone()),
                None => site.scrape().await,
            };
            match content {
                Ok(content) => self.apply_content(&mut resource, &content).await?,
                Err(e) => {
                    warn!(resource = %site.url(), error = %e, "fetch failed");
                }
            }
        }

        if !resource.ready() {
            warn!(resource = %site.url(), "unable to get resource ready");
            return Ok(ReadyOutcome::NotReady { resource });
        }

        let mut item = if options.auto_create {
            Some(self.match_or_create_item_for_resource(&mut resource).await?)
        } else {
            match resource.item {
                Some(id) => self.store.get_item(id).await?,
                None => None,
            }
        };

        if options.auto_save {
            if let Some(item) = item.as_mut() {
                let resources = self.store.resources_for_item(item.id).await?;
                self.merger
                    .merge(item, &resources, options.ignore_existing_content)
                    .await?;
                self.store.update_item_content(item).await?;
            }
        }

        debug!(resource = %resource.url, item = ?item.as_ref().map(|i| i.id), "resource ready");
        Ok(ReadyOutcome::Ready { resource, item })
    }

    /// Site for a link: by provider id when the link carries one, else by url.
    async fn site_for_link(&self, link: &ResourceLink) -> Option<Site> {
        if let (Some(id_type), Some(id_value)) = (link.id_type, link.id_value.as_deref()) {
            if let Some(site) = self.registry.site_for_id(id_type, id_value) {
                return Some(site);
            }
        }
        self.registry.site_for_url(&link.url).await
    }

    async fn enqueue_crawl(&self, resource: ResourceId) {
        let Some(queue) = &self.queue else {
            debug!(resource = %resource, "no crawl queue, skipping related resources");
            return;
        };
        match queue.enqueue(resource).await {
            Ok(result) if result.is_created() => {
                debug!(resource = %resource, job_id = %result.job_id(), "crawl enqueued");
            }
            Ok(result) => {
                debug!(resource = %resource, job_id = %result.job_id(), "crawl already queued");
            }
            Err(e) => {
                warn!(resource = %resource, error = %e, "failed to enqueue crawl");
            }
        }
    }

    /// Link `item` to the item of the required resource that declares the
    /// parent model.
    async fn link_parent(&self, mut item: Item, resource: &ExternalResource) -> Result<Item> {
        let Some(parent_model) = item.model.parent_model() else {
            return Ok(item);
        };
        for link in resource
            .required_resources
            .iter()
            .filter(|l| l.model == Some(parent_model))
        {
            let Some(site) = self.site_for_link(link).await else {
                continue;
            };
            let Some(parent) = self
                .store
                .get_resource_by_lookup(site.id_type(), site.id_value())
                .await?
                .and_then(|r| r.item)
            else {
                continue;
            };
            if item.parent_item != Some(parent) {
                self.store.set_item_parent(item.id, Some(parent)).await?;
                item.parent_item = Some(parent);
                info!(item = %item.id, parent = %parent, "linked parent item");
            }
            break;
        }
        Ok(item)
    }

    /// Crawl the related and prematched links of a resource.
    ///
    /// This is the crawl queue's job body. A resource that no longer exists
    /// is logged and skipped; a failing link does not stop the others.
    pub async fn crawl_related_resources(&self, resource: ResourceId) -> Result<CrawlSummary> {
        let Some(source) = self.store.get_resource(resource).await? else {
            warn!(resource = %resource, "crawl resource not found");
            return Ok(CrawlSummary::default());
        };

        let mut summary = CrawlSummary::default();
        let links = source
            .related_resources
            .iter()
            .map(|l| (l, false))
            .chain(source.prematched_resources.iter().map(|l| (l, true)));

        for (link, prematched) in links {
            match self.crawl_link(link, prematched).await {
                Ok(Some(item)) => {
                    summary.crawled += 1;
                    info!(link = %link.url, item = %item.id, "crawled");
                }
                Ok(None) => {
                    summary.failed += 1;
                    warn!(link = %link.url, "crawl failed");
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!(link = %link.url, error = %e, "crawl error");
                }
            }
        }
        Ok(summary)
    }

    async fn crawl_link(&self, link: &ResourceLink, prematched: bool) -> Result<Option<Item>> {
        let Some(site) = self.site_for_link(link).await else {
            return Ok(None);
        };
        let ReadyOutcome::Ready {
            resource,
            item: Some(mut item),
        } = self.get_resource_ready(&site, ReadyOptions::default()).await?
        else {
            return Ok(None);
        };
        if prematched {
            self.merger
                .merge(&mut item, std::slice::from_ref(&resource), false)
                .await?;
            self.store.update_item_content(&item).await?;
        }
        Ok(Some(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::engine::metadata::DefaultMetadataMerger;
    use crate::stores::memory::MemoryStore;
    use crate::testing::TestCatalog;
    use crate::traits::{merger::MetadataMerger, queue::CrawlQueue, store::ResourceStore};
    use crate::types::{
        id_type::IdType,
        item::{ItemId, ItemModel},
        resource::ResourceContent,
    };

    #[tokio::test]
    async fn test_ready_creates_and_links_item() {
        let t = TestCatalog::new();
        t.imdb.add_content("tt1", ResourceContent::new().with_title("Heat").with_metadata("year", 1995));
        let site = t.imdb_site("tt1");

        let outcome = t.catalog.get_resource_ready(&site, ReadyOptions::default()).await.unwrap();
        assert!(outcome.is_ready());
        let item = outcome.item().unwrap();
        assert_eq!(item.model, ItemModel::Movie);
        assert_eq!(item.title(), "Heat");
        assert_eq!(outcome.resource().item, Some(item.id));
    }

    #[tokio::test]
    async fn test_ready_reuses_existing_content() {
        let t = TestCatalog::new();
        t.imdb.add_content("tt1", ResourceContent::new().with_title("Heat"));
        let site = t.imdb_site("tt1");

        t.catalog.get_resource_ready(&site, ReadyOptions::default()).await.unwrap();
        t.catalog.get_resource_ready(&site, ReadyOptions::default()).await.unwrap();
        assert_eq!(t.imdb.scrape_call_count(), 1);

        t.catalog
            .get_resource_ready(&site, ReadyOptions::default().with_ignore_existing_content(true))
            .await
            .unwrap();
        assert_eq!(t.imdb.scrape_call_count(), 2);
    }

    /// Merges the item into `target` while its metadata is being folded.
    struct MergingMerger {
        catalog: Catalog<MemoryStore>,
        target: ItemId,
    }

    #[async_trait]
    impl MetadataMerger for MergingMerger {
        async fn merge(
            &self,
            item: &mut Item,
            resources: &[ExternalResource],
            ignore_existing_content: bool,
        ) -> Result<()> {
            self.catalog.merge(item.id, self.target).await?;
            DefaultMetadataMerger
                .merge(item, resources, ignore_existing_content)
                .await
        }
    }

    #[tokio::test]
    async fn test_metadata_save_keeps_concurrent_merge() {
        let t = TestCatalog::new();
        let target = t.item(ItemModel::Movie).await;
        let catalog = t.catalog.clone().with_merger(Arc::new(MergingMerger {
            catalog: t.catalog.clone(),
            target: target.id,
        }));
        t.imdb.add_content("tt1", ResourceContent::new().with_title("Heat"));

        let outcome = catalog
            .get_resource_ready(&t.imdb_site("tt1"), ReadyOptions::default())
            .await
            .unwrap();
        let item = outcome.item().unwrap();

        let stored = t.catalog.get_item(item.id).await.unwrap();
        assert_eq!(stored.merged_to_item, Some(target.id));
        assert_eq!(stored.title(), "Heat");
        let resources = t.store().resources_for_item(target.id).await.unwrap();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].id, outcome.resource().id);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_not_ready() {
        let t = TestCatalog::new();
        t.imdb.fail("tt404");
        let outcome = t
            .catalog
            .get_resource_ready(&t.imdb_site("tt404"), ReadyOptions::default())
            .await
            .unwrap();
        assert!(!outcome.is_ready());
        assert!(outcome.item().is_none());
        assert_eq!(t.store().item_count(), 0);
        assert_eq!(t.store().resource_count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_only_does_not_create() {
        let t = TestCatalog::new();
        t.imdb.add_content("tt1", ResourceContent::new().with_title("Heat"));
        let outcome = t
            .catalog
            .get_resource_ready(&t.imdb_site("tt1"), ReadyOptions::fetch_only())
            .await
            .unwrap();
        assert!(outcome.is_ready());
        assert!(outcome.item().is_none());
        assert_eq!(t.store().item_count(), 0);
    }

    #[tokio::test]
    async fn test_preloaded_content_skips_scrape() {
        let t = TestCatalog::new();
        let outcome = t
            .catalog
            .get_resource_ready(
                &t.imdb_site("tt5"),
                ReadyOptions::default().with_preloaded(ResourceContent::new().with_title("Ronin")),
            )
            .await
            .unwrap();
        assert_eq!(outcome.item().unwrap().title(), "Ronin");
        assert_eq!(t.imdb.scrape_call_count(), 0);
    }

    #[tokio::test]
    async fn test_required_resource_sets_parent() {
        let t = TestCatalog::new();
        let show_url = t.tmdb.url_for("show-1");
        t.tmdb.add_content(
            "show-1",
            ResourceContent::new().with_title("The Wire"),
        );
        t.tmdb.add_content(
            "season-1",
            ResourceContent::new()
                .with_title("The Wire Season 1")
                .with_preferred_model(ItemModel::TvSeason)
                .with_required(ResourceLink::new(show_url).with_model(ItemModel::TvShow)),
        );

        let outcome = t
            .catalog
            .get_resource_ready(&t.tmdb_site("season-1"), ReadyOptions::default())
            .await
            .unwrap();
        let season = outcome.into_item().unwrap();
        assert_eq!(season.model, ItemModel::TvSeason);
        let parent = t.catalog.get_item(season.parent_item.unwrap()).await.unwrap();
        assert_eq!(parent.model, ItemModel::TvShow);
        assert_eq!(parent.title(), "The Wire");
    }

    #[tokio::test]
    async fn test_related_resources_are_queued_and_crawled() {
        let t = TestCatalog::with_queue();
        t.imdb.add_content("tt2", ResourceContent::new().with_title("Collateral"));
        t.imdb.add_content(
            "tt1",
            ResourceContent::new()
                .with_title("Heat")
                .with_related(ResourceLink::new(t.imdb.url_for("tt2")))
                .with_related(ResourceLink::new("https://nowhere.test/x")),
        );

        let outcome = t
            .catalog
            .get_resource_ready(&t.imdb_site("tt1"), ReadyOptions::default())
            .await
            .unwrap();
        assert_eq!(t.store().item_count(), 1, "related resources are not fetched inline");

        let queue = t.queue.as_ref().unwrap();
        assert_eq!(queue.pending_count().await.unwrap(), 1);

        let summary = t
            .catalog
            .crawl_related_resources(outcome.resource().id)
            .await
            .unwrap();
        assert_eq!(summary, CrawlSummary { crawled: 1, failed: 1 });
        assert_eq!(t.store().item_count(), 2);
    }

    #[tokio::test]
    async fn test_crawl_missing_resource_is_skipped() {
        let t = TestCatalog::new();
        let summary = t.catalog.crawl_related_resources(ResourceId(999)).await.unwrap();
        assert_eq!(summary, CrawlSummary::default());
    }

    #[tokio::test]
    async fn test_unknown_preferred_model_surfaces() {
        let t = TestCatalog::new();
        t.imdb.add_content(
            "tt9",
            ResourceContent::new()
                .with_title("X")
                .with_metadata("preferred_model", "Blimp"),
        );
        let err = t
            .catalog
            .get_resource_ready(&t.imdb_site("tt9"), ReadyOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_configuration());

        let stored = t
            .store()
            .get_resource_by_lookup(IdType::Imdb, "tt9")
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.ready());
        assert_eq!(stored.preferred_model(), None);
        assert_eq!(t.store().item_count(), 0);

        // nothing was cached, so the next call fetches again
        let err = t
            .catalog
            .get_resource_ready(&t.imdb_site("tt9"), ReadyOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(t.imdb.scrape_call_count(), 2);
    }
}
