//! Integration tests for fan-out: required resources, the crawl queue and
//! the integrity pass over data produced by crawling.

use std::sync::Arc;

use catalog::{
    testing::TestCatalog, CrawlJobStatus, CrawlQueue, CrawlWorker, ItemModel, ReadyOptions,
    ResourceContent, ResourceLink, ResourceStore,
};

#[tokio::test]
async fn test_season_links_show_through_required_resource() {
    let t = TestCatalog::with_queue();
    t.tmdb.add_content("show", ResourceContent::new().with_title("Slow Horses"));
    t.tmdb.add_content(
        "season-2",
        ResourceContent::new()
            .with_title("Slow Horses Season 2")
            .with_preferred_model(ItemModel::TvSeason)
            .with_required(ResourceLink::new(t.tmdb.url_for("show")).with_model(ItemModel::TvShow)),
    );

    let season = t
        .catalog
        .get_resource_ready(&t.tmdb_site("season-2"), ReadyOptions::default())
        .await
        .unwrap()
        .into_item()
        .unwrap();
    let show = t.catalog.get_item(season.parent_item.unwrap()).await.unwrap();
    assert_eq!(show.model, ItemModel::TvShow);

    // No related links, nothing queued
    let queue = t.queue.clone().unwrap();
    assert_eq!(queue.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_preloaded_required_content_is_not_scraped() {
    let t = TestCatalog::new();
    t.imdb.add_content(
        "tt1",
        ResourceContent::new().with_title("Heat").with_required(
            ResourceLink::new(t.goodreads.url_for("novel"))
                .with_content(ResourceContent::new().with_title("Heat: the novelization")),
        ),
    );

    t.catalog
        .get_resource_ready(&t.imdb_site("tt1"), ReadyOptions::default())
        .await
        .unwrap();
    assert_eq!(t.goodreads.scrape_call_count(), 0);
    assert_eq!(t.store().item_count(), 2);
}

#[tokio::test]
async fn test_worker_crawls_related_and_prematched() {
    let t = TestCatalog::with_queue();
    let queue = t.queue.clone().unwrap();

    t.imdb.add_content("tt2", ResourceContent::new().with_title("Collateral"));
    t.goodreads.add_content("b1", ResourceContent::new().with_title("Heat (book)"));
    t.imdb.add_content(
        "tt1",
        ResourceContent::new()
            .with_title("Heat")
            .with_related(ResourceLink::new(t.imdb.url_for("tt2")))
            .with_prematched(ResourceLink::new(t.goodreads.url_for("b1"))),
    );

    t.catalog
        .get_resource_ready(&t.imdb_site("tt1"), ReadyOptions::default())
        .await
        .unwrap();
    // Enqueueing again while the job is pending is a no-op
    t.catalog
        .get_resource_ready(
            &t.imdb_site("tt1"),
            ReadyOptions::default().with_ignore_existing_content(true),
        )
        .await
        .unwrap();
    assert_eq!(queue.pending_count().await.unwrap(), 1);

    let worker = CrawlWorker::new(t.catalog.clone(), queue.clone());
    assert_eq!(worker.run_once().await.unwrap(), 1);

    assert_eq!(t.store().item_count(), 3);
    let jobs = queue.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].status, CrawlJobStatus::Succeeded);
}

#[tokio::test]
async fn test_crawl_job_for_vanished_resource_succeeds() {
    let t = TestCatalog::with_queue();
    let queue = t.queue.clone().unwrap();
    queue.enqueue(catalog::ResourceId(4242)).await.unwrap();

    let worker = CrawlWorker::new(t.catalog.clone(), queue.clone() as Arc<dyn CrawlQueue>);
    worker.run_once().await.unwrap();
    assert_eq!(queue.jobs()[0].status, CrawlJobStatus::Succeeded);
}

#[tokio::test]
async fn test_integrity_pass_after_manual_corrections() {
    let t = TestCatalog::new();
    for id in ["a", "b", "c"] {
        t.imdb.add_content(id, ResourceContent::new().with_title(format!("Film {id}")));
    }
    let mut items = Vec::new();
    for id in ["a", "b", "c"] {
        items.push(
            t.catalog
                .get_resource_ready(&t.imdb_site(id), ReadyOptions::default())
                .await
                .unwrap()
                .into_item()
                .unwrap(),
        );
    }

    // a -> b through the engine, then b -> c behind its back
    t.catalog.merge(items[0].id, items[1].id).await.unwrap();
    t.set_merged(items[1].id, Some(items[2].id)).await;

    let report = t.catalog.check_integrity(false).await.unwrap();
    assert!(!report.is_clean());
    assert_eq!(report.fixed, 0);

    let report = t.catalog.check_integrity(true).await.unwrap();
    assert!(report.fixed > 0);
    assert_eq!(
        t.catalog.get_item(items[0].id).await.unwrap().merged_to_item,
        Some(items[2].id)
    );
    assert_eq!(t.store().resources_for_item(items[2].id).await.unwrap().len(), 3);
    assert!(t.catalog.check_integrity(false).await.unwrap().is_clean());
}
