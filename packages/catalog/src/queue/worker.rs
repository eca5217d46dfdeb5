//! Crawl worker: drains the crawl queue.
//!
//! Each job crawls the related and prematched links of one resource via
//! [`Catalog::crawl_related_resources`]. Jobs are retried by the queue until
//! their attempts run out.
//!
//! # Example
//!
//! ```ignore
//! let queue = Arc::new(MemoryCrawlQueue::new(3));
//! let catalog = Catalog::new(store, registry).with_crawl_queue(queue.clone());
//! let worker = CrawlWorker::new(catalog, queue);
//!
//! let shutdown = CancellationToken::new();
//! tokio::spawn(worker.run(shutdown.clone()));
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::engine::Catalog;
use crate::error::Result;
use crate::traits::{
    queue::{CrawlJob, CrawlQueue},
    store::CatalogStore,
};

/// Configuration for the crawl worker.
#[derive(Debug, Clone)]
pub struct CrawlWorkerConfig {
    /// Maximum number of jobs to claim at once
    pub batch_size: usize,
    /// How long to wait when no jobs are available
    pub poll_interval: Duration,
    /// Worker ID for this instance
    pub worker_id: String,
}

impl Default for CrawlWorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            poll_interval: Duration::from_secs(5),
            worker_id: format!("worker-{}", Uuid::new_v4()),
        }
    }
}

impl CrawlWorkerConfig {
    /// Create a new config with a specific worker ID.
    pub fn with_worker_id(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            ..Default::default()
        }
    }
}

pub struct CrawlWorker<S: CatalogStore> {
    catalog: Catalog<S>,
    queue: Arc<dyn CrawlQueue>,
    config: CrawlWorkerConfig,
}

impl<S: CatalogStore> CrawlWorker<S> {
    pub fn new(catalog: Catalog<S>, queue: Arc<dyn CrawlQueue>) -> Self {
        Self::with_config(catalog, queue, CrawlWorkerConfig::default())
    }

    pub fn with_config(
        catalog: Catalog<S>,
        queue: Arc<dyn CrawlQueue>,
        config: CrawlWorkerConfig,
    ) -> Self {
        Self {
            catalog,
            queue,
            config,
        }
    }

    pub fn config(&self) -> &CrawlWorkerConfig {
        &self.config
    }

    /// Claim one batch and process it. Returns the number of jobs claimed.
    pub async fn run_once(&self) -> Result<usize> {
        let jobs = self.queue.claim(self.config.batch_size).await?;
        if jobs.is_empty() {
            return Ok(0);
        }
        debug!(count = jobs.len(), "claimed crawl jobs");

        let count = jobs.len();
        futures::future::join_all(jobs.into_iter().map(|job| self.process_job(job))).await;
        Ok(count)
    }

    async fn process_job(&self, job: CrawlJob) {
        let job_id = job.id;
        match self.catalog.crawl_related_resources(job.resource).await {
            Ok(summary) => {
                debug!(
                    job_id = %job_id,
                    resource = %job.resource,
                    crawled = summary.crawled,
                    failed = summary.failed,
                    "crawl job succeeded"
                );
                if let Err(e) = self.queue.mark_succeeded(job_id).await {
                    error!(job_id = %job_id, error = %e, "failed to mark job as succeeded");
                }
            }
            Err(e) => {
                warn!(job_id = %job_id, resource = %job.resource, error = %e, "crawl job failed");
                if let Err(e) = self.queue.mark_failed(job_id, &e.to_string()).await {
                    error!(job_id = %job_id, error = %e, "failed to mark job as failed");
                }
            }
        }
    }

    /// Poll until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            worker_id = %self.config.worker_id,
            batch_size = self.config.batch_size,
            "crawl worker starting"
        );

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            match self.run_once().await {
                Ok(0) => {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "failed to claim crawl jobs");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                    }
                }
            }
        }

        info!(worker_id = %self.config.worker_id, "crawl worker stopped");
    }
}
