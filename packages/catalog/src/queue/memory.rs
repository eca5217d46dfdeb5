//! In-memory crawl queue.

use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{CatalogError, Result};
use crate::traits::queue::{CrawlJob, CrawlJobStatus, CrawlQueue, EnqueueResult};
use crate::types::{config::CatalogConfig, resource::ResourceId};

/// Crawl queue held in process memory. Jobs are claimed in enqueue order.
pub struct MemoryCrawlQueue {
    jobs: RwLock<IndexMap<Uuid, CrawlJob>>,
    max_attempts: u32,
}

impl MemoryCrawlQueue {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            jobs: RwLock::new(IndexMap::new()),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Queue using the configured attempt limit.
    pub fn from_config(config: &CatalogConfig) -> Self {
        Self::new(config.crawl_max_attempts)
    }

    /// All jobs, including finished and dead ones.
    pub fn jobs(&self) -> Vec<CrawlJob> {
        self.jobs
            .read()
            .map(|jobs| jobs.values().cloned().collect())
            .unwrap_or_default()
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, IndexMap<Uuid, CrawlJob>>> {
        self.jobs
            .write()
            .map_err(|e| CatalogError::storage(format!("crawl queue lock poisoned: {e}")))
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, IndexMap<Uuid, CrawlJob>>> {
        self.jobs
            .read()
            .map_err(|e| CatalogError::storage(format!("crawl queue lock poisoned: {e}")))
    }
}

impl Default for MemoryCrawlQueue {
    fn default() -> Self {
        Self::new(3)
    }
}

#[async_trait]
impl CrawlQueue for MemoryCrawlQueue {
    async fn enqueue(&self, resource: ResourceId) -> Result<EnqueueResult> {
        let mut jobs = self.write()?;
        if let Some(active) = jobs
            .values()
            .find(|j| j.resource == resource && j.is_active())
        {
            return Ok(EnqueueResult::Duplicate(active.id));
        }
        let job = CrawlJob::new(resource, self.max_attempts);
        let id = job.id;
        jobs.insert(id, job);
        Ok(EnqueueResult::Created(id))
    }

    async fn claim(&self, limit: usize) -> Result<Vec<CrawlJob>> {
        let mut jobs = self.write()?;
        let claimed: Vec<CrawlJob> = jobs
            .values_mut()
            .filter(|j| j.status == CrawlJobStatus::Pending)
            .take(limit)
            .map(|j| {
                j.status = CrawlJobStatus::Running;
                j.attempts += 1;
                j.clone()
            })
            .collect();
        Ok(claimed)
    }

    async fn mark_succeeded(&self, job: Uuid) -> Result<()> {
        let mut jobs = self.write()?;
        let entry = jobs
            .get_mut(&job)
            .ok_or_else(|| CatalogError::storage(format!("crawl job not found: {job}")))?;
        entry.status = CrawlJobStatus::Succeeded;
        entry.last_error = None;
        Ok(())
    }

    async fn mark_failed(&self, job: Uuid, error: &str) -> Result<()> {
        let mut jobs = self.write()?;
        let entry = jobs
            .get_mut(&job)
            .ok_or_else(|| CatalogError::storage(format!("crawl job not found: {job}")))?;
        entry.last_error = Some(error.to_string());
        if entry.attempts >= entry.max_attempts {
            entry.status = CrawlJobStatus::Dead;
            warn!(job_id = %job, resource = %entry.resource, attempts = entry.attempts, "crawl job dead-lettered");
        } else {
            entry.status = CrawlJobStatus::Pending;
            debug!(job_id = %job, attempts = entry.attempts, "crawl job will retry");
        }
        Ok(())
    }

    async fn get_job(&self, job: Uuid) -> Result<Option<CrawlJob>> {
        Ok(self.read()?.get(&job).cloned())
    }

    async fn pending_count(&self) -> Result<usize> {
        Ok(self
            .read()?
            .values()
            .filter(|j| j.status == CrawlJobStatus::Pending)
            .count())
    }
}
