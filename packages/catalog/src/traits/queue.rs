//! Crawl task queue.
//!
//! Jobs carry a resource id; the worker crawls that resource's related and
//! prematched links. Execution is at-least-once, so handlers must tolerate
//! re-runs and resources that vanished after enqueue.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::types::resource::ResourceId;

/// Result type for enqueue operations that handles idempotency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueResult {
    /// Job was enqueued, returns new job ID
    Created(Uuid),
    /// A pending or running job for the resource exists, returns its ID
    Duplicate(Uuid),
}

impl EnqueueResult {
    pub fn job_id(&self) -> Uuid {
        match self {
            EnqueueResult::Created(id) | EnqueueResult::Duplicate(id) => *id,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, EnqueueResult::Created(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlJobStatus {
    Pending,
    Running,
    Succeeded,
    /// Out of attempts
    Dead,
}

/// A queued crawl of one resource's linked resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlJob {
    pub id: Uuid,
    pub resource: ResourceId,
    pub status: CrawlJobStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub last_error: Option<String>,
    pub enqueued_at: DateTime<Utc>,
}

impl CrawlJob {
    pub fn new(resource: ResourceId, max_attempts: u32) -> Self {
        Self {
            id: Uuid::now_v7(),
            resource,
            status: CrawlJobStatus::Pending,
            attempts: 0,
            max_attempts,
            last_error: None,
            enqueued_at: Utc::now(),
        }
    }

    /// Whether the job still occupies the resource's idempotency slot.
    pub fn is_active(&self) -> bool {
        matches!(self.status, CrawlJobStatus::Pending | CrawlJobStatus::Running)
    }
}

/// Queue of crawl jobs.
#[async_trait]
pub trait CrawlQueue: Send + Sync {
    /// Enqueue a crawl for `resource`.
    ///
    /// Returns `Duplicate` when an active job for the resource exists.
    async fn enqueue(&self, resource: ResourceId) -> Result<EnqueueResult>;

    /// Claim up to `limit` pending jobs, marking them running.
    async fn claim(&self, limit: usize) -> Result<Vec<CrawlJob>>;

    async fn mark_succeeded(&self, job: Uuid) -> Result<()>;

    /// Record a failure. The job returns to pending until its attempts are
    /// used up, then it is dead-lettered.
    async fn mark_failed(&self, job: Uuid, error: &str) -> Result<()>;

    async fn get_job(&self, job: Uuid) -> Result<Option<CrawlJob>>;

    /// Number of pending jobs.
    async fn pending_count(&self) -> Result<usize>;
}
