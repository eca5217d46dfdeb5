//! Configuration types for the catalog engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::resource::ResourceContent;

/// Hard ceiling on merge-chain traversal. Exceeding it is always an error.
pub const MAX_MERGE_HOPS: usize = 5;

/// Engine-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Hosts whose links are resolved with one HEAD redirect before
    /// provider lookup.
    #[serde(default = "default_shortlink_hosts")]
    pub shortlink_hosts: Vec<String>,

    /// Timeout for the short-link HEAD request. Default: 1s.
    pub redirect_timeout: Duration,

    /// Attempts per crawl job before it is dead-lettered. Default: 3.
    pub crawl_max_attempts: u32,

    /// Root directory for the filesystem cover store.
    pub cover_root: PathBuf,

    /// Actor recorded on audit entries, if any.
    pub actor: Option<String>,
}

fn default_shortlink_hosts() -> Vec<String> {
    vec!["spotify.link".to_string(), "t.co".to_string()]
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            shortlink_hosts: default_shortlink_hosts(),
            redirect_timeout: Duration::from_secs(1),
            crawl_max_attempts: 3,
            cover_root: PathBuf::from("media"),
            actor: None,
        }
    }
}

impl CatalogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn with_cover_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cover_root = root.into();
        self
    }

    pub fn with_crawl_max_attempts(mut self, attempts: u32) -> Self {
        self.crawl_max_attempts = attempts;
        self
    }

    pub fn with_shortlink_hosts(
        mut self,
        hosts: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.shortlink_hosts = hosts.into_iter().map(Into::into).collect();
        self
    }
}

/// Options for `get_resource_ready`.
///
/// `auto_link` implies `auto_create`, which implies `auto_save`; call
/// [`ReadyOptions::normalized`] to apply the implications.
#[derive(Debug, Clone)]
pub struct ReadyOptions {
    /// Fold fetched metadata into the linked item
    pub auto_save: bool,
    /// Match or create an item and link the resource to it
    pub auto_create: bool,
    /// Fetch required resources, link the parent item and queue related crawls
    pub auto_link: bool,
    /// Let fresh content overwrite existing item fields
    pub ignore_existing_content: bool,
    /// Use this content instead of scraping
    pub preloaded_content: Option<ResourceContent>,
}

impl Default for ReadyOptions {
    fn default() -> Self {
        Self {
            auto_save: true,
            auto_create: true,
            auto_link: true,
            ignore_existing_content: false,
            preloaded_content: None,
        }
    }
}

impl ReadyOptions {
    /// Fetch only: nothing is saved, created or linked.
    pub fn fetch_only() -> Self {
        Self {
            auto_save: false,
            auto_create: false,
            auto_link: false,
            ..Default::default()
        }
    }

    pub fn with_preloaded(mut self, content: ResourceContent) -> Self {
        self.preloaded_content = Some(content);
        self
    }

    pub fn with_ignore_existing_content(mut self, ignore: bool) -> Self {
        self.ignore_existing_content = ignore;
        self
    }

    pub fn normalized(mut self) -> Self {
        if self.auto_link {
            self.auto_create = true;
        }
        if self.auto_create {
            self.auto_save = true;
        }
        self
    }
}
