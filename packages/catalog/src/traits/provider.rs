//! Provider adapter traits.
//!
//! A provider recognizes one identifier kind's URLs and produces resource
//! content for it. Scraping itself lives outside the engine; the engine
//! only calls [`Provider::scrape`].

use async_trait::async_trait;
use regex::Regex;

use crate::error::ProviderResult;
use crate::types::{id_type::IdType, item::ItemModel, resource::ResourceContent};

/// Adapter for one identifier kind.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Identifier kind this adapter owns. Unique within a registry.
    fn id_type(&self) -> IdType;

    /// Human readable site name.
    fn name(&self) -> &str {
        self.id_type().as_str()
    }

    /// Item subtype instantiated when nothing else says otherwise.
    fn default_model(&self) -> ItemModel;

    /// URL patterns; the first capture group is the provider id.
    fn url_patterns(&self) -> &[Regex];

    fn validate(&self, url: &str) -> bool {
        self.url_patterns().iter().any(|p| p.is_match(url))
    }

    /// Looser check tried only after every adapter rejected the URL.
    fn validate_fallback(&self, _url: &str) -> bool {
        false
    }

    fn url_to_id(&self, url: &str) -> Option<String> {
        self.url_patterns()
            .iter()
            .find_map(|p| p.captures(url))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }

    fn id_to_url(&self, id_value: &str) -> String;

    /// Fetch and parse the provider page.
    async fn scrape(&self, id_value: &str, url: &str) -> ProviderResult<ResourceContent>;
}

/// Resolves shortened links to their target URL.
#[async_trait]
pub trait UrlResolver: Send + Sync {
    /// Follow redirects for `url`. `None` when the link cannot be resolved.
    async fn resolve(&self, url: &str) -> Option<String>;
}
