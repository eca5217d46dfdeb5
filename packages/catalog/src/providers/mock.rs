//! Mock provider for testing.
//!
//! Provides a configurable mock implementation of the Provider trait.

use async_trait::async_trait;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::error::{ProviderError, ProviderResult};
use crate::traits::provider::Provider;
use crate::types::{id_type::IdType, item::ItemModel, resource::ResourceContent};

/// Mock provider for testing.
///
/// Recognizes `https://{host}/item/{id}` and returns canned content per id.
/// Ids without content fail to scrape, which leaves their resource not ready.
///
/// # Example
///
/// ```rust
/// use catalog::providers::MockProvider;
/// use catalog::types::{id_type::IdType, item::ItemModel, resource::ResourceContent};
///
/// let mock = MockProvider::new(IdType::Imdb, ItemModel::Movie, "imdb.test")
///     .with_content("tt1", ResourceContent::new().with_title("Heat"));
/// ```
#[derive(Clone)]
pub struct MockProvider {
    id_type: IdType,
    default_model: ItemModel,
    host: String,
    patterns: Vec<Regex>,
    fallback_prefix: Option<String>,
    /// Canned content indexed by id value
    contents: Arc<RwLock<HashMap<String, ResourceContent>>>,
    /// Ids whose scrape returns an HTTP error
    failing: Arc<RwLock<HashSet<String>>>,
    /// Track scrape calls for verification
    scrape_calls: Arc<RwLock<Vec<String>>>,
}

impl MockProvider {
    /// Create a mock for `id_type` owning URLs on `host`.
    pub fn new(id_type: IdType, default_model: ItemModel, host: impl Into<String>) -> Self {
        let host = host.into();
        let pattern = format!(r"^https?://{}/item/([^/?#]+)", regex::escape(&host));
        // The pattern is built from an escaped literal, so it always compiles
        let patterns = Regex::new(&pattern).into_iter().collect();
        Self {
            id_type,
            default_model,
            host,
            patterns,
            fallback_prefix: None,
            contents: Arc::default(),
            failing: Arc::default(),
            scrape_calls: Arc::default(),
        }
    }

    /// Accept any URL under `prefix` as a fallback; the id is the last path
    /// segment.
    pub fn with_fallback_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.fallback_prefix = Some(prefix.into());
        self
    }

    /// Add canned content for an id.
    pub fn add_content(&self, id_value: impl Into<String>, content: ResourceContent) {
        self.contents
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id_value.into(), content);
    }

    /// Add canned content for an id (builder pattern).
    pub fn with_content(self, id_value: impl Into<String>, content: ResourceContent) -> Self {
        self.add_content(id_value, content);
        self
    }

    /// Make scraping `id_value` fail with an HTTP error.
    pub fn fail(&self, id_value: impl Into<String>) {
        self.failing
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id_value.into());
    }

    /// URL of `id_value` on this mock.
    pub fn url_for(&self, id_value: &str) -> String {
        self.id_to_url(id_value)
    }

    /// Get the number of times scrape was called.
    pub fn scrape_call_count(&self) -> usize {
        self.scrape_calls
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Get the ids that were scraped, in call order.
    pub fn scrape_calls(&self) -> Vec<String> {
        self.scrape_calls
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Clear all recorded calls.
    pub fn reset_calls(&self) {
        self.scrape_calls
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn id_type(&self) -> IdType {
        self.id_type
    }

    fn default_model(&self) -> ItemModel {
        self.default_model
    }

    fn url_patterns(&self) -> &[Regex] {
        &self.patterns
    }

    fn validate_fallback(&self, url: &str) -> bool {
        self.fallback_prefix
            .as_deref()
            .is_some_and(|prefix| url.starts_with(prefix))
    }

    fn url_to_id(&self, url: &str) -> Option<String> {
        let from_pattern = self
            .patterns
            .iter()
            .find_map(|p| p.captures(url))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());
        if from_pattern.is_some() || !self.validate_fallback(url) {
            return from_pattern;
        }
        url.trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    fn id_to_url(&self, id_value: &str) -> String {
        format!("https://{}/item/{}", self.host, id_value)
    }

    async fn scrape(&self, id_value: &str, url: &str) -> ProviderResult<ResourceContent> {
        self.scrape_calls
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(id_value.to_string());

        if self
            .failing
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(id_value)
        {
            return Err(ProviderError::Http(
                format!("mock failure for {}", url).into(),
            ));
        }

        self.contents
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id_value)
            .cloned()
            .ok_or_else(|| ProviderError::Scrape {
                url: url.to_string(),
                reason: "no canned content".into(),
            })
    }
}
