//! Provider registry: identifier kind to adapter.
//!
//! Built once at startup and immutable afterwards. The registry is passed to
//! the engine explicitly, so tests can run with fake providers.

use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{debug, warn};
use url::{Host, Url};

use super::site::Site;
use crate::error::{CatalogError, Result};
use crate::traits::provider::{Provider, UrlResolver};
use crate::types::{config::CatalogConfig, id_type::IdType};

/// Builder for [`ProviderRegistry`].
#[derive(Default)]
pub struct ProviderRegistryBuilder {
    providers: IndexMap<IdType, Arc<dyn Provider>>,
    resolver: Option<Arc<dyn UrlResolver>>,
    shortlink_hosts: Vec<String>,
}

impl ProviderRegistryBuilder {
    pub fn new() -> Self {
        Self {
            shortlink_hosts: CatalogConfig::default().shortlink_hosts,
            ..Default::default()
        }
    }

    /// Register an adapter. Fails if its identifier kind is already taken.
    pub fn register(&mut self, provider: Arc<dyn Provider>) -> Result<()> {
        let id_type = provider.id_type();
        if self.providers.contains_key(&id_type) {
            return Err(CatalogError::DuplicateProvider { id_type });
        }
        self.providers.insert(id_type, provider);
        Ok(())
    }

    /// Register an adapter (builder pattern).
    pub fn with_provider(mut self, provider: Arc<dyn Provider>) -> Result<Self> {
        self.register(provider)?;
        Ok(self)
    }

    /// Resolver used for short-link hosts.
    pub fn with_resolver(mut self, resolver: Arc<dyn UrlResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Take short-link hosts from the engine configuration.
    pub fn with_config(mut self, config: &CatalogConfig) -> Self {
        self.shortlink_hosts = config.shortlink_hosts.clone();
        self
    }

    pub fn build(self) -> ProviderRegistry {
        ProviderRegistry {
            providers: self.providers,
            resolver: self.resolver,
            shortlink_hosts: self.shortlink_hosts,
        }
    }
}

/// Immutable map from identifier kind to provider adapter.
///
/// URL lookup tries adapters in registration order.
pub struct ProviderRegistry {
    providers: IndexMap<IdType, Arc<dyn Provider>>,
    resolver: Option<Arc<dyn UrlResolver>>,
    shortlink_hosts: Vec<String>,
}

impl ProviderRegistry {
    pub fn builder() -> ProviderRegistryBuilder {
        ProviderRegistryBuilder::new()
    }

    /// Adapter for `id_type`.
    pub fn get(&self, id_type: IdType) -> Result<Arc<dyn Provider>> {
        self.providers
            .get(&id_type)
            .cloned()
            .ok_or(CatalogError::UnknownProvider { id_type })
    }

    pub fn contains(&self, id_type: IdType) -> bool {
        self.providers.contains_key(&id_type)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Adapters in registration order.
    pub fn providers(&self) -> impl Iterator<Item = &Arc<dyn Provider>> {
        self.providers.values()
    }

    /// Direct lookup by kind and provider id.
    pub fn site_for_id(&self, id_type: IdType, id_value: &str) -> Option<Site> {
        self.providers
            .get(&id_type)
            .map(|p| Site::from_id(Arc::clone(p), id_value))
    }

    /// Find the adapter for `url`.
    ///
    /// Order: each adapter's `validate`; for short-link hosts, `validate`
    /// again on the redirect target; then each adapter's
    /// `validate_fallback`.
    pub async fn site_for_url(&self, url: &str) -> Option<Site> {
        let parsed = match parse_provider_url(url) {
            Some(parsed) => parsed,
            None => {
                debug!(url = %url, "rejected url");
                return None;
            }
        };

        if let Some(site) = self.match_url(url) {
            return Some(site);
        }

        if let Some(site) = self.follow_short_link(url, &parsed).await {
            return Some(site);
        }

        let site = self
            .providers
            .values()
            .find(|p| p.validate_fallback(url))
            .and_then(|p| Site::from_url(Arc::clone(p), url));
        if site.is_none() {
            debug!(url = %url, "no provider for url");
        }
        site
    }

    fn match_url(&self, url: &str) -> Option<Site> {
        let provider = self.providers.values().find(|p| p.validate(url))?;
        let site = Site::from_url(Arc::clone(provider), url);
        if site.is_none() {
            warn!(url = %url, provider = provider.name(), "provider validated url but found no id");
        }
        site
    }

    async fn follow_short_link(&self, url: &str, parsed: &Url) -> Option<Site> {
        let resolver = self.resolver.as_ref()?;
        let host = parsed.host_str()?;
        let is_short = self
            .shortlink_hosts
            .iter()
            .any(|h| h.eq_ignore_ascii_case(host));
        if !is_short || parsed.path().len() <= 1 {
            return None;
        }

        let target = resolver.resolve(url).await?;
        if target == url {
            return None;
        }
        debug!(url = %url, target = %target, "resolved short link");
        self.match_url(&target)
    }
}

/// Parse a URL a provider could own: http(s), a domain host, no port.
fn parse_provider_url(url: &str) -> Option<Url> {
    let parsed = Url::parse(url.trim()).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.port().is_some() {
        return None;
    }
    match parsed.host() {
        Some(Host::Domain(d)) if d.contains('.') => Some(parsed),
        _ => None,
    }
}
