//! Short-link resolution over HTTP.

use async_trait::async_trait;
use reqwest::{header::LOCATION, redirect::Policy};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::{ProviderError, ProviderResult};
use crate::traits::provider::UrlResolver;
use crate::types::config::CatalogConfig;

/// Resolves a short link with one HEAD request and returns its `Location`.
///
/// Redirects are not followed further; the registry validates the target.
pub struct HttpShortLinkResolver {
    client: reqwest::Client,
}

impl HttpShortLinkResolver {
    /// Create a resolver whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> ProviderResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .map_err(ProviderError::from)?;
        Ok(Self { client })
    }

    pub fn from_config(config: &CatalogConfig) -> ProviderResult<Self> {
        Self::new(config.redirect_timeout)
    }
}

#[async_trait]
impl UrlResolver for HttpShortLinkResolver {
    async fn resolve(&self, url: &str) -> Option<String> {
        let response = match self.client.head(url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(url = %url, error = %e, "short link not resolved");
                return None;
            }
        };
        if !response.status().is_redirection() {
            debug!(url = %url, status = %response.status(), "short link did not redirect");
            return None;
        }
        let location = response.headers().get(LOCATION)?.to_str().ok()?;
        // Location may be relative to the short link
        Url::parse(url)
            .and_then(|base| base.join(location))
            .map(|target| target.to_string())
            .ok()
    }
}
