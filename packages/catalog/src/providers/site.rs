//! A provider adapter bound to one provider identity.

use std::fmt;
use std::sync::Arc;

use crate::error::ProviderResult;
use crate::traits::provider::Provider;
use crate::types::{id_type::IdType, item::ItemModel, resource::ResourceContent};

/// One provider artifact: adapter plus `(id_value, canonical url)`.
#[derive(Clone)]
pub struct Site {
    provider: Arc<dyn Provider>,
    id_value: String,
    url: String,
}

impl Site {
    /// Bind `provider` to a URL it recognizes.
    ///
    /// The stored URL is the canonical one produced by `id_to_url`.
    pub fn from_url(provider: Arc<dyn Provider>, url: &str) -> Option<Self> {
        let id_value = provider.url_to_id(url)?;
        Some(Self::from_id(provider, id_value))
    }

    pub fn from_id(provider: Arc<dyn Provider>, id_value: impl Into<String>) -> Self {
        let id_value = id_value.into();
        let url = provider.id_to_url(&id_value);
        Self {
            provider,
            id_value,
            url,
        }
    }

    pub fn id_type(&self) -> IdType {
        self.provider.id_type()
    }

    pub fn id_value(&self) -> &str {
        &self.id_value
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn default_model(&self) -> ItemModel {
        self.provider.default_model()
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub async fn scrape(&self) -> ProviderResult<ResourceContent> {
        self.provider.scrape(&self.id_value, &self.url).await
    }
}

impl fmt::Debug for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Site")
            .field("id_type", &self.id_type())
            .field("id_value", &self.id_value)
            .field("url", &self.url)
            .finish()
    }
}
