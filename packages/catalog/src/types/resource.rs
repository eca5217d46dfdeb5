//! External resources: one scraped artifact per provider identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::id_type::{get_best_lookup_id, IdType, LookupIds};
use super::item::{ItemId, ItemModel};

/// Stable internal resource identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub i64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A reference from one resource to another provider artifact.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceLink {
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_type: Option<IdType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_value: Option<String>,

    /// Item model the linked resource is expected to produce
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ItemModel>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Content already known for the linked resource, used instead of scraping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<ResourceContent>,
}

impl ResourceLink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id_type: IdType, id_value: impl Into<String>) -> Self {
        self.id_type = Some(id_type);
        self.id_value = Some(id_value.into());
        self
    }

    pub fn with_model(mut self, model: ItemModel) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_content(mut self, content: ResourceContent) -> Self {
        self.content = Some(content);
        self
    }
}

/// Freshly scraped content for a resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceContent {
    #[serde(default)]
    pub lookup_ids: LookupIds,

    #[serde(default)]
    pub metadata: Map<String, Value>,

    #[serde(skip)]
    pub cover_image: Option<Vec<u8>>,

    #[serde(default)]
    pub cover_image_extension: Option<String>,

    #[serde(default)]
    pub required_resources: Vec<ResourceLink>,

    #[serde(default)]
    pub related_resources: Vec<ResourceLink>,

    #[serde(default)]
    pub prematched_resources: Vec<ResourceLink>,
}

impl ResourceContent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lookup_id(mut self, id_type: IdType, value: impl Into<String>) -> Self {
        self.lookup_ids.insert(id_type, value.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_title(self, title: impl Into<String>) -> Self {
        self.with_metadata("title", title.into())
    }

    /// Ask matching to create the item as `model` instead of the provider default.
    pub fn with_preferred_model(self, model: ItemModel) -> Self {
        self.with_metadata("preferred_model", model.as_str())
    }

    /// Raw `preferred_model` override, if any.
    pub fn preferred_model(&self) -> Option<&str> {
        self.metadata
            .get("preferred_model")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn with_cover(mut self, bytes: Vec<u8>, extension: impl Into<String>) -> Self {
        self.cover_image = Some(bytes);
        self.cover_image_extension = Some(extension.into());
        self
    }

    pub fn with_required(mut self, link: ResourceLink) -> Self {
        self.required_resources.push(link);
        self
    }

    pub fn with_related(mut self, link: ResourceLink) -> Self {
        self.related_resources.push(link);
        self
    }

    pub fn with_prematched(mut self, link: ResourceLink) -> Self {
        self.prematched_resources.push(link);
        self
    }
}

/// A stored external resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalResource {
    pub id: ResourceId,

    /// Linked canonical item; the only mutable identity field
    pub item: Option<ItemId>,

    pub id_type: IdType,
    pub id_value: String,

    /// Canonical provider URL, globally unique
    pub url: String,

    /// Locally cached cover path
    pub cover: Option<String>,

    #[serde(default)]
    pub other_lookup_ids: LookupIds,

    #[serde(default)]
    pub metadata: Map<String, Value>,

    pub scraped_time: Option<DateTime<Utc>>,
    pub created_time: DateTime<Utc>,
    pub edited_time: DateTime<Utc>,

    #[serde(default)]
    pub required_resources: Vec<ResourceLink>,
    #[serde(default)]
    pub related_resources: Vec<ResourceLink>,
    #[serde(default)]
    pub prematched_resources: Vec<ResourceLink>,
}

impl ExternalResource {
    /// Non-empty metadata and a scrape timestamp.
    pub fn ready(&self) -> bool {
        !self.metadata.is_empty() && self.scraped_time.is_some()
    }

    /// Raw `preferred_model` override carried in metadata, if any.
    pub fn preferred_model(&self) -> Option<&str> {
        self.metadata
            .get("preferred_model")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn has_cover(&self) -> bool {
        self.cover.is_some()
    }

    /// Own id plus `other_lookup_ids`, empty values dropped.
    ///
    /// The own id overrides an auxiliary value of the same kind.
    pub fn all_lookup_ids(&self) -> LookupIds {
        let mut ids = self.other_lookup_ids.clone();
        ids.insert(self.id_type, self.id_value.clone());
        ids.retain(|_, v| !v.is_empty());
        ids
    }

    /// [`all_lookup_ids`](Self::all_lookup_ids) as pairs, best id first.
    pub fn lookup_ids(&self) -> Vec<(IdType, String)> {
        let all = self.all_lookup_ids();
        let best = get_best_lookup_id(&all);
        let mut ids: Vec<(IdType, String)> = Vec::with_capacity(all.len());
        if let Some((bt, bv)) = &best {
            ids.push((*bt, bv.clone()));
        }
        ids.extend(
            all.into_iter()
                .filter(|(t, _)| best.as_ref().map(|(bt, _)| bt) != Some(t)),
        );
        ids
    }
}

/// Identity of a resource stub to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewResource {
    pub id_type: IdType,
    pub id_value: String,
    pub url: String,
}

impl NewResource {
    pub fn new(id_type: IdType, id_value: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id_type,
            id_value: id_value.into(),
            url: url.into(),
        }
    }

    /// Materialize into an empty stub with the given id.
    pub fn into_resource(self, id: ResourceId) -> ExternalResource {
        let now = Utc::now();
        ExternalResource {
            id,
            item: None,
            id_type: self.id_type,
            id_value: self.id_value,
            url: self.url,
            cover: None,
            other_lookup_ids: LookupIds::new(),
            metadata: Map::new(),
            scraped_time: None,
            created_time: now,
            edited_time: now,
            required_resources: vec![],
            related_resources: vec![],
            prematched_resources: vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_is_not_ready() {
        let mut r = NewResource::new(IdType::Imdb, "tt0111161", "https://www.imdb.com/title/tt0111161/")
            .into_resource(ResourceId(1));
        assert!(!r.ready());

        r.metadata.insert("title".into(), "The Shawshank Redemption".into());
        assert!(!r.ready(), "metadata without scraped_time is not ready");

        r.scraped_time = Some(Utc::now());
        assert!(r.ready());
    }

    #[test]
    fn test_preferred_model_ignores_empty() {
        let mut r = NewResource::new(IdType::DoubanMovie, "1", "https://movie.douban.com/subject/1/")
            .into_resource(ResourceId(1));
        assert_eq!(r.preferred_model(), None);
        r.metadata.insert("preferred_model".into(), "".into());
        assert_eq!(r.preferred_model(), None);
        r.metadata.insert("preferred_model".into(), "TVSeason".into());
        assert_eq!(r.preferred_model(), Some("TVSeason"));
    }

    #[test]
    fn test_lookup_ids_put_best_first() {
        let mut r = NewResource::new(IdType::Goodreads, "77566", "https://www.goodreads.com/book/show/77566")
            .into_resource(ResourceId(1));
        r.other_lookup_ids.insert(IdType::Asin, "B004G60EHS".into());
        r.other_lookup_ids.insert(IdType::GoogleBooks, "".into());
        r.other_lookup_ids.insert(IdType::Isbn, "9780553283686".into());

        let ids = r.lookup_ids();
        assert_eq!(
            ids,
            vec![
                (IdType::Isbn, "9780553283686".to_string()),
                (IdType::Asin, "B004G60EHS".to_string()),
                (IdType::Goodreads, "77566".to_string()),
            ]
        );
    }

    #[test]
    fn test_link_serialization_skips_empty_fields() {
        let link = ResourceLink::new("https://example.com/a").with_model(ItemModel::TvShow);
        let json = serde_json::to_string(&link).unwrap();
        assert_eq!(json, r#"{"url":"https://example.com/a","model":"tvshow"}"#);
    }
}
