//! External resource operations: stubs, content, unlinking.

use chrono::Utc;
use tracing::{debug, info};

use super::Catalog;
use crate::covers::cover_path;
use crate::error::{CatalogError, Result};
use crate::traits::store::CatalogStore;
use crate::types::{
    audit::AuditAction,
    id_type::{normalize_lookup_ids, IdType},
    item::ItemModel,
    resource::{ExternalResource, NewResource, ResourceContent, ResourceId},
};

impl<S: CatalogStore> Catalog<S> {
    /// Get a resource by id.
    pub async fn get_resource(&self, id: ResourceId) -> Result<ExternalResource> {
        self.store
            .get_resource(id)
            .await?
            .ok_or_else(|| CatalogError::ResourceNotFound(id.to_string()))
    }

    /// Find the resource for `url`, else for `(id_type, id_value)`, else
    /// insert an empty stub.
    ///
    /// A unique violation on insert means a concurrent caller won the race;
    /// the winner's row is fetched and returned.
    pub async fn get_or_create_stub(
        &self,
        id_type: IdType,
        id_value: &str,
        url: &str,
    ) -> Result<ExternalResource> {
        if let Some(existing) = self.find_stub(id_type, id_value, url).await? {
            return Ok(existing);
        }

        match self
            .store
            .insert_resource(NewResource::new(id_type, id_value, url))
            .await
        {
            Ok(created) => {
                debug!(resource = %url, id_type = %id_type, "created resource stub");
                Ok(created)
            }
            Err(CatalogError::UniqueViolation { constraint }) => {
                debug!(resource = %url, constraint = %constraint, "stub insert raced, refetching");
                self.find_stub(id_type, id_value, url)
                    .await?
                    .ok_or_else(|| CatalogError::ResourceNotFound(url.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn find_stub(
        &self,
        id_type: IdType,
        id_value: &str,
        url: &str,
    ) -> Result<Option<ExternalResource>> {
        if let Some(r) = self.store.get_resource_by_url(url).await? {
            return Ok(Some(r));
        }
        self.store.get_resource_by_lookup(id_type, id_value).await
    }

    /// Store freshly scraped content on `resource` and persist it.
    ///
    /// The cover is only written when the content carries one and the
    /// resource has none cached yet. Content naming an unknown
    /// `preferred_model` is rejected and nothing is written.
    pub async fn apply_content(
        &self,
        resource: &mut ExternalResource,
        content: &ResourceContent,
    ) -> Result<()> {
        if let Some(model) = content.preferred_model() {
            if ItemModel::from_name(model).is_none() {
                return Err(CatalogError::UnknownPreferredModel {
                    model: model.to_string(),
                });
            }
        }

        resource.other_lookup_ids = normalize_lookup_ids(&content.lookup_ids);
        resource.metadata = content.metadata.clone();
        resource.required_resources = content.required_resources.clone();
        resource.related_resources = content.related_resources.clone();
        resource.prematched_resources = content.prematched_resources.clone();

        if let Some(bytes) = content.cover_image.as_deref() {
            if !self.cover_cached(resource).await? {
                let ext = content.cover_image_extension.as_deref().unwrap_or("jpg");
                let path = cover_path(resource.id_type, ext);
                resource.cover = Some(self.covers.save(&path, bytes).await?);
            }
        }

        let now = Utc::now();
        resource.scraped_time = Some(now);
        resource.edited_time = now;
        self.store.update_resource(resource).await?;
        debug!(
            resource = %resource.url,
            lookup_ids = resource.other_lookup_ids.len(),
            "applied scraped content"
        );
        Ok(())
    }

    async fn cover_cached(&self, resource: &ExternalResource) -> Result<bool> {
        match resource.cover.as_deref() {
            Some(path) => self.covers.exists(path).await,
            None => Ok(false),
        }
    }

    /// Model an item for `resource` should have: the `preferred_model`
    /// override when present, else `default`.
    pub fn item_model_for(
        &self,
        resource: &ExternalResource,
        default: ItemModel,
    ) -> Result<ItemModel> {
        match resource.preferred_model() {
            None => Ok(default),
            Some(name) => {
                ItemModel::from_name(name).ok_or_else(|| CatalogError::UnknownPreferredModel {
                    model: name.to_string(),
                })
            }
        }
    }

    /// Detach a resource from its item. No-op if it is not linked.
    pub async fn unlink_resource(&self, id: ResourceId) -> Result<ExternalResource> {
        let mut resource = self.get_resource(id).await?;
        let Some(previous) = resource.item.take() else {
            return Ok(resource);
        };
        resource.edited_time = Utc::now();
        self.store.update_resource(&resource).await?;
        self.audit(previous, AuditAction::Unlink, Some(resource.url.clone()), None)
            .await;
        info!(resource = %resource.url, item = %previous, "unlinked resource");
        Ok(resource)
    }
}
