//! Resource to item matching.
//!
//! Signals, strongest first:
//! 1. a prematched resource already linked to an item
//! 2. an item of the target model whose primary lookup id equals one of the
//!    resource's lookup ids (best kind first)
//! 3. the same lookup with the resource's own raw id

use tracing::{debug, info, warn};

use super::Catalog;
use crate::error::{CatalogError, Result};
use crate::traits::store::CatalogStore;
use crate::types::{
    audit::AuditAction,
    id_type::get_best_lookup_id,
    item::{Item, ItemModel, NewItem},
    resource::ExternalResource,
};

impl<S: CatalogStore> Catalog<S> {
    /// Model of the item `resource` maps to.
    ///
    /// Fails when the resource's provider is not registered or its
    /// `preferred_model` names no known model.
    pub fn model_for_resource(&self, resource: &ExternalResource) -> Result<ItemModel> {
        let provider = self.registry.get(resource.id_type)?;
        self.item_model_for(resource, provider.default_model())
    }

    /// Find the live item `resource` denotes, without creating anything.
    ///
    /// A match found through a non-ideal id is promoted to the ideal pair it
    /// was found with.
    pub async fn match_existing_item_for_resource(
        &self,
        resource: &ExternalResource,
    ) -> Result<Option<Item>> {
        for link in &resource.prematched_resources {
            let Some(linked) = self.store.get_resource_by_url(&link.url).await? else {
                continue;
            };
            if let Some(item_id) = linked.item {
                debug!(resource = %resource.url, prematched = %link.url, "matched by prematched resource");
                return Ok(Some(self.get_item(item_id).await?));
            }
        }

        let model = self.model_for_resource(resource)?;
        for (id_type, id_value) in resource.lookup_ids() {
            let found = match self
                .store
                .find_item_by_lookup_id(model, id_type, &id_value)
                .await?
            {
                Some(item) => Some(item),
                None => {
                    self.store
                        .find_item_by_lookup_id(model, resource.id_type, &resource.id_value)
                        .await?
                }
            };
            let Some(found) = found else { continue };

            let mut item = match self.resolve_final(&found).await {
                Ok(item) => item,
                Err(CatalogError::CycleDetected { start, .. }) => {
                    warn!(item = %start, resource = %resource.url, "skipping unresolvable match");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let primary_is_ideal = item.primary_lookup_id_type.is_some_and(|t| t.is_ideal());
            if id_type.is_ideal() && !primary_is_ideal {
                info!(
                    item = %item.id,
                    id_type = %id_type,
                    id_value = %id_value,
                    "promoting primary lookup id"
                );
                item.set_primary_lookup_id(id_type, id_value.clone());
                self.store.update_item_content(&item).await?;
            }
            debug!(resource = %resource.url, item = %item.id, id_type = %id_type, "matched by lookup id");
            return Ok(Some(item));
        }
        Ok(None)
    }

    /// Match `resource` to an item, creating one when nothing matches, and
    /// persist the link.
    ///
    /// Repeated calls with unchanged inputs return the same item and write
    /// nothing once the link is in place.
    pub async fn match_or_create_item_for_resource(
        &self,
        resource: &mut ExternalResource,
    ) -> Result<Item> {
        let previous = resource.item;
        let item = match self.match_existing_item_for_resource(resource).await? {
            Some(item) => item,
            None => match previous {
                Some(id) => self.get_item(id).await?,
                None => self.create_item_for_resource(resource).await?,
            },
        };

        if previous != Some(item.id) {
            if let Some(old) = previous {
                self.audit(old, AuditAction::Unmatch, Some(resource.url.clone()), None)
                    .await;
            }
            self.audit(item.id, AuditAction::Match, None, Some(resource.url.clone()))
                .await;
            resource.item = Some(item.id);
            self.store.update_resource(resource).await?;
            info!(resource = %resource.url, item = %item.id, "linked resource to item");
        }
        Ok(item)
    }

    async fn create_item_for_resource(&self, resource: &ExternalResource) -> Result<Item> {
        let model = self.model_for_resource(resource)?;
        let mut new_item = NewItem::new(model).with_metadata(model.copy_metadata(&resource.metadata));
        if let Some((id_type, id_value)) = get_best_lookup_id(&resource.all_lookup_ids()) {
            new_item = new_item.with_lookup_id(id_type, id_value);
        }
        let item = self.store.create_item(new_item).await?;
        info!(item = %item.id, model = %model, resource = %resource.url, "created item");
        Ok(item)
    }
}
