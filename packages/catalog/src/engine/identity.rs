//! Identity operations: merge-chain resolution and soft delete.

use tracing::{info, warn};

use super::Catalog;
use crate::error::{CatalogError, Result};
use crate::traits::store::CatalogStore;
use crate::types::{
    audit::AuditAction,
    config::MAX_MERGE_HOPS,
    item::{Item, ItemId},
};

impl<S: CatalogStore> Catalog<S> {
    /// Get an item by id.
    pub async fn get_item(&self, id: ItemId) -> Result<Item> {
        self.store
            .get_item(id)
            .await?
            .ok_or(CatalogError::ItemNotFound(id))
    }

    /// Follow `merged_to_item` to the terminal item.
    ///
    /// At most [`MAX_MERGE_HOPS`] pointers are followed. A chain that has not
    /// ended by then is a cycle or corrupt data and yields
    /// `CycleDetected`; the caller treats the item as unresolved.
    pub async fn resolve_final(&self, item: &Item) -> Result<Item> {
        let mut current = item.clone();
        for _ in 0..MAX_MERGE_HOPS {
            match current.merged_to_item {
                None => return Ok(current),
                Some(next) => current = self.get_item(next).await?,
            }
        }
        if current.merged_to_item.is_none() {
            return Ok(current);
        }
        warn!(
            item = %item.id,
            hops = MAX_MERGE_HOPS,
            "merge chain did not terminate"
        );
        Err(CatalogError::CycleDetected {
            start: item.id,
            hops: MAX_MERGE_HOPS,
        })
    }

    /// Whether `item` may be soft-deleted.
    ///
    /// False if it is already deleted, is merged, has items merged into it,
    /// has child items, or has external resources attached.
    pub async fn can_soft_delete(&self, item: &Item) -> Result<bool> {
        if item.is_deleted || item.merged_to_item.is_some() {
            return Ok(false);
        }
        if !self.store.items_merged_into(item.id).await?.is_empty() {
            return Ok(false);
        }
        if !self.store.child_items(item.id).await?.is_empty() {
            return Ok(false);
        }
        Ok(self.store.resources_for_item(item.id).await?.is_empty())
    }

    /// Detach parent, clear the primary lookup id and unlink every external
    /// resource, in one atomic write.
    pub async fn clear_identity(&self, item: &Item) -> Result<Item> {
        let mut cleared = item.clone();
        cleared.parent_item = None;
        cleared.clear_primary_lookup_id();
        let unlinked = self.store.commit_clear(&cleared).await?;
        info!(item = %item.id, unlinked, "cleared item identity");
        Ok(cleared)
    }

    /// Soft-delete an item. Refused unless [`can_soft_delete`](Self::can_soft_delete).
    pub async fn soft_delete(&self, id: ItemId) -> Result<Item> {
        let item = self.get_item(id).await?;
        if !self.can_soft_delete(&item).await? {
            return Err(CatalogError::CannotSoftDelete { item: id });
        }

        let mut deleted = item.clone();
        deleted.parent_item = None;
        deleted.clear_primary_lookup_id();
        deleted.is_deleted = true;
        self.store.commit_clear(&deleted).await?;

        let before = item
            .primary_lookup_id()
            .map(|(t, v)| format!("{}:{}", t, v));
        self.audit(id, AuditAction::Delete, before, None).await;
        info!(item = %id, "soft-deleted item");
        Ok(deleted)
    }

    /// Clear the soft-delete flag. No-op if the item is not deleted.
    pub async fn undelete(&self, id: ItemId) -> Result<Item> {
        let mut item = self.get_item(id).await?;
        if !item.is_deleted {
            return Ok(item);
        }
        item.is_deleted = false;
        self.store.update_item(&item).await?;
        self.audit(id, AuditAction::Undelete, None, None).await;
        info!(item = %id, "undeleted item");
        Ok(item)
    }
}
