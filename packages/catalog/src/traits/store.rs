//! Storage traits for items, external resources and the audit log.
//!
//! The storage layer is split into focused traits:
//! - `ItemStore`: canonical items
//! - `ResourceStore`: external resources and their unique indexes
//! - `AuditLog`: append-only history
//! - `CatalogStore`: composite adding the atomic multi-record writes

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    audit::AuditEntry,
    id_type::IdType,
    item::{Item, ItemId, ItemModel, NewItem},
    resource::{ExternalResource, NewResource, ResourceId},
};

/// Storage for canonical items.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Get an item by id.
    async fn get_item(&self, id: ItemId) -> Result<Option<Item>>;

    /// Create an item; the store assigns id, uid and timestamps.
    async fn create_item(&self, item: NewItem) -> Result<Item>;

    /// Persist all mutable fields of an existing item.
    ///
    /// The model is not changed here; see [`CatalogStore::replace_item_model`].
    async fn update_item(&self, item: &Item) -> Result<()>;

    /// Persist only the content of an item: metadata, cover and primary
    /// lookup id.
    ///
    /// `merged_to_item`, `parent_item` and `is_deleted` keep their stored
    /// values, so a snapshot read before a concurrent merge or delete cannot
    /// roll those back.
    async fn update_item_content(&self, item: &Item) -> Result<()>;

    /// Set `parent_item` alone.
    async fn set_item_parent(&self, id: ItemId, parent: Option<ItemId>) -> Result<()>;

    /// Find the lowest-id item of `model` whose primary lookup id is exactly
    /// `(id_type, value)`.
    async fn find_item_by_lookup_id(
        &self,
        model: ItemModel,
        id_type: IdType,
        value: &str,
    ) -> Result<Option<Item>>;

    /// Items whose `merged_to_item` points at `id`.
    async fn items_merged_into(&self, id: ItemId) -> Result<Vec<Item>>;

    /// Items whose `parent_item` points at `id`.
    async fn child_items(&self, id: ItemId) -> Result<Vec<Item>>;

    /// All items in id order.
    async fn list_items(&self) -> Result<Vec<Item>>;
}

/// Storage for external resources.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn get_resource(&self, id: ResourceId) -> Result<Option<ExternalResource>>;

    async fn get_resource_by_url(&self, url: &str) -> Result<Option<ExternalResource>>;

    async fn get_resource_by_lookup(
        &self,
        id_type: IdType,
        id_value: &str,
    ) -> Result<Option<ExternalResource>>;

    /// Insert a stub.
    ///
    /// Returns `CatalogError::UniqueViolation` when the url or
    /// `(id_type, id_value)` is already taken.
    async fn insert_resource(&self, resource: NewResource) -> Result<ExternalResource>;

    /// Persist all mutable fields of an existing resource.
    async fn update_resource(&self, resource: &ExternalResource) -> Result<()>;

    /// Resources linked to `item`, in id order.
    async fn resources_for_item(&self, item: ItemId) -> Result<Vec<ExternalResource>>;
}

/// Append-only audit log sink.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(&self, entry: AuditEntry) -> Result<()>;

    /// Entries for `item`, oldest first.
    async fn entries_for_item(&self, item: ItemId) -> Result<Vec<AuditEntry>>;
}

/// Composite store used by the engine.
///
/// Adds the writes that touch more than one record and must be applied
/// atomically.
#[async_trait]
pub trait CatalogStore: ItemStore + ResourceStore + AuditLog {
    /// Set `item.merged_to_item = target` and relink every resource of
    /// `item` to `target`. Returns the number of relinked resources.
    async fn commit_merge(&self, item: ItemId, target: ItemId) -> Result<usize>;

    /// Persist `item` and unlink every resource still pointing at it.
    /// Returns the number of unlinked resources.
    async fn commit_clear(&self, item: &Item) -> Result<usize>;

    /// Swap the concrete model of `item`, keeping id, uid, metadata, merge
    /// pointers and resource links.
    async fn replace_item_model(&self, item: ItemId, model: ItemModel) -> Result<Item>;
}
