//! In-memory storage implementation for testing and development.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{CatalogError, Result};
use crate::traits::store::{AuditLog, CatalogStore, ItemStore, ResourceStore};
use crate::types::{
    audit::AuditEntry,
    id_type::IdType,
    item::{Item, ItemId, ItemModel, NewItem},
    resource::{ExternalResource, NewResource, ResourceId},
};

#[derive(Default)]
struct Tables {
    items: BTreeMap<ItemId, Item>,
    resources: BTreeMap<ResourceId, ExternalResource>,
    by_url: HashMap<String, ResourceId>,
    by_lookup: HashMap<(IdType, String), ResourceId>,
    audit: Vec<AuditEntry>,
    next_item: i64,
    next_resource: i64,
}

/// In-memory storage for items, resources and the audit log.
///
/// All tables sit behind one lock, so the multi-record writes are atomic.
/// Not suitable for production as data is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| CatalogError::storage("memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| CatalogError::storage("memory store lock poisoned"))
    }

    /// Get the number of stored items.
    pub fn item_count(&self) -> usize {
        self.read().map(|t| t.items.len()).unwrap_or_default()
    }

    /// Get the number of stored resources.
    pub fn resource_count(&self) -> usize {
        self.read().map(|t| t.resources.len()).unwrap_or_default()
    }

    /// Get the number of audit entries.
    pub fn audit_count(&self) -> usize {
        self.read().map(|t| t.audit.len()).unwrap_or_default()
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn get_item(&self, id: ItemId) -> Result<Option<Item>> {
        Ok(self.read()?.items.get(&id).cloned())
    }

    async fn create_item(&self, item: NewItem) -> Result<Item> {
        let mut t = self.write()?;
        t.next_item += 1;
        let item = item.into_item(ItemId(t.next_item));
        t.items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn update_item(&self, item: &Item) -> Result<()> {
        let mut t = self.write()?;
        let stored = t
            .items
            .get_mut(&item.id)
            .ok_or(CatalogError::ItemNotFound(item.id))?;
        let model = stored.model;
        *stored = item.clone();
        stored.model = model;
        stored.edited_time = Utc::now();
        Ok(())
    }

    async fn update_item_content(&self, item: &Item) -> Result<()> {
        let mut t = self.write()?;
        let stored = t
            .items
            .get_mut(&item.id)
            .ok_or(CatalogError::ItemNotFound(item.id))?;
        stored.metadata = item.metadata.clone();
        stored.cover = item.cover.clone();
        stored.primary_lookup_id_type = item.primary_lookup_id_type;
        stored.primary_lookup_id_value = item.primary_lookup_id_value.clone();
        stored.edited_time = Utc::now();
        Ok(())
    }

    async fn set_item_parent(&self, id: ItemId, parent: Option<ItemId>) -> Result<()> {
        let mut t = self.write()?;
        let stored = t.items.get_mut(&id).ok_or(CatalogError::ItemNotFound(id))?;
        stored.parent_item = parent;
        stored.edited_time = Utc::now();
        Ok(())
    }

    async fn find_item_by_lookup_id(
        &self,
        model: ItemModel,
        id_type: IdType,
        value: &str,
    ) -> Result<Option<Item>> {
        Ok(self
            .read()?
            .items
            .values()
            .find(|i| i.model == model && i.primary_lookup_id() == Some((id_type, value)))
            .cloned())
    }

    async fn items_merged_into(&self, id: ItemId) -> Result<Vec<Item>> {
        Ok(self
            .read()?
            .items
            .values()
            .filter(|i| i.merged_to_item == Some(id))
            .cloned()
            .collect())
    }

    async fn child_items(&self, id: ItemId) -> Result<Vec<Item>> {
        Ok(self
            .read()?
            .items
            .values()
            .filter(|i| i.parent_item == Some(id))
            .cloned()
            .collect())
    }

    async fn list_items(&self) -> Result<Vec<Item>> {
        Ok(self.read()?.items.values().cloned().collect())
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn get_resource(&self, id: ResourceId) -> Result<Option<ExternalResource>> {
        Ok(self.read()?.resources.get(&id).cloned())
    }

    async fn get_resource_by_url(&self, url: &str) -> Result<Option<ExternalResource>> {
        let t = self.read()?;
        Ok(t.by_url.get(url).and_then(|id| t.resources.get(id)).cloned())
    }

    async fn get_resource_by_lookup(
        &self,
        id_type: IdType,
        id_value: &str,
    ) -> Result<Option<ExternalResource>> {
        let t = self.read()?;
        Ok(t.by_lookup
            .get(&(id_type, id_value.to_string()))
            .and_then(|id| t.resources.get(id))
            .cloned())
    }

    async fn insert_resource(&self, resource: NewResource) -> Result<ExternalResource> {
        let mut t = self.write()?;
        if t.by_url.contains_key(&resource.url) {
            return Err(CatalogError::UniqueViolation {
                constraint: "external_resource.url".into(),
            });
        }
        let key = (resource.id_type, resource.id_value.clone());
        if t.by_lookup.contains_key(&key) {
            return Err(CatalogError::UniqueViolation {
                constraint: "external_resource.id_type_id_value".into(),
            });
        }
        t.next_resource += 1;
        let resource = resource.into_resource(ResourceId(t.next_resource));
        t.by_url.insert(resource.url.clone(), resource.id);
        t.by_lookup.insert(key, resource.id);
        t.resources.insert(resource.id, resource.clone());
        Ok(resource)
    }

    async fn update_resource(&self, resource: &ExternalResource) -> Result<()> {
        let mut t = self.write()?;
        let stored = t
            .resources
            .get_mut(&resource.id)
            .ok_or_else(|| CatalogError::ResourceNotFound(resource.id.to_string()))?;
        // Identity columns are fixed at creation
        let (id_type, id_value, url) = (stored.id_type, stored.id_value.clone(), stored.url.clone());
        *stored = resource.clone();
        stored.id_type = id_type;
        stored.id_value = id_value;
        stored.url = url;
        stored.edited_time = Utc::now();
        Ok(())
    }

    async fn resources_for_item(&self, item: ItemId) -> Result<Vec<ExternalResource>> {
        Ok(self
            .read()?
            .resources
            .values()
            .filter(|r| r.item == Some(item))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AuditLog for MemoryStore {
    async fn append(&self, entry: AuditEntry) -> Result<()> {
        self.write()?.audit.push(entry);
        Ok(())
    }

    async fn entries_for_item(&self, item: ItemId) -> Result<Vec<AuditEntry>> {
        Ok(self
            .read()?
            .audit
            .iter()
            .filter(|e| e.item == item)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn commit_merge(&self, item: ItemId, target: ItemId) -> Result<usize> {
        let mut t = self.write()?;
        let target_item = t.items.get(&target).ok_or(CatalogError::ItemNotFound(target))?;
        if let Some(merged_to) = target_item.merged_to_item {
            return Err(CatalogError::TargetAlreadyMerged {
                item,
                target,
                merged_to,
            });
        }
        let now = Utc::now();
        let stored = t
            .items
            .get_mut(&item)
            .ok_or(CatalogError::ItemNotFound(item))?;
        stored.merged_to_item = Some(target);
        stored.edited_time = now;

        let mut relinked = 0;
        for r in t.resources.values_mut().filter(|r| r.item == Some(item)) {
            r.item = Some(target);
            r.edited_time = now;
            relinked += 1;
        }
        Ok(relinked)
    }

    async fn commit_clear(&self, item: &Item) -> Result<usize> {
        let mut t = self.write()?;
        let now = Utc::now();
        let stored = t
            .items
            .get_mut(&item.id)
            .ok_or(CatalogError::ItemNotFound(item.id))?;
        let model = stored.model;
        *stored = item.clone();
        stored.model = model;
        stored.edited_time = now;

        let mut unlinked = 0;
        for r in t.resources.values_mut().filter(|r| r.item == Some(item.id)) {
            r.item = None;
            r.edited_time = now;
            unlinked += 1;
        }
        Ok(unlinked)
    }

    async fn replace_item_model(&self, item: ItemId, model: ItemModel) -> Result<Item> {
        let mut t = self.write()?;
        let old = t.items.remove(&item).ok_or(CatalogError::ItemNotFound(item))?;
        let new = Item {
            model,
            edited_time: Utc::now(),
            ..old
        };
        t.items.insert(item, new.clone());
        Ok(new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::audit::AuditAction;

    fn stub(id: &str) -> NewResource {
        NewResource::new(
            IdType::Imdb,
            id,
            format!("https://www.imdb.com/title/{}/", id),
        )
    }

    #[tokio::test]
    async fn test_item_crud() {
        let store = MemoryStore::new();
        let mut item = store
            .create_item(NewItem::new(ItemModel::Movie).with_lookup_id(IdType::Imdb, "tt1"))
            .await
            .unwrap();
        assert_eq!(item.id, ItemId(1));
        assert_eq!(store.item_count(), 1);

        item.metadata.insert("title".into(), "Heat".into());
        store.update_item(&item).await.unwrap();

        let found = store
            .find_item_by_lookup_id(ItemModel::Movie, IdType::Imdb, "tt1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.title(), "Heat");

        let other_model = store
            .find_item_by_lookup_id(ItemModel::TvShow, IdType::Imdb, "tt1")
            .await
            .unwrap();
        assert!(other_model.is_none());
    }

    #[tokio::test]
    async fn test_insert_resource_unique_constraints() {
        let store = MemoryStore::new();
        store.insert_resource(stub("tt1")).await.unwrap();

        let err = store.insert_resource(stub("tt1")).await.unwrap_err();
        assert!(matches!(err, CatalogError::UniqueViolation { .. }));

        let same_id_other_url = NewResource::new(IdType::Imdb, "tt1", "https://m.imdb.com/title/tt1/");
        let err = store.insert_resource(same_id_other_url).await.unwrap_err();
        assert!(matches!(err, CatalogError::UniqueViolation { .. }));
        assert_eq!(store.resource_count(), 1);
    }

    #[tokio::test]
    async fn test_update_resource_keeps_identity_columns() {
        let store = MemoryStore::new();
        let mut r = store.insert_resource(stub("tt1")).await.unwrap();
        r.url = "https://elsewhere.example/".into();
        r.metadata.insert("title".into(), "Heat".into());
        store.update_resource(&r).await.unwrap();

        let stored = store.get_resource(r.id).await.unwrap().unwrap();
        assert_eq!(stored.url, "https://www.imdb.com/title/tt1/");
        assert_eq!(stored.metadata["title"], "Heat");
    }

    #[tokio::test]
    async fn test_commit_merge_relinks_resources() {
        let store = MemoryStore::new();
        let a = store.create_item(NewItem::new(ItemModel::Movie)).await.unwrap();
        let b = store.create_item(NewItem::new(ItemModel::Movie)).await.unwrap();
        for id in ["tt1", "tt2"] {
            let mut r = store.insert_resource(stub(id)).await.unwrap();
            r.item = Some(a.id);
            store.update_resource(&r).await.unwrap();
        }

        let relinked = store.commit_merge(a.id, b.id).await.unwrap();
        assert_eq!(relinked, 2);
        assert!(store.resources_for_item(a.id).await.unwrap().is_empty());
        assert_eq!(store.resources_for_item(b.id).await.unwrap().len(), 2);
        let a = store.get_item(a.id).await.unwrap().unwrap();
        assert_eq!(a.merged_to_item, Some(b.id));
    }

    #[tokio::test]
    async fn test_commit_merge_missing_target_changes_nothing() {
        let store = MemoryStore::new();
        let a = store.create_item(NewItem::new(ItemModel::Movie)).await.unwrap();
        let err = store.commit_merge(a.id, ItemId(99)).await.unwrap_err();
        assert!(matches!(err, CatalogError::ItemNotFound(ItemId(99))));
        let a = store.get_item(a.id).await.unwrap().unwrap();
        assert_eq!(a.merged_to_item, None);
    }

    #[tokio::test]
    async fn test_commit_merge_into_merged_target_changes_nothing() {
        let store = MemoryStore::new();
        let a = store.create_item(NewItem::new(ItemModel::Movie)).await.unwrap();
        let b = store.create_item(NewItem::new(ItemModel::Movie)).await.unwrap();
        let c = store.create_item(NewItem::new(ItemModel::Movie)).await.unwrap();
        let mut r = store
            .insert_resource(NewResource::new(IdType::Imdb, "tt1", "https://www.imdb.com/title/tt1/"))
            .await
            .unwrap();
        r.item = Some(a.id);
        store.update_resource(&r).await.unwrap();

        // b became non-terminal after the caller last looked at it
        store.commit_merge(b.id, c.id).await.unwrap();
        let err = store.commit_merge(a.id, b.id).await.unwrap_err();
        assert!(matches!(
            err,
            CatalogError::TargetAlreadyMerged { merged_to, .. } if merged_to == c.id
        ));
        assert_eq!(store.get_item(a.id).await.unwrap().unwrap().merged_to_item, None);
        let r = store.get_resource(r.id).await.unwrap().unwrap();
        assert_eq!(r.item, Some(a.id));
    }

    #[tokio::test]
    async fn test_content_write_keeps_merge_delete_and_parent() {
        let store = MemoryStore::new();
        let show = store.create_item(NewItem::new(ItemModel::TvShow)).await.unwrap();
        let a = store.create_item(NewItem::new(ItemModel::TvSeason)).await.unwrap();
        let b = store.create_item(NewItem::new(ItemModel::TvSeason)).await.unwrap();
        let mut stale = store.get_item(a.id).await.unwrap().unwrap();

        store.set_item_parent(a.id, Some(show.id)).await.unwrap();
        store.commit_merge(a.id, b.id).await.unwrap();
        let mut deleted = store.get_item(a.id).await.unwrap().unwrap();
        deleted.is_deleted = true;
        store.update_item(&deleted).await.unwrap();

        stale.metadata.insert("title".into(), "Season 1".into());
        stale.cover = Some("item/tmdb_tvseason/x.jpg".into());
        store.update_item_content(&stale).await.unwrap();

        let stored = store.get_item(a.id).await.unwrap().unwrap();
        assert_eq!(stored.title(), "Season 1");
        assert_eq!(stored.cover.as_deref(), Some("item/tmdb_tvseason/x.jpg"));
        assert_eq!(stored.merged_to_item, Some(b.id));
        assert_eq!(stored.parent_item, Some(show.id));
        assert!(stored.is_deleted);

        let err = store.set_item_parent(ItemId(99), None).await.unwrap_err();
        assert!(matches!(err, CatalogError::ItemNotFound(ItemId(99))));
    }

    #[tokio::test]
    async fn test_replace_item_model_keeps_identity() {
        let store = MemoryStore::new();
        let item = store.create_item(NewItem::new(ItemModel::Movie)).await.unwrap();
        let recast = store
            .replace_item_model(item.id, ItemModel::TvShow)
            .await
            .unwrap();
        assert_eq!(recast.id, item.id);
        assert_eq!(recast.uid, item.uid);
        assert_eq!(recast.model, ItemModel::TvShow);
    }

    #[tokio::test]
    async fn test_audit_entries_are_per_item() {
        let store = MemoryStore::new();
        store
            .append(AuditEntry::new(ItemId(1), AuditAction::Match))
            .await
            .unwrap();
        store
            .append(AuditEntry::new(ItemId(2), AuditAction::Merge))
            .await
            .unwrap();
        let entries = store.entries_for_item(ItemId(1)).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, AuditAction::Match);
    }
}
