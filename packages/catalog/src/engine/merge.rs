//! Merge and unmerge.
//!
//! Readers resolve chains lazily through `resolve_final`; a merge only ever
//! points at a terminal item.

use tracing::info;

use super::Catalog;
use crate::error::{CatalogError, Result};
use crate::traits::store::CatalogStore;
use crate::types::{
    audit::AuditAction,
    item::{Item, ItemId},
};

impl<S: CatalogStore> Catalog<S> {
    /// Merge `item` into `target`.
    ///
    /// Every resource of `item` is relinked to `target` in the same write
    /// that sets the pointer. Validation failures leave both items untouched.
    pub async fn merge(&self, item: ItemId, target: ItemId) -> Result<Item> {
        if item == target {
            return Err(CatalogError::SelfMerge { item });
        }
        let source = self.get_item(item).await?;
        let target_item = self.get_item(target).await?;

        if let Some(deleted) = [&source, &target_item]
            .into_iter()
            .find(|i| i.is_deleted)
            .map(|i| i.id)
        {
            return Err(CatalogError::MergeDeleted {
                item,
                target,
                deleted,
            });
        }
        if let Some(merged_to) = target_item.merged_to_item {
            return Err(CatalogError::TargetAlreadyMerged {
                item,
                target,
                merged_to,
            });
        }
        if !source.model.can_merge_into(target_item.model) {
            return Err(CatalogError::TypeMismatch {
                item,
                item_model: source.model,
                target,
                target_model: target_item.model,
            });
        }

        let relinked = self.store.commit_merge(item, target).await?;
        self.audit(
            item,
            AuditAction::Merge,
            source.merged_to_item.map(|m| m.to_string()),
            Some(target.to_string()),
        )
        .await;
        info!(item = %item, target = %target, relinked, "merged item");
        self.get_item(item).await
    }

    /// Clear `merged_to_item`. No-op if the item is not merged.
    ///
    /// Resources relinked by the merge stay on the target.
    pub async fn unmerge(&self, item: ItemId) -> Result<Item> {
        let mut current = self.get_item(item).await?;
        let Some(previous) = current.merged_to_item.take() else {
            return Ok(current);
        };
        self.store.update_item(&current).await?;
        self.audit(item, AuditAction::Unmerge, Some(previous.to_string()), None)
            .await;
        info!(item = %item, previous = %previous, "unmerged item");
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::CatalogError;
    use crate::testing::TestCatalog;
    use crate::traits::store::{ItemStore, ResourceStore};
    use crate::types::{audit::AuditAction, item::ItemModel};

    #[tokio::test]
    async fn test_self_merge_fails() {
        let t = TestCatalog::new();
        let a = t.item(ItemModel::Movie).await;
        let err = t.catalog.merge(a.id, a.id).await.unwrap_err();
        assert!(matches!(err, CatalogError::SelfMerge { .. }));
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_merge_into_merged_target_fails() {
        let t = TestCatalog::new();
        let a = t.item(ItemModel::Movie).await;
        let b = t.item(ItemModel::Movie).await;
        let c = t.item(ItemModel::Movie).await;
        t.catalog.merge(b.id, c.id).await.unwrap();

        let err = t.catalog.merge(a.id, b.id).await.unwrap_err();
        match err {
            CatalogError::TargetAlreadyMerged { merged_to, .. } => assert_eq!(merged_to, c.id),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(t.catalog.get_item(a.id).await.unwrap().merged_to_item, None);
    }

    #[tokio::test]
    async fn test_type_mismatch() {
        let t = TestCatalog::new();
        let movie = t.item(ItemModel::Movie).await;
        let album = t.item(ItemModel::Album).await;
        let err = t.catalog.merge(movie.id, album.id).await.unwrap_err();
        assert!(matches!(
            err,
            CatalogError::TypeMismatch {
                item_model: ItemModel::Movie,
                target_model: ItemModel::Album,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_merge_into_deleted_target_fails() {
        let t = TestCatalog::new();
        let a = t.item(ItemModel::Movie).await;
        let b = t.item(ItemModel::Movie).await;
        let r = t.attach_resource(a.id, "tt1").await;
        t.catalog.soft_delete(b.id).await.unwrap();

        let err = t.catalog.merge(a.id, b.id).await.unwrap_err();
        assert!(err.is_validation());
        match err {
            CatalogError::MergeDeleted { deleted, .. } => assert_eq!(deleted, b.id),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(t.catalog.get_item(a.id).await.unwrap().merged_to_item, None);
        let stored = t.catalog.store().get_resource(r.id).await.unwrap().unwrap();
        assert_eq!(stored.item, Some(a.id));
    }

    #[tokio::test]
    async fn test_merge_deleted_item_fails() {
        let t = TestCatalog::new();
        let a = t.item(ItemModel::Movie).await;
        let b = t.item(ItemModel::Movie).await;
        t.catalog.soft_delete(a.id).await.unwrap();

        let err = t.catalog.merge(a.id, b.id).await.unwrap_err();
        assert!(matches!(err, CatalogError::MergeDeleted { deleted, .. } if deleted == a.id));
        let a = t.catalog.get_item(a.id).await.unwrap();
        assert!(a.is_deleted);
        assert_eq!(a.merged_to_item, None);
        assert!(t.catalog.store().items_merged_into(b.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_season_may_merge_into_show() {
        let t = TestCatalog::new();
        let season = t.item(ItemModel::TvSeason).await;
        let show = t.item(ItemModel::TvShow).await;
        let merged = t.catalog.merge(season.id, show.id).await.unwrap();
        assert_eq!(merged.merged_to_item, Some(show.id));
    }

    #[tokio::test]
    async fn test_merge_relinks_resources() {
        let t = TestCatalog::new();
        let a = t.item(ItemModel::Movie).await;
        let b = t.item(ItemModel::Movie).await;
        let r1 = t.attach_resource(a.id, "tt1").await;
        let r2 = t.attach_resource(a.id, "tt2").await;

        t.catalog.merge(a.id, b.id).await.unwrap();

        for r in [r1, r2] {
            let stored = t.catalog.store().get_resource(r.id).await.unwrap().unwrap();
            assert_eq!(stored.item, Some(b.id));
        }
        assert!(t.catalog.store().resources_for_item(a.id).await.unwrap().is_empty());
        let history = t.catalog.history(a.id).await.unwrap();
        assert_eq!(history.last().unwrap().action, AuditAction::Merge);
    }

    #[tokio::test]
    async fn test_unmerge() {
        let t = TestCatalog::new();
        let a = t.item(ItemModel::Game).await;
        let b = t.item(ItemModel::Game).await;
        t.catalog.merge(a.id, b.id).await.unwrap();

        let unmerged = t.catalog.unmerge(a.id).await.unwrap();
        assert_eq!(unmerged.merged_to_item, None);
        // second call is a no-op
        t.catalog.unmerge(a.id).await.unwrap();
        let actions: Vec<_> = t
            .catalog
            .history(a.id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(actions, vec![AuditAction::Merge, AuditAction::Unmerge]);
    }
}
