//! Recast: change an item's concrete model, keeping its identity.

use tracing::info;

use super::Catalog;
use crate::error::{CatalogError, Result};
use crate::traits::store::CatalogStore;
use crate::types::{
    audit::AuditAction,
    item::{Item, ItemId, ItemModel},
};

impl<S: CatalogStore> Catalog<S> {
    /// Recast to the model named `model` (case-insensitive).
    pub async fn recast(&self, item: ItemId, model: &str) -> Result<Item> {
        let model = ItemModel::from_name(model).ok_or_else(|| CatalogError::InvalidTargetModel {
            model: model.to_string(),
        })?;
        self.recast_to(item, model).await
    }

    /// Recast to `model`. No-op if the item already is one.
    ///
    /// Id, uid, metadata, merge pointers and resource links survive the swap.
    pub async fn recast_to(&self, item: ItemId, model: ItemModel) -> Result<Item> {
        let current = self.get_item(item).await?;
        if current.is_instance_of(model) {
            return Ok(current);
        }
        let recast = self.store.replace_item_model(item, model).await?;
        self.audit(
            item,
            AuditAction::Recast,
            Some(current.model.to_string()),
            Some(model.to_string()),
        )
        .await;
        info!(item = %item, from = %current.model, to = %model, "recast item");
        Ok(recast)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::CatalogError;
    use crate::testing::TestCatalog;
    use crate::traits::store::ResourceStore;
    use crate::types::{audit::AuditAction, item::ItemModel};

    #[tokio::test]
    async fn test_recast_preserves_identity() {
        let t = TestCatalog::new();
        let movie = t.item(ItemModel::Movie).await;
        let other = t.item(ItemModel::Movie).await;
        t.attach_resource(movie.id, "tt1").await;
        t.catalog.merge(other.id, movie.id).await.unwrap();

        let recast = t.catalog.recast(movie.id, "TVShow").await.unwrap();
        assert!(recast.is_instance_of(ItemModel::TvShow));
        assert_eq!(recast.id, movie.id);
        assert_eq!(recast.uid, movie.uid);
        assert_eq!(recast.uuid(), movie.uuid());
        assert_eq!(
            t.catalog.store().resources_for_item(movie.id).await.unwrap().len(),
            1
        );
        let merged = t.catalog.get_item(other.id).await.unwrap();
        assert_eq!(merged.merged_to_item, Some(movie.id));

        let entry = t.catalog.history(movie.id).await.unwrap().pop().unwrap();
        assert_eq!(entry.action, AuditAction::Recast);
        assert_eq!(entry.before.as_deref(), Some("movie"));
        assert_eq!(entry.after.as_deref(), Some("tvshow"));
    }

    #[tokio::test]
    async fn test_recast_same_model_is_noop() {
        let t = TestCatalog::new();
        let movie = t.item(ItemModel::Movie).await;
        let same = t.catalog.recast(movie.id, "movie").await.unwrap();
        assert_eq!(same, movie);
        assert!(t.catalog.history(movie.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recast_invalid_model() {
        let t = TestCatalog::new();
        let movie = t.item(ItemModel::Movie).await;
        let err = t.catalog.recast(movie.id, "Hovercraft").await.unwrap_err();
        assert!(matches!(err, CatalogError::InvalidTargetModel { .. }));
        assert!(err.is_validation());
    }
}
