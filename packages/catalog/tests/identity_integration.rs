//! Integration tests for item identity: merge chains, merge rules,
//! soft delete and recast.

use catalog::{
    testing::TestCatalog, AuditAction, CatalogError, ItemModel, ItemStore, NewItem,
    ResourceStore, MAX_MERGE_HOPS,
};

#[tokio::test]
async fn test_short_chains_resolve_to_terminal_item() {
    for len in 1..=5 {
        let t = TestCatalog::new();
        let ids = t.merge_chain(ItemModel::Movie, len).await;
        let head = t.catalog.get_item(ids[0]).await.unwrap();
        let last = t.catalog.resolve_final(&head).await.unwrap();
        assert_eq!(last.id, *ids.last().unwrap(), "chain of {len} items");
        assert!(last.merged_to_item.is_none());
    }
}

#[tokio::test]
async fn test_long_chains_and_cycles_error() {
    let t = TestCatalog::new();
    let ids = t.merge_chain(ItemModel::Movie, MAX_MERGE_HOPS + 2).await;
    let head = t.catalog.get_item(ids[0]).await.unwrap();
    assert!(matches!(
        t.catalog.resolve_final(&head).await,
        Err(CatalogError::CycleDetected { .. })
    ));

    let ring = t.merge_chain(ItemModel::Movie, 3).await;
    t.set_merged(ring[2], Some(ring[0])).await;
    for id in &ring {
        let item = t.catalog.get_item(*id).await.unwrap();
        assert!(t.catalog.resolve_final(&item).await.is_err());
    }
}

#[tokio::test]
async fn test_merge_invariants() {
    let t = TestCatalog::new();
    let a = t.item(ItemModel::Album).await;
    let b = t.item(ItemModel::Album).await;
    let c = t.item(ItemModel::Album).await;
    let r = t.attach_resource(a.id, "tt-a").await;

    assert!(t.catalog.merge(a.id, a.id).await.is_err());

    t.catalog.merge(b.id, c.id).await.unwrap();
    let err = t.catalog.merge(a.id, b.id).await.unwrap_err();
    assert!(matches!(err, CatalogError::TargetAlreadyMerged { .. }));
    assert_eq!(
        t.store().get_resource(r.id).await.unwrap().unwrap().item,
        Some(a.id),
        "failed merge leaves resources in place"
    );

    t.catalog.merge(a.id, c.id).await.unwrap();
    assert_eq!(
        t.store().get_resource(r.id).await.unwrap().unwrap().item,
        Some(c.id)
    );
}

#[tokio::test]
async fn test_soft_delete_invariant() {
    let t = TestCatalog::new();

    let plain = t.item(ItemModel::Podcast).await;
    assert!(t.catalog.can_soft_delete(&plain).await.unwrap());

    let linked = t.item(ItemModel::Podcast).await;
    t.attach_resource(linked.id, "pod-1").await;
    assert!(!t.catalog.can_soft_delete(&linked).await.unwrap());
    assert!(t.catalog.soft_delete(linked.id).await.is_err());

    let parent = t.item(ItemModel::Podcast).await;
    t.store()
        .create_item(NewItem::new(ItemModel::PodcastEpisode).with_parent(parent.id))
        .await
        .unwrap();
    assert!(!t.catalog.can_soft_delete(&parent).await.unwrap());

    let merged = t.item(ItemModel::Podcast).await;
    t.catalog.merge(merged.id, plain.id).await.unwrap();
    let merged = t.catalog.get_item(merged.id).await.unwrap();
    assert!(!t.catalog.can_soft_delete(&merged).await.unwrap());

    let fresh = t.item(ItemModel::Podcast).await;
    let deleted = t.catalog.soft_delete(fresh.id).await.unwrap();
    assert!(deleted.is_deleted);
    assert!(!t.catalog.can_soft_delete(&deleted).await.unwrap());
}

#[tokio::test]
async fn test_recast_keeps_public_identity() {
    let t = TestCatalog::new();
    let item = t.item(ItemModel::Movie).await;
    let dup = t.item(ItemModel::Movie).await;
    t.attach_resource(item.id, "tt-r").await;
    t.catalog.merge(dup.id, item.id).await.unwrap();
    let public_url = item.url();

    let recast = t.catalog.recast(item.id, "tvseason").await.unwrap();
    assert!(recast.is_instance_of(ItemModel::TvSeason));
    assert_eq!(recast.uuid(), item.uuid());
    assert_ne!(recast.url(), public_url, "url path follows the model");
    assert_eq!(t.store().resources_for_item(item.id).await.unwrap().len(), 1);
    assert_eq!(
        t.store().items_merged_into(item.id).await.unwrap()[0].id,
        dup.id
    );

    let actions: Vec<_> = t
        .catalog
        .history(item.id)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.action)
        .collect();
    assert_eq!(actions, vec![AuditAction::Recast]);
}

#[tokio::test]
async fn test_audit_entries_carry_actor() {
    let t = TestCatalog::new();
    let a = t.item(ItemModel::Game).await;
    let b = t.item(ItemModel::Game).await;
    t.catalog.merge(a.id, b.id).await.unwrap();

    let entry = t.catalog.history(a.id).await.unwrap().remove(0);
    assert_eq!(entry.action, AuditAction::Merge);
    assert_eq!(entry.actor.as_deref(), Some("test"));
    assert_eq!(entry.after, Some(b.id.to_string()));
}
