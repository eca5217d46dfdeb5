//! Default metadata merge step.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use crate::error::Result;
use crate::traits::merger::MetadataMerger;
use crate::types::{id_type::IdType, item::Item, resource::ExternalResource};

/// Copies each model's declared metadata keys from ready resources.
///
/// Per key: an empty item field takes the resource value; array fields are
/// union-merged; with `ignore_existing_content` the resource value always
/// wins. The first cover found fills an empty item cover, and every
/// resource's lookup ids feed primary-id promotion.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMetadataMerger;

#[async_trait]
impl MetadataMerger for DefaultMetadataMerger {
    async fn merge(
        &self,
        item: &mut Item,
        resources: &[ExternalResource],
        ignore_existing_content: bool,
    ) -> Result<()> {
        let mut lookup_ids: Vec<(IdType, String)> = Vec::new();
        for resource in resources.iter().filter(|r| r.ready()) {
            for key in item.model.metadata_copy_keys() {
                let Some(incoming) = resource.metadata.get(*key).filter(|v| !is_empty(v)) else {
                    continue;
                };
                merge_field(item, key, incoming, ignore_existing_content);
            }
            if item.cover.is_none() {
                item.cover = resource.cover.clone();
            }
            lookup_ids.extend(resource.lookup_ids());
        }
        item.update_lookup_ids(&lookup_ids);
        item.edited_time = Utc::now();
        Ok(())
    }
}

fn merge_field(item: &mut Item, key: &str, incoming: &Value, overwrite: bool) {
    let entry = item.metadata.entry(key.to_string()).or_insert(Value::Null);
    if overwrite || is_empty(entry) {
        *entry = incoming.clone();
        return;
    }
    if let (Value::Array(existing), Value::Array(new)) = (entry, incoming) {
        for v in new {
            if !existing.contains(v) {
                existing.push(v.clone());
            }
        }
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        item::{ItemId, ItemModel, NewItem},
        resource::{NewResource, ResourceId},
    };
    use serde_json::json;

    fn ready_resource(id: i64, id_type: IdType, value: &str, metadata: Value) -> ExternalResource {
        let mut r = NewResource::new(id_type, value, format!("https://{}.test/item/{}", id_type, value))
            .into_resource(ResourceId(id));
        r.metadata = metadata.as_object().cloned().unwrap_or_default();
        r.scraped_time = Some(Utc::now());
        r
    }

    #[tokio::test]
    async fn test_fills_empty_fields_and_unions_arrays() {
        let mut item = NewItem::new(ItemModel::Movie)
            .with_title("Heat")
            .into_item(ItemId(1));
        item.metadata.insert("genre".into(), json!(["crime"]));

        let resources = vec![
            ready_resource(1, IdType::Imdb, "tt1", json!({
                "title": "Heat (1995)",
                "genre": ["crime", "thriller"],
                "year": 1995,
                "not_copied": true,
            })),
            ready_resource(2, IdType::DoubanMovie, "1", json!({"director": ["Michael Mann"]})),
        ];

        DefaultMetadataMerger.merge(&mut item, &resources, false).await.unwrap();
        assert_eq!(item.title(), "Heat");
        assert_eq!(item.metadata["genre"], json!(["crime", "thriller"]));
        assert_eq!(item.metadata["year"], json!(1995));
        assert_eq!(item.metadata["director"], json!(["Michael Mann"]));
        assert!(!item.metadata.contains_key("not_copied"));
    }

    #[tokio::test]
    async fn test_ignore_existing_content_overwrites() {
        let mut item = NewItem::new(ItemModel::Movie)
            .with_title("Old")
            .into_item(ItemId(1));
        let resources = vec![ready_resource(1, IdType::Imdb, "tt1", json!({"title": "New"}))];
        DefaultMetadataMerger.merge(&mut item, &resources, true).await.unwrap();
        assert_eq!(item.title(), "New");
    }

    #[tokio::test]
    async fn test_skips_unready_and_promotes_lookup_id() {
        let mut item = NewItem::new(ItemModel::Edition)
            .with_lookup_id(IdType::Goodreads, "77566")
            .into_item(ItemId(1));

        let mut unready = ready_resource(1, IdType::Goodreads, "77566", json!({"title": "X"}));
        unready.scraped_time = None;
        let mut ready = ready_resource(2, IdType::Goodreads, "77566", json!({"title": "Hyperion"}));
        ready.other_lookup_ids.insert(IdType::Isbn, "9780553283686".into());
        ready.cover = Some("item/goodreads/cover.jpg".into());

        DefaultMetadataMerger.merge(&mut item, &[unready], false).await.unwrap();
        assert_eq!(item.title(), "");

        DefaultMetadataMerger.merge(&mut item, &[ready], false).await.unwrap();
        assert_eq!(item.title(), "Hyperion");
        assert_eq!(item.primary_lookup_id(), Some((IdType::Isbn, "9780553283686")));
        assert_eq!(item.cover.as_deref(), Some("item/goodreads/cover.jpg"));
    }
}
