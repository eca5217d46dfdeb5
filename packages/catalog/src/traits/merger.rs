//! Metadata merge step.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{item::Item, resource::ExternalResource};

/// Folds the metadata of an item's ready resources into the item.
///
/// Called after a resource becomes ready and after matching. Mutates `item`
/// in place; the caller persists it.
#[async_trait]
pub trait MetadataMerger: Send + Sync {
    async fn merge(
        &self,
        item: &mut Item,
        resources: &[ExternalResource],
        ignore_existing_content: bool,
    ) -> Result<()>;
}
