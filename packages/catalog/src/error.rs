//! Typed errors for the catalog engine.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling. Every variant raised by an
//! interactive operation carries the ids and types needed to render an
//! actionable message.

use thiserror::Error;

use crate::types::{
    id_type::IdType,
    item::{ItemId, ItemModel},
};

/// Errors that can occur during catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Merge target is the item itself
    #[error("cannot merge item {item} into itself")]
    SelfMerge { item: ItemId },

    /// Merge target is not a terminal item
    #[error("cannot merge item {item} into {target}: target is already merged into {merged_to}")]
    TargetAlreadyMerged {
        item: ItemId,
        target: ItemId,
        merged_to: ItemId,
    },

    /// Merge source or target is soft-deleted
    #[error("cannot merge item {item} into {target}: item {deleted} is deleted")]
    MergeDeleted {
        item: ItemId,
        target: ItemId,
        deleted: ItemId,
    },

    /// Merge between incompatible concrete subtypes
    #[error("cannot merge {item_model} {item} into {target_model} {target}")]
    TypeMismatch {
        item: ItemId,
        item_model: ItemModel,
        target: ItemId,
        target_model: ItemModel,
    },

    /// Recast target is not a registered item subtype
    #[error("invalid model to recast to: {model}")]
    InvalidTargetModel { model: String },

    /// `preferred_model` in resource metadata names no registered subtype
    #[error("preferred model {model} does not exist")]
    UnknownPreferredModel { model: String },

    /// Merge chain did not terminate within the hop ceiling
    #[error("merge chain starting at item {start} did not terminate within {hops} hops")]
    CycleDetected { start: ItemId, hops: usize },

    /// Two adapters claimed the same identifier kind
    #[error("provider for {id_type} already registered")]
    DuplicateProvider { id_type: IdType },

    /// No adapter registered for an identifier kind
    #[error("provider for {id_type} not found")]
    UnknownProvider { id_type: IdType },

    /// Identifier kind key is not part of the enumeration
    #[error("unknown identifier kind: {value}")]
    UnknownIdType { value: String },

    /// Item not found in store
    #[error("item not found: {0}")]
    ItemNotFound(ItemId),

    /// External resource not found in store
    #[error("external resource not found: {0}")]
    ResourceNotFound(String),

    /// Soft delete refused by the `can_soft_delete` invariant
    #[error("item {item} cannot be deleted: it is merged, has merged items, children or external resources")]
    CannotSoftDelete { item: ItemId },

    /// Store rejected a write on a uniqueness constraint
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// Storage operation failed
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Provider adapter failed
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CatalogError {
    /// Input validation failures: rejected before any state change.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CatalogError::SelfMerge { .. }
                | CatalogError::TargetAlreadyMerged { .. }
                | CatalogError::MergeDeleted { .. }
                | CatalogError::TypeMismatch { .. }
                | CatalogError::InvalidTargetModel { .. }
                | CatalogError::CannotSoftDelete { .. }
        )
    }

    /// Configuration failures: fatal at startup or registration time.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CatalogError::DuplicateProvider { .. }
                | CatalogError::UnknownProvider { .. }
                | CatalogError::UnknownPreferredModel { .. }
        )
    }

    pub(crate) fn storage(msg: impl Into<String>) -> Self {
        CatalogError::Storage(msg.into().into())
    }
}

/// Errors raised by provider adapters.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// URL does not belong to the provider or is malformed
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Provider page could not be turned into content
    #[error("failed to scrape {url}: {reason}")]
    Scrape { url: String, reason: String },

    /// Request timed out
    #[error("timeout fetching: {url}")]
    Timeout { url: String },
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        match e.url() {
            Some(url) if e.is_timeout() => ProviderError::Timeout {
                url: url.to_string(),
            },
            _ => ProviderError::Http(Box::new(e)),
        }
    }
}

/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Result type alias for provider operations.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;
