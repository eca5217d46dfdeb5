//! Trait seams of the catalog engine.
//!
//! Applications implement these to plug in storage, provider adapters,
//! the crawl queue, cover storage and the metadata merge step.

pub mod cover;
pub mod merger;
pub mod provider;
pub mod queue;
pub mod store;
