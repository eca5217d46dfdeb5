//! Domain types for the catalog engine.

pub mod audit;
pub mod config;
pub mod id_type;
pub mod item;
pub mod resource;
