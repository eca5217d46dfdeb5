//! Provider registry and adapters.
//!
//! - `ProviderRegistry` - immutable map from identifier kind to adapter
//! - `Site` - an adapter bound to one provider identity
//! - `HttpShortLinkResolver` - resolves short links with one HEAD redirect hop
//! - `MockProvider` - canned-content adapter for tests

pub mod mock;
pub mod redirect;
pub mod registry;
pub mod site;

pub use mock::MockProvider;
pub use redirect::HttpShortLinkResolver;
pub use registry::{ProviderRegistry, ProviderRegistryBuilder};
pub use site::Site;
