//! Search provider module
//!
//! Defines the SearchProvider trait, the registry tracking provider health, and the
//! concrete providers.

mod loader;
mod registry;
mod traits;

pub mod bing;
pub mod duckduckgo;
pub mod exa;
pub mod google;
pub mod serper;

pub use loader::ProviderLoader;
pub use registry::{ProviderConfig, ProviderRegistry, ProviderStatus};
pub use traits::{ProviderCategory, ProviderError, SearchOptions, SearchProvider};

#[cfg(test)]
pub(crate) use registry::testing;
