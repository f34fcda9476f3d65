//! Fallback search module
//!
//! Tries providers in priority order, caches the first non-empty answer and counts
//! provider failures in the shared registry. [`FallbackSearchManager::search_parallel`]
//! instead queries every available provider at once and keeps all of their results.

mod fallback;
mod parallel;

pub use fallback::FallbackSearchManager;
pub use parallel::{ParallelSearchMetadata, ParallelSearchResult};
