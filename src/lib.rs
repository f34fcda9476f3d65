//! SearchRelay: resilient multi-provider web search
//!
//! Queries run down a priority list of search providers until one answers, a
//! coordinator fans a query out to a semantic and a keyword channel at once, and a
//! pipeline executor runs analysis components with fallbacks, timeouts and
//! persistence of every intermediate result.

pub mod autosave;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod network;
pub mod pipeline;
pub mod providers;
pub mod query;
pub mod results;
pub mod search;

pub use config::Settings;
pub use coordinator::{AggregatedSearchResult, DualChannelSearchCoordinator};
pub use pipeline::{ComponentRegistration, PipelineRun, ResilientPipelineExecutor};
pub use providers::{ProviderRegistry, SearchProvider};
pub use results::{SearchResponse, SearchResult};
pub use search::FallbackSearchManager;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
