//! Result types shared by providers, the fallback manager and the coordinator
//!
//! The core never deduplicates; the same URL may appear from several providers.

mod types;

pub use types::*;
