//! Resilient pipeline execution
//!
//! Named components run in registration order against a growing context. A component
//! that errors, panics, times out or returns nothing falls back to its alternate path
//! when one is registered; otherwise it is marked failed and the run moves on. Every
//! transition is handed to the [`AutoSave`](crate::autosave::AutoSave) store.

mod component;
mod executor;
mod run;

pub use component::{
    ComponentFn, ComponentRegistration, ComponentSummary, Context, OrderIssue, PipelineSummary,
};
pub use executor::{ProgressCallback, ResilientPipelineExecutor, CATEGORY_PARTIAL};
pub use run::{
    ComponentReport, ComponentStatus, FailureReason, PipelineRun, PipelineStats, PipelineTiming,
};
