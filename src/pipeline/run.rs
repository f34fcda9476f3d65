//! Pipeline run reports

use super::component::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Why a component attempt did not produce a value
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    #[error("dependencies not met: {}", .missing.join(", "))]
    DependencyNotMet { missing: Vec<String> },

    #[error("timed out after {seconds}s")]
    Timeout { seconds: f64 },

    #[error("{message}")]
    Error { message: String },

    #[error("empty result")]
    EmptyResult,

    #[error("fallback failed: {message}")]
    FallbackFailed { message: String },

    #[error("aborted after a required component failed")]
    Aborted,
}

/// Outcome of one component within a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentReport {
    pub name: String,
    pub status: ComponentStatus,
    pub required: bool,
    /// Final reason when the component failed
    pub reason: Option<FailureReason>,
    /// Why the primary executor did not deliver, even if the fallback did
    pub primary_failure: Option<FailureReason>,
    pub via_fallback: bool,
    /// Seconds spent on the component
    pub elapsed: f64,
}

impl ComponentReport {
    pub(crate) fn pending(name: &str, required: bool) -> Self {
        Self {
            name: name.to_string(),
            status: ComponentStatus::Pending,
            required,
            reason: None,
            primary_failure: None,
            via_fallback: false,
            elapsed: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub total: usize,
    pub succeeded_count: usize,
    pub failed_count: usize,
    /// Fraction of components that succeeded, 0.0 for an empty pipeline
    pub success_rate: f64,
    /// True iff no component failed
    pub complete: bool,
    /// True iff at least one component produced a value
    pub data_preserved: bool,
}

impl PipelineStats {
    pub(crate) fn compute(total: usize, succeeded_count: usize, failed_count: usize) -> Self {
        let success_rate = if total > 0 {
            succeeded_count as f64 / total as f64
        } else {
            0.0
        };
        Self {
            total,
            succeeded_count,
            failed_count,
            success_rate,
            complete: failed_count == 0,
            data_preserved: succeeded_count > 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineTiming {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Seconds
    pub duration: f64,
}

/// Everything one pipeline execution produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub session_id: String,
    /// Initial input plus each successful component's output under its name
    pub accumulated_context: Context,
    /// Succeeded components in execution order
    pub succeeded: Vec<String>,
    /// Failed components in execution order
    pub failed: Vec<String>,
    pub components: Vec<ComponentReport>,
    pub stats: PipelineStats,
    pub timing: PipelineTiming,
    pub aborted: bool,
}

impl PipelineRun {
    pub fn report(&self, name: &str) -> Option<&ComponentReport> {
        self.components.iter().find(|r| r.name == name)
    }

    pub fn is_complete(&self) -> bool {
        self.stats.complete
    }
}
