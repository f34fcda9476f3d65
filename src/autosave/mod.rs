//! Persistence of intermediate stages
//!
//! Every search stage and pipeline transition is handed to an [`AutoSave`] store so a
//! crash leaves a trail of everything completed so far. Callers go through
//! [`save_stage_quietly`] and [`save_error_quietly`]: a failing store is logged and
//! never interrupts the work being recorded.

mod file;
mod memory;

pub use file::FileAutoSave;
pub use memory::{MemoryAutoSave, RecordKind, SavedRecord};

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// Category for search stages
pub const CATEGORY_WEB_RESEARCH: &str = "web_research";
/// Category for pipeline stages
pub const CATEGORY_ANALYSIS: &str = "full_analysis";

/// A store for stage snapshots and error records.
///
/// Stores keep no current session. Every save names the session it belongs to;
/// `None` saves outside any session.
pub trait AutoSave: Send + Sync {
    /// Generate an id for a new session
    fn start_session(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }

    fn save_stage(
        &self,
        session: Option<&str>,
        stage: &str,
        payload: &Value,
        category: &str,
    ) -> Result<()>;

    fn save_error(
        &self,
        session: Option<&str>,
        stage: &str,
        error: &str,
        context: &Value,
    ) -> Result<()>;
}

/// Store that drops everything, for callers that opt out of persistence
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAutoSave;

impl AutoSave for NoopAutoSave {
    fn save_stage(&self, _: Option<&str>, _: &str, _: &Value, _: &str) -> Result<()> {
        Ok(())
    }

    fn save_error(&self, _: Option<&str>, _: &str, _: &str, _: &Value) -> Result<()> {
        Ok(())
    }
}

/// Save a stage, logging instead of failing
pub fn save_stage_quietly<T>(
    store: &dyn AutoSave,
    session: Option<&str>,
    stage: &str,
    payload: &T,
    category: &str,
) where
    T: Serialize + ?Sized,
{
    let value = match serde_json::to_value(payload) {
        Ok(value) => value,
        Err(e) => {
            warn!("Could not serialize stage {}: {}", stage, e);
            return;
        }
    };

    if let Err(e) = store.save_stage(session, stage, &value, category) {
        warn!("Failed to save stage {}: {}", stage, e);
    }
}

/// Save an error record, logging instead of failing
pub fn save_error_quietly<T>(
    store: &dyn AutoSave,
    session: Option<&str>,
    stage: &str,
    error: &str,
    context: &T,
) where
    T: Serialize + ?Sized,
{
    let value = serde_json::to_value(context).unwrap_or(Value::Null);
    if let Err(e) = store.save_error(session, stage, error, &value) {
        warn!("Failed to save error for {}: {}", stage, e);
    }
}

/// Store whose every save fails
#[cfg(test)]
pub(crate) struct BrokenAutoSave;

#[cfg(test)]
impl AutoSave for BrokenAutoSave {
    fn save_stage(&self, _: Option<&str>, _: &str, _: &Value, _: &str) -> Result<()> {
        Err(anyhow::anyhow!("disk full"))
    }

    fn save_error(&self, _: Option<&str>, _: &str, _: &str, _: &Value) -> Result<()> {
        Err(anyhow::anyhow!("disk full"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_quiet_helpers_swallow_failures() {
        save_stage_quietly(&BrokenAutoSave, None, "stage", &json!({"a": 1}), CATEGORY_ANALYSIS);
        save_error_quietly(&BrokenAutoSave, Some("s1"), "stage", "boom", &json!({}));
    }

    #[test]
    fn test_default_session_ids_are_unique() {
        let store = NoopAutoSave;
        assert_ne!(store.start_session(), store.start_session());
    }
}
