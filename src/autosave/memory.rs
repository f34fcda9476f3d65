//! In-memory store, used for dry runs and tests

use super::AutoSave;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Stage,
    Error,
}

/// One saved stage or error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedRecord {
    pub kind: RecordKind,
    pub session: Option<String>,
    pub stage: String,
    pub category: Option<String>,
    pub payload: Value,
    pub error: Option<String>,
}

/// Keeps every record in memory, in save order
#[derive(Debug, Clone, Default)]
pub struct MemoryAutoSave {
    records: Arc<RwLock<Vec<SavedRecord>>>,
}

impl MemoryAutoSave {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records in save order
    pub fn records(&self) -> Vec<SavedRecord> {
        self.records.read().map(|r| r.clone()).unwrap_or_default()
    }

    /// Names of saved stages (not errors), in save order
    pub fn stages(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|r| r.kind == RecordKind::Stage)
            .map(|r| r.stage)
            .collect()
    }

    /// Names of saved error records, in save order
    pub fn error_stages(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|r| r.kind == RecordKind::Error)
            .map(|r| r.stage)
            .collect()
    }

    /// Records saved under `session`, in save order
    pub fn session_records(&self, session: &str) -> Vec<SavedRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.session.as_deref() == Some(session))
            .collect()
    }

    /// Payload of the latest stage saved under `stage`
    pub fn stage_payload(&self, stage: &str) -> Option<Value> {
        self.records()
            .into_iter()
            .rev()
            .find(|r| r.kind == RecordKind::Stage && r.stage == stage)
            .map(|r| r.payload)
    }

    fn push(&self, record: SavedRecord) -> Result<()> {
        self.records
            .write()
            .map_err(|_| anyhow::anyhow!("autosave record lock poisoned"))?
            .push(record);
        Ok(())
    }
}

impl AutoSave for MemoryAutoSave {
    fn save_stage(
        &self,
        session: Option<&str>,
        stage: &str,
        payload: &Value,
        category: &str,
    ) -> Result<()> {
        self.push(SavedRecord {
            kind: RecordKind::Stage,
            session: session.map(str::to_string),
            stage: stage.to_string(),
            category: Some(category.to_string()),
            payload: payload.clone(),
            error: None,
        })
    }

    fn save_error(
        &self,
        session: Option<&str>,
        stage: &str,
        error: &str,
        context: &Value,
    ) -> Result<()> {
        self.push(SavedRecord {
            kind: RecordKind::Error,
            session: session.map(str::to_string),
            stage: stage.to_string(),
            category: None,
            payload: context.clone(),
            error: Some(error.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_records_in_order() {
        let store = MemoryAutoSave::new();
        store.save_stage(Some("s1"), "a", &json!(1), "cat").unwrap();
        store.save_error(Some("s2"), "b", "boom", &json!({})).unwrap();
        store.save_stage(None, "a", &json!(2), "cat").unwrap();

        assert_eq!(store.stages(), vec!["a", "a"]);
        assert_eq!(store.error_stages(), vec!["b"]);
        assert_eq!(store.stage_payload("a"), Some(json!(2)));
        assert_eq!(store.records()[1].error.as_deref(), Some("boom"));
        assert_eq!(store.session_records("s1").len(), 1);
        assert_eq!(store.session_records("s2")[0].stage, "b");
    }

    #[test]
    fn test_clones_share_records() {
        let store = MemoryAutoSave::new();
        let handle = store.clone();
        handle.save_stage(None, "x", &json!(null), "cat").unwrap();
        assert_eq!(store.stages(), vec!["x"]);
    }
}
