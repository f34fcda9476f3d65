//! JSON file store with a background writer
//!
//! Layout: `<root>/[<session>/]<category>/<stage>_<timestamp>.json`, error records under
//! `[<session>/]errors/`. Saves are queued to a writer thread; dropping the store drains the queue.

use super::AutoSave;
use anyhow::Result;
use chrono::Utc;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::sync::Mutex;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

struct WriteJob {
    path: PathBuf,
    body: Value,
}

pub struct FileAutoSave {
    root: PathBuf,
    sender: Mutex<Option<Sender<WriteJob>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl FileAutoSave {
    /// Create a store rooted at `root` and start its writer thread
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;

        let (sender, receiver) = mpsc::channel::<WriteJob>();
        let writer = std::thread::Builder::new()
            .name("autosave-writer".to_string())
            .spawn(move || {
                for job in receiver {
                    if let Err(e) = write_job(&job) {
                        warn!("Failed to write {}: {}", job.path.display(), e);
                    }
                }
            })?;

        info!("Auto-save enabled under {}", root.display());
        Ok(Self {
            root,
            sender: Mutex::new(Some(sender)),
            writer: Mutex::new(Some(writer)),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn base_dir(&self, session: Option<&str>) -> PathBuf {
        match session {
            Some(session) => self.root.join(sanitize(session)),
            None => self.root.clone(),
        }
    }

    fn enqueue(&self, dir: PathBuf, stage: &str, body: Value) -> Result<()> {
        let file_name = format!(
            "{}_{}.json",
            sanitize(stage),
            Utc::now().format("%Y%m%d_%H%M%S_%6f")
        );
        let job = WriteJob {
            path: dir.join(file_name),
            body,
        };

        let guard = self
            .sender
            .lock()
            .map_err(|_| anyhow::anyhow!("autosave sender lock poisoned"))?;
        match guard.as_ref() {
            Some(sender) => sender
                .send(job)
                .map_err(|_| anyhow::anyhow!("autosave writer stopped")),
            None => Err(anyhow::anyhow!("autosave store closed")),
        }
    }
}

impl AutoSave for FileAutoSave {
    fn start_session(&self) -> String {
        let session = format!(
            "session_{}_{}",
            Utc::now().format("%Y%m%d_%H%M%S"),
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        );
        info!("Started auto-save session {}", session);
        session
    }

    fn save_stage(
        &self,
        session: Option<&str>,
        stage: &str,
        payload: &Value,
        category: &str,
    ) -> Result<()> {
        let body = json!({
            "stage": stage,
            "category": category,
            "saved_at": Utc::now().to_rfc3339(),
            "data": payload,
        });
        debug!("Saving stage {} ({})", stage, category);
        self.enqueue(self.base_dir(session).join(sanitize(category)), stage, body)
    }

    fn save_error(
        &self,
        session: Option<&str>,
        stage: &str,
        error: &str,
        context: &Value,
    ) -> Result<()> {
        let body = json!({
            "stage": stage,
            "error": error,
            "saved_at": Utc::now().to_rfc3339(),
            "context": context,
        });
        self.enqueue(self.base_dir(session).join("errors"), stage, body)
    }
}

impl Drop for FileAutoSave {
    fn drop(&mut self) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
        if let Some(writer) = self.writer.lock().ok().and_then(|mut w| w.take()) {
            let _ = writer.join();
        }
    }
}

fn write_job(job: &WriteJob) -> Result<()> {
    if let Some(parent) = job.path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&job.path, serde_json::to_vec_pretty(&job.body)?)?;
    Ok(())
}

/// Keep stage names usable as file names
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files_in(dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        files.sort();
        files
    }

    #[test]
    fn test_writes_stage_and_error_files() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileAutoSave::new(dir.path()).unwrap();
            store
                .save_stage(None, "exa results", &json!({"count": 5}), "web_research")
                .unwrap();
            store
                .save_error(None, "component_x", "boom", &json!({"input": "abc"}))
                .unwrap();
        }

        let stages = files_in(&dir.path().join("web_research"));
        assert_eq!(stages.len(), 1);
        let name = stages[0].file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("exa_results_"));

        let body: Value =
            serde_json::from_slice(&std::fs::read(&stages[0]).unwrap()).unwrap();
        assert_eq!(body["data"]["count"], 5);
        assert_eq!(body["category"], "web_research");

        let errors = files_in(&dir.path().join("errors"));
        assert_eq!(errors.len(), 1);
        let body: Value = serde_json::from_slice(&std::fs::read(&errors[0]).unwrap()).unwrap();
        assert_eq!(body["error"], "boom");
    }

    #[test]
    fn test_session_directory() {
        let dir = tempfile::tempdir().unwrap();
        let session;
        {
            let store = FileAutoSave::new(dir.path()).unwrap();
            session = store.start_session();
            store
                .save_stage(Some(session.as_str()), "pipeline_started", &json!({}), "full_analysis")
                .unwrap();
            store
                .save_error(Some(session.as_str()), "component_x", "boom", &json!({}))
                .unwrap();
        }

        let stages = files_in(&dir.path().join(&session).join("full_analysis"));
        assert_eq!(stages.len(), 1);
        assert_eq!(files_in(&dir.path().join(&session).join("errors")).len(), 1);
    }

    #[test]
    fn test_sessions_do_not_share_directories() {
        let dir = tempfile::tempdir().unwrap();
        let first;
        let second;
        {
            let store = FileAutoSave::new(dir.path()).unwrap();
            first = store.start_session();
            second = store.start_session();
            store
                .save_stage(Some(first.as_str()), "pipeline_started", &json!({}), "full_analysis")
                .unwrap();
            store
                .save_stage(Some(second.as_str()), "pipeline_started", &json!({}), "full_analysis")
                .unwrap();
            store
                .save_stage(Some(first.as_str()), "pipeline_completed", &json!({}), "full_analysis")
                .unwrap();
        }

        assert_eq!(files_in(&dir.path().join(&first).join("full_analysis")).len(), 2);
        assert_eq!(files_in(&dir.path().join(&second).join("full_analysis")).len(), 1);
        assert!(!dir.path().join("full_analysis").exists());
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("a/b c"), "a_b_c");
        assert_eq!(sanitize("fetch_raw-1"), "fetch_raw-1");
    }
}
