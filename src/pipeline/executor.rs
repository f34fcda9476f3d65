//! Resilient pipeline execution

use super::component::{ComponentFn, ComponentRegistration, Context, OrderIssue, PipelineSummary};
use super::run::{
    ComponentReport, ComponentStatus, FailureReason, PipelineRun, PipelineStats, PipelineTiming,
};
use crate::autosave::{save_error_quietly, save_stage_quietly, AutoSave, CATEGORY_ANALYSIS};
use crate::config::PipelineSettings;
use crate::results::truncate_chars;
use chrono::Utc;
use serde_json::{json, Value};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{error, info, warn};

/// Category for partial-result snapshots
pub const CATEGORY_PARTIAL: &str = "partial_results";

const STAGE_STARTED: &str = "pipeline_started";
const STAGE_COMPLETED: &str = "pipeline_completed";

const PARTIAL_MIN_CHARS: usize = 10;
const PARTIAL_MAX_CHARS: usize = 500;

/// Progress hook: `(1-based component index, message)`
pub type ProgressCallback = dyn Fn(usize, &str) + Send + Sync;

/// What a single attempt produced
enum Attempt {
    Value(Value),
    Failed(String),
    TimedOut,
}

/// Runs registered components one at a time, isolating their failures.
///
/// Components run in registration order. Each gets a snapshot of the accumulated
/// context and its output is stored under its name for later components.
pub struct ResilientPipelineExecutor {
    components: Vec<ComponentRegistration>,
    autosave: Arc<dyn AutoSave>,
    settings: PipelineSettings,
}

impl ResilientPipelineExecutor {
    pub fn new(autosave: Arc<dyn AutoSave>, settings: PipelineSettings) -> Self {
        Self {
            components: Vec::new(),
            autosave,
            settings,
        }
    }

    /// Register a component; an existing one with the same name is replaced in place
    pub fn register(&mut self, component: ComponentRegistration) {
        info!(
            "Registered component {} (required: {}, fallback: {})",
            component.name,
            component.required,
            component.has_fallback()
        );
        match self
            .components
            .iter_mut()
            .find(|c| c.name == component.name)
        {
            Some(existing) => *existing = component,
            None => self.components.push(component),
        }
    }

    /// Builder form of [`Self::register`]
    pub fn with_component(mut self, component: ComponentRegistration) -> Self {
        self.register(component);
        self
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.default_timeout)
    }

    pub fn summary(&self) -> PipelineSummary {
        let default_timeout = self.default_timeout();
        PipelineSummary {
            components: self
                .components
                .iter()
                .map(|c| c.summary(default_timeout))
                .collect(),
            execution_order: self.components.iter().map(|c| c.name.clone()).collect(),
        }
    }

    /// Dependencies that registration order cannot satisfy.
    ///
    /// The run itself is not affected: such components fail as dependency-not-met.
    pub fn validate_order(&self) -> Vec<OrderIssue> {
        let positions: HashMap<&str, usize> = self
            .components
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.as_str(), i))
            .collect();

        let mut issues = Vec::new();
        for (index, component) in self.components.iter().enumerate() {
            for dependency in &component.dependencies {
                match positions.get(dependency.as_str()) {
                    None => issues.push(OrderIssue::Unknown {
                        component: component.name.clone(),
                        dependency: dependency.clone(),
                    }),
                    Some(&position) if position >= index => {
                        issues.push(OrderIssue::RegisteredLater {
                            component: component.name.clone(),
                            dependency: dependency.clone(),
                        })
                    }
                    Some(_) => {}
                }
            }
        }
        issues
    }

    pub async fn run(&self, initial_context: Context, session_id: Option<String>) -> PipelineRun {
        self.execute(initial_context, session_id, None).await
    }

    pub async fn run_with_progress(
        &self,
        initial_context: Context,
        session_id: Option<String>,
        progress: &ProgressCallback,
    ) -> PipelineRun {
        self.execute(initial_context, session_id, Some(progress))
            .await
    }

    async fn execute(
        &self,
        initial_context: Context,
        session_id: Option<String>,
        progress: Option<&ProgressCallback>,
    ) -> PipelineRun {
        let session_id = session_id.unwrap_or_else(|| self.autosave.start_session());
        let session = Some(session_id.as_str());
        let start = Utc::now();
        let clock = Instant::now();

        info!(
            "Starting pipeline with {} components (session {})",
            self.components.len(),
            session_id
        );
        for issue in self.validate_order() {
            warn!("Pipeline order: {}", issue);
        }

        save_stage_quietly(
            self.autosave.as_ref(),
            session,
            STAGE_STARTED,
            &json!({
                "components": self.components.iter().map(|c| &c.name).collect::<Vec<_>>(),
                "input": &initial_context,
                "session_id": &session_id,
            }),
            CATEGORY_ANALYSIS,
        );

        let mut context = initial_context;
        let mut succeeded: Vec<String> = Vec::new();
        let mut failed: Vec<String> = Vec::new();
        let mut reports: Vec<ComponentReport> = self
            .components
            .iter()
            .map(|c| ComponentReport::pending(&c.name, c.required))
            .collect();
        let mut aborted = false;

        for (index, component) in self.components.iter().enumerate() {
            if let Some(progress) = progress {
                progress(index + 1, &format!("Running {}", component.name));
            }
            let report = &mut reports[index];
            let name = component.name.clone();

            if aborted {
                report.status = ComponentStatus::Failed;
                report.reason = Some(FailureReason::Aborted);
                failed.push(name);
                continue;
            }

            let missing: Vec<String> = component
                .dependencies
                .iter()
                .filter(|d| !succeeded.contains(d))
                .cloned()
                .collect();
            if !missing.is_empty() {
                let reason = FailureReason::DependencyNotMet { missing };
                warn!("Skipping {}: {}", name, reason);
                save_error_quietly(
                    self.autosave.as_ref(),
                    session,
                    &format!("component_{}", name),
                    &reason.to_string(),
                    &reason,
                );
                report.status = ComponentStatus::Failed;
                report.reason = Some(reason);
                failed.push(name);
                aborted = self.should_abort(component);
                continue;
            }

            report.status = ComponentStatus::Running;
            let started = Instant::now();
            let (primary_failure, value) = self
                .execute_component(component, &context, session)
                .await;
            report.elapsed = started.elapsed().as_secs_f64();

            match value {
                Ok(value) => {
                    let via_fallback = primary_failure.is_some();
                    let stage = if via_fallback {
                        info!("Fallback for {} succeeded", name);
                        format!("fallback_{}", name)
                    } else {
                        info!("Component {} succeeded", name);
                        format!("component_{}", name)
                    };
                    save_stage_quietly(
                        self.autosave.as_ref(),
                        session,
                        &stage,
                        &value,
                        CATEGORY_ANALYSIS,
                    );

                    context.insert(name.clone(), value);
                    report.status = ComponentStatus::Succeeded;
                    report.via_fallback = via_fallback;
                    report.primary_failure = primary_failure;
                    succeeded.push(name);
                }
                Err(reason) => {
                    error!("Component {} failed: {}", name, reason);
                    save_error_quietly(
                        self.autosave.as_ref(),
                        session,
                        &format!("component_{}", name),
                        &reason.to_string(),
                        &json!({ "primary_failure": &primary_failure, "reason": &reason }),
                    );
                    report.status = ComponentStatus::Failed;
                    report.reason = Some(reason);
                    report.primary_failure = primary_failure;
                    failed.push(name);
                    aborted = self.should_abort(component);
                }
            }
        }

        let end = Utc::now();
        let stats = PipelineStats::compute(self.components.len(), succeeded.len(), failed.len());
        info!(
            "Pipeline finished: {}/{} succeeded ({:.1}%)",
            stats.succeeded_count,
            stats.total,
            stats.success_rate * 100.0
        );

        let run = PipelineRun {
            session_id,
            accumulated_context: context,
            succeeded,
            failed,
            components: reports,
            stats,
            timing: PipelineTiming {
                start,
                end,
                duration: clock.elapsed().as_secs_f64(),
            },
            aborted,
        };
        save_stage_quietly(
            self.autosave.as_ref(),
            Some(run.session_id.as_str()),
            STAGE_COMPLETED,
            &run,
            CATEGORY_ANALYSIS,
        );
        run
    }

    fn should_abort(&self, component: &ComponentRegistration) -> bool {
        if component.required && self.settings.abort_on_required_failure {
            error!(
                "Required component {} failed, aborting remaining components",
                component.name
            );
            return true;
        }
        false
    }

    /// Primary attempt, then fallback.
    ///
    /// Returns the primary failure (if any) next to the final outcome.
    async fn execute_component(
        &self,
        component: &ComponentRegistration,
        context: &Context,
        session: Option<&str>,
    ) -> (Option<FailureReason>, Result<Value, FailureReason>) {
        let deadline = component.timeout.unwrap_or_else(|| self.default_timeout());
        let name = &component.name;

        let primary_failure = match attempt(&component.executor, context, deadline).await {
            Attempt::Value(value) if !is_empty_value(&value) => return (None, Ok(value)),
            Attempt::Value(_) => {
                warn!("Component {} returned an empty result", name);
                FailureReason::EmptyResult
            }
            Attempt::Failed(message) => {
                error!("Component {} raised: {}", name, message);
                self.save_partial(session, name, "execute", context, &message, None);
                FailureReason::Error { message }
            }
            Attempt::TimedOut => {
                warn!("Component {} timed out after {:?}", name, deadline);
                self.save_partial(session, name, "execute", context, "timeout", Some(deadline));
                FailureReason::Timeout {
                    seconds: deadline.as_secs_f64(),
                }
            }
        };

        let Some(fallback) = &component.fallback else {
            return (Some(primary_failure.clone()), Err(primary_failure));
        };

        info!("Trying fallback for {}", name);
        let outcome = match attempt(fallback, context, deadline).await {
            Attempt::Value(value) if !is_empty_value(&value) => Ok(value),
            Attempt::Value(_) => Err(FailureReason::FallbackFailed {
                message: "fallback returned an empty result".to_string(),
            }),
            Attempt::Failed(message) => {
                self.save_partial(session, name, "fallback", context, &message, None);
                Err(FailureReason::FallbackFailed { message })
            }
            Attempt::TimedOut => {
                warn!("Fallback for {} timed out after {:?}", name, deadline);
                self.save_partial(session, name, "fallback", context, "timeout", Some(deadline));
                Err(FailureReason::FallbackFailed {
                    message: format!("fallback timed out after {:?}", deadline),
                })
            }
        };
        (Some(primary_failure), outcome)
    }

    fn save_partial(
        &self,
        session: Option<&str>,
        component: &str,
        method: &str,
        context: &Context,
        error: &str,
        timed_out_after: Option<Duration>,
    ) {
        let mut payload = json!({
            "component": component,
            "method": method,
            "timestamp": Utc::now().to_rfc3339(),
            "result": partial_snapshot(context),
            "status": if timed_out_after.is_some() { "timeout" } else { "error" },
            "error": error,
        });
        if let Some(deadline) = timed_out_after {
            payload["timeout_seconds"] = json!(deadline.as_secs_f64());
        }

        save_stage_quietly(
            self.autosave.as_ref(),
            session,
            &format!("{}_{}_PARTIAL_ERROR", component, method),
            &payload,
            CATEGORY_PARTIAL,
        );
    }
}

/// Run one attempt on its own task so panics and overruns stay contained
async fn attempt(func: &Arc<dyn ComponentFn>, context: &Context, deadline: Duration) -> Attempt {
    let func = func.clone();
    let snapshot = context.clone();
    let mut handle = tokio::spawn(async move { func.call(snapshot).await });

    match timeout(deadline, &mut handle).await {
        Ok(Ok(Ok(value))) => Attempt::Value(value),
        Ok(Ok(Err(e))) => Attempt::Failed(format!("{:#}", e)),
        Ok(Err(join_error)) if join_error.is_panic() => Attempt::Failed(format!(
            "panicked: {}",
            panic_message(join_error.into_panic())
        )),
        Ok(Err(join_error)) => Attempt::Failed(join_error.to_string()),
        Err(_) => {
            handle.abort();
            Attempt::TimedOut
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return message.to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "unknown panic".to_string()
}

/// Null, false and empty containers count as "no result"
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Number(_) => false,
    }
}

/// Best-effort slice of the context for recovery after a failure
fn partial_snapshot(context: &Context) -> Value {
    let mut partial = serde_json::Map::new();
    for (key, value) in context {
        match value {
            Value::Object(map) if !map.is_empty() => {
                partial.insert(key.clone(), value.clone());
            }
            Value::Array(items) if !items.is_empty() => {
                partial.insert(key.clone(), value.clone());
            }
            Value::String(s) if s.chars().count() > PARTIAL_MIN_CHARS => {
                partial.insert(key.clone(), json!(truncate_chars(s, PARTIAL_MAX_CHARS)));
            }
            _ => {}
        }
    }

    if partial.is_empty() {
        json!({ "note": "no partial data available" })
    } else {
        Value::Object(partial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autosave::MemoryAutoSave;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn executor() -> (ResilientPipelineExecutor, MemoryAutoSave) {
        let store = MemoryAutoSave::new();
        let executor =
            ResilientPipelineExecutor::new(Arc::new(store.clone()), PipelineSettings::default());
        (executor, store)
    }

    fn returning(name: &str, value: Value) -> ComponentRegistration {
        ComponentRegistration::new(name, move |_ctx: Context| {
            let value = value.clone();
            async move { anyhow::Ok(value) }
        })
    }

    fn failing(name: &str) -> ComponentRegistration {
        ComponentRegistration::new(name, |_ctx: Context| async {
            Err::<Value, _>(anyhow::anyhow!("upstream returned garbage"))
        })
    }

    fn counting(name: &str, calls: Arc<AtomicUsize>) -> ComponentRegistration {
        ComponentRegistration::new(name, move |_ctx: Context| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { anyhow::Ok(json!("done")) }
        })
    }

    fn explode() -> Value {
        panic!("component exploded")
    }

    fn input() -> Context {
        let mut context = Context::new();
        context.insert("segment".to_string(), json!("electric vehicles in Brazil"));
        context
    }

    #[tokio::test]
    async fn test_successful_run_accumulates_outputs() {
        let (executor, _) = executor();
        let executor = executor
            .with_component(returning("research", json!({"sources": 3})))
            .with_component(
                ComponentRegistration::new("analysis", |ctx: Context| async move {
                    let sources = ctx["research"]["sources"].as_u64().unwrap_or(0);
                    anyhow::Ok(json!({ "seen": sources }))
                })
                .depends_on(["research"]),
            );

        let run = executor.run(input(), Some("session-1".to_string())).await;

        assert_eq!(run.session_id, "session-1");
        assert_eq!(run.succeeded, vec!["research", "analysis"]);
        assert!(run.failed.is_empty());
        assert_eq!(run.accumulated_context["analysis"], json!({ "seen": 3 }));
        assert!(run.accumulated_context.contains_key("segment"));
        assert!(run.is_complete());
        assert_eq!(run.stats.success_rate, 1.0);
        assert!(run.timing.end >= run.timing.start);
    }

    #[tokio::test]
    async fn test_dependency_on_failed_component_is_never_invoked() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (executor, store) = executor();
        let executor = executor
            .with_component(failing("a"))
            .with_component(counting("b", calls.clone()).depends_on(["a"]));

        let run = executor.run(input(), None).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(run.failed, vec!["a", "b"]);
        assert_eq!(
            run.report("b").unwrap().reason,
            Some(FailureReason::DependencyNotMet {
                missing: vec!["a".to_string()]
            })
        );
        assert!(store.error_stages().contains(&"component_b".to_string()));
    }

    #[tokio::test]
    async fn test_partial_results_survive_a_failure() {
        let (executor, _) = executor();
        let executor = executor
            .with_component(returning("c1", json!(1)))
            .with_component(returning("c2", json!(2)))
            .with_component(failing("c3"))
            .with_component(returning("c4", json!(4)))
            .with_component(returning("c5", json!(5)));

        let run = executor.run(Context::new(), None).await;

        assert_eq!(run.accumulated_context["c1"], json!(1));
        assert_eq!(run.accumulated_context["c2"], json!(2));
        assert!(!run.accumulated_context.contains_key("c3"));
        assert_eq!(run.failed, vec!["c3"]);
        assert_eq!(
            run.stats.succeeded_count + run.stats.failed_count,
            run.stats.total
        );
        assert_eq!(run.stats.total, 5);
        assert!(!run.is_complete());
        assert!(matches!(
            run.report("c3").unwrap().reason,
            Some(FailureReason::Error { .. })
        ));
    }

    #[tokio::test]
    async fn test_timed_out_component_uses_fallback() {
        let summarize_calls = Arc::new(AtomicUsize::new(0));
        let (executor, store) = executor();
        let executor = executor
            .with_component(
                ComponentRegistration::new("fetch_raw", |_ctx: Context| async {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    anyhow::Ok(json!("too late"))
                })
                .required(true)
                .timeout(Duration::from_millis(50))
                .with_fallback(|_ctx: Context| async { anyhow::Ok(json!({ "partial": true })) }),
            )
            .with_component(
                counting("summarize", summarize_calls.clone()).depends_on(["fetch_raw"]),
            );

        let run = executor.run(input(), None).await;

        assert_eq!(run.succeeded, vec!["fetch_raw", "summarize"]);
        assert_eq!(summarize_calls.load(Ordering::SeqCst), 1);
        assert_eq!(run.accumulated_context["fetch_raw"], json!({ "partial": true }));

        let report = run.report("fetch_raw").unwrap();
        assert!(report.via_fallback);
        assert_eq!(report.status, ComponentStatus::Succeeded);
        assert_eq!(
            report.primary_failure,
            Some(FailureReason::Timeout { seconds: 0.05 })
        );

        let partial = store
            .stage_payload("fetch_raw_execute_PARTIAL_ERROR")
            .unwrap();
        assert_eq!(partial["status"], "timeout");
        assert_eq!(partial["timeout_seconds"], json!(0.05));
        assert_eq!(
            partial["result"]["segment"],
            json!("electric vehicles in Brazil")
        );
        assert!(store.stages().contains(&"fallback_fetch_raw".to_string()));
    }

    #[tokio::test]
    async fn test_panic_is_isolated() {
        let (executor, _) = executor();
        let executor = executor
            .with_component(ComponentRegistration::new("unstable", |_ctx: Context| async {
                anyhow::Ok(explode())
            }))
            .with_component(returning("after", json!("ok")));

        let run = executor.run(Context::new(), None).await;

        assert_eq!(run.failed, vec!["unstable"]);
        assert_eq!(run.succeeded, vec!["after"]);
        match &run.report("unstable").unwrap().reason {
            Some(FailureReason::Error { message }) => assert!(message.contains("component exploded")),
            other => panic!("unexpected reason {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_result_triggers_fallback() {
        let (executor, _) = executor();
        let executor = executor
            .with_component(
                returning("with_fallback", json!({}))
                    .with_fallback(|_ctx: Context| async { anyhow::Ok(json!(["backup"])) }),
            )
            .with_component(returning("without_fallback", Value::Null));

        let run = executor.run(Context::new(), None).await;

        assert_eq!(run.succeeded, vec!["with_fallback"]);
        assert_eq!(run.accumulated_context["with_fallback"], json!(["backup"]));
        assert_eq!(
            run.report("with_fallback").unwrap().primary_failure,
            Some(FailureReason::EmptyResult)
        );
        assert_eq!(
            run.report("without_fallback").unwrap().reason,
            Some(FailureReason::EmptyResult)
        );
    }

    #[tokio::test]
    async fn test_failing_fallback_marks_component_failed() {
        let (executor, _) = executor();
        let executor = executor.with_component(failing("a").with_fallback(|_ctx: Context| async {
            Err::<Value, _>(anyhow::anyhow!("backup also down"))
        }));

        let run = executor.run(Context::new(), None).await;

        let report = run.report("a").unwrap();
        assert_eq!(report.status, ComponentStatus::Failed);
        assert_eq!(
            report.reason,
            Some(FailureReason::FallbackFailed {
                message: "backup also down".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_required_failure_continues_by_default() {
        let (executor, _) = executor();
        let executor = executor
            .with_component(failing("critical").required(true))
            .with_component(returning("next", json!(true)));

        let run = executor.run(Context::new(), None).await;

        assert!(!run.aborted);
        assert_eq!(run.succeeded, vec!["next"]);
    }

    #[tokio::test]
    async fn test_required_failure_aborts_when_configured() {
        let calls = Arc::new(AtomicUsize::new(0));
        let store = MemoryAutoSave::new();
        let settings = PipelineSettings {
            abort_on_required_failure: true,
            ..PipelineSettings::default()
        };
        let executor = ResilientPipelineExecutor::new(Arc::new(store), settings)
            .with_component(returning("first", json!(1)))
            .with_component(failing("critical").required(true))
            .with_component(counting("later", calls.clone()));

        let run = executor.run(Context::new(), None).await;

        assert!(run.aborted);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(run.failed, vec!["critical", "later"]);
        assert_eq!(
            run.report("later").unwrap().reason,
            Some(FailureReason::Aborted)
        );
        assert_eq!(run.stats.total, 3);
    }

    #[tokio::test]
    async fn test_every_transition_is_persisted() {
        let (executor, store) = executor();
        let executor = executor
            .with_component(returning("a", json!("alpha")))
            .with_component(failing("b").with_fallback(|_ctx: Context| async {
                anyhow::Ok(json!("beta"))
            }))
            .with_component(failing("c"));

        let run = executor.run(input(), None).await;

        assert_eq!(
            store.stages(),
            vec![
                "pipeline_started",
                "component_a",
                "b_execute_PARTIAL_ERROR",
                "fallback_b",
                "c_execute_PARTIAL_ERROR",
                "pipeline_completed",
            ]
        );
        assert_eq!(store.error_stages(), vec!["component_c"]);

        let completed = store.stage_payload("pipeline_completed").unwrap();
        assert_eq!(completed["session_id"], json!(run.session_id));
        assert_eq!(completed["stats"]["failed_count"], 1);
    }

    #[tokio::test]
    async fn test_fallback_timeout_keeps_partial_record() {
        let (executor, store) = executor();
        let executor = executor.with_component(
            failing("enrich")
                .timeout(Duration::from_millis(50))
                .with_fallback(|_ctx: Context| async {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    anyhow::Ok(json!("too late"))
                }),
        );

        let run = executor.run(input(), None).await;

        assert_eq!(run.failed, vec!["enrich"]);
        assert!(matches!(
            run.report("enrich").unwrap().reason,
            Some(FailureReason::FallbackFailed { .. })
        ));

        let partial = store
            .stage_payload("enrich_fallback_PARTIAL_ERROR")
            .unwrap();
        assert_eq!(partial["method"], "fallback");
        assert_eq!(partial["status"], "timeout");
        assert_eq!(partial["timeout_seconds"], json!(0.05));
    }

    #[tokio::test]
    async fn test_records_carry_the_run_session() {
        let (executor, store) = executor();
        let executor = executor
            .with_component(returning("a", json!("alpha")))
            .with_component(failing("b"));

        let run = executor
            .run(Context::new(), Some("client-session".to_string()))
            .await;

        assert_eq!(run.session_id, "client-session");
        let records = store.records();
        assert!(!records.is_empty());
        assert!(records
            .iter()
            .all(|r| r.session.as_deref() == Some("client-session")));
    }

    #[tokio::test]
    async fn test_file_records_land_in_the_run_session_directory() {
        let dir = tempfile::tempdir().unwrap();
        let first;
        let second;
        {
            let store: Arc<dyn AutoSave> =
                Arc::new(crate::autosave::FileAutoSave::new(dir.path()).unwrap());
            let executor = ResilientPipelineExecutor::new(store, PipelineSettings::default())
                .with_component(returning("a", json!("alpha")));

            let (one, two) = tokio::join!(
                executor.run(Context::new(), Some("client-session".to_string())),
                executor.run(Context::new(), None),
            );
            first = one.session_id;
            second = two.session_id;
        }

        assert_eq!(first, "client-session");
        for session in [&first, &second] {
            let analysis = dir.path().join(session).join(CATEGORY_ANALYSIS);
            assert_eq!(std::fs::read_dir(&analysis).unwrap().count(), 3);
        }
        assert!(!dir.path().join(CATEGORY_ANALYSIS).exists());
    }

    #[tokio::test]
    async fn test_failing_store_never_fails_the_run() {
        let executor = ResilientPipelineExecutor::new(
            Arc::new(crate::autosave::BrokenAutoSave),
            PipelineSettings::default(),
        )
        .with_component(returning("a", json!({"rows": 2})))
        .with_component(failing("b").with_fallback(|_ctx: Context| async {
            anyhow::Ok(json!("beta"))
        }))
        .with_component(counting("c", Arc::new(AtomicUsize::new(0))).depends_on(["a", "b"]));

        let run = executor.run(input(), None).await;

        assert_eq!(run.succeeded, vec!["a", "b", "c"]);
        assert!(run.is_complete());
        assert_eq!(run.accumulated_context["b"], json!("beta"));
    }

    #[tokio::test]
    async fn test_progress_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let (executor, _) = executor();
        let executor = executor
            .with_component(returning("a", json!(1)))
            .with_component(returning("b", json!(2)));

        executor
            .run_with_progress(Context::new(), None, &move |index, message: &str| {
                sink.lock().unwrap().push((index, message.to_string()));
            })
            .await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec![(1, "Running a".to_string()), (2, "Running b".to_string())]
        );
    }

    #[test]
    fn test_register_replaces_in_place() {
        let (mut executor, _) = executor();
        executor.register(returning("a", json!(1)));
        executor.register(returning("b", json!(2)));
        executor.register(returning("a", json!(3)).required(true));

        let summary = executor.summary();
        assert_eq!(summary.execution_order, vec!["a", "b"]);
        assert!(summary.components[0].required);
        assert_eq!(executor.len(), 2);
    }

    #[test]
    fn test_validate_order() {
        let (executor, _) = executor();
        let executor = executor
            .with_component(returning("report", json!(1)).depends_on(["analysis", "ghost"]))
            .with_component(returning("analysis", json!(2)));

        let issues = executor.validate_order();
        assert_eq!(
            issues,
            vec![
                OrderIssue::RegisteredLater {
                    component: "report".to_string(),
                    dependency: "analysis".to_string(),
                },
                OrderIssue::Unknown {
                    component: "report".to_string(),
                    dependency: "ghost".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_partial_snapshot() {
        let mut context = Context::new();
        context.insert("short".to_string(), json!("tiny"));
        context.insert("long".to_string(), json!("x".repeat(800)));
        context.insert("list".to_string(), json!([1, 2]));
        context.insert("empty".to_string(), json!({}));
        context.insert("number".to_string(), json!(42));

        let snapshot = partial_snapshot(&context);
        let object = snapshot.as_object().unwrap();
        assert_eq!(object.len(), 2);
        assert_eq!(object["long"].as_str().unwrap().chars().count(), 500);
        assert_eq!(object["list"], json!([1, 2]));

        assert_eq!(
            partial_snapshot(&Context::new()),
            json!({ "note": "no partial data available" })
        );
    }

    #[test]
    fn test_empty_values() {
        assert!(is_empty_value(&Value::Null));
        assert!(is_empty_value(&json!(false)));
        assert!(is_empty_value(&json!("")));
        assert!(is_empty_value(&json!([])));
        assert!(!is_empty_value(&json!(0)));
        assert!(!is_empty_value(&json!({"a": 1})));
    }
}
