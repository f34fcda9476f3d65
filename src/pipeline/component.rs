//! Component registrations

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Context handed to every component: initial input plus earlier outputs
pub type Context = Map<String, Value>;

/// A unit of pipeline work, called with a snapshot of the accumulated context
pub trait ComponentFn: Send + Sync {
    fn call(&self, context: Context) -> BoxFuture<'static, anyhow::Result<Value>>;
}

impl<F, Fut> ComponentFn for F
where
    F: Fn(Context) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    fn call(&self, context: Context) -> BoxFuture<'static, anyhow::Result<Value>> {
        Box::pin(self(context))
    }
}

/// One named pipeline step
#[derive(Clone)]
pub struct ComponentRegistration {
    pub(crate) name: String,
    pub(crate) executor: Arc<dyn ComponentFn>,
    pub(crate) fallback: Option<Arc<dyn ComponentFn>>,
    pub(crate) required: bool,
    pub(crate) timeout: Option<Duration>,
    pub(crate) dependencies: Vec<String>,
}

impl ComponentRegistration {
    pub fn new<F, Fut>(name: impl Into<String>, executor: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self::from_component(name, Arc::new(executor))
    }

    /// Register an already shared component
    pub fn from_component(name: impl Into<String>, executor: Arc<dyn ComponentFn>) -> Self {
        Self {
            name: name.into(),
            executor,
            fallback: None,
            required: false,
            timeout: None,
            dependencies: Vec::new(),
        }
    }

    /// Called with the same context when the executor fails, times out or comes back empty
    pub fn with_fallback<F, Fut>(mut self, fallback: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.fallback = Some(Arc::new(fallback));
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Deadline for each attempt; the pipeline default applies when unset
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Components that must have succeeded before this one runs
    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies
            .extend(dependencies.into_iter().map(Into::into));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    pub(crate) fn summary(&self, default_timeout: Duration) -> ComponentSummary {
        ComponentSummary {
            name: self.name.clone(),
            required: self.required,
            timeout_seconds: self.timeout.unwrap_or(default_timeout).as_secs_f64(),
            dependencies: self.dependencies.clone(),
            has_fallback: self.has_fallback(),
        }
    }
}

impl std::fmt::Debug for ComponentRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistration")
            .field("name", &self.name)
            .field("required", &self.required)
            .field("timeout", &self.timeout)
            .field("dependencies", &self.dependencies)
            .field("has_fallback", &self.has_fallback())
            .finish()
    }
}

/// Static description of a registered component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSummary {
    pub name: String,
    pub required: bool,
    pub timeout_seconds: f64,
    pub dependencies: Vec<String>,
    pub has_fallback: bool,
}

/// Registered components and the order they run in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub components: Vec<ComponentSummary>,
    pub execution_order: Vec<String>,
}

/// A dependency that registration order cannot satisfy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderIssue {
    /// Dependency names no registered component
    Unknown { component: String, dependency: String },
    /// Dependency is registered after the component needing it
    RegisteredLater { component: String, dependency: String },
}

impl std::fmt::Display for OrderIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderIssue::Unknown {
                component,
                dependency,
            } => write!(f, "{} depends on unknown component {}", component, dependency),
            OrderIssue::RegisteredLater {
                component,
                dependency,
            } => write!(
                f,
                "{} depends on {} which is registered after it",
                component, dependency
            ),
        }
    }
}
