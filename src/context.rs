//! Per-run execution state shared across every step in a workflow (spec §4.3).

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::RuntimeError;
use crate::expression::EvaluationContext;
use crate::types::{StepOutput, StepResult};

/// One entry in the append-only execution log.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub step_id: Option<String>,
    pub message: String,
}

impl LogEntry {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            step_id: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn for_step(mut self, step_id: impl Into<String>) -> Self {
        self.step_id = Some(step_id.into());
        self
    }
}

/// Lifecycle observer notified as steps progress. Every method has a no-op
/// default so callers only implement the hooks they care about.
pub trait ExecutionCallback: Send + Sync {
    fn on_step_started(&self, _step_id: &str) {}
    fn on_step_completed(&self, _result: &StepResult) {}
    fn on_step_skipped(&self, _step_id: &str, _reason: &str) {}
    fn on_log(&self, _entry: &LogEntry) {}
}

/// An [`ExecutionCallback`] that does nothing; the default when a caller
/// has no observer to attach.
#[derive(Debug, Default)]
pub struct NoopCallback;

impl ExecutionCallback for NoopCallback {}

/// Shared, mutable state for a single workflow run.
///
/// `variables` and `results` are guarded independently so a reader of one
/// never blocks on the other. Results are append-once per step ID: calling
/// [`ExecutionContext::record_result`] twice for the same ID is a logic
/// error and returns [`RuntimeError::ExecutionError`] rather than silently
/// overwriting, per spec §4.3.
pub struct ExecutionContext {
    workflow_id: String,
    execution_id: String,
    variables: RwLock<HashMap<String, Value>>,
    results: RwLock<HashMap<String, StepResult>>,
    logs: RwLock<Vec<LogEntry>>,
    callback: Arc<dyn ExecutionCallback>,
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("workflow_id", &self.workflow_id)
            .field("execution_id", &self.execution_id)
            .finish_non_exhaustive()
    }
}

impl ExecutionContext {
    #[must_use]
    pub fn new(workflow_id: impl Into<String>, execution_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            execution_id: execution_id.into(),
            variables: RwLock::new(HashMap::new()),
            results: RwLock::new(HashMap::new()),
            logs: RwLock::new(Vec::new()),
            callback: Arc::new(NoopCallback),
        }
    }

    /// Start a run for `workflow_id`, generating a fresh opaque execution
    /// ID the way a caller driving many concurrent runs of the same
    /// workflow definition would.
    #[must_use]
    pub fn new_run(workflow_id: impl Into<String>) -> Self {
        Self::new(workflow_id, uuid::Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn with_callback(mut self, callback: Arc<dyn ExecutionCallback>) -> Self {
        self.callback = callback;
        self
    }

    #[must_use]
    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    #[must_use]
    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    #[must_use]
    pub fn callback(&self) -> &Arc<dyn ExecutionCallback> {
        &self.callback
    }

    pub fn set_variable(&self, name: impl Into<String>, value: Value) {
        self.variables
            .write()
            .expect("variables lock poisoned")
            .insert(name.into(), value);
    }

    #[must_use]
    pub fn get_variable(&self, name: &str) -> Option<Value> {
        self.variables
            .read()
            .expect("variables lock poisoned")
            .get(name)
            .cloned()
    }

    #[must_use]
    pub fn variables_snapshot(&self) -> HashMap<String, Value> {
        self.variables.read().expect("variables lock poisoned").clone()
    }

    /// Record a step's result. Returns an error if this step ID already has
    /// a recorded result — results are append-once, never overwritten.
    pub fn record_result(&self, result: StepResult) -> Result<(), RuntimeError> {
        self.callback.on_step_completed(&result);
        let mut results = self.results.write().expect("results lock poisoned");
        if results.contains_key(&result.step_id) {
            return Err(RuntimeError::execution(format!(
                "result already recorded for step {}",
                result.step_id
            ))
            .with_step_id(result.step_id.clone()));
        }
        debug!(step_id = %result.step_id, status = result.status.as_str(), "step result recorded");
        results.insert(result.step_id.clone(), result);
        Ok(())
    }

    #[must_use]
    pub fn get_result(&self, step_id: &str) -> Option<StepResult> {
        self.results.read().expect("results lock poisoned").get(step_id).cloned()
    }

    pub fn notify_step_started(&self, step_id: &str) {
        trace!(step_id, "step started");
        self.callback.on_step_started(step_id);
    }

    pub fn notify_step_skipped(&self, step_id: &str, reason: &str) {
        debug!(step_id, reason, "step skipped");
        self.callback.on_step_skipped(step_id, reason);
    }

    pub fn log(&self, entry: LogEntry) {
        self.callback.on_log(&entry);
        self.logs.write().expect("logs lock poisoned").push(entry);
    }

    #[must_use]
    pub fn logs_snapshot(&self) -> Vec<LogEntry> {
        self.logs.read().expect("logs lock poisoned").clone()
    }

    /// Absorb a child context's logs, preserving chronological order
    /// (parent's existing logs, then the child's), per spec §4.5.
    pub fn merge_logs_from(&self, child: &Self) {
        let child_logs = child.logs_snapshot();
        self.logs.write().expect("logs lock poisoned").extend(child_logs);
    }

    /// Build an isolated child context for a nested (reference-workflow)
    /// execution: shares identity and the lifecycle callback, starts with
    /// empty variables and results, per spec §4.5.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            workflow_id: self.workflow_id.clone(),
            execution_id: self.execution_id.clone(),
            variables: RwLock::new(HashMap::new()),
            results: RwLock::new(HashMap::new()),
            logs: RwLock::new(Vec::new()),
            callback: Arc::clone(&self.callback),
        }
    }

    /// Canonical flattening into the view expression evaluation and
    /// variable substitution consume (spec §4.3):
    ///
    /// - every variable is copied over by name
    /// - every recorded step result becomes `{status, duration, step_id,
    ///   output, error}` plus its output's own fields shallow-flattened
    ///   alongside, bound under the step's ID
    #[must_use]
    pub fn to_evaluation_context(&self) -> EvaluationContext {
        let mut ctx = EvaluationContext::new();

        for (name, value) in self.variables_snapshot() {
            ctx.set(name, value);
        }

        for (step_id, result) in self.results.read().expect("results lock poisoned").iter() {
            ctx.set(step_id.clone(), flatten_result(result));
        }

        ctx
    }
}

fn flatten_result(result: &StepResult) -> Value {
    let mut map = serde_json::Map::new();
    map.insert("step_id".to_string(), Value::from(result.step_id.clone()));
    map.insert("status".to_string(), Value::from(result.status.as_str()));
    map.insert("duration".to_string(), Value::from(result.duration_ms()));
    if let Some(error) = &result.error {
        map.insert("error".to_string(), Value::from(error.clone()));
    }

    let output = result.output.flatten();
    map.insert("output".to_string(), output.clone());
    if let StepOutput::None = result.output {
        // no further fields to hoist
    } else if let Value::Object(fields) = output {
        for (key, value) in fields {
            map.entry(key).or_insert(value);
        }
    }

    Value::Object(map)
}
