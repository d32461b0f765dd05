//! Thread-safe executor registry (spec §4.1).
//!
//! `register`/`unregister` need exclusive access; every other operation is a
//! concurrent read. A process-wide default registry is available via
//! [`default_registry`] for production callers; tests and nested scopes
//! construct their own isolated [`Registry`] instead.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use tracing::{info, warn};

use crate::error::RuntimeError;

use super::Executor;

/// Maps a step's `step_type` to the executor that runs it.
#[derive(Default)]
pub struct Registry {
    executors: RwLock<HashMap<String, Arc<dyn Executor>>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `executor` under its own [`Executor::type_name`]. Fails if the
    /// type is already bound — the registry never holds two executors for
    /// the same identifier, per spec §3.
    pub fn register(&self, executor: Arc<dyn Executor>) -> Result<(), RuntimeError> {
        let type_name = executor.type_name().to_string();
        let mut executors = self.executors.write().expect("registry lock poisoned");
        if executors.contains_key(&type_name) {
            warn!(step_type = %type_name, "rejected duplicate executor registration");
            return Err(RuntimeError::config(format!(
                "executor already registered for type: {type_name}"
            )));
        }
        info!(step_type = %type_name, "executor registered");
        executors.insert(type_name, executor);
        Ok(())
    }

    /// [`Registry::register`], intended for static registrations at process
    /// start: panics instead of surfacing the error to the caller.
    pub fn must_register(&self, executor: Arc<dyn Executor>) {
        self.register(executor).expect("must_register: duplicate executor type");
    }

    #[must_use]
    pub fn unregister(&self, type_name: &str) -> Option<Arc<dyn Executor>> {
        let removed = self.executors.write().expect("registry lock poisoned").remove(type_name);
        if removed.is_some() {
            info!(step_type = type_name, "executor unregistered");
        }
        removed
    }

    #[must_use]
    pub fn get(&self, type_name: &str) -> Option<Arc<dyn Executor>> {
        self.executors.read().expect("registry lock poisoned").get(type_name).cloned()
    }

    /// Like [`Registry::get`], but surfaces the miss as the
    /// [`RuntimeError::ExecutorNotFound`] transport-level error (spec §7).
    pub fn get_or_error(&self, type_name: &str) -> Result<Arc<dyn Executor>, RuntimeError> {
        self.get(type_name)
            .ok_or_else(|| RuntimeError::ExecutorNotFound(type_name.to_string()))
    }

    #[must_use]
    pub fn has(&self, type_name: &str) -> bool {
        self.executors.read().expect("registry lock poisoned").contains_key(type_name)
    }

    #[must_use]
    pub fn types(&self) -> Vec<String> {
        self.executors.read().expect("registry lock poisoned").keys().cloned().collect()
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.executors.read().expect("registry lock poisoned").len()
    }

    /// Run `init` on every registered executor with the given config,
    /// stopping at the first failure.
    pub async fn init_all(
        &self,
        config: &std::collections::HashMap<String, serde_json::Value>,
    ) -> Result<(), RuntimeError> {
        let executors: Vec<_> = self.executors.read().expect("registry lock poisoned").values().cloned().collect();
        for executor in executors {
            executor.init(config).await?;
        }
        Ok(())
    }

    /// Run `cleanup` on every registered executor, continuing past
    /// individual failures and returning the first one encountered.
    pub async fn cleanup_all(&self) -> Result<(), RuntimeError> {
        let executors: Vec<_> = self.executors.read().expect("registry lock poisoned").values().cloned().collect();
        let mut first_error = None;
        for executor in executors {
            if let Err(err) = executor.cleanup().await {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

static DEFAULT_REGISTRY: OnceLock<Registry> = OnceLock::new();

/// The process-wide default registry, lazily constructed empty. Nested or
/// test scopes should build their own [`Registry`] instead of reaching for
/// this one.
pub fn default_registry() -> &'static Registry {
    DEFAULT_REGISTRY.get_or_init(Registry::new)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use serde_json::Value;

    use crate::context::ExecutionContext;
    use crate::types::{Step, StepOutput, StepResult};

    use super::*;

    struct EchoExecutor;

    #[async_trait]
    impl Executor for EchoExecutor {
        fn type_name(&self) -> &str {
            "echo"
        }

        async fn execute(&self, step: &Step, _ctx: &ExecutionContext) -> Result<StepResult, RuntimeError> {
            Ok(StepResult::success(&step.id, chrono::Utc::now(), StepOutput::None))
        }
    }

    #[test]
    fn register_then_get_round_trips() {
        let registry = Registry::new();
        registry.register(Arc::new(EchoExecutor)).unwrap();
        assert!(registry.has("echo"));
        assert_eq!(registry.count(), 1);
        assert!(registry.get("echo").is_some());
    }

    #[test]
    fn get_or_error_reports_executor_not_found() {
        let registry = Registry::new();
        let err = registry.get_or_error("missing").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ExecutorNotFound);
    }

    #[test]
    fn registering_a_duplicate_type_fails() {
        let registry = Registry::new();
        registry.register(Arc::new(EchoExecutor)).unwrap();
        assert!(registry.register(Arc::new(EchoExecutor)).is_err());
    }

    #[test]
    #[should_panic(expected = "duplicate executor type")]
    fn must_register_panics_on_a_duplicate_type() {
        let registry = Registry::new();
        registry.must_register(Arc::new(EchoExecutor));
        registry.must_register(Arc::new(EchoExecutor));
    }

    #[test]
    fn unregister_removes_the_binding() {
        let registry = Registry::new();
        registry.register(Arc::new(EchoExecutor)).unwrap();
        assert!(registry.unregister("echo").is_some());
        assert!(!registry.has("echo"));
    }

    #[tokio::test]
    async fn init_all_and_cleanup_all_reach_every_executor() {
        let registry = Registry::new();
        registry.register(Arc::new(EchoExecutor)).unwrap();
        registry.init_all(&HashMap::<String, Value>::new()).await.unwrap();
        registry.cleanup_all().await.unwrap();
    }
}
