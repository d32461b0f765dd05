//! Shared identifier + config storage composed into every executor.

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value;

/// Value member factoring out the bookkeeping every [`super::Executor`]
/// implementation needs: its type identifier and the config captured at
/// `init` time. Executors hold one of these rather than inheriting from a
/// shared base type.
#[derive(Debug)]
pub struct ExecutorBase {
    type_name: String,
    config: RwLock<HashMap<String, Value>>,
}

impl ExecutorBase {
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            config: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn store_config(&self, config: HashMap<String, Value>) {
        *self.config.write().expect("executor config lock poisoned") = config;
    }

    #[must_use]
    pub fn config_snapshot(&self) -> HashMap<String, Value> {
        self.config.read().expect("executor config lock poisoned").clone()
    }

    /// Resolve a config value by name, preferring the step-level override
    /// over the value captured at `init`, per spec §6.
    #[must_use]
    pub fn resolve(&self, step_config: &HashMap<String, Value>, key: &str) -> Option<Value> {
        step_config
            .get(key)
            .cloned()
            .or_else(|| self.config_snapshot().get(key).cloned())
    }
}
