//! The keyed view the expression subsystem evaluates against.

use std::collections::HashMap;

use serde_json::Value;

/// Keyed storage for scalar variables and per-step result mappings.
///
/// Constructed either empty (for ad-hoc evaluation, e.g. in unit tests) or
/// via [`crate::context::ExecutionContext::to_evaluation_context`], which
/// performs the canonical flattening described in spec §4.3.
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    entries: HashMap<String, Value>,
}

impl EvaluationContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Resolve a dotted path (`stepA.status`, `user.name`) against the
    /// context. The first segment is a top-level key; the rest navigates
    /// into a JSON object.
    #[must_use]
    pub fn resolve_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.entries.get(first)?;
        for segment in segments {
            current = current.get(segment)?;
        }
        Some(current)
    }
}
