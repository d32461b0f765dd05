//! Declarative step and condition value objects.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-step policy deciding what happens to the enclosing branch when the
/// step fails. The zero value behaves as `Abort` per spec §9 — encoded
/// explicitly rather than relying on `#[derive(Default)]` picking the first
/// variant by accident of declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OnError {
    Abort,
    Continue,
    Skip,
}

impl Default for OnError {
    fn default() -> Self {
        Self::Abort
    }
}

impl OnError {
    /// Unknown values fall back to `Abort` rather than failing to parse —
    /// the deserializer below routes every incoming string through this,
    /// so an unrecognized `on_error` in workflow JSON never hard-errors.
    #[must_use]
    pub fn from_str_lossy(value: &str) -> Self {
        match value {
            "continue" => Self::Continue,
            "skip" => Self::Skip,
            _ => Self::Abort,
        }
    }
}

impl<'de> Deserialize<'de> for OnError {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_str_lossy(&raw))
    }
}

/// A sequence of steps guarded by a boolean expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    /// Boolean expression evaluated against the execution context.
    pub expression: String,
    /// Steps run, in order, when the expression evaluates to `true`.
    pub then: Vec<Step>,
    /// Steps run, in order, when the expression evaluates to `false`.
    #[serde(default)]
    pub r#else: Vec<Step>,
}

/// A single declarative action within a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Non-empty identifier, unique within its containing sequence.
    pub id: String,
    /// Human label.
    #[serde(default)]
    pub name: Option<String>,
    /// Non-empty identifier selecting an executor from the registry.
    pub step_type: String,
    /// Executor-specific configuration.
    #[serde(default)]
    pub config: HashMap<String, Value>,
    /// Present only when `step_type == "condition"`.
    #[serde(default)]
    pub condition: Option<Condition>,
    /// Policy applied when this step fails inside its branch.
    #[serde(default)]
    pub on_error: OnError,
    /// Skipped before execution when `true`.
    #[serde(default)]
    pub disabled: bool,
}

impl Step {
    /// Shorthand for building a leaf step in tests and fixtures.
    #[must_use]
    pub fn new(id: impl Into<String>, step_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            step_type: step_type.into(),
            config: HashMap::new(),
            condition: None,
            on_error: OnError::default(),
            disabled: false,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: HashMap<String, Value>) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_on_error(mut self, on_error: OnError) -> Self {
        self.on_error = on_error;
        self
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }
}
