//! Heterogeneous step output, represented as a tagged variant per spec §9.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Output of the condition executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionOutput {
    pub expression: String,
    pub result: bool,
    pub branch_taken: String,
    pub steps_executed: Vec<String>,
}

/// Output of the reference-workflow executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefWorkflowOutput {
    pub workflow_id: String,
    pub workflow_name: String,
    pub step_count: usize,
    pub steps_executed: Vec<String>,
    pub outputs: HashMap<String, Value>,
}

/// Result of an HTTP step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status_code: u16,
    pub body: Value,
    pub headers: HashMap<String, String>,
}

/// Result of a database step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DbResult {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub data: Vec<Value>,
    #[serde(default)]
    pub rows_affected: Option<u64>,
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub exists: Option<bool>,
    #[serde(default)]
    pub tx_id: Option<String>,
}

/// Result of a message-queue step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MqResult {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub messages: Vec<Value>,
    /// Set by `connect`/`close`/`is_connected`; absent for publish/consume.
    #[serde(default)]
    pub connected: Option<bool>,
}

/// Result of a remote tool-call (MCP) step. Transport failures surface as
/// `is_error: true` here rather than propagating — see spec §7.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub is_error: bool,
    pub content: String,
}

/// The executor-specific payload of a [`crate::types::StepResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "output_type", rename_all = "snake_case")]
pub enum StepOutput {
    Condition(ConditionOutput),
    RefWorkflow(RefWorkflowOutput),
    Http(HttpResponse),
    Db(DbResult),
    Mq(MqResult),
    Tool(ToolResult),
    /// Generic mapping, for executors with no typed payload of their own.
    Map(HashMap<String, Value>),
    None,
}

impl StepOutput {
    /// Canonical flattening entry point for §4.3: project this output onto
    /// the top-level keys that `${stepId.<field>}` substitution resolves
    /// against, as a shallow JSON object.
    #[must_use]
    pub fn flatten(&self) -> Value {
        match self {
            Self::Condition(c) => serde_json::to_value(c).unwrap_or(Value::Null),
            Self::RefWorkflow(r) => serde_json::to_value(r).unwrap_or(Value::Null),
            Self::Http(h) => {
                let mut map = serde_json::Map::new();
                map.insert("status_code".to_string(), Value::from(h.status_code));
                map.insert("body".to_string(), h.body.clone());
                map.insert(
                    "headers".to_string(),
                    serde_json::to_value(&h.headers).unwrap_or(Value::Null),
                );
                Value::Object(map)
            }
            Self::Db(d) => serde_json::to_value(d).unwrap_or(Value::Null),
            Self::Mq(m) => serde_json::to_value(m).unwrap_or(Value::Null),
            Self::Tool(t) => serde_json::to_value(t).unwrap_or(Value::Null),
            Self::Map(m) => serde_json::to_value(m).unwrap_or(Value::Null),
            Self::None => Value::Null,
        }
    }
}
