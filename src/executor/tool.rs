//! Remote tool-call (MCP) executor: an external interface boundary
//! (spec §6). This is the one leaf executor where a transport failure does
//! not become a failed [`StepResult`] — it becomes a [`crate::types::ToolResult`]
//! with `is_error: true`, because a remote tool call reporting its own
//! failure is itself a successful round trip (spec §7).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::error::RuntimeError;
use crate::expression::VariableResolver;
use crate::types::{Step, StepOutput, StepResult, ToolDefinition, ToolResult};

use super::base::ExecutorBase;
use super::Executor;

/// A fully resolved tool invocation, ready to hand to an adapter. Per
/// spec §6, arguments travel as a JSON-encoded string (`CallTool(serverID,
/// toolName, argumentsJSON)`), not as a raw value, so adapters speak the
/// same wire shape a real MCP bridge would.
#[derive(Debug, Clone)]
pub struct ToolRequest {
    pub server_id: String,
    pub tool_name: String,
    pub arguments_json: String,
}

/// `ToolClient` per spec §6: `GetTools(serverID)` and `CallTool(serverID,
/// toolName, argumentsJSON)`.
#[async_trait]
pub trait ToolAdapter: Send + Sync {
    async fn get_tools(&self, server_id: &str) -> Result<Vec<ToolDefinition>, RuntimeError>;
    async fn call(&self, request: ToolRequest) -> Result<ToolResult, RuntimeError>;
}

/// Canned-response adapter for tests: tool names resolve to a fixed
/// [`ToolResult`], with anything unregistered reported as an error result.
#[derive(Default)]
pub struct StubToolAdapter {
    responses: HashMap<String, ToolResult>,
    tools: HashMap<String, Vec<ToolDefinition>>,
}

impl StubToolAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_response(mut self, tool_name: impl Into<String>, result: ToolResult) -> Self {
        self.responses.insert(tool_name.into(), result);
        self
    }

    #[must_use]
    pub fn with_tools(mut self, server_id: impl Into<String>, tools: Vec<ToolDefinition>) -> Self {
        self.tools.insert(server_id.into(), tools);
        self
    }
}

#[async_trait]
impl ToolAdapter for StubToolAdapter {
    async fn get_tools(&self, server_id: &str) -> Result<Vec<ToolDefinition>, RuntimeError> {
        Ok(self.tools.get(server_id).cloned().unwrap_or_default())
    }

    async fn call(&self, request: ToolRequest) -> Result<ToolResult, RuntimeError> {
        Ok(self.responses.get(&request.tool_name).cloned().unwrap_or(ToolResult {
            is_error: true,
            content: format!("no tool registered: {}", request.tool_name),
        }))
    }
}

pub struct ToolExecutor {
    base: ExecutorBase,
    adapter: Box<dyn ToolAdapter>,
}

impl ToolExecutor {
    #[must_use]
    pub fn new(adapter: Box<dyn ToolAdapter>) -> Self {
        Self {
            base: ExecutorBase::new("tool"),
            adapter,
        }
    }
}

#[async_trait]
impl Executor for ToolExecutor {
    fn type_name(&self) -> &str {
        self.base.type_name()
    }

    async fn init(&self, config: &HashMap<String, Value>) -> Result<(), RuntimeError> {
        self.base.store_config(config.clone());
        Ok(())
    }

    async fn execute(&self, step: &Step, ctx: &ExecutionContext) -> Result<StepResult, RuntimeError> {
        let start = Utc::now();

        if step.disabled {
            return Ok(StepResult::skipped(&step.id, start));
        }

        let eval_ctx = ctx.to_evaluation_context();

        let server_id = self
            .base
            .resolve(&step.config, "server_id")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();

        let action = self
            .base
            .resolve(&step.config, "action")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "call".to_string());

        if action == "list_tools" {
            // A transport-level failure here still surfaces as a
            // successful step result carrying an error-shaped tool output,
            // matching the call path below: callers branch on tool errors
            // textually rather than via step status, per spec §7.
            let tool_result = match self.adapter.get_tools(&server_id).await {
                Ok(tools) => ToolResult {
                    is_error: false,
                    content: serde_json::to_string(&tools).unwrap_or_default(),
                },
                Err(err) => ToolResult { is_error: true, content: err.to_string() },
            };
            return Ok(StepResult::success(&step.id, start, StepOutput::Tool(tool_result)));
        }

        let tool_name = match self
            .base
            .resolve(&step.config, "tool_name")
            .and_then(|v| v.as_str().map(str::to_string))
        {
            Some(tool_name) => tool_name,
            None => {
                let err = RuntimeError::config("tool step is missing tool_name").with_step_id(step.id.clone());
                return Ok(StepResult::failed(&step.id, start, StepOutput::None, err.to_string()));
            }
        };

        let arguments = self
            .base
            .resolve(&step.config, "arguments")
            .map(|raw| VariableResolver::resolve_json(&raw, &eval_ctx))
            .unwrap_or(Value::Null);
        let arguments_json = serde_json::to_string(&arguments).unwrap_or_else(|_| "null".to_string());

        let request = ToolRequest { server_id, tool_name, arguments_json };

        // A transport-level adapter failure still produces a successful
        // step result carrying an error-shaped tool output; only the tool
        // output's `is_error` flag distinguishes it.
        let tool_result = match self.adapter.call(request).await {
            Ok(result) => result,
            Err(err) => ToolResult { is_error: true, content: err.to_string() },
        };

        Ok(StepResult::success(&step.id, start, StepOutput::Tool(tool_result)))
    }
}
