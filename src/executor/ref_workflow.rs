//! Reference-workflow executor: runs an inline sub-workflow definition in
//! an isolated child [`ExecutionContext`] (spec §4.5).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::error::RuntimeError;
use crate::expression::VariableResolver;
use crate::types::{RefWorkflowOutput, Step, StepOutput, StepResult};

use super::base::ExecutorBase;
use super::branch::execute_steps;
use super::registry::Registry;
use super::Executor;

/// An inline sub-workflow, parsed out of a step's `workflow_definition`
/// config entry.
#[derive(Debug, Deserialize)]
struct WorkflowDefinition {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    variables: HashMap<String, Value>,
    steps: Vec<Step>,
}

/// Executes an inline `workflow_definition` as an isolated child run: the
/// child starts with its own variables (seeded from the definition, not
/// inherited from the parent), executes its steps through the same
/// registry, and only its declared `outputs` flow back to the parent.
pub struct RefWorkflowExecutor {
    base: ExecutorBase,
    registry: Arc<Registry>,
}

impl RefWorkflowExecutor {
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            base: ExecutorBase::new("ref_workflow"),
            registry,
        }
    }
}

#[async_trait]
impl Executor for RefWorkflowExecutor {
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

        let definition_value = match step.config.get("workflow_definition") {
            Some(value) => value,
            None => {
                let err = RuntimeError::config("ref_workflow step is missing workflow_definition")
                    .with_step_id(step.id.clone());
                return Ok(StepResult::failed(&step.id, start, StepOutput::None, err.to_string()));
            }
        };
        let definition: WorkflowDefinition = match serde_json::from_value(definition_value.clone()) {
            Ok(definition) => definition,
            Err(err) => {
                let err = RuntimeError::config(format!("invalid workflow_definition: {err}"))
                    .with_step_id(step.id.clone());
                return Ok(StepResult::failed(&step.id, start, StepOutput::None, err.to_string()));
            }
        };
        if definition.steps.is_empty() {
            let err = RuntimeError::config("workflow_definition.steps must be non-empty")
                .with_step_id(step.id.clone());
            return Ok(StepResult::failed(&step.id, start, StepOutput::None, err.to_string()));
        }

        let parent_eval_ctx = ctx.to_evaluation_context();
        let child_ctx = ctx.child();

        for (name, value) in &definition.variables {
            child_ctx.set_variable(name.clone(), value.clone());
        }

        if let Some(Value::Object(params)) = step.config.get("params") {
            for (name, value) in params {
                let bound = match value {
                    Value::String(template) => {
                        Value::String(VariableResolver::resolve_string(template, &parent_eval_ctx))
                    }
                    other => other.clone(),
                };
                child_ctx.set_variable(name.clone(), bound);
            }
        }

        let (steps_executed, branch_error) =
            execute_steps(&self.registry, &definition.steps, &child_ctx).await?;

        ctx.merge_logs_from(&child_ctx);

        let mut outputs = HashMap::new();
        if let Some(Value::Object(output_mapping)) = step.config.get("outputs") {
            for (parent_name, child_var) in output_mapping {
                let Value::String(child_var_name) = child_var else {
                    continue;
                };
                // Missing child variables are silently dropped: a
                // sub-workflow that never set a mapped output produces no
                // entry rather than a null placeholder.
                if let Some(value) = child_ctx.get_variable(child_var_name) {
                    ctx.set_variable(parent_name.clone(), value.clone());
                    outputs.insert(parent_name.clone(), value);
                }
            }
        }

        let workflow_id = definition.id.clone().unwrap_or_else(|| definition.name.clone());
        let step_count = definition.steps.len();
        let steps_executed_count = steps_executed.len();

        let output = StepOutput::RefWorkflow(RefWorkflowOutput {
            workflow_id,
            workflow_name: definition.name,
            step_count,
            steps_executed,
            outputs,
        });

        Ok(match branch_error {
            Some(message) => StepResult::failed(&step.id, start, output, message),
            None => {
                let mut metrics = HashMap::new();
                metrics.insert("ref_workflow_step_count".to_string(), step_count as f64);
                metrics.insert("ref_workflow_steps_executed".to_string(), steps_executed_count as f64);
                StepResult::success(&step.id, start, output).with_metrics(metrics)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SetVariableExecutor;

    #[async_trait]
    impl Executor for SetVariableExecutor {
        fn type_name(&self) -> &str {
            "set_variable"
        }

        async fn execute(&self, step: &Step, ctx: &ExecutionContext) -> Result<StepResult, RuntimeError> {
            let name = step.config.get("name").and_then(Value::as_str).unwrap_or_default();
            let value = step.config.get("value").cloned().unwrap_or(Value::Null);
            ctx.set_variable(name, value);
            Ok(StepResult::success(&step.id, Utc::now(), StepOutput::None))
        }
    }

    fn registry() -> Arc<Registry> {
        let registry = Registry::new();
        registry.register(Arc::new(SetVariableExecutor)).unwrap();
        Arc::new(registry)
    }

    #[tokio::test]
    async fn child_context_does_not_see_parent_variables() {
        let executor = RefWorkflowExecutor::new(registry());
        let ctx = ExecutionContext::new("wf", "exec");
        ctx.set_variable("secret", Value::from("hidden"));

        let mut config = HashMap::new();
        config.insert(
            "workflow_definition".to_string(),
            serde_json::json!({
                "name": "child",
                "variables": {},
                "steps": [
                    {"id": "check", "step_type": "set_variable", "config": {"name": "saw_secret", "value": false}}
                ]
            }),
        );

        let step = Step::new("ref", "ref_workflow").with_config(config);
        let result = executor.execute(&step, &ctx).await.unwrap();
        assert_eq!(result.status, crate::types::Status::Success);
    }

    #[tokio::test]
    async fn params_are_resolved_against_the_parent_context() {
        let executor = RefWorkflowExecutor::new(registry());
        let ctx = ExecutionContext::new("wf", "exec");
        ctx.set_variable("user_id", Value::from("u-42"));

        let mut config = HashMap::new();
        config.insert(
            "workflow_definition".to_string(),
            serde_json::json!({
                "name": "child",
                "variables": {},
                "steps": [
                    {"id": "echo", "step_type": "set_variable", "config": {"name": "echoed", "value": "ok"}}
                ]
            }),
        );
        config.insert(
            "params".to_string(),
            serde_json::json!({"bound_user": "${user_id}"}),
        );
        config.insert(
            "outputs".to_string(),
            serde_json::json!({"final_user": "bound_user"}),
        );

        let step = Step::new("ref", "ref_workflow").with_config(config);
        let result = executor.execute(&step, &ctx).await.unwrap();
        let StepOutput::RefWorkflow(output) = result.output else {
            panic!("expected ref_workflow output")
        };
        assert_eq!(output.outputs.get("final_user"), Some(&Value::from("u-42")));
        assert_eq!(ctx.get_variable("final_user"), Some(Value::from("u-42")));
        assert_eq!(ctx.get_variable("uid"), None);
    }

    #[tokio::test]
    async fn missing_child_variable_is_silently_dropped_from_outputs() {
        let executor = RefWorkflowExecutor::new(registry());
        let ctx = ExecutionContext::new("wf", "exec");

        let mut config = HashMap::new();
        config.insert(
            "workflow_definition".to_string(),
            serde_json::json!({
                "name": "child",
                "variables": {},
                "steps": [
                    {"id": "noop", "step_type": "set_variable", "config": {"name": "unrelated", "value": 1}}
                ]
            }),
        );
        config.insert(
            "outputs".to_string(),
            serde_json::json!({"missing": "never_set"}),
        );

        let step = Step::new("ref", "ref_workflow").with_config(config);
        let result = executor.execute(&step, &ctx).await.unwrap();
        let StepOutput::RefWorkflow(output) = result.output else {
            panic!("expected ref_workflow output")
        };
        assert!(output.outputs.is_empty());
    }

    #[tokio::test]
    async fn disabled_step_in_the_definition_is_skipped_not_recorded_as_executed() {
        let executor = RefWorkflowExecutor::new(registry());
        let ctx = ExecutionContext::new("wf", "exec");

        let mut config = HashMap::new();
        config.insert(
            "workflow_definition".to_string(),
            serde_json::json!({
                "name": "child",
                "variables": {},
                "steps": [
                    {"id": "skipped", "step_type": "set_variable", "disabled": true, "config": {"name": "x", "value": 1}},
                    {"id": "ran", "step_type": "set_variable", "config": {"name": "y", "value": 2}}
                ]
            }),
        );

        let step = Step::new("ref", "ref_workflow").with_config(config);
        let result = executor.execute(&step, &ctx).await.unwrap();
        assert_eq!(result.status, crate::types::Status::Success);
        let StepOutput::RefWorkflow(output) = result.output else {
            panic!("expected ref_workflow output")
        };
        assert_eq!(output.steps_executed, vec!["ran".to_string()]);
    }

    #[tokio::test]
    async fn empty_steps_sequence_is_a_config_error() {
        let executor = RefWorkflowExecutor::new(registry());
        let ctx = ExecutionContext::new("wf", "exec");

        let mut config = HashMap::new();
        config.insert(
            "workflow_definition".to_string(),
            serde_json::json!({"name": "child", "variables": {}, "steps": []}),
        );

        let step = Step::new("ref", "ref_workflow").with_config(config);
        let result = executor.execute(&step, &ctx).await.unwrap();
        assert_eq!(result.status, crate::types::Status::Failed);
        assert!(result.error.unwrap().contains("non-empty"));
    }

    #[tokio::test]
    async fn success_metrics_report_step_count_and_steps_executed() {
        let executor = RefWorkflowExecutor::new(registry());
        let ctx = ExecutionContext::new("wf", "exec");

        let mut config = HashMap::new();
        config.insert(
            "workflow_definition".to_string(),
            serde_json::json!({
                "name": "child",
                "variables": {},
                "steps": [
                    {"id": "a", "step_type": "set_variable", "config": {"name": "a", "value": 1}},
                    {"id": "b", "step_type": "set_variable", "config": {"name": "b", "value": 2}}
                ]
            }),
        );

        let step = Step::new("ref", "ref_workflow").with_config(config);
        let result = executor.execute(&step, &ctx).await.unwrap();
        assert_eq!(result.status, crate::types::Status::Success);
        assert_eq!(result.metrics.get("ref_workflow_step_count"), Some(&2.0));
        assert_eq!(result.metrics.get("ref_workflow_steps_executed"), Some(&2.0));
    }

    #[tokio::test]
    async fn missing_workflow_definition_is_a_failed_result_not_an_error() {
        let executor = RefWorkflowExecutor::new(registry());
        let ctx = ExecutionContext::new("wf", "exec");

        let step = Step::new("ref", "ref_workflow");
        let result = executor.execute(&step, &ctx).await.unwrap();
        assert_eq!(result.status, crate::types::Status::Failed);
        assert!(result.error.is_some());
    }
}
