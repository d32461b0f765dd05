//! Condition executor: evaluates a boolean expression and runs exactly one
//! branch, sequentially (spec §4.4).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::context::ExecutionContext;
use crate::error::RuntimeError;
use crate::expression::ExpressionEvaluator;
use crate::types::{bool_to_float, ConditionOutput, OnError, Step, StepOutput, StepResult};

use super::base::ExecutorBase;
use super::branch::execute_steps;
use super::registry::Registry;
use super::Executor;

/// Runs a step's `then` branch when its expression evaluates `true`, its
/// `else` branch otherwise. Holds the registry it dispatches nested steps
/// through.
pub struct ConditionExecutor {
    base: ExecutorBase,
    registry: Arc<Registry>,
}

impl ConditionExecutor {
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            base: ExecutorBase::new("condition"),
            registry,
        }
    }

}

#[async_trait]
impl Executor for ConditionExecutor {
    fn type_name(&self) -> &str {
        self.base.type_name()
    }

    async fn init(&self, config: &HashMap<String, serde_json::Value>) -> Result<(), RuntimeError> {
        self.base.store_config(config.clone());
        Ok(())
    }

    async fn execute(&self, step: &Step, ctx: &ExecutionContext) -> Result<StepResult, RuntimeError> {
        let start = Utc::now();

        if step.disabled {
            return Ok(StepResult::skipped(&step.id, start));
        }

        let condition = match step.condition.as_ref() {
            Some(condition) => condition,
            None => {
                let err = RuntimeError::config("condition step is missing its condition block")
                    .with_step_id(step.id.clone());
                return Ok(StepResult::failed(&step.id, start, StepOutput::None, err.to_string()));
            }
        };

        let eval_ctx = ctx.to_evaluation_context();
        let branch_result = match ExpressionEvaluator::evaluate_string(&condition.expression, &eval_ctx) {
            Ok(result) => result,
            Err(err) => {
                return Ok(StepResult::failed(&step.id, start, StepOutput::None, err.to_string()));
            }
        };

        let branch = if branch_result { &condition.then } else { &condition.r#else };
        let branch_taken = if branch_result { "then" } else { "else" };

        let (steps_executed, branch_error) = execute_steps(&self.registry, branch, ctx).await?;

        let mut metrics = HashMap::new();
        metrics.insert("condition_result".to_string(), bool_to_float(branch_result));
        metrics.insert("branch_steps_count".to_string(), steps_executed.len() as f64);

        let output = StepOutput::Condition(ConditionOutput {
            expression: condition.expression.clone(),
            result: branch_result,
            branch_taken: branch_taken.to_string(),
            steps_executed,
        });

        Ok(match branch_error {
            Some(message) => StepResult::failed(&step.id, start, output, message).with_metrics(metrics),
            None => StepResult::success(&step.id, start, output).with_metrics(metrics),
        })
    }
}
