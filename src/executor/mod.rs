//! Executor dispatch: the uniform `{type_name, init, execute, cleanup}`
//! contract (spec §4.1) and the registry that resolves a step's declared
//! `step_type` to a concrete implementation.

mod base;
mod branch;
mod condition;
mod database;
mod http;
mod mq;
mod ref_workflow;
mod registry;
mod tool;

pub use base::ExecutorBase;
pub use condition::ConditionExecutor;
pub use database::{DatabaseAdapter, DatabaseExecutor, DbAction, DbRequest, InMemoryDatabaseAdapter};
pub use http::{HttpAdapter, HttpExecutor, HttpRequest};
pub use mq::{InMemoryMqAdapter, MqAction, MqAdapter, MqExecutor, MqRequest};
pub use ref_workflow::RefWorkflowExecutor;
pub use registry::{default_registry, Registry};
pub use tool::{StubToolAdapter, ToolAdapter, ToolExecutor, ToolRequest};

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::error::RuntimeError;
use crate::types::{Step, StepResult};

/// Polymorphic dispatch without inheritance (spec §9): every executor
/// implements the same trait, and [`ExecutorBase`] factors out the
/// identifier + config storage each implementation would otherwise
/// duplicate, as a value member rather than a parent class.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Stable identifier matched against a step's `step_type`.
    fn type_name(&self) -> &str;

    /// Called once before any `execute`; receives executor-level defaults.
    /// The default implementation does nothing.
    async fn init(&self, _config: &HashMap<String, Value>) -> Result<(), RuntimeError> {
        Ok(())
    }

    /// Run the step and produce its result. Step-level `config` entries
    /// override whatever `init` stored, per spec §6.
    async fn execute(
        &self,
        step: &Step,
        ctx: &ExecutionContext,
    ) -> Result<StepResult, RuntimeError>;

    /// Called once at shutdown; releases any resources acquired in `init`.
    async fn cleanup(&self) -> Result<(), RuntimeError> {
        Ok(())
    }
}
