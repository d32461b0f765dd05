//! Value objects with no behavior beyond constructors and serialization
//! tags: [`Step`], [`StepResult`], [`Condition`], [`ToolDefinition`], and
//! the executor-specific output variants.

mod output;
mod result;
mod step;
mod tool;

pub use output::{ConditionOutput, DbResult, HttpResponse, MqResult, RefWorkflowOutput, StepOutput, ToolResult};
pub use result::{bool_to_float, Status, StepResult};
pub use step::{Condition, OnError, Step};
pub use tool::ToolDefinition;
