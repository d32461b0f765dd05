//! Sequential step-sequence runner shared by the condition and
//! reference-workflow executors (spec §4.4, §4.5): both dispatch a list of
//! steps through the same registry under the same `on_error` discipline.

use chrono::Utc;
use tracing::warn;

use crate::context::ExecutionContext;
use crate::error::RuntimeError;
use crate::types::{OnError, Step, StepResult};

use super::registry::Registry;

/// Run `steps` in order against `ctx`. Returns the IDs of every step that
/// actually dispatched through the registry — a disabled step is recorded
/// in `ctx` as skipped but never added to this list — and, if the branch
/// was cut short by an aborting failure, that failure's message.
///
/// Per the error-strategy semantics in spec §8 property 6, a step whose
/// `on_error` is `continue` never itself fails the branch — only a
/// subsequent step failing under `abort` (the default) does. `continue`
/// exists purely to keep the branch running past a step whose outcome this
/// branch doesn't care about.
///
/// A step's transport-level dispatch failure (registry miss, adapter
/// failure) propagates immediately as `Err`, regardless of `on_error` —
/// that policy governs step *content* failure, not dispatch failure.
pub(super) async fn execute_steps(
    registry: &Registry,
    steps: &[Step],
    ctx: &ExecutionContext,
) -> Result<(Vec<String>, Option<String>), RuntimeError> {
    let mut steps_executed = Vec::with_capacity(steps.len());

    for step in steps {
        if step.disabled {
            ctx.notify_step_skipped(&step.id, "step disabled");
            ctx.record_result(StepResult::skipped(&step.id, Utc::now()))?;
            continue;
        }

        steps_executed.push(step.id.clone());
        ctx.notify_step_started(&step.id);
        let executor = registry.get_or_error(&step.step_type)?;
        let result = executor.execute(step, ctx).await?;
        let failed = result.status.is_failure();
        let error_message = result.error.clone();
        ctx.record_result(result)?;

        if failed {
            match step.on_error {
                OnError::Abort => {
                    warn!(step_id = %step.id, "step failed, aborting branch");
                    return Ok((
                        steps_executed,
                        Some(error_message.unwrap_or_else(|| format!("step {} failed", step.id))),
                    ));
                }
                OnError::Continue => {
                    warn!(step_id = %step.id, "step failed, continuing branch");
                }
                OnError::Skip => {
                    warn!(step_id = %step.id, "step failed, skipping rest of branch");
                    return Ok((steps_executed, None));
                }
            }
        }
    }

    Ok((steps_executed, None))
}
