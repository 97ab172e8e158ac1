//! `save-checkpoint`: move the current task from pending to completed.

use serde_json::{Value, json};

use super::StepOutcome;
use crate::context::{TASKS_COMPLETED, TASKS_PENDING, WorkflowContext};
use crate::errors::WorkflowError;

/// No-op outside a task scope. Never fails.
pub fn save_checkpoint(
    ctx: &mut WorkflowContext,
    _input: Option<&Value>,
) -> Result<StepOutcome, WorkflowError> {
    let Some(task_id) = ctx.current_task_id().map(str::to_string) else {
        return Ok(StepOutcome::Continue);
    };

    let mut completed = ctx.get_string_list(TASKS_COMPLETED);
    let mut pending = ctx.get_string_list(TASKS_PENDING);

    if !completed.contains(&task_id) {
        completed.push(task_id.clone());
    }
    pending.retain(|id| *id != task_id);

    ctx.set(TASKS_COMPLETED, json!(completed));
    ctx.set(TASKS_PENDING, json!(pending));
    Ok(StepOutcome::Continue)
}
