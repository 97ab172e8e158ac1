//! `create-issues`: normalize task ids and initialize task tracking.

use serde_json::{Value, json};
use std::collections::HashSet;
use tracing::debug;

use super::{CREATE_ISSUES, StepOutcome};
use crate::context::{ANALYSIS, TASK_IDS, TASKS_COMPLETED, TASKS_PENDING, WorkflowContext};
use crate::errors::WorkflowError;
use crate::schemas::{AnalysisResult, PhaseContract};

/// Positional id for the task at zero-based `index`.
pub fn positional_task_id(index: usize) -> String {
    format!("task-{:03}", index + 1)
}

/// Requires `analysis` in the context. Blank ids become `task-NNN` by
/// position; the normalized analysis is written back together with
/// `taskIds`, an empty `tasksCompleted` and `tasksPending = taskIds`.
pub fn create_issues(
    ctx: &mut WorkflowContext,
    _input: Option<&Value>,
) -> Result<StepOutcome, WorkflowError> {
    let raw = ctx
        .get(ANALYSIS)
        .ok_or_else(|| WorkflowError::missing(CREATE_ISSUES, ANALYSIS))?;
    let mut analysis = AnalysisResult::from_value(raw)?;

    for (index, task) in analysis.tasks.iter_mut().enumerate() {
        if !task.has_id() {
            task.id = positional_task_id(index);
        }
    }

    let mut seen = HashSet::new();
    for (index, task) in analysis.tasks.iter().enumerate() {
        if !seen.insert(task.id.as_str()) {
            return Err(WorkflowError::contract(
                AnalysisResult::NAME,
                format!("tasks[{index}].id"),
                format!("duplicate task id `{}`", task.id),
            ));
        }
    }

    let task_ids = analysis.task_ids();
    debug!(count = task_ids.len(), "Normalized task ids");

    ctx.set(ANALYSIS, analysis.to_value()?);
    ctx.set(TASK_IDS, json!(task_ids));
    ctx.set(TASKS_COMPLETED, json!([]));
    ctx.set(TASKS_PENDING, json!(task_ids));
    Ok(StepOutcome::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis_with_ids(ids: &[Option<&str>]) -> Value {
        let tasks: Vec<Value> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let mut task = json!({
                    "title": format!("Task {i}"),
                    "description": "Do the thing",
                    "requirements": [],
                    "estimatedComplexity": "low"
                });
                if let Some(id) = id {
                    task["id"] = json!(id);
                }
                task
            })
            .collect();
        json!({
            "tasks": tasks,
            "requirements": [],
            "constraints": [],
            "techStack": {"language": "Rust", "testFramework": "cargo test"}
        })
    }

    #[test]
    fn test_missing_analysis_names_key_and_handler() {
        let mut ctx = WorkflowContext::new();
        let err = create_issues(&mut ctx, None).unwrap_err();
        assert!(matches!(err, WorkflowError::MissingPrecondition { .. }));
        let msg = err.to_string();
        assert!(msg.contains("analysis"));
        assert!(msg.contains("create-issues"));
    }

    #[test]
    fn test_assigns_positional_ids() {
        let mut ctx = WorkflowContext::new();
        ctx.set(ANALYSIS, analysis_with_ids(&[None, None, None]));
        create_issues(&mut ctx, None).unwrap();
        assert_eq!(
            ctx.get_string_list(TASK_IDS),
            vec!["task-001", "task-002", "task-003"]
        );
        assert_eq!(ctx.get_string_list(TASKS_PENDING), ctx.get_string_list(TASK_IDS));
        assert!(ctx.get_string_list(TASKS_COMPLETED).is_empty());
    }

    #[test]
    fn test_keeps_existing_ids_and_fills_gaps_by_position() {
        let mut ctx = WorkflowContext::new();
        ctx.set(ANALYSIS, analysis_with_ids(&[Some("custom-id"), Some(""), None]));
        create_issues(&mut ctx, None).unwrap();
        assert_eq!(
            ctx.get_string_list(TASK_IDS),
            vec!["custom-id", "task-002", "task-003"]
        );
        let analysis: AnalysisResult = ctx.get_as(ANALYSIS).unwrap();
        assert_eq!(analysis.tasks[1].id, "task-002");
    }

    #[test]
    fn test_duplicate_ids_after_normalization_rejected() {
        let mut ctx = WorkflowContext::new();
        ctx.set(ANALYSIS, analysis_with_ids(&[None, Some("task-001")]));
        let err = create_issues(&mut ctx, None).unwrap_err();
        assert!(err.to_string().contains("duplicate task id"));
    }

    #[test]
    fn test_malformed_analysis_is_contract_violation() {
        let mut ctx = WorkflowContext::new();
        ctx.set(ANALYSIS, json!({"tasks": "none"}));
        let err = create_issues(&mut ctx, None).unwrap_err();
        assert!(matches!(err, WorkflowError::ContractViolation { .. }));
    }

    #[test]
    fn test_positional_id_padding() {
        assert_eq!(positional_task_id(0), "task-001");
        assert_eq!(positional_task_id(41), "task-042");
        assert_eq!(positional_task_id(999), "task-1000");
    }
}
