//! Execution context shared by the phases of one workflow run.
//!
//! The context is an insertion-ordered map of JSON values plus an optional
//! "current task" marker. Per-task work happens in a child context produced
//! by [`WorkflowContext::with_task`]; the child owns a copy of the parent's
//! variables and nothing it writes flows back implicitly. The engine copies
//! the task-tracking lists upward with
//! [`WorkflowContext::reconcile_task_tracking`].

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::schemas::TaskDefinition;

pub const TASKS_COMPLETED: &str = "tasksCompleted";
pub const TASKS_PENDING: &str = "tasksPending";
pub const TASK_IDS: &str = "taskIds";
pub const ANALYSIS: &str = "analysis";

#[derive(Debug, Clone, Default)]
pub struct WorkflowContext {
    variables: Map<String, Value>,
    current_task: Option<TaskDefinition>,
}

impl WorkflowContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rehydrate a context from checkpointed variables.
    pub fn from_variables(variables: Map<String, Value>) -> Self {
        Self {
            variables,
            current_task: None,
        }
    }

    /// Missing keys yield `None`, never an error.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    /// Typed read. Absent or mistyped values yield `None`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Read a list of strings, treating absent or malformed values as empty.
    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        self.get_as::<Vec<String>>(key).unwrap_or_default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.variables.insert(key.into(), value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.variables.contains_key(key)
    }

    /// Resolve a dotted path such as `review.hasActionableIssues`.
    pub fn lookup_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Child context scoped to `task`. The parent is left untouched.
    pub fn with_task(&self, task: TaskDefinition) -> Self {
        Self {
            variables: self.variables.clone(),
            current_task: Some(task),
        }
    }

    pub fn current_task(&self) -> Option<&TaskDefinition> {
        self.current_task.as_ref()
    }

    pub fn current_task_id(&self) -> Option<&str> {
        self.current_task.as_ref().map(|t| t.id.as_str())
    }

    pub fn variables(&self) -> &Map<String, Value> {
        &self.variables
    }

    pub fn into_variables(self) -> Map<String, Value> {
        self.variables
    }

    /// Copy `tasksCompleted` and `tasksPending` from a task child into `self`.
    pub fn reconcile_task_tracking(&mut self, child: &WorkflowContext) {
        for key in [TASKS_COMPLETED, TASKS_PENDING] {
            if let Some(value) = child.get(key) {
                self.set(key, value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task(id: &str) -> TaskDefinition {
        TaskDefinition::new(id, "Title", "Description")
    }

    #[test]
    fn test_get_missing_is_none() {
        let ctx = WorkflowContext::new();
        assert!(ctx.get("nope").is_none());
        assert!(ctx.get_string_list("nope").is_empty());
    }

    #[test]
    fn test_set_overwrites_and_preserves_order() {
        let mut ctx = WorkflowContext::new();
        ctx.set("b", json!(1));
        ctx.set("a", json!(2));
        ctx.set("b", json!(3));
        let keys: Vec<&String> = ctx.variables().keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(ctx.get("b"), Some(&json!(3)));
    }

    #[test]
    fn test_get_string_list_malformed_is_empty() {
        let mut ctx = WorkflowContext::new();
        ctx.set(TASKS_PENDING, json!("task-001"));
        assert!(ctx.get_string_list(TASKS_PENDING).is_empty());
        ctx.set(TASKS_PENDING, json!(["task-001", 2]));
        assert!(ctx.get_string_list(TASKS_PENDING).is_empty());
    }

    #[test]
    fn test_with_task_does_not_mutate_parent() {
        let mut parent = WorkflowContext::new();
        parent.set("shared", json!("parent"));

        let mut child = parent.with_task(task("task-001"));
        child.set("shared", json!("child"));
        child.set("childOnly", json!(true));

        assert_eq!(parent.get("shared"), Some(&json!("parent")));
        assert!(parent.get("childOnly").is_none());
        assert!(parent.current_task_id().is_none());
        assert_eq!(child.current_task_id(), Some("task-001"));
    }

    #[test]
    fn test_child_sees_parent_variables() {
        let mut parent = WorkflowContext::new();
        parent.set("specPath", json!("spec.md"));
        let child = parent.with_task(task("task-001"));
        assert_eq!(child.get("specPath"), Some(&json!("spec.md")));
    }

    #[test]
    fn test_reconcile_copies_only_tracking_lists() {
        let mut parent = WorkflowContext::new();
        parent.set(TASKS_PENDING, json!(["task-001", "task-002"]));
        parent.set(TASKS_COMPLETED, json!([]));

        let mut child = parent.with_task(task("task-001"));
        child.set(TASKS_PENDING, json!(["task-002"]));
        child.set(TASKS_COMPLETED, json!(["task-001"]));
        child.set("implementation", json!({"commits": []}));

        parent.reconcile_task_tracking(&child);
        assert_eq!(parent.get_string_list(TASKS_PENDING), vec!["task-002"]);
        assert_eq!(parent.get_string_list(TASKS_COMPLETED), vec!["task-001"]);
        assert!(parent.get("implementation").is_none());
    }

    #[test]
    fn test_lookup_path_nested() {
        let mut ctx = WorkflowContext::new();
        ctx.set("review", json!({"hasActionableIssues": true, "issues": [{"severity": "minor"}]}));
        assert_eq!(ctx.lookup_path("review.hasActionableIssues"), Some(&json!(true)));
        assert_eq!(ctx.lookup_path("review.issues.0.severity"), Some(&json!("minor")));
        assert!(ctx.lookup_path("review.missing").is_none());
        assert!(ctx.lookup_path("absent.path").is_none());
    }

    #[test]
    fn test_from_variables_has_no_current_task() {
        let mut vars = Map::new();
        vars.insert("x".into(), json!(1));
        let ctx = WorkflowContext::from_variables(vars);
        assert!(ctx.current_task().is_none());
        assert_eq!(ctx.get_as::<i64>("x"), Some(1));
    }
}
