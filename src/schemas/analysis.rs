//! Analysis phase output: the structured task list derived from a spec.

use serde::{Deserialize, Serialize};

use super::{PhaseContract, require_non_empty};
use crate::errors::WorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

/// One unit of work for the per-task loop.
///
/// `id` may be blank in raw agent output; the `create-issues` handler assigns
/// positional ids before any task is executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinition {
    #[serde(default)]
    pub id: String,
    pub title: String,
    pub description: String,
    pub requirements: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub estimated_complexity: Complexity,
    #[serde(default)]
    pub file_paths: Vec<String>,
}

impl TaskDefinition {
    pub fn new(id: &str, title: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            requirements: Vec::new(),
            dependencies: Vec::new(),
            estimated_complexity: Complexity::Medium,
            file_paths: Vec::new(),
        }
    }

    pub fn has_id(&self) -> bool {
        !self.id.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub id: String,
    pub description: String,
    pub source: String,
    pub testable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechStack {
    pub language: String,
    pub test_framework: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_tool: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub tasks: Vec<TaskDefinition>,
    pub requirements: Vec<Requirement>,
    pub constraints: Vec<String>,
    pub tech_stack: TechStack,
}

impl AnalysisResult {
    pub fn task(&self, id: &str) -> Option<&TaskDefinition> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn task_ids(&self) -> Vec<String> {
        self.tasks.iter().map(|t| t.id.clone()).collect()
    }
}

impl PhaseContract for AnalysisResult {
    const NAME: &'static str = "analysis";

    fn validate(&self) -> Result<(), WorkflowError> {
        if self.tasks.is_empty() {
            return Err(WorkflowError::contract(
                Self::NAME,
                "tasks",
                "must contain at least one task",
            ));
        }
        for (i, task) in self.tasks.iter().enumerate() {
            require_non_empty(Self::NAME, &format!("tasks[{i}].title"), &task.title)?;
            require_non_empty(
                Self::NAME,
                &format!("tasks[{i}].description"),
                &task.description,
            )?;
        }
        for (i, req) in self.requirements.iter().enumerate() {
            require_non_empty(Self::NAME, &format!("requirements[{i}].id"), &req.id)?;
            require_non_empty(
                Self::NAME,
                &format!("requirements[{i}].description"),
                &req.description,
            )?;
            require_non_empty(Self::NAME, &format!("requirements[{i}].source"), &req.source)?;
        }
        require_non_empty(Self::NAME, "techStack.language", &self.tech_stack.language)?;
        require_non_empty(
            Self::NAME,
            "techStack.testFramework",
            &self.tech_stack.test_framework,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn valid() -> Value {
        json!({
            "tasks": [{
                "id": "task-001",
                "title": "Add parser",
                "description": "Parse the config format",
                "requirements": ["req-1"],
                "estimatedComplexity": "medium"
            }],
            "requirements": [
                {"id": "req-1", "description": "Parses config", "source": "spec", "testable": true}
            ],
            "constraints": [],
            "techStack": {"language": "Rust", "testFramework": "cargo test"}
        })
    }

    #[test]
    fn test_valid_analysis_fills_defaults() {
        let analysis = AnalysisResult::from_value(&valid()).unwrap();
        assert_eq!(analysis.tasks[0].dependencies, Vec::<String>::new());
        assert_eq!(analysis.tasks[0].file_paths, Vec::<String>::new());
        assert_eq!(analysis.tasks[0].estimated_complexity, Complexity::Medium);
        assert!(analysis.tech_stack.build_tool.is_none());
    }

    #[test]
    fn test_missing_id_is_accepted_for_later_normalization() {
        let mut value = valid();
        value["tasks"][0].as_object_mut().unwrap().remove("id");
        let analysis = AnalysisResult::from_value(&value).unwrap();
        assert!(!analysis.tasks[0].has_id());
    }

    #[test]
    fn test_empty_task_list_rejected() {
        let mut value = valid();
        value["tasks"] = json!([]);
        let err = AnalysisResult::from_value(&value).unwrap_err();
        assert!(err.to_string().contains("at least one task"));
    }

    #[test]
    fn test_complexity_outside_enum_rejected() {
        let mut value = valid();
        value["tasks"][0]["estimatedComplexity"] = json!("extreme");
        let err = AnalysisResult::from_value(&value).unwrap_err();
        assert!(matches!(err, WorkflowError::ContractViolation { .. }));
    }

    #[test]
    fn test_empty_title_names_field_path() {
        let mut value = valid();
        value["tasks"][0]["title"] = json!("");
        let err = AnalysisResult::from_value(&value).unwrap_err();
        assert!(err.to_string().contains("tasks[0].title"));
    }

    #[test]
    fn test_missing_tech_stack_rejected() {
        let mut value = valid();
        value.as_object_mut().unwrap().remove("techStack");
        let err = AnalysisResult::from_value(&value).unwrap_err();
        assert!(err.to_string().contains("techStack"));
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let mut value = valid();
        value["notes"] = json!("extra commentary");
        assert!(AnalysisResult::from_value(&value).is_ok());
    }

    #[test]
    fn test_task_lookup() {
        let analysis = AnalysisResult::from_value(&valid()).unwrap();
        assert!(analysis.task("task-001").is_some());
        assert!(analysis.task("task-999").is_none());
        assert_eq!(analysis.task_ids(), vec!["task-001".to_string()]);
    }
}
