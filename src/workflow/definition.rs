//! Workflow definition loading and validation.
//!
//! A workflow is a YAML file `<workflow-dir>/<name>.yaml` with an ordered list
//! of phases. Agent instructions can be inline (`prompt`) or come from
//! `<workflow-dir>/agents/<agent>.md`; gate instructions default to
//! `<workflow-dir>/gates/<gate>.md`.
//!
//! ```yaml
//! name: spec-implementation
//! phases:
//!   - name: analyze
//!     type: agent
//!     agent: analyzer
//!     schema: analysis
//!   - name: plan
//!     type: code
//!     handler: create-issues
//!   - name: execute
//!     type: per-task
//!     steps:
//!       - name: implement
//!         type: agent
//!         agent: implementer
//!         schema: implementation
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::state::INITIAL_PHASE;
use crate::errors::WorkflowError;
use crate::schemas::OutputSchema;

type Result<T> = std::result::Result<T, WorkflowError>;

/// Default context key for aggregated gate results.
pub const DEFAULT_GATES_OUTPUT: &str = "review";

/// One agent invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStep {
    pub name: String,
    /// Inline instructions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Name of an instruction file under `agents/`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// Context key for the validated output. Defaults to the step name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
}

impl AgentStep {
    pub fn output_key(&self) -> &str {
        self.output.as_deref().unwrap_or(&self.name)
    }

    pub fn output_schema(&self) -> Result<Option<OutputSchema>> {
        self.schema
            .as_deref()
            .map(|s| s.parse::<OutputSchema>())
            .transpose()
    }
}

/// A deterministic step run through the handler registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeStep {
    pub name: String,
    pub handler: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

/// Review gates with an optional fix loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatesStep {
    pub name: String,
    pub gates: Vec<GateDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<AgentStep>,
    /// Overrides the engine's configured attempt limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fix_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
}

impl GatesStep {
    pub fn output_key(&self) -> &str {
        self.output.as_deref().unwrap_or(DEFAULT_GATES_OUTPUT)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerTaskPhase {
    pub name: String,
    pub steps: Vec<PhaseDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
}

/// One entry in a workflow's phase list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PhaseDefinition {
    Agent(AgentStep),
    Code(CodeStep),
    Gates(GatesStep),
    PerTask(PerTaskPhase),
}

impl PhaseDefinition {
    pub fn name(&self) -> &str {
        match self {
            Self::Agent(s) => &s.name,
            Self::Code(s) => &s.name,
            Self::Gates(s) => &s.name,
            Self::PerTask(s) => &s.name,
        }
    }

    pub fn when(&self) -> Option<&str> {
        match self {
            Self::Agent(s) => s.when.as_deref(),
            Self::Code(s) => s.when.as_deref(),
            Self::Gates(s) => s.when.as_deref(),
            Self::PerTask(s) => s.when.as_deref(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Agent(_) => "agent",
            Self::Code(_) => "code",
            Self::Gates(_) => "gates",
            Self::PerTask(_) => "per-task",
        }
    }

    pub fn is_per_task(&self) -> bool {
        matches!(self, Self::PerTask(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub phases: Vec<PhaseDefinition>,
    /// Directory holding the YAML file and its `agents/` and `gates/` folders.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl WorkflowDefinition {
    /// Load `<workflow_dir>/<name>.yaml` (or `.yml`).
    pub fn load_named(workflow_dir: &Path, name: &str) -> Result<Self> {
        let yaml = workflow_dir.join(format!("{name}.yaml"));
        let path = if yaml.exists() {
            yaml
        } else {
            workflow_dir.join(format!("{name}.yml"))
        };
        Self::load(&path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| WorkflowError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::from_yaml(&content, base_dir)
    }

    pub fn from_yaml(content: &str, base_dir: PathBuf) -> Result<Self> {
        let mut definition: WorkflowDefinition =
            serde_yaml::from_str(content).map_err(|e| WorkflowError::InvalidDefinition {
                message: e.to_string(),
            })?;
        definition.base_dir = base_dir;
        definition.validate()?;
        Ok(definition)
    }

    /// Structural checks that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.phases.is_empty() {
            return Err(invalid(format!("workflow `{}` has no phases", self.name)));
        }

        let mut names = HashSet::new();
        for phase in &self.phases {
            if !names.insert(phase.name()) {
                return Err(invalid(format!("duplicate phase name `{}`", phase.name())));
            }
            validate_phase(phase, false)?;
        }
        Ok(())
    }

    pub fn phase_names(&self) -> Vec<&str> {
        self.phases.iter().map(PhaseDefinition::name).collect()
    }

    pub fn phase_index(&self, name: &str) -> Option<usize> {
        self.phases.iter().position(|p| p.name() == name)
    }

    /// Phase to resume at after a checkpoint taken at `current_phase`.
    ///
    /// `init` maps to the first phase; `None` means every phase completed.
    pub fn phase_after(&self, current_phase: &str) -> Result<Option<&str>> {
        if current_phase == INITIAL_PHASE {
            return Ok(self.phases.first().map(PhaseDefinition::name));
        }
        let index = self
            .phase_index(current_phase)
            .ok_or_else(|| WorkflowError::UnknownPhase {
                name: current_phase.to_string(),
            })?;
        Ok(self.phases.get(index + 1).map(PhaseDefinition::name))
    }

    /// Names of every phase up to and including `current_phase`; empty for `init`.
    pub fn phases_through(&self, current_phase: &str) -> Result<Vec<String>> {
        if current_phase == INITIAL_PHASE {
            return Ok(Vec::new());
        }
        let index = self
            .phase_index(current_phase)
            .ok_or_else(|| WorkflowError::UnknownPhase {
                name: current_phase.to_string(),
            })?;
        Ok(self.phases[..=index]
            .iter()
            .map(|p| p.name().to_string())
            .collect())
    }

    pub fn first_per_task_index(&self) -> Option<usize> {
        self.phases.iter().position(PhaseDefinition::is_per_task)
    }

    /// Instructions for an agent step: inline prompt or `agents/<agent>.md`.
    pub fn agent_instructions(&self, step: &AgentStep) -> Result<String> {
        if let Some(prompt) = &step.prompt {
            return Ok(prompt.clone());
        }
        let agent = step.agent.as_deref().unwrap_or(&step.name);
        read_instructions(&self.base_dir.join("agents").join(format!("{agent}.md")))
    }

    /// Instructions for a gate: inline prompt or `gates/<name>.md`.
    pub fn gate_instructions(&self, gate: &GateDefinition) -> Result<String> {
        if let Some(prompt) = &gate.prompt {
            return Ok(prompt.clone());
        }
        read_instructions(&self.base_dir.join("gates").join(format!("{}.md", gate.name)))
    }
}

fn validate_phase(phase: &PhaseDefinition, nested: bool) -> Result<()> {
    match phase {
        PhaseDefinition::Agent(step) => validate_agent_step(step),
        PhaseDefinition::Code(step) => {
            if step.handler.trim().is_empty() {
                return Err(invalid(format!("phase `{}` has an empty handler", step.name)));
            }
            Ok(())
        }
        PhaseDefinition::Gates(step) => {
            if step.gates.is_empty() {
                return Err(invalid(format!("phase `{}` defines no gates", step.name)));
            }
            if let Some(fix) = &step.fix {
                validate_agent_step(fix)?;
            }
            Ok(())
        }
        PhaseDefinition::PerTask(per_task) => {
            if nested {
                return Err(invalid(format!(
                    "per-task phase `{}` cannot be nested inside another per-task phase",
                    per_task.name
                )));
            }
            if per_task.steps.is_empty() {
                return Err(invalid(format!(
                    "per-task phase `{}` has no steps",
                    per_task.name
                )));
            }
            per_task
                .steps
                .iter()
                .try_for_each(|step| validate_phase(step, true))
        }
    }
}

fn validate_agent_step(step: &AgentStep) -> Result<()> {
    step.output_schema()?;
    if step.prompt.is_none() && step.agent.is_none() {
        return Err(invalid(format!(
            "agent step `{}` needs either `prompt` or `agent`",
            step.name
        )));
    }
    Ok(())
}

fn read_instructions(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| WorkflowError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn invalid(message: String) -> WorkflowError {
    WorkflowError::InvalidDefinition { message }
}
