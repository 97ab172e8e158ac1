//! Phase execution.
//!
//! The engine walks a [`WorkflowDefinition`] in order against one root
//! [`WorkflowContext`]. Agent phases go through [`AgentQuery`], code phases
//! through the [`HandlerRegistry`], gates phases fan out one agent query per
//! gate and may loop through a fix agent, and per-task phases run their steps
//! once per pending task in a child context.
//!
//! A blocker anywhere stops the run with [`WorkflowStatus::Paused`]. Any other
//! failure inside a phase yields [`WorkflowStatus::Failed`]. Only setup
//! problems (unreadable definition or spec, unknown resume phase) are returned
//! as `Err`.

use std::path::Path;
use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::definition::{
    AgentStep, CodeStep, GatesStep, PerTaskPhase, PhaseDefinition, WorkflowDefinition,
};
use super::state::{Checkpoint, INITIAL_PHASE, PriorState, WorkflowResult, WorkflowStatus};
use super::template::{evaluate_condition, render};
use crate::agent::{AgentQuery, AgentRequest, AgentResponse};
use crate::audit::{AuditEntry, AuditEvent};
use crate::compliance::audit_compliance;
use crate::config::EngineConfig;
use crate::context::{ANALYSIS, TASKS_COMPLETED, TASKS_PENDING, WorkflowContext};
use crate::errors::WorkflowError;
use crate::handlers::{HandlerRegistry, SAVE_CHECKPOINT, StepOutcome, create_default_registry};
use crate::review::{AggregatedReviewResult, aggregate_gate_results};
use crate::schemas::{AnalysisResult, OutputSchema, PhaseContract, ReviewResult, VerifyResult};
use crate::session::{NullSink, SessionSink};
use crate::signals::{AgentSignals, blocker_from_payload, extract_signals};

type Result<T> = std::result::Result<T, WorkflowError>;

/// Context key for the compliance report derived from verification output.
pub const COMPLIANCE: &str = "compliance";
/// Default context key for fix agent output.
pub const FIX_OUTPUT: &str = "fix";

pub const SPEC_PATH: &str = "specPath";
pub const SPEC_CONTENT: &str = "specContent";
pub const WORKING_DIRECTORY: &str = "workingDirectory";

pub struct WorkflowEngine {
    agent: Arc<dyn AgentQuery>,
    registry: HandlerRegistry,
    config: EngineConfig,
    sink: Arc<dyn SessionSink>,
}

impl WorkflowEngine {
    /// Engine with the built-in handlers and no persistence.
    pub fn new(agent: Arc<dyn AgentQuery>, config: EngineConfig) -> Self {
        Self {
            agent,
            registry: create_default_registry(),
            config,
            sink: Arc::new(NullSink),
        }
    }

    pub fn with_registry(mut self, registry: HandlerRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn SessionSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn registry_mut(&mut self) -> &mut HandlerRegistry {
        &mut self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn load_workflow(&self, workflow_name: &str) -> Result<WorkflowDefinition> {
        WorkflowDefinition::load_named(&self.config.workflow_dir, workflow_name)
    }

    /// Run `<workflow_dir>/<workflow_name>.yaml` from its first phase.
    pub async fn run(&self, workflow_name: &str, spec_path: &Path) -> Result<WorkflowResult> {
        let definition = self.load_workflow(workflow_name)?;
        self.run_definition(&definition, spec_path).await
    }

    pub async fn run_definition(
        &self,
        definition: &WorkflowDefinition,
        spec_path: &Path,
    ) -> Result<WorkflowResult> {
        let spec_content =
            std::fs::read_to_string(spec_path).map_err(|source| WorkflowError::Io {
                path: spec_path.to_path_buf(),
                source,
            })?;

        let mut ctx = WorkflowContext::new();
        ctx.set(SPEC_PATH, json!(spec_path.display().to_string()));
        ctx.set(SPEC_CONTENT, json!(spec_content));
        ctx.set(
            WORKING_DIRECTORY,
            json!(self.config.working_dir.display().to_string()),
        );

        info!(
            workflow = %definition.name,
            phases = definition.phases.len(),
            dry_run = self.config.dry_run,
            "Starting workflow"
        );
        Ok(self.execute(definition, ctx, Vec::new(), 0).await)
    }

    /// Continue a run from `from_phase` with previously saved state.
    pub async fn resume(
        &self,
        workflow_name: &str,
        prior: PriorState,
        from_phase: &str,
    ) -> Result<WorkflowResult> {
        let definition = self.load_workflow(workflow_name)?;
        self.resume_definition(&definition, prior, from_phase).await
    }

    pub async fn resume_definition(
        &self,
        definition: &WorkflowDefinition,
        prior: PriorState,
        from_phase: &str,
    ) -> Result<WorkflowResult> {
        let start = definition
            .phase_index(from_phase)
            .ok_or_else(|| WorkflowError::UnknownPhase {
                name: from_phase.to_string(),
            })?;

        info!(
            workflow = %definition.name,
            from_phase,
            completed = prior.completed_phases.len(),
            "Resuming workflow"
        );
        let ctx = WorkflowContext::from_variables(prior.variables);
        Ok(self
            .execute(definition, ctx, prior.completed_phases, start)
            .await)
    }

    async fn execute(
        &self,
        definition: &WorkflowDefinition,
        mut ctx: WorkflowContext,
        mut completed: Vec<String>,
        start: usize,
    ) -> WorkflowResult {
        for phase in &definition.phases[start..] {
            let name = phase.name();

            if self.config.dry_run && phase.is_per_task() {
                info!(phase = name, "Dry run: stopping before per-task phase");
                break;
            }

            match self.run_phase(definition, phase, &mut ctx, &completed).await {
                Ok(PhaseOutcome::Completed) => completed.push(name.to_string()),
                Ok(PhaseOutcome::Skipped) => completed.push(name.to_string()),
                Ok(PhaseOutcome::Blocked(reason)) => {
                    warn!(phase = name, blocker = %reason, "Workflow paused on blocker");
                    let entry = AuditEntry::new(name, AuditEvent::Blocked).with_detail(&reason);
                    if let Err(e) = self.sink.record_audit(&entry) {
                        return failed(ctx, completed, WorkflowError::from(e));
                    }
                    return WorkflowResult {
                        status: WorkflowStatus::Paused,
                        completed_phases: completed,
                        outputs: ctx.into_variables(),
                        blocker_details: Some(reason),
                        error: None,
                    };
                }
                Err(err) => {
                    warn!(phase = name, error = %err, "Phase failed");
                    let entry =
                        AuditEntry::new(name, AuditEvent::Failed).with_detail(err.to_string());
                    let _ = self.sink.record_audit(&entry);
                    return failed(ctx, completed, err);
                }
            }
        }

        info!(completed = completed.len(), "Workflow complete");
        WorkflowResult {
            status: WorkflowStatus::Complete,
            completed_phases: completed,
            outputs: ctx.into_variables(),
            blocker_details: None,
            error: None,
        }
    }

    async fn run_phase(
        &self,
        definition: &WorkflowDefinition,
        phase: &PhaseDefinition,
        ctx: &mut WorkflowContext,
        completed: &[String],
    ) -> Result<PhaseOutcome> {
        let name = phase.name();

        if let Some(condition) = phase.when()
            && !evaluate_condition(condition, ctx)
        {
            info!(phase = name, condition, "Skipping phase");
            self.audit(
                AuditEntry::new(name, AuditEvent::PhaseSkipped)
                    .with_detail(format!("condition `{}` is false", condition)),
            )?;
            return Ok(PhaseOutcome::Skipped);
        }

        info!(phase = name, kind = phase.kind(), "Starting phase");
        self.audit(AuditEntry::new(name, AuditEvent::PhaseStarted))?;

        let outcome = match phase {
            PhaseDefinition::PerTask(per_task) => {
                self.run_per_task(definition, per_task, ctx, completed).await?
            }
            step => self.run_step(definition, step, ctx).await?,
        };

        match outcome {
            StepOutcome::Continue => {
                self.audit(AuditEntry::new(name, AuditEvent::PhaseCompleted))?;
                info!(phase = name, "Phase complete");
                Ok(PhaseOutcome::Completed)
            }
            StepOutcome::Blocked(reason) => Ok(PhaseOutcome::Blocked(reason)),
        }
    }

    /// One agent, code or gates step against `ctx`.
    async fn run_step(
        &self,
        definition: &WorkflowDefinition,
        step: &PhaseDefinition,
        ctx: &mut WorkflowContext,
    ) -> Result<StepOutcome> {
        match step {
            PhaseDefinition::Agent(agent) => self.run_agent_step(definition, agent, ctx).await,
            PhaseDefinition::Code(code) => self.run_code_step(code, ctx),
            PhaseDefinition::Gates(gates) => self.run_gates_step(definition, gates, ctx).await,
            PhaseDefinition::PerTask(nested) => Err(WorkflowError::InvalidDefinition {
                message: format!("per-task phase `{}` cannot be nested", nested.name),
            }),
        }
    }

    async fn run_per_task(
        &self,
        definition: &WorkflowDefinition,
        phase: &PerTaskPhase,
        ctx: &mut WorkflowContext,
        completed: &[String],
    ) -> Result<StepOutcome> {
        let pending = ctx.get_string_list(TASKS_PENDING);
        let analysis: Option<AnalysisResult> = ctx.get_as(ANALYSIS);
        let checkpoint_phase = completed
            .last()
            .map(String::as_str)
            .unwrap_or(INITIAL_PHASE)
            .to_string();
        let total = pending.len();

        if total == 0 {
            info!(phase = %phase.name, "No pending tasks");
        }

        for (index, task_id) in pending.iter().enumerate() {
            let task = analysis
                .as_ref()
                .and_then(|a| a.task(task_id))
                .cloned()
                .ok_or_else(|| WorkflowError::UnknownTask {
                    id: task_id.clone(),
                })?;

            info!(
                phase = %phase.name,
                task = %task_id,
                "[{}/{}] {}",
                index + 1,
                total,
                task.title
            );
            self.audit(AuditEntry::new(&phase.name, AuditEvent::TaskStarted).with_task(task_id))?;

            let mut child = ctx.with_task(task);
            for step in &phase.steps {
                if let Some(condition) = step.when()
                    && !evaluate_condition(condition, &child)
                {
                    debug!(task = %task_id, step = step.name(), condition, "Skipping step");
                    continue;
                }
                debug!(task = %task_id, step = step.name(), "Running step");
                if let StepOutcome::Blocked(reason) =
                    self.run_step(definition, step, &mut child).await?
                {
                    warn!(task = %task_id, step = step.name(), "Task blocked");
                    return Ok(StepOutcome::Blocked(reason));
                }
            }

            let save = self.registry.get(SAVE_CHECKPOINT)?;
            if let StepOutcome::Blocked(reason) = save(&mut child, None)? {
                return Ok(StepOutcome::Blocked(reason));
            }
            ctx.reconcile_task_tracking(&child);

            self.sink
                .save_checkpoint(&Checkpoint::from_variables(
                    &checkpoint_phase,
                    ctx.variables().clone(),
                ))
                .map_err(WorkflowError::from)?;
            self.audit(
                AuditEntry::new(&phase.name, AuditEvent::TaskCompleted).with_task(task_id),
            )?;
            info!(task = %task_id, "Task complete");
        }

        Ok(StepOutcome::Continue)
    }

    async fn run_agent_step(
        &self,
        definition: &WorkflowDefinition,
        step: &AgentStep,
        ctx: &mut WorkflowContext,
    ) -> Result<StepOutcome> {
        let schema = step.output_schema()?;
        let instructions = definition.agent_instructions(step)?;
        let prompt = build_prompt(&instructions, ctx, schema);
        let response = self.query(&step.name, prompt, schema).await?;

        let signals = extract_signals(&response.text);
        self.record_progress(&step.name, ctx, &signals)?;
        if let Some(blocker) = detect_blocker(&signals, &response) {
            return Ok(StepOutcome::Blocked(blocker));
        }

        let output = match schema {
            Some(schema) => schema.validate(&require_payload(&response, schema)?)?,
            None => response
                .payload()
                .unwrap_or_else(|| Value::String(response.text.clone())),
        };

        if schema == Some(OutputSchema::Verification) {
            let verify = VerifyResult::from_value(&output)?;
            let report = audit_compliance(&verify, &ctx.get_string_list(TASKS_COMPLETED));
            info!(
                met = report.met_requirements,
                total = report.total_requirements,
                percentage = report.percentage,
                "Compliance"
            );
            ctx.set(
                COMPLIANCE,
                serde_json::to_value(&report).map_err(anyhow::Error::from)?,
            );
        }

        debug!(step = %step.name, key = step.output_key(), "Storing agent output");
        ctx.set(step.output_key(), output);
        Ok(StepOutcome::Continue)
    }

    fn run_code_step(&self, step: &CodeStep, ctx: &mut WorkflowContext) -> Result<StepOutcome> {
        let handler = self.registry.get(&step.handler)?;
        debug!(step = %step.name, handler = %step.handler, "Running handler");
        handler(ctx, step.input.as_ref())
    }

    async fn run_gates_step(
        &self,
        definition: &WorkflowDefinition,
        step: &GatesStep,
        ctx: &mut WorkflowContext,
    ) -> Result<StepOutcome> {
        let max_attempts = step
            .max_fix_attempts
            .unwrap_or(self.config.max_fix_attempts);
        let fix_step = step.fix.as_ref().map(fix_agent_step);
        let mut attempts = 0;

        loop {
            let aggregated = match self.run_gates(definition, step, ctx).await? {
                GateRun::Blocked(reason) => return Ok(StepOutcome::Blocked(reason)),
                GateRun::Reviewed(aggregated) => aggregated,
            };
            let actionable = aggregated.has_actionable_issues();
            ctx.set(
                step.output_key(),
                serde_json::to_value(&aggregated).map_err(anyhow::Error::from)?,
            );

            if !actionable {
                info!(step = %step.name, attempts, "Gates passed");
                return Ok(StepOutcome::Continue);
            }

            let fix = match &fix_step {
                Some(fix) if attempts < max_attempts => fix,
                _ => {
                    return Ok(StepOutcome::Blocked(unresolved_issues(
                        &step.name,
                        &aggregated,
                        attempts,
                    )));
                }
            };

            attempts += 1;
            info!(
                step = %step.name,
                attempt = attempts,
                max_attempts,
                issues = aggregated.actionable_issues().len(),
                "Gates found actionable issues, running fix agent"
            );
            if let StepOutcome::Blocked(reason) = self.run_agent_step(definition, fix, ctx).await? {
                return Ok(StepOutcome::Blocked(reason));
            }
        }
    }

    async fn run_gates(
        &self,
        definition: &WorkflowDefinition,
        step: &GatesStep,
        ctx: &WorkflowContext,
    ) -> Result<GateRun> {
        let mut results = Vec::with_capacity(step.gates.len());

        for gate in &step.gates {
            let label = format!("{}/{}", step.name, gate.name);
            let instructions = definition.gate_instructions(gate)?;
            let prompt = build_prompt(&instructions, ctx, Some(OutputSchema::Review));
            let response = self.query(&label, prompt, Some(OutputSchema::Review)).await?;

            let signals = extract_signals(&response.text);
            self.record_progress(&label, ctx, &signals)?;
            if let Some(blocker) = detect_blocker(&signals, &response) {
                return Ok(GateRun::Blocked(blocker));
            }

            let payload = require_payload(&response, OutputSchema::Review)?;
            let review = ReviewResult::from_value(&payload)?;
            debug!(
                gate = %gate.name,
                issues = review.issues.len(),
                actionable = review.has_actionable_issues(),
                "Gate reviewed"
            );
            results.push((gate.name.clone(), review));
        }

        Ok(GateRun::Reviewed(aggregate_gate_results(&results)))
    }

    async fn query(
        &self,
        phase: &str,
        prompt: String,
        schema: Option<OutputSchema>,
    ) -> Result<AgentResponse> {
        let request = AgentRequest {
            phase: phase.to_string(),
            prompt,
            model: self.config.model.clone(),
            working_dir: self.config.working_dir.clone(),
            mcp_servers: self.config.mcp_servers.clone(),
            schema,
        };
        debug!(phase, model = %self.config.model, "Querying agent");
        self.agent
            .query(request)
            .await
            .map_err(|e| WorkflowError::Agent {
                phase: phase.to_string(),
                message: format!("{:#}", e),
            })
    }

    fn record_progress(
        &self,
        phase: &str,
        ctx: &WorkflowContext,
        signals: &AgentSignals,
    ) -> Result<()> {
        let Some(percentage) = signals.latest_progress() else {
            return Ok(());
        };
        info!(phase, percentage, "Agent reported progress");
        let mut entry =
            AuditEntry::new(phase, AuditEvent::Progress).with_detail(format!("{}%", percentage));
        if let Some(task_id) = ctx.current_task_id() {
            entry = entry.with_task(task_id);
        }
        self.audit(entry)
    }

    fn audit(&self, entry: AuditEntry) -> Result<()> {
        self.sink.record_audit(&entry).map_err(WorkflowError::from)
    }
}

enum PhaseOutcome {
    Completed,
    Skipped,
    Blocked(String),
}

enum GateRun {
    Reviewed(AggregatedReviewResult),
    Blocked(String),
}

fn failed(ctx: WorkflowContext, completed: Vec<String>, err: WorkflowError) -> WorkflowResult {
    WorkflowResult {
        status: WorkflowStatus::Failed,
        completed_phases: completed,
        outputs: ctx.into_variables(),
        blocker_details: None,
        error: Some(err.to_string()),
    }
}

/// Fix steps always use the `fix` contract and store under `fix` unless told
/// otherwise.
fn fix_agent_step(fix: &AgentStep) -> AgentStep {
    AgentStep {
        schema: fix
            .schema
            .clone()
            .or_else(|| Some(OutputSchema::Fix.as_str().to_string())),
        output: fix.output.clone().or_else(|| Some(FIX_OUTPUT.to_string())),
        ..fix.clone()
    }
}

fn detect_blocker(signals: &AgentSignals, response: &AgentResponse) -> Option<String> {
    signals
        .blocker_message()
        .or_else(|| response.payload().as_ref().and_then(blocker_from_payload))
}

fn require_payload(response: &AgentResponse, schema: OutputSchema) -> Result<Value> {
    response
        .payload()
        .ok_or_else(|| WorkflowError::contract(schema.as_str(), "$", "no JSON object in agent output"))
}

fn unresolved_issues(step: &str, review: &AggregatedReviewResult, attempts: u32) -> String {
    let mut message = format!(
        "{} still has {} actionable issue(s) after {} fix attempt(s):",
        step,
        review.actionable_issues().len(),
        attempts
    );
    for issue in review.actionable_issues() {
        let location = match (&issue.file, issue.line) {
            (Some(file), Some(line)) => format!(" ({}:{})", file, line),
            (Some(file), None) => format!(" ({})", file),
            _ => String::new(),
        };
        message.push_str(&format!(
            "\n- [{:?}] {}{}",
            issue.severity, issue.description, location
        ));
    }
    message
}

/// Render instructions and append the current task and output requirements.
fn build_prompt(
    instructions: &str,
    ctx: &WorkflowContext,
    schema: Option<OutputSchema>,
) -> String {
    let mut prompt = render(instructions, ctx);

    if let Some(task) = ctx.current_task() {
        let task_json = serde_json::to_string_pretty(task).unwrap_or_default();
        prompt.push_str(&format!(
            "\n\n## Current Task\n\n```json\n{}\n```",
            task_json
        ));
    }

    if let Some(schema) = schema {
        prompt.push_str(&format!(
            "\n\n## Output\n\nRespond with a single JSON object matching the `{}` output \
             contract, inside a ```json fenced block.\n\
             If you cannot proceed, explain why inside <blocker>...</blocker> instead.",
            schema
        ));
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::TaskDefinition;

    #[test]
    fn test_build_prompt_renders_and_appends_task() {
        let mut ctx = WorkflowContext::new();
        ctx.set("specPath", json!("docs/spec.md"));
        let child = ctx.with_task(TaskDefinition::new("task-001", "Parser", "Write the parser"));

        let prompt = build_prompt("Read {{specPath}}.", &child, Some(OutputSchema::Implementation));
        assert!(prompt.starts_with("Read docs/spec.md."));
        assert!(prompt.contains("## Current Task"));
        assert!(prompt.contains("\"id\": \"task-001\""));
        assert!(prompt.contains("`implementation` output"));
        assert!(prompt.contains("<blocker>"));
    }

    #[test]
    fn test_build_prompt_without_schema_or_task() {
        let prompt = build_prompt("Plain", &WorkflowContext::new(), None);
        assert_eq!(prompt, "Plain");
    }

    #[test]
    fn test_detect_blocker_from_tag_and_payload() {
        let detect = |response: &AgentResponse| {
            detect_blocker(&extract_signals(&response.text), response)
        };
        let tagged = AgentResponse::text("Stuck <blocker>missing credentials</blocker>");
        assert_eq!(detect(&tagged).as_deref(), Some("missing credentials"));

        let structured = AgentResponse::structured(json!({"blocker": "no database"}));
        assert_eq!(detect(&structured).as_deref(), Some("no database"));

        let clean = AgentResponse::structured(json!({"blocker": ""}));
        assert!(detect(&clean).is_none());

        let progress = AgentResponse::text("<progress>40%</progress> still going");
        assert!(detect(&progress).is_none());
    }

    #[test]
    fn test_fix_agent_step_defaults() {
        let fix = AgentStep {
            name: "address-review".into(),
            prompt: Some("Fix it".into()),
            agent: None,
            schema: None,
            output: None,
            when: None,
        };
        let step = fix_agent_step(&fix);
        assert_eq!(step.output_key(), "fix");
        assert_eq!(step.output_schema().unwrap(), Some(OutputSchema::Fix));
    }

    #[test]
    fn test_require_payload_names_contract() {
        let err = require_payload(&AgentResponse::text("no json here"), OutputSchema::Analysis)
            .unwrap_err();
        assert!(matches!(err, WorkflowError::ContractViolation { .. }));
        assert!(err.to_string().contains("analysis"));
    }
}
