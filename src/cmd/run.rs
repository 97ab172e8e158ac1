//! `wrangler-workflow run`: start or resume a workflow session.

use anyhow::{Context, Result, anyhow, bail};
use console::style;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use wrangler_workflow::agent::ClaudeCliAgent;
use wrangler_workflow::config::{CliOverrides, WranglerConfig};
use wrangler_workflow::session::SessionManager;
use wrangler_workflow::workflow::{
    PriorState, WorkflowDefinition, WorkflowEngine, WorkflowResult, WorkflowStatus,
};

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_PAUSED: u8 = 2;

#[derive(Debug, Clone)]
pub struct RunArgs {
    pub spec_file: PathBuf,
    pub workflow: String,
    pub dry_run: bool,
    pub resume: Option<String>,
    pub working_dir: Option<PathBuf>,
    pub model: Option<String>,
    pub workflow_dir: Option<PathBuf>,
}

/// Run the workflow and map its outcome to an exit code.
pub async fn cmd_run(args: &RunArgs) -> Result<u8> {
    let working_dir = match &args.working_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    let working_dir = working_dir
        .canonicalize()
        .with_context(|| format!("Working directory not found: {}", working_dir.display()))?;

    let spec_path = resolve_spec(&args.spec_file, &working_dir)?;

    let config = WranglerConfig::resolve(&working_dir)?;
    let engine_config = config.engine_config(
        &working_dir,
        &CliOverrides {
            model: args.model.clone(),
            workflow_dir: args.workflow_dir.clone(),
            dry_run: args.dry_run,
        },
    );
    let agent = ClaudeCliAgent::new(config.claude_cmd())
        .with_permission_mode(engine_config.permission_mode.clone())
        .with_setting_sources(engine_config.setting_sources.clone());
    let engine = WorkflowEngine::new(Arc::new(agent), engine_config);

    let definition = engine
        .load_workflow(&args.workflow)
        .with_context(|| format!("Failed to load workflow '{}'", args.workflow))?;

    let (session, result) = match &args.resume {
        Some(session_id) => {
            let session = Arc::new(SessionManager::open(&working_dir, session_id)?);
            let result = resume(engine, &definition, &session, session_id).await?;
            (session, result)
        }
        None => {
            let mut session = SessionManager::new(&working_dir);
            let session_id = session.create_session(&spec_path, &working_dir, &args.workflow)?;
            print_header(&definition, &spec_path, &session_id, args.dry_run);

            let session = Arc::new(session);
            let result = engine
                .with_sink(session.clone())
                .run_definition(&definition, &spec_path)
                .await?;
            (session, result)
        }
    };

    report(&result, &session, &args.spec_file, args.dry_run)
}

async fn resume(
    engine: WorkflowEngine,
    definition: &WorkflowDefinition,
    session: &Arc<SessionManager>,
    session_id: &str,
) -> Result<WorkflowResult> {
    let checkpoint = session
        .load_checkpoint(session_id)?
        .ok_or_else(|| anyhow!("Session {} has no checkpoint to resume from", session_id))?;

    let from_phase = definition
        .phase_after(&checkpoint.current_phase)?
        .map(str::to_string);
    let Some(from_phase) = from_phase else {
        println!(
            "{} Session {} already completed every phase",
            style("✓").green(),
            session_id
        );
        return Ok(WorkflowResult {
            status: WorkflowStatus::Complete,
            completed_phases: definition
                .phase_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
            outputs: checkpoint.variables,
            blocker_details: None,
            error: None,
        });
    };

    println!(
        "{} Resuming session {} at phase {} ({} task(s) pending)",
        style("→").cyan(),
        style(session_id).bold(),
        style(&from_phase).bold(),
        checkpoint.tasks_pending.len()
    );

    let completed_phases = definition.phases_through(&checkpoint.current_phase)?;
    let prior = PriorState {
        completed_phases,
        ..PriorState::from(checkpoint)
    };
    let result = engine
        .with_sink(session.clone())
        .resume_definition(definition, prior, &from_phase)
        .await?;
    Ok(result)
}

fn resolve_spec(spec_file: &Path, working_dir: &Path) -> Result<PathBuf> {
    let candidates = [spec_file.to_path_buf(), working_dir.join(spec_file)];
    match candidates.iter().find(|p| p.is_file()) {
        Some(path) => path
            .canonicalize()
            .with_context(|| format!("Failed to resolve spec file: {}", path.display())),
        None => bail!("Spec file not found: {}", spec_file.display()),
    }
}

fn print_header(definition: &WorkflowDefinition, spec: &Path, session_id: &str, dry_run: bool) {
    println!(
        "{} {} {}",
        style("wrangler").bold().cyan(),
        style(&definition.name).bold(),
        if dry_run {
            style("(dry run)").dim().to_string()
        } else {
            String::new()
        }
    );
    println!("  {} {}", style("Spec:").dim(), spec.display());
    println!("  {} {}", style("Session:").dim(), session_id);
    println!(
        "  {} {}",
        style("Phases:").dim(),
        definition.phase_names().join(" → ")
    );
    println!();
}

fn report(
    result: &WorkflowResult,
    session: &SessionManager,
    spec_file: &Path,
    dry_run: bool,
) -> Result<u8> {
    let session_id = session.session_id().unwrap_or_default();

    match result.status {
        WorkflowStatus::Complete => {
            session.complete_session(result)?;
            let label = if dry_run {
                "Dry run complete"
            } else {
                "Workflow complete"
            };
            println!(
                "{} {} ({} phase(s))",
                style("✓").green().bold(),
                style(label).green().bold(),
                result.completed_phases.len()
            );
            if let Some(summary) = result
                .outputs
                .get("compliance")
                .and_then(|c| c.get("summary"))
                .and_then(|s| s.as_str())
            {
                println!("  {}", summary);
            }
            Ok(EXIT_SUCCESS)
        }
        WorkflowStatus::Paused => {
            let blocker = result.blocker_details.as_deref().unwrap_or("unspecified");
            session.write_checkpoint(&result.checkpoint())?;
            let blocker_path = session.write_blocker(blocker)?;

            println!(
                "{} {} after {}",
                style("⏸").yellow(),
                style("Workflow paused").yellow().bold(),
                result.last_completed_phase()
            );
            println!("  {} {}", style("Blocker:").yellow(), blocker);
            println!("  {} {}", style("Details:").dim(), blocker_path.display());
            println!();
            println!(
                "Resume with: wrangler-workflow run {} --resume {}",
                spec_file.display(),
                session_id
            );
            Ok(EXIT_PAUSED)
        }
        WorkflowStatus::Failed | WorkflowStatus::Running => {
            session.complete_session(result)?;
            eprintln!(
                "{} {}",
                style("Workflow failed:").red().bold(),
                result.error.as_deref().unwrap_or("unknown error")
            );
            Ok(EXIT_FAILURE)
        }
    }
}
