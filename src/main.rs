use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use wrangler_workflow::config::DEFAULT_WORKFLOW;

mod cmd;

#[derive(Parser)]
#[command(name = "wrangler-workflow")]
#[command(version, about = "Deterministic workflow engine for spec implementation")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a workflow against a specification file
    Run {
        /// Path to the specification markdown file
        spec_file: PathBuf,

        /// Workflow definition name (file under the workflow directory)
        #[arg(long, default_value = DEFAULT_WORKFLOW)]
        workflow: String,

        /// Run analysis and planning only, stopping before per-task execution
        #[arg(long)]
        dry_run: bool,

        /// Resume a paused session by id
        #[arg(long, value_name = "SESSION_ID")]
        resume: Option<String>,

        /// Project directory (defaults to the current directory)
        #[arg(long)]
        working_dir: Option<PathBuf>,

        /// Model passed to every agent query [default: opus]
        #[arg(long)]
        model: Option<String>,

        /// Directory holding workflow definitions (defaults to <working-dir>/workflows)
        #[arg(long)]
        workflow_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    wrangler_workflow::logging::init(cli.verbose);

    let code = match cli.command {
        Commands::Run {
            spec_file,
            workflow,
            dry_run,
            resume,
            working_dir,
            model,
            workflow_dir,
        } => {
            let args = cmd::RunArgs {
                spec_file,
                workflow,
                dry_run,
                resume,
                working_dir,
                model,
                workflow_dir,
            };
            cmd::cmd_run(&args).await?
        }
    };

    Ok(ExitCode::from(code))
}
