//! Layered configuration for wrangler-workflow.
//!
//! Settings are resolved in three layers, later layers winning:
//! 1. `.wrangler/wrangler.toml` in the working directory
//! 2. environment (`WRANGLER_MODEL`, `WRANGLER_CLAUDE_CMD`,
//!    `WRANGLER_MAX_FIX_ATTEMPTS`, `GITHUB_TOKEN`), after loading `.env`
//! 3. command-line flags
//!
//! # Configuration File Format
//!
//! ```toml
//! [project]
//! claude_cmd = "claude"
//! workflow_dir = "workflows"
//!
//! [engine]
//! model = "opus"
//! max_fix_attempts = 2
//! permission_mode = "acceptEdits"
//! setting_sources = ["project"]
//! mcp = true
//!
//! [github]
//! owner = "acme"
//! repo = "widgets"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::integration::build_mcp_config;

pub const DEFAULT_MODEL: &str = "opus";
pub const DEFAULT_CLAUDE_CMD: &str = "claude";
pub const DEFAULT_MAX_FIX_ATTEMPTS: u32 = 2;
pub const DEFAULT_WORKFLOW: &str = "spec-implementation";

pub const ENV_MODEL: &str = "WRANGLER_MODEL";
pub const ENV_CLAUDE_CMD: &str = "WRANGLER_CLAUDE_CMD";
pub const ENV_MAX_FIX_ATTEMPTS: &str = "WRANGLER_MAX_FIX_ATTEMPTS";
pub const ENV_GITHUB_TOKEN: &str = "GITHUB_TOKEN";

/// `<working-dir>/.wrangler`
pub fn wrangler_dir(working_dir: &Path) -> PathBuf {
    working_dir.join(".wrangler")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claude_cmd: Option<String>,
    /// Relative paths resolve against the working directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fix_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub setting_sources: Vec<String>,
    /// Hand the wrangler MCP server to agents.
    #[serde(default = "default_mcp")]
    pub mcp: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp_server_path: Option<PathBuf>,
}

fn default_mcp() -> bool {
    true
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            model: None,
            max_fix_attempts: None,
            permission_mode: None,
            setting_sources: Vec::new(),
            mcp: default_mcp(),
            mcp_server_path: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GitHubSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
}

/// Contents of `wrangler.toml` plus environment overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WranglerConfig {
    #[serde(default)]
    pub project: ProjectSection,
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub github: GitHubSection,
    /// Only ever read from the environment.
    #[serde(skip)]
    pub github_token: Option<String>,
}

impl WranglerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse wrangler.toml")
    }

    /// Load `<wrangler_dir>/wrangler.toml`, or defaults when it does not exist.
    pub fn load_or_default(wrangler_dir: &Path) -> Result<Self> {
        let config_path = wrangler_dir.join("wrangler.toml");
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// File and environment layers for `working_dir`.
    ///
    /// `<working_dir>/.env` is loaded first if present; variables already set
    /// in the process environment are not overwritten.
    pub fn resolve(working_dir: &Path) -> Result<Self> {
        let env_file = working_dir.join(".env");
        if env_file.exists() {
            dotenvy::from_path(&env_file)
                .with_context(|| format!("Failed to load {}", env_file.display()))?;
        }
        let mut config = Self::load_or_default(&wrangler_dir(working_dir))?;
        config.apply_env_from(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(model) = non_empty(ENV_MODEL) {
            self.engine.model = Some(model);
        }
        if let Some(cmd) = non_empty(ENV_CLAUDE_CMD) {
            self.project.claude_cmd = Some(cmd);
        }
        if let Some(raw) = non_empty(ENV_MAX_FIX_ATTEMPTS) {
            let attempts = raw.trim().parse::<u32>().with_context(|| {
                format!("{} must be a non-negative integer, got '{}'", ENV_MAX_FIX_ATTEMPTS, raw)
            })?;
            self.engine.max_fix_attempts = Some(attempts);
        }
        if let Some(token) = non_empty(ENV_GITHUB_TOKEN) {
            self.github_token = Some(token);
        }
        Ok(())
    }

    pub fn claude_cmd(&self) -> String {
        self.project
            .claude_cmd
            .clone()
            .unwrap_or_else(|| DEFAULT_CLAUDE_CMD.to_string())
    }

    /// Final engine settings with CLI flags applied on top.
    pub fn engine_config(&self, working_dir: &Path, cli: &CliOverrides) -> EngineConfig {
        let workflow_dir = cli
            .workflow_dir
            .clone()
            .or_else(|| self.project.workflow_dir.clone())
            .map(|dir| {
                if dir.is_absolute() {
                    dir
                } else {
                    working_dir.join(dir)
                }
            })
            .unwrap_or_else(|| working_dir.join("workflows"));

        let model = cli
            .model
            .clone()
            .or_else(|| self.engine.model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let mcp_servers = self.engine.mcp.then(|| {
            build_mcp_config(working_dir, self.engine.mcp_server_path.as_deref())
        });

        EngineConfig {
            working_dir: working_dir.to_path_buf(),
            workflow_dir,
            model,
            dry_run: cli.dry_run,
            max_fix_attempts: self
                .engine
                .max_fix_attempts
                .unwrap_or(DEFAULT_MAX_FIX_ATTEMPTS),
            mcp_servers,
            permission_mode: self.engine.permission_mode.clone(),
            setting_sources: self.engine.setting_sources.clone(),
        }
    }
}

/// Flags from the command line that override file and environment settings.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub model: Option<String>,
    pub workflow_dir: Option<PathBuf>,
    pub dry_run: bool,
}

/// Settings the engine runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub working_dir: PathBuf,
    /// Directory holding `<workflow>.yaml`, `agents/` and `gates/`.
    pub workflow_dir: PathBuf,
    pub model: String,
    pub dry_run: bool,
    pub max_fix_attempts: u32,
    /// `mcpServers` map passed to every agent query.
    pub mcp_servers: Option<Value>,
    pub permission_mode: Option<String>,
    pub setting_sources: Vec<String>,
}

impl EngineConfig {
    pub fn new(working_dir: &Path) -> Self {
        Self {
            working_dir: working_dir.to_path_buf(),
            workflow_dir: working_dir.join("workflows"),
            model: DEFAULT_MODEL.to_string(),
            dry_run: false,
            max_fix_attempts: DEFAULT_MAX_FIX_ATTEMPTS,
            mcp_servers: None,
            permission_mode: None,
            setting_sources: Vec::new(),
        }
    }

    pub fn with_workflow_dir(mut self, workflow_dir: &Path) -> Self {
        self.workflow_dir = workflow_dir.to_path_buf();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_max_fix_attempts(mut self, attempts: u32) -> Self {
        self.max_fix_attempts = attempts;
        self
    }

    pub fn with_mcp_servers(mut self, servers: Option<Value>) -> Self {
        self.mcp_servers = servers;
        self
    }
}
