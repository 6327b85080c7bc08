use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};
use crate::paths::Paths;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    /// Minimum router score for a tool to be selected.
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,
    #[serde(default = "default_per_tool_timeout_secs")]
    pub per_tool_timeout_secs: f64,
    /// Per-tool overrides of `per_tool_timeout_secs`, keyed by tool name.
    #[serde(default)]
    pub tool_timeouts: HashMap<String, f64>,
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    /// How many recent turns the router may consult.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

/// Upper bound for any tool timeout: one day.
pub const MAX_TIMEOUT_SECS: f64 = 86_400.0;

fn default_match_threshold() -> f64 {
    0.5
}

fn default_per_tool_timeout_secs() -> f64 {
    30.0
}

fn default_max_history() -> usize {
    100
}

fn default_history_window() -> usize {
    10
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            match_threshold: default_match_threshold(),
            per_tool_timeout_secs: default_per_tool_timeout_secs(),
            tool_timeouts: HashMap::new(),
            max_history: default_max_history(),
            history_window: default_history_window(),
        }
    }
}

impl AgentConfig {
    pub fn timeout_for(&self, tool: &str) -> Duration {
        let secs = self
            .tool_timeouts
            .get(tool)
            .copied()
            .unwrap_or(self.per_tool_timeout_secs);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::from_secs_f64(MAX_TIMEOUT_SECS))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSearchConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: default_search_endpoint(),
            max_results: default_max_results(),
        }
    }
}

fn default_search_endpoint() -> String {
    "https://api.search.brave.com/res/v1/web/search".to_string()
}

fn default_max_results() -> u32 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExecConfig {
    /// Refuse `working_dir` values outside the workspace.
    #[serde(default)]
    pub restrict_to_workspace: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PythonConfig {
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
}

fn default_interpreter() -> String {
    "python3".to_string()
}

impl Default for PythonConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ToolsConfig {
    /// Sandbox root for file and terminal tools. `None` means `<base>/workspace`.
    #[serde(default)]
    pub workspace: Option<String>,
    #[serde(default)]
    pub exec: ExecConfig,
    #[serde(default)]
    pub web_search: WebSearchConfig,
    #[serde(default)]
    pub python: PythonConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        let config_path = paths.config_file();
        if config_path.exists() {
            debug!(path = %config_path.display(), "Loading config");
            Self::load(&config_path)
        } else {
            debug!(path = %config_path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let agent = &self.agent;
        if !(0.0..=1.0).contains(&agent.match_threshold) {
            return Err(Error::Config(format!(
                "agent.matchThreshold must be within [0, 1], got {}",
                agent.match_threshold
            )));
        }
        if !valid_timeout(agent.per_tool_timeout_secs) {
            return Err(Error::Config(format!(
                "agent.perToolTimeoutSecs must be positive and at most {}",
                MAX_TIMEOUT_SECS
            )));
        }
        for (tool, secs) in &agent.tool_timeouts {
            if !valid_timeout(*secs) {
                return Err(Error::Config(format!(
                    "agent.toolTimeouts.{} must be positive and at most {}",
                    tool, MAX_TIMEOUT_SECS
                )));
            }
        }
        if agent.max_history == 0 {
            return Err(Error::Config("agent.maxHistory must be at least 1".to_string()));
        }
        if self.tools.python.interpreter.trim().is_empty() {
            return Err(Error::Config(
                "tools.python.interpreter must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the tool workspace, expanding a leading `~/`.
    pub fn workspace_path(&self, paths: &Paths) -> PathBuf {
        match self.tools.workspace.as_deref() {
            Some(ws) if !ws.trim().is_empty() => {
                if let Some(rest) = ws.strip_prefix("~/") {
                    if let Some(home) = dirs::home_dir() {
                        return home.join(rest);
                    }
                }
                PathBuf::from(ws)
            }
            _ => paths.workspace(),
        }
    }
}

fn valid_timeout(secs: f64) -> bool {
    secs.is_finite() && secs > 0.0 && secs <= MAX_TIMEOUT_SECS
}
