pub mod agent;
pub mod config_cmd;
pub mod history;
pub mod run_cmd;
pub mod tools_cmd;

use std::path::PathBuf;
use std::sync::Arc;
use uranus_core::{Config, Paths};
use uranus_tools::ToolRegistry;

/// Everything a command needs to talk to the tools.
pub struct Env {
    pub paths: Paths,
    pub config: Arc<Config>,
    pub registry: Arc<ToolRegistry>,
    pub workspace: PathBuf,
}

impl Env {
    pub fn load() -> anyhow::Result<Self> {
        let paths = Paths::new();
        let config = Config::load_or_default(&paths)?;
        paths.ensure_dirs()?;
        let workspace = config.workspace_path(&paths);
        std::fs::create_dir_all(&workspace)?;
        let registry = ToolRegistry::with_defaults()?;

        Ok(Self {
            paths,
            config: Arc::new(config),
            registry: Arc::new(registry),
            workspace,
        })
    }
}
