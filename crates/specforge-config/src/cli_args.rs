use std::path::PathBuf;

/// CLI arguments that override configuration file values
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    /// Explicit config file; disables discovery
    pub config_path: Option<PathBuf>,
    pub state_dir: Option<PathBuf>,
    pub max_rollback_depth: Option<u32>,
    /// `Some(false)` for `--no-git`
    pub git_enabled: Option<bool>,
    pub repo_path: Option<PathBuf>,
    pub llm_provider: Option<String>,
    pub llm_model: Option<String>,
}
