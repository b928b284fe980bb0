use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use specforge_utils::types::ConfigSource;

use crate::model::ATTRIBUTED_KEYS;
use crate::{CliArgs, Config};

/// Directory searched for in each ancestor during discovery
pub const CONFIG_DIR_NAME: &str = ".specforge";

/// File name inside [`CONFIG_DIR_NAME`]
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// TOML configuration file structure. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    orchestrator: Option<OrchestratorSection>,
    lock: Option<LockSection>,
    git: Option<GitSection>,
    llm: Option<LlmSection>,
    analysis: Option<AnalysisSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct OrchestratorSection {
    state_dir: Option<PathBuf>,
    max_rollback_depth: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LockSection {
    max_attempts: Option<u32>,
    backoff_ms: Option<u64>,
    ttl_secs: Option<u64>,
    sweep_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct GitSection {
    enabled: Option<bool>,
    repo_path: Option<PathBuf>,
    remote: Option<String>,
    command_timeout_secs: Option<u64>,
    push_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LlmSection {
    provider: Option<String>,
    model: Option<String>,
    api_key_env: Option<String>,
    base_url: Option<String>,
    max_tokens: Option<u32>,
    timeout_secs: Option<u64>,
    budget: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct AnalysisSection {
    high_confidence_threshold: Option<f64>,
}

/// Overwrite `$target` with `$value` when present and attribute `$key` to `$source`.
macro_rules! apply {
    ($attr:ident, $source:expr, $key:literal, $target:expr, $value:expr) => {
        if let Some(v) = $value {
            $target = v;
            $attr.insert($key.to_string(), $source.clone());
        }
    };
}

impl Config {
    /// Discover and load configuration with precedence: CLI > file > defaults
    ///
    /// Uses the current working directory for discovery when no explicit
    /// config path is given, then falls back to the per-user config file.
    pub fn discover(cli_args: &CliArgs) -> Result<Self> {
        let start_dir = std::env::current_dir().context("Failed to get current directory")?;
        let config_path = match &cli_args.config_path {
            Some(explicit) => Some(explicit.clone()),
            None => Self::discover_config_file_from(&start_dir)?.or_else(global_config_file),
        };
        Self::resolve(config_path.as_deref(), cli_args)
    }

    /// Discover and load configuration starting from a specific directory.
    ///
    /// Path-driven variant used by tests to avoid process-global state; it
    /// never consults the per-user config file.
    pub fn discover_from(start_dir: &Path, cli_args: &CliArgs) -> Result<Self> {
        let config_path = match &cli_args.config_path {
            Some(explicit) => Some(explicit.clone()),
            None => Self::discover_config_file_from(start_dir)?,
        };
        Self::resolve(config_path.as_deref(), cli_args)
    }

    fn resolve(config_path: Option<&Path>, cli_args: &CliArgs) -> Result<Self> {
        let mut config = Self::default();
        let mut attr: HashMap<String, ConfigSource> = ATTRIBUTED_KEYS
            .iter()
            .map(|k| ((*k).to_string(), ConfigSource::Default))
            .collect();

        if let Some(path) = config_path {
            debug!(path = %path.display(), "Loading config file");
            let file = Self::load_config_file(path)
                .with_context(|| format!("Failed to load config file: {}", path.display()))?;
            let src = ConfigSource::Config;

            if let Some(o) = file.orchestrator {
                apply!(attr, src, "state_dir", config.orchestrator.state_dir, o.state_dir);
                apply!(
                    attr,
                    src,
                    "max_rollback_depth",
                    config.orchestrator.max_rollback_depth,
                    o.max_rollback_depth
                );
            }
            if let Some(l) = file.lock {
                apply!(attr, src, "lock_max_attempts", config.lock.max_attempts, l.max_attempts);
                apply!(attr, src, "lock_backoff_ms", config.lock.backoff_ms, l.backoff_ms);
                apply!(attr, src, "lock_ttl_secs", config.lock.ttl_secs, l.ttl_secs);
                apply!(
                    attr,
                    src,
                    "lock_sweep_interval_secs",
                    config.lock.sweep_interval_secs,
                    l.sweep_interval_secs
                );
            }
            if let Some(g) = file.git {
                apply!(attr, src, "git_enabled", config.git.enabled, g.enabled);
                apply!(attr, src, "git_repo_path", config.git.repo_path, g.repo_path.map(Some));
                apply!(attr, src, "git_remote", config.git.remote, g.remote);
                apply!(
                    attr,
                    src,
                    "git_command_timeout_secs",
                    config.git.command_timeout_secs,
                    g.command_timeout_secs
                );
                apply!(
                    attr,
                    src,
                    "git_push_timeout_secs",
                    config.git.push_timeout_secs,
                    g.push_timeout_secs
                );
            }
            if let Some(l) = file.llm {
                apply!(attr, src, "llm_provider", config.llm.provider, l.provider.map(Some));
                apply!(attr, src, "llm_model", config.llm.model, l.model.map(Some));
                apply!(attr, src, "llm_api_key_env", config.llm.api_key_env, l.api_key_env);
                apply!(attr, src, "llm_base_url", config.llm.base_url, l.base_url.map(Some));
                apply!(attr, src, "llm_max_tokens", config.llm.max_tokens, l.max_tokens);
                apply!(attr, src, "llm_timeout_secs", config.llm.timeout_secs, l.timeout_secs);
                apply!(attr, src, "llm_budget", config.llm.budget, l.budget.map(Some));
            }
            if let Some(a) = file.analysis {
                apply!(
                    attr,
                    src,
                    "high_confidence_threshold",
                    config.analysis.high_confidence_threshold,
                    a.high_confidence_threshold
                );
            }
        }

        // CLI overrides everything
        let cli = ConfigSource::Cli;
        apply!(attr, cli, "state_dir", config.orchestrator.state_dir, cli_args.state_dir.clone());
        apply!(
            attr,
            cli,
            "max_rollback_depth",
            config.orchestrator.max_rollback_depth,
            cli_args.max_rollback_depth
        );
        apply!(attr, cli, "git_enabled", config.git.enabled, cli_args.git_enabled);
        apply!(
            attr,
            cli,
            "git_repo_path",
            config.git.repo_path,
            cli_args.repo_path.clone().map(Some)
        );
        apply!(
            attr,
            cli,
            "llm_provider",
            config.llm.provider,
            cli_args.llm_provider.clone().map(Some)
        );
        apply!(attr, cli, "llm_model", config.llm.model, cli_args.llm_model.clone().map(Some));

        config.source_attribution = attr;
        config.validate()?;
        Ok(config)
    }

    /// Walk upward from `start_dir` looking for `.specforge/config.toml`.
    ///
    /// Stops at the first repository root (`.git`, `.hg`, `.svn`) or the
    /// filesystem root.
    pub fn discover_config_file_from(start_dir: &Path) -> Result<Option<PathBuf>> {
        let mut current_dir = Some(start_dir);

        while let Some(dir) = current_dir {
            let config_path = dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME);
            if config_path.is_file() {
                return Ok(Some(config_path));
            }

            if dir.join(".git").exists() || dir.join(".hg").exists() || dir.join(".svn").exists()
            {
                break;
            }

            current_dir = dir.parent();
        }

        Ok(None)
    }

    fn load_config_file(path: &Path) -> Result<TomlConfig> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).with_context(|| {
                format!("Failed to parse TOML config file: {}", path.display())
            }),
            // An explicit path that does not exist yet behaves like an empty file
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(TomlConfig::default()),
            Err(e) => Err(anyhow::anyhow!(
                "Failed to read config file {}: {e}",
                path.display()
            )),
        }
    }
}

/// Per-user fallback: `<config dir>/specforge/config.toml`.
fn global_config_file() -> Option<PathBuf> {
    let path = dirs::config_dir()?.join("specforge").join(CONFIG_FILE_NAME);
    path.is_file().then_some(path)
}
