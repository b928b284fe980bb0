//! Configuration management for specforge
//!
//! Hierarchical configuration with discovery and precedence:
//! CLI > file > defaults. Settings live in `.specforge/config.toml` with
//! `[orchestrator]`, `[lock]`, `[git]`, `[llm]` and `[analysis]` sections.

mod builder;
mod cli_args;
mod discovery;
mod model;
mod sources;
mod validation;

use std::path::{Path, PathBuf};
use std::time::Duration;

pub use builder::ConfigBuilder;
pub use cli_args::CliArgs;
pub use discovery::{CONFIG_DIR_NAME, CONFIG_FILE_NAME};
pub use model::*;
pub use specforge_utils::types::ConfigSource;
pub use validation::KNOWN_LLM_PROVIDERS;

impl LockConfig {
    #[must_use]
    pub const fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl GitConfig {
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    #[must_use]
    pub const fn push_timeout(&self) -> Duration {
        Duration::from_secs(self.push_timeout_secs)
    }

    /// Longest a single transition can spend in git while holding the
    /// project lock, with every command running into its timeout.
    #[must_use]
    pub const fn locked_worst_case_secs(&self) -> u64 {
        GIT_COMMANDS_PER_TRANSITION
            .saturating_mul(self.command_timeout_secs)
            .saturating_add(GIT_NETWORK_CALLS_PER_TRANSITION.saturating_mul(self.push_timeout_secs))
    }

    /// Repository directory, defaulting to `fallback` when unset.
    #[must_use]
    pub fn repo_dir(&self, fallback: &Path) -> PathBuf {
        self.repo_path
            .clone()
            .unwrap_or_else(|| fallback.to_path_buf())
    }
}

impl LlmConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Whether a real provider is configured.
    #[must_use]
    pub fn has_provider(&self) -> bool {
        self.provider.as_deref().is_some_and(|p| p != "none")
    }
}

impl Config {
    /// Deterministic config for tests: defaults, git disabled, state under `state_dir`.
    #[must_use]
    pub fn minimal_for_testing(state_dir: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.orchestrator.state_dir = state_dir.into();
        config.git.enabled = false;
        config
    }
}
