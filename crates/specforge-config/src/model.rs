use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use specforge_utils::types::ConfigSource;

/// Default directory (relative to the working directory) holding project state
pub const DEFAULT_STATE_DIR: &str = ".specforge";

/// Default cap on total rollbacks per project
pub const DEFAULT_MAX_ROLLBACK_DEPTH: u32 = 10;

pub const DEFAULT_LOCK_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_LOCK_BACKOFF_MS: u64 = 100;
pub const DEFAULT_LOCK_TTL_SECS: u64 = 600;
pub const DEFAULT_LOCK_SWEEP_INTERVAL_SECS: u64 = 60;

pub const DEFAULT_GIT_REMOTE: &str = "origin";
pub const DEFAULT_GIT_COMMAND_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_GIT_PUSH_TIMEOUT_SECS: u64 = 60;

/// Local git commands one transition may run while holding the project lock:
/// repository and remote detection, branch lookup and checkout, staging,
/// commit plus `rev-parse HEAD`, and the handoff tag.
pub const GIT_COMMANDS_PER_TRANSITION: u64 = 8;

/// Network git calls one transition may make under the lock: the remote
/// reachability check, the branch push and the tag push.
pub const GIT_NETWORK_CALLS_PER_TRANSITION: u64 = 3;

pub const DEFAULT_LLM_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const DEFAULT_LLM_MAX_TOKENS: u32 = 1024;
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 30;

/// Confidence at or above which pattern analysis is trusted without LLM escalation
pub const DEFAULT_HIGH_CONFIDENCE_THRESHOLD: f64 = 0.85;

/// Orchestration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub state_dir: PathBuf,
    pub max_rollback_depth: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            max_rollback_depth: DEFAULT_MAX_ROLLBACK_DEPTH,
        }
    }
}

/// Project lock settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    pub max_attempts: u32,
    pub backoff_ms: u64,
    pub ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_LOCK_MAX_ATTEMPTS,
            backoff_ms: DEFAULT_LOCK_BACKOFF_MS,
            ttl_secs: DEFAULT_LOCK_TTL_SECS,
            sweep_interval_secs: DEFAULT_LOCK_SWEEP_INTERVAL_SECS,
        }
    }
}

/// Version-control integration settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitConfig {
    /// Master switch; `false` forces disabled mode regardless of the repository
    pub enabled: bool,
    /// Repository working directory (defaults to the current directory)
    pub repo_path: Option<PathBuf>,
    pub remote: String,
    pub command_timeout_secs: u64,
    pub push_timeout_secs: u64,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            repo_path: None,
            remote: DEFAULT_GIT_REMOTE.to_string(),
            command_timeout_secs: DEFAULT_GIT_COMMAND_TIMEOUT_SECS,
            push_timeout_secs: DEFAULT_GIT_PUSH_TIMEOUT_SECS,
        }
    }
}

/// Text-generation provider settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// `"anthropic"` or `"none"`; unset means no provider
    pub provider: Option<String>,
    pub model: Option<String>,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// Maximum number of provider calls per process
    pub budget: Option<u32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: None,
            model: None,
            api_key_env: DEFAULT_LLM_API_KEY_ENV.to_string(),
            base_url: None,
            max_tokens: DEFAULT_LLM_MAX_TOKENS,
            timeout_secs: DEFAULT_LLM_TIMEOUT_SECS,
            budget: None,
        }
    }
}

/// Root-cause analysis settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub high_confidence_threshold: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            high_confidence_threshold: DEFAULT_HIGH_CONFIDENCE_THRESHOLD,
        }
    }
}

/// Configuration for specforge operations.
///
/// Resolved with precedence CLI arguments > config file > built-in defaults.
/// Use [`Config::discover`] for CLI-like behavior (searches for
/// `.specforge/config.toml` upward from the working directory), or
/// [`Config::builder`] for deterministic programmatic configuration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Config {
    pub orchestrator: OrchestratorConfig,
    pub lock: LockConfig,
    pub git: GitConfig,
    pub llm: LlmConfig,
    pub analysis: AnalysisConfig,
    /// Where each effective key came from
    pub source_attribution: HashMap<String, ConfigSource>,
}

/// Keys tracked in [`Config::source_attribution`]
pub(crate) const ATTRIBUTED_KEYS: &[&str] = &[
    "state_dir",
    "max_rollback_depth",
    "lock_max_attempts",
    "lock_backoff_ms",
    "lock_ttl_secs",
    "lock_sweep_interval_secs",
    "git_enabled",
    "git_repo_path",
    "git_remote",
    "git_command_timeout_secs",
    "git_push_timeout_secs",
    "llm_provider",
    "llm_model",
    "llm_api_key_env",
    "llm_base_url",
    "llm_max_tokens",
    "llm_timeout_secs",
    "llm_budget",
    "high_confidence_threshold",
];
