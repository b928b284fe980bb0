use specforge_utils::error::ConfigError;

use crate::Config;

/// Providers `[llm] provider` may name
pub const KNOWN_LLM_PROVIDERS: &[&str] = &["anthropic", "none"];

impl Config {
    /// Validate configuration values.
    ///
    /// Collects every problem; a single problem is reported as
    /// [`ConfigError::InvalidValue`], several as [`ConfigError::ValidationFailed`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<(String, String)> = Vec::new();
        let mut nonzero = |key: &str, value: u64| {
            if value == 0 {
                errors.push((key.to_string(), "must be greater than 0".to_string()));
            }
        };

        nonzero(
            "max_rollback_depth",
            u64::from(self.orchestrator.max_rollback_depth),
        );
        nonzero("lock_max_attempts", u64::from(self.lock.max_attempts));
        nonzero("lock_backoff_ms", self.lock.backoff_ms);
        nonzero("lock_ttl_secs", self.lock.ttl_secs);
        nonzero("lock_sweep_interval_secs", self.lock.sweep_interval_secs);
        nonzero("git_command_timeout_secs", self.git.command_timeout_secs);
        nonzero("git_push_timeout_secs", self.git.push_timeout_secs);
        nonzero("llm_max_tokens", u64::from(self.llm.max_tokens));
        nonzero("llm_timeout_secs", self.llm.timeout_secs);
        if let Some(budget) = self.llm.budget {
            nonzero("llm_budget", u64::from(budget));
        }

        // An expired lock may be taken over, so the TTL has to outlast every
        // git call a transition makes while holding it.
        let git_worst_case = self.git.locked_worst_case_secs();
        if self.git.enabled && self.lock.ttl_secs > 0 && self.lock.ttl_secs <= git_worst_case {
            errors.push((
                "lock_ttl_secs".to_string(),
                format!(
                    "{} must exceed {git_worst_case}, the longest git work a transition may do under the lock",
                    self.lock.ttl_secs
                ),
            ));
        }

        if self.orchestrator.state_dir.as_os_str().is_empty() {
            errors.push(("state_dir".to_string(), "must not be empty".to_string()));
        }
        if self.git.remote.trim().is_empty() {
            errors.push(("git_remote".to_string(), "must not be empty".to_string()));
        }

        if let Some(provider) = &self.llm.provider
            && !KNOWN_LLM_PROVIDERS.contains(&provider.as_str())
        {
            errors.push((
                "llm_provider".to_string(),
                format!(
                    "unknown provider '{provider}' (expected one of: {})",
                    KNOWN_LLM_PROVIDERS.join(", ")
                ),
            ));
        }

        let threshold = self.analysis.high_confidence_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            errors.push((
                "high_confidence_threshold".to_string(),
                format!("{threshold} is outside (0, 1]"),
            ));
        }

        match errors.len() {
            0 => Ok(()),
            1 => {
                let (key, value) = errors.remove(0);
                Err(ConfigError::InvalidValue { key, value })
            }
            n => Err(ConfigError::ValidationFailed {
                errors: errors
                    .into_iter()
                    .map(|(key, value)| format!("{key}: {value}"))
                    .collect(),
                error_count: n,
            }),
        }
    }
}
