use std::collections::BTreeMap;

use specforge_utils::types::ConfigSource;

use crate::Config;

impl Config {
    /// Effective configuration as `key -> (value, source)`.
    ///
    /// Unset optional keys are omitted.
    #[must_use]
    pub fn effective_config(&self) -> BTreeMap<String, (String, String)> {
        let mut out = BTreeMap::new();
        let mut add = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                let source = self
                    .source_attribution
                    .get(key)
                    .unwrap_or(&ConfigSource::Default)
                    .to_string();
                out.insert(key.to_string(), (value, source));
            }
        };

        add(
            "state_dir",
            Some(self.orchestrator.state_dir.display().to_string()),
        );
        add(
            "max_rollback_depth",
            Some(self.orchestrator.max_rollback_depth.to_string()),
        );
        add("lock_max_attempts", Some(self.lock.max_attempts.to_string()));
        add("lock_backoff_ms", Some(self.lock.backoff_ms.to_string()));
        add("lock_ttl_secs", Some(self.lock.ttl_secs.to_string()));
        add(
            "lock_sweep_interval_secs",
            Some(self.lock.sweep_interval_secs.to_string()),
        );
        add("git_enabled", Some(self.git.enabled.to_string()));
        add(
            "git_repo_path",
            self.git.repo_path.as_ref().map(|p| p.display().to_string()),
        );
        add("git_remote", Some(self.git.remote.clone()));
        add(
            "git_command_timeout_secs",
            Some(self.git.command_timeout_secs.to_string()),
        );
        add(
            "git_push_timeout_secs",
            Some(self.git.push_timeout_secs.to_string()),
        );
        add("llm_provider", self.llm.provider.clone());
        add("llm_model", self.llm.model.clone());
        add("llm_api_key_env", Some(self.llm.api_key_env.clone()));
        add("llm_base_url", self.llm.base_url.clone());
        add("llm_max_tokens", Some(self.llm.max_tokens.to_string()));
        add("llm_timeout_secs", Some(self.llm.timeout_secs.to_string()));
        add("llm_budget", self.llm.budget.map(|b| b.to_string()));
        add(
            "high_confidence_threshold",
            Some(self.analysis.high_confidence_threshold.to_string()),
        );

        out
    }
}
