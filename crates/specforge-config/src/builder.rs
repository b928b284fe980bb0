use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use specforge_utils::error::ConfigError;
use specforge_utils::types::ConfigSource;

use crate::Config;
use crate::model::ATTRIBUTED_KEYS;

impl Config {
    /// Create a builder for programmatic configuration.
    ///
    /// Use this when embedding specforge: no environment variables or config
    /// files are consulted.
    ///
    /// ```rust,no_run
    /// use specforge_config::Config;
    /// use std::time::Duration;
    ///
    /// let config = Config::builder()
    ///     .state_dir("/custom/state")
    ///     .git_enabled(false)
    ///     .lock_backoff(Duration::from_millis(50))
    ///     .build()
    ///     .expect("Failed to build config");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Fluent builder for [`Config`].
///
/// Every value set through the builder is attributed to
/// `ConfigSource::Programmatic`.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    state_dir: Option<PathBuf>,
    max_rollback_depth: Option<u32>,
    lock_max_attempts: Option<u32>,
    lock_backoff: Option<Duration>,
    lock_ttl: Option<Duration>,
    git_enabled: Option<bool>,
    repo_path: Option<PathBuf>,
    git_remote: Option<String>,
    llm_provider: Option<String>,
    llm_model: Option<String>,
    llm_budget: Option<u32>,
    llm_timeout: Option<Duration>,
    high_confidence_threshold: Option<f64>,
}

impl ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_dir = Some(path.into());
        self
    }

    #[must_use]
    pub fn max_rollback_depth(mut self, depth: u32) -> Self {
        self.max_rollback_depth = Some(depth);
        self
    }

    #[must_use]
    pub fn lock_max_attempts(mut self, attempts: u32) -> Self {
        self.lock_max_attempts = Some(attempts);
        self
    }

    #[must_use]
    pub fn lock_backoff(mut self, backoff: Duration) -> Self {
        self.lock_backoff = Some(backoff);
        self
    }

    #[must_use]
    pub fn lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = Some(ttl);
        self
    }

    #[must_use]
    pub fn git_enabled(mut self, enabled: bool) -> Self {
        self.git_enabled = Some(enabled);
        self
    }

    #[must_use]
    pub fn repo_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.repo_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn git_remote(mut self, remote: impl Into<String>) -> Self {
        self.git_remote = Some(remote.into());
        self
    }

    #[must_use]
    pub fn llm_provider(mut self, provider: impl Into<String>) -> Self {
        self.llm_provider = Some(provider.into());
        self
    }

    #[must_use]
    pub fn llm_model(mut self, model: impl Into<String>) -> Self {
        self.llm_model = Some(model.into());
        self
    }

    #[must_use]
    pub fn llm_budget(mut self, calls: u32) -> Self {
        self.llm_budget = Some(calls);
        self
    }

    #[must_use]
    pub fn llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn high_confidence_threshold(mut self, threshold: f64) -> Self {
        self.high_confidence_threshold = Some(threshold);
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<Config, ConfigError> {
        let mut config = Config::default();
        let mut attr: HashMap<String, ConfigSource> = ATTRIBUTED_KEYS
            .iter()
            .map(|k| ((*k).to_string(), ConfigSource::Default))
            .collect();
        let mut set = |key: &str| {
            attr.insert(key.to_string(), ConfigSource::Programmatic);
        };

        if let Some(v) = self.state_dir {
            config.orchestrator.state_dir = v;
            set("state_dir");
        }
        if let Some(v) = self.max_rollback_depth {
            config.orchestrator.max_rollback_depth = v;
            set("max_rollback_depth");
        }
        if let Some(v) = self.lock_max_attempts {
            config.lock.max_attempts = v;
            set("lock_max_attempts");
        }
        if let Some(v) = self.lock_backoff {
            config.lock.backoff_ms = duration_millis(v);
            set("lock_backoff_ms");
        }
        if let Some(v) = self.lock_ttl {
            config.lock.ttl_secs = v.as_secs();
            set("lock_ttl_secs");
        }
        if let Some(v) = self.git_enabled {
            config.git.enabled = v;
            set("git_enabled");
        }
        if let Some(v) = self.repo_path {
            config.git.repo_path = Some(v);
            set("git_repo_path");
        }
        if let Some(v) = self.git_remote {
            config.git.remote = v;
            set("git_remote");
        }
        if let Some(v) = self.llm_provider {
            config.llm.provider = Some(v);
            set("llm_provider");
        }
        if let Some(v) = self.llm_model {
            config.llm.model = Some(v);
            set("llm_model");
        }
        if let Some(v) = self.llm_budget {
            config.llm.budget = Some(v);
            set("llm_budget");
        }
        if let Some(v) = self.llm_timeout {
            config.llm.timeout_secs = v.as_secs();
            set("llm_timeout_secs");
        }
        if let Some(v) = self.high_confidence_threshold {
            config.analysis.high_confidence_threshold = v;
            set("high_confidence_threshold");
        }

        config.source_attribution = attr;
        config.validate()?;
        Ok(config)
    }
}

fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
