//! Text-generation providers
//!
//! Root-cause analysis escalates ambiguous failures to a text generator when
//! one is configured. Everything here degrades: no provider means
//! [`from_config`] returns `None`, and every call is bounded by a timeout.

mod anthropic;
mod budgeted;
mod types;

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub use anthropic::{AnthropicGenerator, DEFAULT_MODEL};
pub use budgeted::BudgetedGenerator;
pub use specforge_utils::error::LlmError;
pub use types::{Completion, CompletionRequest, Message, Role, TextGenerator, Usage};

use specforge_config::LlmConfig;

/// Build the configured generator.
///
/// Returns `Ok(None)` when `[llm] provider` is unset or `"none"`. A `budget`
/// wraps the provider in a [`BudgetedGenerator`].
///
/// # Errors
///
/// `LlmError::Misconfiguration` for an unknown provider or a provider that
/// cannot be constructed (missing API key).
pub fn from_config(config: &LlmConfig) -> Result<Option<Arc<dyn TextGenerator>>, LlmError> {
    let Some(provider) = config.provider.as_deref() else {
        debug!("No text-generation provider configured");
        return Ok(None);
    };

    let generator: Arc<dyn TextGenerator> = match provider {
        "none" => return Ok(None),
        "anthropic" => Arc::new(AnthropicGenerator::from_config(config)?),
        other => {
            return Err(LlmError::Misconfiguration(format!(
                "Unknown text-generation provider '{other}'"
            )));
        }
    };

    info!(provider, "Text-generation provider configured");

    Ok(Some(match config.budget {
        Some(limit) => Arc::new(BudgetedGenerator::new(generator, limit)),
        None => generator,
    }))
}

/// Run one completion bounded by `timeout`.
///
/// # Errors
///
/// `LlmError::Timeout` when the deadline passes, otherwise whatever the
/// generator returns.
pub async fn complete_with_timeout(
    generator: &dyn TextGenerator,
    request: CompletionRequest,
    timeout: Duration,
) -> Result<Completion, LlmError> {
    match tokio::time::timeout(timeout, generator.generate_completion(request)).await {
        Ok(result) => result,
        Err(_) => Err(LlmError::Timeout { duration: timeout }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Scripted generator: returns `reply` after `delay`, counting calls.
    struct ScriptedGenerator {
        reply: Result<String, LlmError>,
        delay: Duration,
        calls: AtomicU32,
    }

    impl ScriptedGenerator {
        fn ok(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                delay: Duration::ZERO,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate_completion(
            &self,
            _request: CompletionRequest,
        ) -> Result<Completion, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.reply
                .clone()
                .map(|content| Completion::new(content, "scripted-model"))
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest::new(vec![Message::user("why did this fail?")])
    }

    #[test]
    fn test_no_provider_yields_none() {
        assert!(from_config(&LlmConfig::default()).unwrap().is_none());

        let none = LlmConfig {
            provider: Some("none".to_string()),
            ..LlmConfig::default()
        };
        assert!(from_config(&none).unwrap().is_none());
    }

    #[test]
    fn test_unknown_provider_is_misconfiguration() {
        let config = LlmConfig {
            provider: Some("mystery".to_string()),
            ..LlmConfig::default()
        };
        assert!(matches!(
            from_config(&config),
            Err(LlmError::Misconfiguration(_))
        ));
    }

    #[tokio::test]
    async fn test_budget_counts_attempts() {
        let inner = Arc::new(ScriptedGenerator {
            reply: Err(LlmError::ProviderOutage("down".to_string())),
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
        });
        let budgeted = BudgetedGenerator::new(inner.clone(), 2);

        assert!(budgeted.generate_completion(request()).await.is_err());
        assert!(budgeted.generate_completion(request()).await.is_err());
        let third = budgeted.generate_completion(request()).await;

        assert_eq!(
            third.unwrap_err(),
            LlmError::BudgetExceeded {
                limit: 2,
                attempted: 3
            }
        );
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(budgeted.call_count(), 3);
        assert_eq!(budgeted.limit(), 2);
    }

    #[tokio::test]
    async fn test_budget_passes_through_success() {
        let budgeted = BudgetedGenerator::new(Arc::new(ScriptedGenerator::ok("{}")), 5);
        let completion = budgeted.generate_completion(request()).await.unwrap();
        assert_eq!(completion.content, "{}");
        assert_eq!(budgeted.name(), "scripted");
    }

    #[tokio::test]
    async fn test_timeout_bounds_slow_generator() {
        let slow = ScriptedGenerator {
            reply: Ok("late".to_string()),
            delay: Duration::from_millis(200),
            calls: AtomicU32::new(0),
        };
        let result = complete_with_timeout(&slow, request(), Duration::from_millis(20)).await;
        assert!(matches!(result, Err(LlmError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_fast_generator_completes_within_timeout() {
        let fast = ScriptedGenerator::ok("done");
        let completion = complete_with_timeout(&fast, request(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(completion.model, "scripted-model");
    }
}
