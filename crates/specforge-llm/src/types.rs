//! Core types for the text-generation capability

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use specforge_utils::error::LlmError;

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Input to [`TextGenerator::generate_completion`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionRequest {
    /// Ordered conversation; system messages are hoisted by providers that need it
    pub messages: Vec<Message>,
    /// Overrides the generator's default model
    pub model: Option<String>,
    /// Overrides the generator's default output cap
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    #[must_use]
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Token accounting reported by the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Result of a completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub content: String,
    pub usage: Usage,
    /// Model that actually served the request
    pub model: String,
    pub finish_reason: Option<String>,
}

impl Completion {
    #[must_use]
    pub fn new(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: Usage::default(),
            model: model.into(),
            finish_reason: None,
        }
    }
}

/// Text-generation capability.
///
/// Providers are interchangeable; callers only see this trait. Every failure
/// is an [`LlmError`] so callers can degrade.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Short provider name for logs such as `"anthropic"`
    fn name(&self) -> &str;

    /// Generate a completion for `request`.
    ///
    /// # Errors
    ///
    /// Transport failures, provider errors (auth, quota, outage), timeouts,
    /// budget exhaustion and unavailability.
    async fn generate_completion(&self, request: CompletionRequest)
    -> Result<Completion, LlmError>;
}
