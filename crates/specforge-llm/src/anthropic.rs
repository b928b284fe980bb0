//! Anthropic Messages API generator

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use specforge_config::LlmConfig;
use specforge_utils::error::LlmError;

use crate::types::{Completion, CompletionRequest, Message, Role, TextGenerator, Usage};

/// Default Anthropic API endpoint
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1/messages";

/// Anthropic API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Model used when neither the request nor `[llm] model` names one
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Generator backed by Anthropic's Messages API over HTTPS.
#[derive(Clone)]
pub struct AnthropicGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    default_model: String,
    default_max_tokens: u32,
    timeout: Duration,
}

impl std::fmt::Debug for AnthropicGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicGenerator")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("default_model", &self.default_model)
            .finish()
    }
}

impl AnthropicGenerator {
    /// # Errors
    ///
    /// `LlmError::Misconfiguration` if the HTTP client cannot be constructed.
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        default_model: String,
        default_max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Misconfiguration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
            default_model,
            default_max_tokens,
            timeout,
        })
    }

    /// Build from `[llm]` settings, reading the API key from `api_key_env`.
    ///
    /// # Errors
    ///
    /// `LlmError::Misconfiguration` when the key variable is unset or empty.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                LlmError::Misconfiguration(format!(
                    "Anthropic API key not found in environment variable '{}'",
                    config.api_key_env
                ))
            })?;

        Self::new(
            api_key,
            config.base_url.clone(),
            config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            config.max_tokens,
            config.timeout(),
        )
    }

    /// Split system messages into the top-level `system` field.
    fn convert_messages(messages: &[Message]) -> (Option<String>, Vec<AnthropicMessage>) {
        let mut system_prompt: Option<String> = None;
        let mut converted = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => match system_prompt.as_mut() {
                    Some(existing) => {
                        existing.push_str("\n\n");
                        existing.push_str(&msg.content);
                    }
                    None => system_prompt = Some(msg.content.clone()),
                },
                Role::User => converted.push(AnthropicMessage {
                    role: "user",
                    content: msg.content.clone(),
                }),
                Role::Assistant => converted.push(AnthropicMessage {
                    role: "assistant",
                    content: msg.content.clone(),
                }),
            }
        }

        (system_prompt, converted)
    }
}

/// Map an HTTP status to the provider error taxonomy.
pub(crate) fn error_for_status(status: u16, body: &str) -> LlmError {
    let detail = format!("HTTP {status}: {}", truncate(body, 200));
    match status {
        401 | 403 => LlmError::ProviderAuth(detail),
        429 => LlmError::ProviderQuota(detail),
        500..=599 => LlmError::ProviderOutage(detail),
        _ => LlmError::Transport(detail),
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[async_trait]
impl TextGenerator for AnthropicGenerator {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate_completion(&self, request: CompletionRequest) -> Result<Completion, LlmError> {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());
        let max_tokens = request.max_tokens.unwrap_or(self.default_max_tokens);
        let (system, messages) = Self::convert_messages(&request.messages);

        debug!(provider = "anthropic", model = %model, max_tokens, "Requesting completion");

        let body = AnthropicRequest {
            model: model.clone(),
            messages,
            max_tokens,
            temperature: request.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            system,
        };

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout {
                        duration: self.timeout,
                    }
                } else {
                    LlmError::Transport(format!("Anthropic request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(error_for_status(status.as_u16(), &text));
        }

        let parsed: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Transport(format!("Failed to parse Anthropic response: {e}")))?;

        let content: String = parsed
            .content
            .iter()
            .filter(|b| b.content_type == "text")
            .filter_map(|b| b.text.as_deref())
            .collect();

        if content.is_empty() {
            return Err(LlmError::Transport(
                "Anthropic response missing text content".to_string(),
            ));
        }

        let usage = parsed
            .usage
            .map(|u| Usage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
            })
            .unwrap_or_default();

        debug!(
            provider = "anthropic",
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "Completion received"
        );

        Ok(Completion {
            content,
            usage,
            model: parsed.model.unwrap_or(model),
            finish_reason: parsed.stop_reason,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    model: Option<String>,
    stop_reason: Option<String>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Clone, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
}
