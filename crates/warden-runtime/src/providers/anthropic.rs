//! Anthropic Messages API provider.
//!
//! ```json
//! {
//!   "api_key": "sk-ant-...",
//!   "base_url": "https://api.anthropic.com/v1"
//! }
//! ```
//!
//! `api_key` falls back to `ANTHROPIC_API_KEY`.

use super::{
    secrets::{ApiCredential, CredentialSource},
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;

pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

/// Anthropic Claude provider.
pub struct AnthropicProvider {
    credential: ApiCredential,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        let credential =
            ApiCredential::new(api_key, CredentialSource::Programmatic, "Anthropic API key");
        Self::with_credential(credential, DEFAULT_BASE_URL)
    }

    pub fn from_env() -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_env(ANTHROPIC_API_KEY_ENV, "Anthropic API key")?;
        Self::with_credential(credential, DEFAULT_BASE_URL)
    }

    /// Build from the `llm.provider` config block, falling back to the
    /// environment for the key.
    pub fn from_config(config: &JsonValue) -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_config_or_env(
            config,
            "api_key",
            ANTHROPIC_API_KEY_ENV,
            "Anthropic API key",
        )?;

        let base_url = config
            .get("base_url")
            .and_then(JsonValue::as_str)
            .unwrap_or(DEFAULT_BASE_URL);
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ProviderError::NotConfigured(
                "base_url must start with http:// or https://".to_string(),
            ));
        }

        Self::with_credential(credential, base_url)
    }

    fn with_credential(credential: ApiCredential, base_url: &str) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ProviderError::HttpError(e.to_string()))?;

        Ok(Self {
            credential,
            base_url: api_base(base_url),
            client,
        })
    }

    /// Endpoint that completions are posted to.
    pub fn messages_url(&self) -> String {
        format!("{}/messages", self.base_url)
    }
}

/// Trim trailing slashes and add the `/v1` API prefix to a bare host URL.
fn api_base(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    let has_path = trimmed
        .split_once("://")
        .is_some_and(|(_, rest)| rest.contains('/'));
    if has_path {
        trimmed.to_string()
    } else {
        format!("{}/v1", trimmed)
    }
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop_sequences: Vec<String>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlockResponse>,
    model: String,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlockResponse {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    message: String,
}

/// Pull the system prompt out; the API takes it as a separate field.
fn split_system(messages: Vec<ChatMessage>) -> (Option<String>, Vec<AnthropicMessage>) {
    let mut system: Option<String> = None;
    let mut others = Vec::new();

    for msg in messages {
        if msg.role == "system" {
            system = Some(match system {
                Some(existing) => format!("{}\n\n{}", existing, msg.content),
                None => msg.content,
            });
        } else {
            others.push(AnthropicMessage {
                role: msg.role,
                content: msg.content,
            });
        }
    }
    (system, others)
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let (system, messages) = split_system(messages);

        let request = AnthropicRequest {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            system,
            messages,
            temperature: config.temperature,
            stop_sequences: config.stop_sequences.clone(),
        };

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", self.credential.expose())
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .timeout(config.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(config.timeout)
                } else {
                    ProviderError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(ProviderError::RateLimited { retry_after });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthError);
        }

        if !status.is_success() {
            let message = match response.json::<AnthropicError>().await {
                Ok(body) => body.error.message,
                Err(e) => e.to_string(),
            };
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let content = body
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        tracing::debug!(
            model = %body.model,
            input_tokens = body.usage.input_tokens,
            output_tokens = body.usage.output_tokens,
            "Anthropic completion"
        );

        Ok(CompletionResponse {
            content,
            usage: TokenUsage {
                prompt_tokens: body.usage.input_tokens,
                completion_tokens: body.usage.output_tokens,
            },
            model: body.model,
            stop_reason: body.stop_reason,
        })
    }

    async fn health_check(&self) -> bool {
        !self.credential.is_empty()
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "sk-ant-REDACTED";

    #[test]
    fn test_api_key_not_in_debug_output() {
        let provider = AnthropicProvider::new(SECRET).unwrap();
        let debug_output = format!("{:?}", provider);
        assert!(!debug_output.contains(SECRET));
        assert!(debug_output.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn test_health_check_requires_key() {
        assert!(AnthropicProvider::new(SECRET).unwrap().health_check().await);
        assert!(!AnthropicProvider::new("").unwrap().health_check().await);
    }

    #[test]
    fn test_from_config() {
        let config = serde_json::json!({
            "api_key": "config-api-key",
            "base_url": "https://proxy.internal/v1/"
        });

        let provider = AnthropicProvider::from_config(&config).unwrap();
        assert_eq!(provider.base_url, "https://proxy.internal/v1");
        assert_eq!(provider.credential.source(), CredentialSource::Config);
        assert_eq!(provider.name(), "anthropic");
    }

    #[test]
    fn test_bare_host_gets_api_prefix() {
        let config = serde_json::json!({
            "api_key": "key",
            "base_url": "https://api.anthropic.com/"
        });
        let provider = AnthropicProvider::from_config(&config).unwrap();
        assert_eq!(provider.messages_url(), "https://api.anthropic.com/v1/messages");

        let default = AnthropicProvider::new("key").unwrap();
        assert_eq!(default.messages_url(), "https://api.anthropic.com/v1/messages");
    }

    #[test]
    fn test_sample_config_posts_to_messages_endpoint() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/warden.yaml");
        let config = crate::RuntimeConfig::from_yaml_file(path).unwrap();

        let mut provider_config = config.llm.provider.clone();
        provider_config["api_key"] = serde_json::json!("key");
        let provider = AnthropicProvider::from_config(&provider_config).unwrap();
        assert_eq!(provider.messages_url(), "https://api.anthropic.com/v1/messages");
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let config = serde_json::json!({
            "api_key": "key",
            "base_url": "proxy.internal"
        });
        assert!(matches!(
            AnthropicProvider::from_config(&config),
            Err(ProviderError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_system_messages_split_out() {
        let (system, messages) = split_system(vec![
            ChatMessage::system("You are a compliance analyst."),
            ChatMessage::user("Is the client a cannabis business?"),
            ChatMessage::assistant("Thought: check the article"),
        ]);
        assert_eq!(system.as_deref(), Some("You are a compliance analyst."));
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "user");
    }
}
