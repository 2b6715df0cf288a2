use anthropic_ai_sdk::client::AnthropicClient;
use anthropic_ai_sdk::types::message::{
    ContentBlock, CreateMessageParams, CreateMessageResponse, Message, MessageClient, MessageError,
    RequiredMessageParams, Role,
};
use async_trait::async_trait;

use crate::error::GatewayError;
use crate::gateway::LanguageModel;

#[derive(Debug, Clone)]
/// Runtime configuration for [`AnthropicGateway`].
pub struct AnthropicGatewayConfig {
    /// Anthropic API key.
    pub api_key: String,
    /// Model id (for example `claude-sonnet-4-5`).
    pub model: String,
    /// Anthropic API version header value.
    pub api_version: String,
    /// Optional base URL override for proxies or compatible endpoints.
    pub api_base_url: Option<String>,
    /// Maximum output tokens per call.
    pub max_tokens: u32,
    /// Optional sampling temperature.
    pub temperature: Option<f32>,
    /// Optional nucleus sampling parameter.
    pub top_p: Option<f32>,
}

impl AnthropicGatewayConfig {
    /// Creates a config with sensible defaults.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            api_version: AnthropicClient::DEFAULT_API_VERSION.to_string(),
            api_base_url: None,
            max_tokens: 4096,
            temperature: None,
            top_p: None,
        }
    }
}

#[derive(Debug, Clone)]
/// Anthropic backend adapter implementing [`LanguageModel`].
pub struct AnthropicGateway {
    client: AnthropicClient,
    config: AnthropicGatewayConfig,
}

impl AnthropicGateway {
    pub fn new(config: AnthropicGatewayConfig) -> Result<Self, GatewayError> {
        let mut builder =
            AnthropicClient::builder(config.api_key.clone(), config.api_version.clone());
        if let Some(url) = &config.api_base_url {
            builder = builder.with_api_base_url(url.clone());
        }

        let client = builder
            .build::<MessageError>()
            .map_err(|err| GatewayError::Request(err.to_string()))?;

        Ok(Self { client, config })
    }

    /// Creates a gateway using `ANTHROPIC_API_KEY` from the environment.
    pub fn from_env(model: impl Into<String>) -> Result<Self, GatewayError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| GatewayError::Request("ANTHROPIC_API_KEY is not set".to_string()))?;
        Self::new(AnthropicGatewayConfig::new(api_key, model))
    }
}

#[async_trait]
impl LanguageModel for AnthropicGateway {
    async fn generate(&self, prompt: &str) -> Result<String, GatewayError> {
        let required = RequiredMessageParams {
            model: self.config.model.clone(),
            messages: vec![Message::new_text(Role::User, prompt.to_string())],
            max_tokens: self.config.max_tokens,
        };

        let mut request = CreateMessageParams::new(required).with_stream(false);

        if let Some(temperature) = self.config.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(top_p) = self.config.top_p {
            request = request.with_top_p(top_p);
        }

        let response = self
            .client
            .create_message(Some(&request))
            .await
            .map_err(|err| GatewayError::Request(err.to_string()))?;

        extract_text(&response)
    }
}

fn extract_text(response: &CreateMessageResponse) -> Result<String, GatewayError> {
    let mut text_parts = Vec::new();
    for block in &response.content {
        if let ContentBlock::Text { text } = block {
            text_parts.push(text.clone());
        }
    }

    if text_parts.is_empty() {
        return Err(GatewayError::Response(
            "anthropic response contained no text blocks".to_string(),
        ));
    }

    Ok(text_parts.join("\n"))
}
