use async_trait::async_trait;
use reqwest::Client;

use crate::error::GatewayError;
use crate::gateway::LanguageModel;
use crate::gateway::openai::{
    OpenAiGatewayConfig, build_request, chat_completion, chat_completions_endpoint,
};

const DEFAULT_API_BASE_URL: &str = "https://api.groq.com/openai/v1";

#[derive(Debug, Clone)]
pub struct GroqGatewayConfig {
    pub api_key: String,
    pub model: String,
    pub api_base_url: Option<String>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl GroqGatewayConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            api_base_url: None,
            temperature: None,
            top_p: None,
            max_tokens: Some(4096),
        }
    }
}

#[derive(Debug, Clone)]
/// Groq adapter. Groq exposes an OpenAI-compatible chat-completions API, so
/// this reuses that wire format against the Groq endpoint.
pub struct GroqGateway {
    client: Client,
    config: GroqGatewayConfig,
}

impl GroqGateway {
    pub fn new(config: GroqGatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .build()
            .map_err(|err| GatewayError::Request(err.to_string()))?;

        Ok(Self { client, config })
    }

    /// Creates a gateway using `GROQ_API_KEY` from the environment.
    pub fn from_env(model: impl Into<String>) -> Result<Self, GatewayError> {
        let api_key = std::env::var("GROQ_API_KEY")
            .map_err(|_| GatewayError::Request("GROQ_API_KEY is not set".to_string()))?;
        Self::new(GroqGatewayConfig::new(api_key, model))
    }

    fn endpoint(&self) -> String {
        chat_completions_endpoint(self.config.api_base_url.as_deref(), DEFAULT_API_BASE_URL)
    }

    fn as_chat_config(&self) -> OpenAiGatewayConfig {
        OpenAiGatewayConfig {
            api_key: self.config.api_key.clone(),
            model: self.config.model.clone(),
            api_base_url: self.config.api_base_url.clone(),
            temperature: self.config.temperature,
            top_p: self.config.top_p,
            max_tokens: self.config.max_tokens,
        }
    }
}

#[async_trait]
impl LanguageModel for GroqGateway {
    async fn generate(&self, prompt: &str) -> Result<String, GatewayError> {
        let request = build_request(prompt, &self.as_chat_config());
        chat_completion(&self.client, &self.endpoint(), &self.config.api_key, &request).await
    }
}
