use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::gateway::LanguageModel;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

#[derive(Debug, Clone)]
pub struct OllamaGatewayConfig {
    pub model: String,
    pub base_url: String,
    pub temperature: Option<f32>,
}

impl OllamaGatewayConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Clone)]
/// Local Ollama adapter implementing [`LanguageModel`]. No API key; the
/// host is taken from config or `OLLAMA_BASE_URL`.
pub struct OllamaGateway {
    client: Client,
    config: OllamaGatewayConfig,
}

impl OllamaGateway {
    pub fn new(config: OllamaGatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .build()
            .map_err(|err| GatewayError::Request(err.to_string()))?;

        Ok(Self { client, config })
    }

    /// Creates a gateway against `OLLAMA_BASE_URL`, defaulting to the local
    /// daemon.
    pub fn from_env(model: impl Into<String>) -> Result<Self, GatewayError> {
        let base_url =
            std::env::var("OLLAMA_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(OllamaGatewayConfig::new(model).with_base_url(base_url))
    }

    fn endpoint(&self) -> String {
        format!("{}/api/chat", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LanguageModel for OllamaGateway {
    async fn generate(&self, prompt: &str) -> Result<String, GatewayError> {
        let request = build_request(prompt, &self.config);

        let response = self
            .client
            .post(self.endpoint())
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|err| GatewayError::Request(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Request(if body.is_empty() {
                format!("ollama request failed ({status})")
            } else {
                format!("ollama request failed ({status}): {body}")
            }));
        }

        let payload = response
            .json::<ChatResponse>()
            .await
            .map_err(|err| GatewayError::Response(err.to_string()))?;

        extract_text(payload)
    }
}

fn build_request(prompt: &str, config: &OllamaGatewayConfig) -> ChatRequest {
    ChatRequest {
        model: config.model.clone(),
        messages: vec![ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        }],
        stream: false,
        options: config
            .temperature
            .map(|temperature| ChatOptions { temperature }),
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatOptions>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ChatMessage>,
}

fn extract_text(response: ChatResponse) -> Result<String, GatewayError> {
    let message = response
        .message
        .ok_or_else(|| GatewayError::Response("ollama response missing message".to_string()))?;

    if message.content.is_empty() {
        return Err(GatewayError::Response(
            "ollama response contained no text".to_string(),
        ));
    }

    Ok(message.content)
}
