use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GatewayError;
use crate::gateway::LanguageModel;

const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct OpenAiGatewayConfig {
    pub api_key: String,
    pub model: String,
    pub api_base_url: Option<String>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl OpenAiGatewayConfig {
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
/// OpenAI chat-completions adapter implementing [`LanguageModel`].
pub struct OpenAiGateway {
    client: Client,
    config: OpenAiGatewayConfig,
}

impl OpenAiGateway {
    pub fn new(config: OpenAiGatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .build()
            .map_err(|err| GatewayError::Request(err.to_string()))?;

        Ok(Self { client, config })
    }

    /// Creates a gateway using `OPENAI_API_KEY` from the environment.
    pub fn from_env(model: impl Into<String>) -> Result<Self, GatewayError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| GatewayError::Request("OPENAI_API_KEY is not set".to_string()))?;
        Self::new(OpenAiGatewayConfig::new(api_key, model))
    }

    fn endpoint(&self) -> String {
        chat_completions_endpoint(self.config.api_base_url.as_deref(), DEFAULT_API_BASE_URL)
    }
}

#[async_trait]
impl LanguageModel for OpenAiGateway {
    async fn generate(&self, prompt: &str) -> Result<String, GatewayError> {
        let request = build_request(prompt, &self.config);
        chat_completion(&self.client, &self.endpoint(), &self.config.api_key, &request).await
    }
}

pub(crate) fn chat_completions_endpoint(base_url: Option<&str>, default_base: &str) -> String {
    let base = base_url.unwrap_or(default_base).trim_end_matches('/');
    format!("{base}/chat/completions")
}

/// Sends a chat-completions request and extracts the first choice's text.
/// Shared with the Groq gateway, which speaks the same wire format.
pub(crate) async fn chat_completion(
    client: &Client,
    endpoint: &str,
    api_key: &str,
    request: &ChatCompletionRequest,
) -> Result<String, GatewayError> {
    let response = client
        .post(endpoint)
        .header("authorization", format!("Bearer {api_key}"))
        .header("content-type", "application/json")
        .json(request)
        .send()
        .await
        .map_err(|err| GatewayError::Request(err.to_string()))?;

    if !response.status().is_success() {
        return Err(GatewayError::Request(extract_api_error(response).await));
    }

    let payload = response
        .json::<ChatCompletionResponse>()
        .await
        .map_err(|err| GatewayError::Response(err.to_string()))?;

    extract_text(payload)
}

pub(crate) fn build_request(prompt: &str, config: &OpenAiGatewayConfig) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: config.model.clone(),
        messages: vec![ChatRequestMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        }],
        temperature: config.temperature,
        top_p: config.top_p,
        max_tokens: config.max_tokens,
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionRequest {
    pub(crate) model: String,
    pub(crate) messages: Vec<ChatRequestMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequestMessage {
    pub(crate) role: String,
    pub(crate) content: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatAssistantMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatAssistantMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: Option<String>,
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<Value>,
}

fn extract_text(response: ChatCompletionResponse) -> Result<String, GatewayError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| GatewayError::Response("chat response missing choices".to_string()))?;

    let message = choice.message.ok_or_else(|| {
        GatewayError::Response("chat response missing choice message".to_string())
    })?;

    message
        .content
        .filter(|text| !text.is_empty())
        .ok_or_else(|| GatewayError::Response("chat response contained no text".to_string()))
}

async fn extract_api_error(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(&body) {
        let code = parsed
            .error
            .code
            .map(|value| match value {
                Value::String(value) => value,
                other => other.to_string(),
            })
            .unwrap_or_else(|| status.as_u16().to_string());
        let error_type = parsed
            .error
            .type_
            .unwrap_or_else(|| status.to_string().to_uppercase());
        let message = parsed
            .error
            .message
            .unwrap_or_else(|| "unknown api error".to_string());

        return format!("chat api error {code} {error_type}: {message}");
    }

    if body.is_empty() {
        format!("chat api request failed ({status})")
    } else {
        format!("chat api request failed ({status}): {body}")
    }
}
