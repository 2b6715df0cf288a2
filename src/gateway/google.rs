use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::gateway::LanguageModel;

const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone)]
pub struct GoogleGatewayConfig {
    pub api_key: String,
    pub model: String,
    pub api_base_url: Option<String>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

impl GoogleGatewayConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            api_base_url: None,
            temperature: None,
            top_p: None,
            max_output_tokens: Some(4096),
        }
    }
}

#[derive(Debug, Clone)]
/// Google Gemini adapter implementing [`LanguageModel`].
pub struct GoogleGateway {
    client: Client,
    config: GoogleGatewayConfig,
}

impl GoogleGateway {
    pub fn new(config: GoogleGatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .build()
            .map_err(|err| GatewayError::Request(err.to_string()))?;

        Ok(Self { client, config })
    }

    /// Creates a gateway using `GOOGLE_API_KEY` (or `GEMINI_API_KEY`) from
    /// the environment.
    pub fn from_env(model: impl Into<String>) -> Result<Self, GatewayError> {
        let api_key = std::env::var("GOOGLE_API_KEY")
            .or_else(|_| std::env::var("GEMINI_API_KEY"))
            .map_err(|_| {
                GatewayError::Request("GOOGLE_API_KEY (or GEMINI_API_KEY) is not set".to_string())
            })?;
        Self::new(GoogleGatewayConfig::new(api_key, model))
    }

    fn endpoint(&self) -> String {
        let base = self
            .config
            .api_base_url
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE_URL)
            .trim_end_matches('/');
        format!("{base}/models/{}:generateContent", self.config.model)
    }
}

#[async_trait]
impl LanguageModel for GoogleGateway {
    async fn generate(&self, prompt: &str) -> Result<String, GatewayError> {
        let request = build_request(prompt, &self.config);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|err| GatewayError::Request(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Request(if body.is_empty() {
                format!("google api request failed ({status})")
            } else {
                format!("google api request failed ({status}): {body}")
            }));
        }

        let payload = response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|err| GatewayError::Response(err.to_string()))?;

        extract_text(payload)
    }
}

fn build_request(prompt: &str, config: &GoogleGatewayConfig) -> GenerateContentRequest {
    let generation_config = if config.temperature.is_none()
        && config.top_p.is_none()
        && config.max_output_tokens.is_none()
    {
        None
    } else {
        Some(GenerationConfig {
            temperature: config.temperature,
            top_p: config.top_p,
            max_output_tokens: config.max_output_tokens,
        })
    };

    GenerateContentRequest {
        contents: vec![Content {
            role: "user".to_string(),
            parts: vec![Part {
                text: Some(prompt.to_string()),
            }],
        }],
        generation_config,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Content {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
}

fn extract_text(response: GenerateContentResponse) -> Result<String, GatewayError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| GatewayError::Response("google response missing candidates".to_string()))?;

    let content = candidate.content.ok_or_else(|| {
        GatewayError::Response("google response missing candidate content".to_string())
    })?;

    let text_parts = content
        .parts
        .into_iter()
        .filter_map(|part| part.text)
        .collect::<Vec<_>>();

    if text_parts.is_empty() {
        return Err(GatewayError::Response(
            "google response contained no text parts".to_string(),
        ));
    }

    Ok(text_parts.join("\n"))
}
