//! Gateways over language-model backends.
//!
//! The loop treats every backend uniformly: given a prompt string, return
//! the raw textual completion or fail with a [`GatewayError`]. Provider
//! configuration (keys, model names, sampling) is resolved before
//! construction and never leaks into the loop.

mod anthropic;
mod google;
mod groq;
mod ollama;
mod openai;

use async_trait::async_trait;

use crate::error::GatewayError;

pub use anthropic::{AnthropicGateway, AnthropicGatewayConfig};
pub use google::{GoogleGateway, GoogleGatewayConfig};
pub use groq::{GroqGateway, GroqGatewayConfig};
pub use ollama::{OllamaGateway, OllamaGatewayConfig};
pub use openai::{OpenAiGateway, OpenAiGatewayConfig};

/// The single capability the agent loop needs from a model backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GatewayError>;
}
