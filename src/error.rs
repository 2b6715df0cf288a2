use thiserror::Error;

/// Setup-time failure: the prompt template is missing a required placeholder.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("prompt template missing required placeholder {placeholder}")]
    MissingPlaceholder { placeholder: &'static str },
}

/// The model backend could not produce usable text. Auth, network, quota,
/// and empty-completion failures all collapse into this at the loop boundary.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("model request failed: {0}")]
    Request(String),
    #[error("model response invalid: {0}")]
    Response(String),
}

/// The model's raw response could not be parsed into a well-formed decision.
/// Carries the raw text for caller diagnostics.
#[derive(Debug, Error)]
#[error("failed to decode model response: {message}")]
pub struct DecodeError {
    pub message: String,
    pub raw: String,
}

impl DecodeError {
    pub fn new(message: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            raw: raw.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),
    #[error("invalid tool parameters for {tool}: {message}")]
    InvalidParameters { tool: String, message: String },
    #[error("tool execution failed: {0}")]
    Execution(String),
}

/// Builder-time errors. Runtime failures never surface through this type;
/// they are folded into the invocation's final response instead.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Template(#[from] TemplateError),
}
