//! Prompt-driven tool-calling agent loop.
//!
//! The agent compiles a prompt from a template, a tool catalog listing, and
//! the running context, asks a pluggable [`LanguageModel`] gateway for a
//! completion, decodes the structured decision it contains, and either
//! executes the named tool (feeding the result back into context) or
//! terminates with the final response. Tool failures never escape the loop;
//! every invocation ends with a non-empty final response.
//!
//! ```no_run
//! use toolcall_agent::{Agent, OpenAiGateway, ToolSpec};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let agent = Agent::builder()
//!     .gateway(OpenAiGateway::from_env("gpt-4o-mini")?)
//!     .tool(
//!         ToolSpec::new("calculator", "Sums two numbers given as 'a+b'")
//!             .with_handler(|params| async move { Ok(params.join("")) }),
//!     )
//!     .build()?;
//!
//! let result = agent.invoke("What is 25 + 37?").await;
//! println!("{}", result.final_response);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod decode;
pub mod error;
pub mod gateway;
pub mod prompt;
pub mod tools;

pub use agent::{Agent, AgentBuilder, AgentConfig, InvocationResult};
pub use decode::{Decision, DecisionSchema, NONE_SENTINEL, decode_decision};
pub use error::{AgentError, DecodeError, GatewayError, TemplateError, ToolError};
pub use gateway::{
    AnthropicGateway, AnthropicGatewayConfig, GoogleGateway, GoogleGatewayConfig, GroqGateway,
    GroqGatewayConfig, LanguageModel, OllamaGateway, OllamaGatewayConfig, OpenAiGateway,
    OpenAiGatewayConfig,
};
pub use prompt::{DEFAULT_TEMPLATE, PromptTemplate};
pub use tools::{ToolCatalog, ToolSpec};
