use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::decode::{Decision, DecisionSchema, decode_decision};
use crate::error::AgentError;
use crate::gateway::LanguageModel;
use crate::prompt::PromptTemplate;
use crate::tools::{ToolCatalog, ToolSpec};

/// Fallback used when the model signals completion without any answer text.
const EMPTY_RESPONSE_FALLBACK: &str = "No response provided";

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Decide/act cycles allowed per invocation before forced termination.
    pub max_iterations: u32,
    /// When true, a decision naming an unknown tool terminates the run
    /// instead of feeding an error string back for the model to correct.
    pub strict_tools: bool,
    pub template: PromptTemplate,
    pub schema: DecisionSchema,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            strict_tools: false,
            template: PromptTemplate::default(),
            schema: DecisionSchema::default(),
        }
    }
}

/// The terminal value of one full invocation. `tool_calls` and
/// `tool_results` are index-aligned; their length is `iterations - 1` when
/// the run ended with a final answer (the last iteration produced no tool
/// call) and `iterations` when the iteration ceiling was exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationResult {
    pub tool_calls: Vec<String>,
    pub tool_results: Vec<String>,
    pub final_response: String,
    pub iterations: u32,
}

pub struct AgentBuilder {
    gateway: Option<Arc<dyn LanguageModel>>,
    tools: Vec<ToolSpec>,
    config: AgentConfig,
    cancellation: Option<CancellationToken>,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self {
            gateway: None,
            tools: Vec::new(),
            config: AgentConfig::default(),
            cancellation: None,
        }
    }
}

impl AgentBuilder {
    pub fn gateway<M>(mut self, gateway: M) -> Self
    where
        M: LanguageModel + 'static,
    {
        self.gateway = Some(Arc::new(gateway));
        self
    }

    pub fn tool(mut self, tool: ToolSpec) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn template(mut self, template: PromptTemplate) -> Self {
        self.config.template = template;
        self
    }

    pub fn schema(mut self, schema: DecisionSchema) -> Self {
        self.config.schema = schema;
        self
    }

    pub fn max_iterations(mut self, max_iterations: u32) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    pub fn strict_tools(mut self, strict_tools: bool) -> Self {
        self.config.strict_tools = strict_tools;
        self
    }

    /// Token checked at the top of each deciding iteration; a cancelled run
    /// returns its best-effort partial result.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn build(self) -> Result<Agent, AgentError> {
        let Some(gateway) = self.gateway else {
            return Err(AgentError::Config(
                "agent gateway must be configured via AgentBuilder::gateway(...)".to_string(),
            ));
        };

        // Re-registration under the same name replaces the prior entry.
        let mut catalog = ToolCatalog::new();
        for tool in self.tools {
            catalog.register(tool);
        }

        Ok(Agent {
            gateway,
            catalog,
            config: self.config,
            cancellation: self.cancellation,
        })
    }
}

/// The agent loop: compiles a prompt from the template, tool listing, and
/// running context, calls the gateway, decodes the decision, and either
/// dispatches a tool (folding its result back into context) or terminates.
///
/// The catalog is fixed at build time, so concurrent invocations on a
/// shared agent only ever read shared state.
pub struct Agent {
    gateway: Arc<dyn LanguageModel>,
    catalog: ToolCatalog,
    config: AgentConfig,
    cancellation: Option<CancellationToken>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("catalog", &self.catalog)
            .field("config", &self.config)
            .finish()
    }
}

impl Agent {
    pub fn builder() -> AgentBuilder {
        AgentBuilder::default()
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    /// Runs the loop with the configured iteration ceiling.
    ///
    /// Runtime failures never surface as errors: gateway failures, decode
    /// failures, unknown tools, and handler failures all end up described
    /// in the returned `final_response`, which is never empty.
    pub async fn invoke(&self, user_query: impl Into<String>) -> InvocationResult {
        self.invoke_with_ceiling(user_query, self.config.max_iterations)
            .await
    }

    /// Runs the loop with a per-call iteration ceiling.
    pub async fn invoke_with_ceiling(
        &self,
        user_query: impl Into<String>,
        max_iterations: u32,
    ) -> InvocationResult {
        let user_query = user_query.into();
        let tool_listing = self.catalog.describe_all();

        let mut context = user_query.clone();
        let mut tool_calls: Vec<String> = Vec::new();
        let mut tool_results: Vec<String> = Vec::new();
        let mut iterations = 0u32;

        while iterations < max_iterations {
            if let Some(token) = &self.cancellation {
                if token.is_cancelled() {
                    warn!(iterations, "invocation cancelled; returning partial result");
                    return InvocationResult {
                        final_response: synthesize_cancelled(&tool_calls, &tool_results),
                        tool_calls,
                        tool_results,
                        iterations,
                    };
                }
            }

            iterations += 1;
            let prompt = self.config.template.compile(&tool_listing, &context);
            debug!(iteration = iterations, "calling model gateway");

            let raw = match self.gateway.generate(&prompt).await {
                Ok(raw) => raw,
                Err(err) => {
                    error!(iteration = iterations, %err, "model gateway failed");
                    return InvocationResult {
                        final_response: format!("Error: model backend unavailable: {err}"),
                        tool_calls,
                        tool_results,
                        iterations,
                    };
                }
            };

            let decision = match decode_decision(&raw, &self.config.schema) {
                Ok(decision) => decision,
                Err(err) => {
                    // Repeated malformed output indicates a model/template
                    // mismatch, not a transient fault; terminate this run.
                    error!(iteration = iterations, %err, "undecodable model response");
                    return InvocationResult {
                        final_response: format!(
                            "Error parsing model response: {}; raw response: {}",
                            err.message,
                            snippet(&err.raw)
                        ),
                        tool_calls,
                        tool_results,
                        iterations,
                    };
                }
            };

            if decision.is_ambiguous() {
                // Tie-break: tool execution intent overrides a premature
                // final answer.
                warn!(
                    tool = decision.tool_name.as_deref().unwrap_or_default(),
                    "decision carries both a tool call and a final response; executing the tool"
                );
            }

            let Decision {
                tool_name,
                parameters,
                final_response,
            } = decision;

            let Some(tool_name) = tool_name else {
                let Some(final_response) = final_response else {
                    return InvocationResult {
                        final_response:
                            "Error: model produced neither a tool call nor a final response"
                                .to_string(),
                        tool_calls,
                        tool_results,
                        iterations,
                    };
                };

                let final_response = if final_response.is_empty() {
                    EMPTY_RESPONSE_FALLBACK.to_string()
                } else {
                    final_response
                };
                debug!(iterations, "final response produced");
                return InvocationResult {
                    final_response,
                    tool_calls,
                    tool_results,
                    iterations,
                };
            };

            if self.config.strict_tools && self.catalog.lookup(&tool_name).is_err() {
                return InvocationResult {
                    final_response: format!("Error: tool '{tool_name}' not found"),
                    tool_calls,
                    tool_results,
                    iterations,
                };
            }

            let result = self.dispatch_tool(&tool_name, parameters).await;
            debug!(tool = %tool_name, result = %snippet(&result), "tool executed");

            context = rewrite_context(&user_query, &tool_name, &result);
            tool_calls.push(tool_name);
            tool_results.push(result);
        }

        InvocationResult {
            final_response: synthesize_exhausted(max_iterations, &tool_calls, &tool_results),
            tool_calls,
            tool_results,
            iterations,
        }
    }

    /// Convenience wrapper returning only the final response string.
    pub async fn run(&self, user_query: impl Into<String>) -> String {
        let result = self.invoke(user_query).await;
        debug!(
            iterations = result.iterations,
            tools = ?result.tool_calls,
            "invocation finished"
        );
        result.final_response
    }

    /// The failure-isolation boundary: lookup and handler failures are
    /// converted into string results fed back to the model, never
    /// propagated out of the loop.
    async fn dispatch_tool(&self, tool_name: &str, parameters: Vec<String>) -> String {
        let tool = match self.catalog.lookup(tool_name) {
            Ok(tool) => tool,
            Err(_) => {
                warn!(tool = %tool_name, "decision named an unknown tool");
                return format!("Error: tool '{tool_name}' not found");
            }
        };

        match tool.execute(parameters).await {
            Ok(result) => result,
            Err(err) => format!("Error executing tool '{tool_name}': {err}"),
        }
    }
}

/// Rewrites the running context after a tool execution: the original query,
/// the most recent tool's name and result, and an instruction to continue
/// or answer.
fn rewrite_context(user_query: &str, tool_name: &str, result: &str) -> String {
    format!(
        "{user_query}\n\n--- Previous Tool Call ---\nTool Used: {tool_name}\nResult: {result}\n\n\
         Based on this result, either call another tool or provide the final response to the user."
    )
}

fn synthesize_exhausted(max_iterations: u32, tool_calls: &[String], tool_results: &[String]) -> String {
    match tool_calls.last().zip(tool_results.last()) {
        Some((name, result)) => format!(
            "Error: maximum iterations ({max_iterations}) reached without a final response. \
             Partial results: last tool '{name}' returned: {result}"
        ),
        None => format!(
            "Error: maximum iterations ({max_iterations}) reached without a final response."
        ),
    }
}

fn synthesize_cancelled(tool_calls: &[String], tool_results: &[String]) -> String {
    match tool_calls.last().zip(tool_results.last()) {
        Some((name, result)) => format!(
            "Invocation cancelled. Partial results: last tool '{name}' returned: {result}"
        ),
        None => "Invocation cancelled before any tool was executed.".to_string(),
    }
}

fn snippet(text: &str) -> &str {
    let mut end = text.len().min(200);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests;
