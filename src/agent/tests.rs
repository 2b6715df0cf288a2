use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::error::{GatewayError, ToolError};

/// Scripted gateway: pops canned responses in order and records every
/// prompt it was given.
#[derive(Default)]
struct ScriptedGateway {
    responses: Mutex<VecDeque<Result<String, GatewayError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGateway {
    fn with_responses(responses: Vec<Result<String, GatewayError>>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::from(responses)),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LanguageModel for ScriptedGateway {
    async fn generate(&self, prompt: &str) -> Result<String, GatewayError> {
        self.prompts
            .lock()
            .expect("prompt lock poisoned")
            .push(prompt.to_string());
        let mut guard = self.responses.lock().expect("response lock poisoned");
        guard.pop_front().unwrap_or_else(|| {
            Err(GatewayError::Response(
                "no more scripted responses".to_string(),
            ))
        })
    }
}

fn decision(tool_call: &str, parameters: &str, final_response: &str) -> String {
    format!(
        "```json\n{{\n    \"Tool call\": \"{tool_call}\",\n    \"Tool Parameters\": \"{parameters}\",\n    \"Final Response\": \"{final_response}\"\n}}\n```"
    )
}

fn calculator_tool() -> ToolSpec {
    ToolSpec::new("calculator", "Sums two numbers given as 'a+b'").with_handler(|params| {
        async move {
            let expression = params
                .first()
                .ok_or_else(|| ToolError::Execution("no expression given".to_string()))?;
            let (a, b) = expression
                .split_once('+')
                .ok_or_else(|| ToolError::Execution("expected 'a+b'".to_string()))?;
            let sum = a.trim().parse::<i64>().and_then(|a| {
                b.trim().parse::<i64>().map(|b| a + b)
            });
            match sum {
                Ok(sum) => Ok(sum.to_string()),
                Err(err) => Err(ToolError::Execution(err.to_string())),
            }
        }
    })
}

fn failing_tool() -> ToolSpec {
    ToolSpec::new("fail", "always fails")
        .with_handler(|_params| async move { Err(ToolError::Execution("boom".to_string())) })
}

#[tokio::test]
async fn calculator_scenario_produces_aligned_transcript() {
    let gateway = ScriptedGateway::with_responses(vec![
        Ok(decision("calculator", "25+37", "None")),
        Ok(decision("None", "None", "The result is 62.")),
    ]);

    let agent = Agent::builder()
        .gateway(gateway)
        .tool(calculator_tool())
        .build()
        .expect("agent builds");

    let result = agent.invoke("What is 25 + 37?").await;

    assert_eq!(
        result,
        InvocationResult {
            tool_calls: vec!["calculator".to_string()],
            tool_results: vec!["62".to_string()],
            final_response: "The result is 62.".to_string(),
            iterations: 2,
        }
    );
}

#[tokio::test]
async fn final_only_decision_terminates_without_dispatch() {
    let gateway =
        ScriptedGateway::with_responses(vec![Ok(decision("None", "None", "Hello there."))]);

    let agent = Agent::builder()
        .gateway(gateway)
        .tool(calculator_tool())
        .build()
        .expect("agent builds");

    let result = agent.invoke("Hi!").await;

    assert_eq!(result.final_response, "Hello there.");
    assert_eq!(result.iterations, 1);
    assert!(result.tool_calls.is_empty());
    assert!(result.tool_results.is_empty());
}

#[tokio::test]
async fn garbage_response_terminates_with_diagnostic_in_one_iteration() {
    let gateway = ScriptedGateway::with_responses(vec![Ok(
        "I refuse to answer in the requested format.".to_string()
    )]);

    let agent = Agent::builder()
        .gateway(gateway)
        .tool(calculator_tool())
        .build()
        .expect("agent builds");

    let result = agent.invoke("What is 1 + 1?").await;

    assert_eq!(result.iterations, 1);
    assert!(result.tool_calls.is_empty());
    assert!(result.final_response.starts_with("Error parsing model response"));
    assert!(result.final_response.contains("I refuse to answer"));
}

#[tokio::test]
async fn unknown_tool_is_fed_back_and_model_can_correct() {
    let gateway = ScriptedGateway::with_responses(vec![
        Ok(decision("calcultor", "2+2", "None")),
        Ok(decision("calculator", "2+2", "None")),
        Ok(decision("None", "None", "The answer is 4.")),
    ]);

    let agent = Agent::builder()
        .gateway(gateway)
        .tool(calculator_tool())
        .build()
        .expect("agent builds");

    let result = agent.invoke("What is 2 + 2?").await;

    assert_eq!(result.final_response, "The answer is 4.");
    assert_eq!(result.iterations, 3);
    assert_eq!(
        result.tool_calls,
        vec!["calcultor".to_string(), "calculator".to_string()]
    );
    assert_eq!(
        result.tool_results[0],
        "Error: tool 'calcultor' not found"
    );
    assert_eq!(result.tool_results[1], "4");
}

#[tokio::test]
async fn strict_tools_terminates_on_unknown_tool() {
    let gateway = ScriptedGateway::with_responses(vec![Ok(decision("nope", "x", "None"))]);

    let agent = Agent::builder()
        .gateway(gateway)
        .tool(calculator_tool())
        .strict_tools(true)
        .build()
        .expect("agent builds");

    let result = agent.invoke("anything").await;

    assert_eq!(result.final_response, "Error: tool 'nope' not found");
    assert_eq!(result.iterations, 1);
    assert!(result.tool_calls.is_empty());
}

#[tokio::test]
async fn ceiling_exhaustion_counts_every_iteration() {
    for ceiling in 1..=3u32 {
        let responses = (0..ceiling)
            .map(|_| Ok(decision("calculator", "1+1", "None")))
            .collect::<Vec<_>>();
        let gateway = ScriptedGateway::with_responses(responses);

        let agent = Agent::builder()
            .gateway(gateway)
            .tool(calculator_tool())
            .build()
            .expect("agent builds");

        let result = agent.invoke_with_ceiling("loop forever", ceiling).await;

        assert_eq!(result.iterations, ceiling);
        assert_eq!(result.tool_calls.len(), ceiling as usize);
        assert_eq!(result.tool_results.len(), ceiling as usize);
        assert!(!result.final_response.is_empty());
        assert!(result.final_response.contains("maximum iterations"));
        assert!(result.final_response.contains("last tool 'calculator'"));
    }
}

#[tokio::test]
async fn tool_failure_is_isolated_and_surfaced_as_a_result() {
    let gateway = ScriptedGateway::with_responses(vec![
        Ok(decision("fail", "None", "None")),
        Ok(decision("None", "None", "Could not compute.")),
    ]);

    let agent = Agent::builder()
        .gateway(gateway)
        .tool(failing_tool())
        .build()
        .expect("agent builds");

    let result = agent.invoke("try it").await;

    assert_eq!(result.final_response, "Could not compute.");
    assert_eq!(
        result.tool_results,
        vec!["Error executing tool 'fail': tool execution failed: boom".to_string()]
    );
}

#[tokio::test]
async fn gateway_failure_terminates_with_error_response() {
    let gateway = ScriptedGateway::with_responses(vec![Err(GatewayError::Request(
        "connection refused".to_string(),
    ))]);

    let agent = Agent::builder()
        .gateway(gateway)
        .tool(calculator_tool())
        .build()
        .expect("agent builds");

    let result = agent.invoke("hello").await;

    assert_eq!(result.iterations, 1);
    assert!(result.final_response.starts_with("Error: model backend unavailable"));
    assert!(result.final_response.contains("connection refused"));
}

#[tokio::test]
async fn ambiguous_decision_prefers_the_tool_call() {
    let gateway = ScriptedGateway::with_responses(vec![
        Ok(decision("calculator", "3+4", "premature answer")),
        Ok(decision("None", "None", "The sum is 7.")),
    ]);

    let agent = Agent::builder()
        .gateway(gateway)
        .tool(calculator_tool())
        .build()
        .expect("agent builds");

    let result = agent.invoke("3 plus 4?").await;

    assert_eq!(result.tool_calls, vec!["calculator".to_string()]);
    assert_eq!(result.tool_results, vec!["7".to_string()]);
    assert_eq!(result.final_response, "The sum is 7.");
}

#[tokio::test]
async fn neither_tool_nor_final_is_a_malformed_decision() {
    let gateway = ScriptedGateway::with_responses(vec![Ok(decision("None", "None", "None"))]);

    let agent = Agent::builder()
        .gateway(gateway)
        .tool(calculator_tool())
        .build()
        .expect("agent builds");

    let result = agent.invoke("say nothing").await;

    assert_eq!(result.iterations, 1);
    assert!(
        result
            .final_response
            .contains("neither a tool call nor a final response")
    );
}

#[tokio::test]
async fn empty_final_response_falls_back_to_placeholder() {
    let gateway = ScriptedGateway::with_responses(vec![Ok(decision("None", "None", ""))]);

    let agent = Agent::builder()
        .gateway(gateway)
        .tool(calculator_tool())
        .build()
        .expect("agent builds");

    let result = agent.invoke("quiet").await;

    assert_eq!(result.final_response, "No response provided");
}

#[tokio::test]
async fn context_rewrite_feeds_latest_tool_result_into_next_prompt() {
    let gateway = ScriptedGateway::with_responses(vec![
        Ok(decision("calculator", "5+6", "None")),
        Ok(decision("None", "None", "11.")),
    ]);
    let prompts_handle = std::sync::Arc::new(gateway);
    let agent = Agent::builder()
        .gateway(SharedGateway(prompts_handle.clone()))
        .tool(calculator_tool())
        .build()
        .expect("agent builds");

    let result = agent.invoke("What is 5 + 6?").await;
    assert_eq!(result.final_response, "11.");

    let prompts = prompts_handle.prompts.lock().expect("prompt lock poisoned");
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].contains("- calculator: Sums two numbers given as 'a+b'"));
    assert!(prompts[0].contains("What is 5 + 6?"));
    assert!(prompts[1].contains("--- Previous Tool Call ---"));
    assert!(prompts[1].contains("Tool Used: calculator"));
    assert!(prompts[1].contains("Result: 11"));
    assert!(prompts[1].contains("What is 5 + 6?"));
}

/// Adapter so a test can keep a handle on a gateway the agent owns.
struct SharedGateway(std::sync::Arc<ScriptedGateway>);

#[async_trait]
impl LanguageModel for SharedGateway {
    async fn generate(&self, prompt: &str) -> Result<String, GatewayError> {
        self.0.generate(prompt).await
    }
}

#[tokio::test]
async fn cancelled_token_returns_partial_result() {
    let gateway = ScriptedGateway::with_responses(vec![
        Ok(decision("calculator", "8+9", "None")),
        Ok(decision("None", "None", "17.")),
    ]);

    let token = CancellationToken::new();
    token.cancel();

    let agent = Agent::builder()
        .gateway(gateway)
        .tool(calculator_tool())
        .cancellation_token(token)
        .build()
        .expect("agent builds");

    let result = agent.invoke("What is 8 + 9?").await;

    assert_eq!(result.iterations, 0);
    assert!(result.tool_calls.is_empty());
    assert!(result.final_response.contains("cancelled"));
}

#[tokio::test]
async fn builder_requires_a_gateway() {
    let err = Agent::builder()
        .tool(calculator_tool())
        .build()
        .expect_err("must fail");

    assert!(matches!(err, AgentError::Config(_)));
}

#[test]
fn agent_formats_debug_without_gateway_internals() {
    let agent = Agent::builder()
        .gateway(ScriptedGateway::default())
        .tool(calculator_tool())
        .build()
        .expect("agent builds");

    let rendered = format!("{agent:?}");
    assert!(rendered.contains("Agent"));
    assert!(rendered.contains("calculator"));
}

#[tokio::test]
async fn run_returns_only_the_final_response() {
    let gateway =
        ScriptedGateway::with_responses(vec![Ok(decision("None", "None", "Just the answer."))]);

    let agent = Agent::builder()
        .gateway(gateway)
        .tool(calculator_tool())
        .build()
        .expect("agent builds");

    assert_eq!(agent.run("hello").await, "Just the answer.");
}

#[tokio::test]
async fn duplicate_tool_registration_silently_replaces() {
    let gateway = ScriptedGateway::with_responses(vec![
        Ok(decision("calculator", "1+2", "None")),
        Ok(decision("None", "None", "3.")),
    ]);

    let stale = ToolSpec::new("calculator", "old variant")
        .with_handler(|_params| async move { Ok("stale".to_string()) });

    let agent = Agent::builder()
        .gateway(gateway)
        .tool(stale)
        .tool(calculator_tool())
        .build()
        .expect("agent builds");

    assert_eq!(agent.catalog().len(), 1);

    let result = agent.invoke("1 plus 2").await;
    assert_eq!(result.tool_results, vec!["3".to_string()]);
}

#[tokio::test]
async fn context_rewrite_keeps_only_the_latest_tool_result() {
    let gateway = ScriptedGateway::with_responses(vec![
        Ok(decision("calculator", "1+1", "None")),
        Ok(decision("calculator", "2+2", "None")),
        Ok(decision("None", "None", "done")),
    ]);
    let handle = std::sync::Arc::new(gateway);

    let agent = Agent::builder()
        .gateway(SharedGateway(handle.clone()))
        .tool(calculator_tool())
        .build()
        .expect("agent builds");

    agent.invoke("count").await;

    let prompts = handle.prompts.lock().expect("prompt lock poisoned");
    assert_eq!(prompts.len(), 3);
    assert!(prompts[2].contains("Result: 4"));
    assert!(!prompts[2].contains("Result: 2\n"));
}
