//! Walks the full decide/act loop against a scripted gateway, no network or
//! API key required. Run with `cargo run --example scripted_loop`.

use std::collections::VecDeque;
use std::error::Error;
use std::sync::Mutex;

use async_trait::async_trait;
use toolcall_agent::{Agent, GatewayError, LanguageModel, ToolError, ToolSpec};

struct ScriptedGateway {
    responses: Mutex<VecDeque<String>>,
}

impl ScriptedGateway {
    fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(String::from).collect()),
        }
    }
}

#[async_trait]
impl LanguageModel for ScriptedGateway {
    async fn generate(&self, _prompt: &str) -> Result<String, GatewayError> {
        let mut guard = self.responses.lock().expect("lock poisoned");
        guard
            .pop_front()
            .ok_or_else(|| GatewayError::Response("scripted gateway exhausted".to_string()))
    }
}

fn calculator() -> ToolSpec {
    ToolSpec::new(
        "calculator",
        "Sums two integers given as a single 'a+b' expression",
    )
    .with_handler(|params| async move {
        let expression = params
            .first()
            .ok_or_else(|| ToolError::Execution("no expression given".to_string()))?;
        let (a, b) = expression
            .split_once('+')
            .ok_or_else(|| ToolError::Execution("expected 'a+b'".to_string()))?;
        let a: i64 = a
            .trim()
            .parse()
            .map_err(|err| ToolError::Execution(format!("bad left operand: {err}")))?;
        let b: i64 = b
            .trim()
            .parse()
            .map_err(|err| ToolError::Execution(format!("bad right operand: {err}")))?;
        Ok((a + b).to_string())
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "toolcall_agent=debug".into()),
        )
        .init();

    let gateway = ScriptedGateway::new(vec![
        r#"```json
{
    "Tool call": "calculator",
    "Tool Parameters": "25+37",
    "Final Response": "None"
}
```"#,
        r#"```json
{
    "Tool call": "None",
    "Tool Parameters": "None",
    "Final Response": "The result is 62."
}
```"#,
    ]);

    let agent = Agent::builder()
        .gateway(gateway)
        .tool(calculator())
        .build()?;

    let result = agent.invoke("What is 25 + 37?").await;

    println!("final response : {}", result.final_response);
    println!("iterations     : {}", result.iterations);
    for (name, tool_result) in result.tool_calls.iter().zip(&result.tool_results) {
        println!("tool transcript: {name} -> {tool_result}");
    }

    Ok(())
}
