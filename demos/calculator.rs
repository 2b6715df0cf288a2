//! Live calculator agent against a real provider. Needs `OPENAI_API_KEY`
//! (or set `GROQ_API_KEY` and switch the gateway below).
//! Run with `cargo run --example calculator`.

use std::error::Error;

use toolcall_agent::{Agent, OpenAiGateway, ToolError, ToolSpec};

fn calculator() -> ToolSpec {
    ToolSpec::new(
        "calculator",
        "Evaluates a single arithmetic operation. Parameters: left operand, \
         operator (+, -, *, /), right operand as three comma-separated values, \
         e.g. '125, *, 48'.",
    )
    .with_handler(|params| async move {
        let [left, op, right] = params.as_slice() else {
            return Err(ToolError::InvalidParameters {
                tool: "calculator".to_string(),
                message: format!("expected 3 parameters, got {}", params.len()),
            });
        };

        let left: f64 = left
            .parse()
            .map_err(|err| ToolError::Execution(format!("bad left operand: {err}")))?;
        let right: f64 = right
            .parse()
            .map_err(|err| ToolError::Execution(format!("bad right operand: {err}")))?;

        let value = match op.as_str() {
            "+" => left + right,
            "-" => left - right,
            "*" => left * right,
            "/" if right != 0.0 => left / right,
            "/" => return Err(ToolError::Execution("division by zero".to_string())),
            other => {
                return Err(ToolError::Execution(format!("unknown operator '{other}'")));
            }
        };

        Ok(value.to_string())
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

    let agent = Agent::builder()
        .gateway(OpenAiGateway::from_env("gpt-4o-mini")?)
        .tool(calculator())
        .max_iterations(5)
        .build()?;

    for query in [
        "What is 125 multiplied by 48?",
        "Calculate (456 + 789), then multiply the result by 12.",
        "Hello! Who are you?",
    ] {
        println!("\n> {query}");
        let result = agent.invoke(query).await;
        for (name, tool_result) in result.tool_calls.iter().zip(&result.tool_results) {
            println!("  [{name}] {tool_result}");
        }
        println!("{}", result.final_response);
    }

    Ok(())
}
