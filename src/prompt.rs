use crate::error::TemplateError;

/// Placeholder replaced with the catalog's tool listing.
pub const TOOL_LIST_PLACEHOLDER: &str = "{tool_list}";
/// Placeholder replaced with the running context (query + latest tool result).
pub const USER_INPUT_PLACEHOLDER: &str = "{user_input}";

/// Default template. Instructs the model to answer with a single fenced JSON
/// object using the default decision keys and the literal "None" sentinel.
pub const DEFAULT_TEMPLATE: &str = r#"You are a helpful assistant that can call tools to answer the user's request.

You have access to the following tools:
{tool_list}

Decide whether a tool is needed. Respond with exactly one JSON object inside a
```json fence and nothing else:

```json
{
    "Tool call": "<name of the tool to call, or None>",
    "Tool Parameters": "<comma-separated parameter values, or None>",
    "Final Response": "<your answer to the user, or None>"
}
```

Rules:
- To call a tool, set "Tool call" and "Tool Parameters" and set "Final Response" to "None".
- To answer the user, set "Tool call" and "Tool Parameters" to "None" and put the answer in "Final Response".
- Use the literal string "None" for any field that does not apply.

User request:
{user_input}
"#;

/// A prompt template validated once at construction. Compilation is a pure
/// placeholder substitution, so identical inputs always yield identical
/// prompts.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplate {
    /// Validates that both placeholders are present. A template without them
    /// is a setup error, not something to discover mid-run.
    pub fn new(template: impl Into<String>) -> Result<Self, TemplateError> {
        let template = template.into();
        for placeholder in [TOOL_LIST_PLACEHOLDER, USER_INPUT_PLACEHOLDER] {
            if !template.contains(placeholder) {
                return Err(TemplateError::MissingPlaceholder { placeholder });
            }
        }
        Ok(Self { template })
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Substitutes the tool listing and running context into the template.
    /// Single pass over the template text only, so placeholder-shaped text
    /// inside a tool description or the context is never re-expanded.
    pub fn compile(&self, tool_listing: &str, context: &str) -> String {
        let mut output =
            String::with_capacity(self.template.len() + tool_listing.len() + context.len());
        let mut rest = self.template.as_str();

        loop {
            let next_tool = rest.find(TOOL_LIST_PLACEHOLDER);
            let next_input = rest.find(USER_INPUT_PLACEHOLDER);
            let (index, placeholder, value) = match (next_tool, next_input) {
                (Some(tool), Some(input)) if tool <= input => {
                    (tool, TOOL_LIST_PLACEHOLDER, tool_listing)
                }
                (Some(tool), None) => (tool, TOOL_LIST_PLACEHOLDER, tool_listing),
                (_, Some(input)) => (input, USER_INPUT_PLACEHOLDER, context),
                (None, None) => break,
            };

            output.push_str(&rest[..index]);
            output.push_str(value);
            rest = &rest[index + placeholder.len()..];
        }

        output.push_str(rest);
        output
    }
}
