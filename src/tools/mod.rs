use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::error::ToolError;

type ToolHandler =
    dyn Fn(Vec<String>) -> BoxFuture<'static, Result<String, ToolError>> + Send + Sync;

/// A registered tool: a unique name, a description shown verbatim to the
/// model, and an async handler taking the canonical ordered-string
/// parameters and returning a string result.
#[derive(Clone)]
pub struct ToolSpec {
    name: String,
    description: String,
    handler: Arc<ToolHandler>,
}

impl std::fmt::Debug for ToolSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSpec")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            handler: Arc::new(|_params| {
                Box::pin(async {
                    Err(ToolError::Execution(
                        "tool handler not configured".to_string(),
                    ))
                })
            }),
        }
    }

    pub fn with_handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Vec<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ToolError>> + Send + 'static,
    {
        self.handler = Arc::new(move |params| Box::pin(handler(params)));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub async fn execute(&self, parameters: Vec<String>) -> Result<String, ToolError> {
        (self.handler)(parameters).await
    }
}

/// Registry of tools available to the model, keyed by name. Listing order is
/// registration order, so identical catalogs always produce identical
/// prompts.
#[derive(Clone, Debug, Default)]
pub struct ToolCatalog {
    order: Vec<String>,
    entries: HashMap<String, ToolSpec>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool. Re-registering an existing name replaces the prior
    /// entry in place, keeping its original position in the listing.
    pub fn register(&mut self, tool: ToolSpec) {
        let name = tool.name().to_string();
        if self.entries.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    pub fn lookup(&self, name: &str) -> Result<&ToolSpec, ToolError> {
        self.entries
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Formats the textual listing injected into prompts, one
    /// `- name: description` line per tool in registration order.
    pub fn describe_all(&self) -> String {
        self.order
            .iter()
            .filter_map(|name| self.entries.get(name))
            .map(|tool| format!("- {}: {}", tool.name(), tool.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
