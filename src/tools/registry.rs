//! Tool registry - manages and dispatches tool calls
//!
//! Central hub for registering tools and routing tool calls to handlers.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::core::config::SearchConfig;
use crate::core::{Result, Snippet, ToolDefinition, TwinError};
use crate::tools::search::{SearchTool, TavilySearch};

/// Name the search tool is exposed under
pub const SEARCH_TOOL: &str = "search";

struct RegisteredTool {
    definition: ToolDefinition,
    tool: Arc<dyn SearchTool>,
}

/// Registry of available tools
pub struct ToolRegistry {
    /// Tools indexed by name
    tools: BTreeMap<String, RegisteredTool>,
    /// Upper bound on snippets returned per invocation
    max_results: usize,
    /// Per-invocation timeout
    timeout: Option<Duration>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new(max_results: usize, timeout: Option<Duration>) -> Self {
        Self {
            tools: BTreeMap::new(),
            max_results: max_results.max(1),
            timeout,
        }
    }

    /// Build the registry described by configuration
    ///
    /// With search disabled the registry is empty and the model is offered no tools.
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        let mut registry = Self::new(config.max_results, config.timeout());
        if config.enabled {
            registry.register_search(SEARCH_TOOL, Arc::new(TavilySearch::from_config(config)?));
        }
        Ok(registry)
    }

    /// Register a search capability under `name`
    pub fn register_search(&mut self, name: impl Into<String>, tool: Arc<dyn SearchTool>) {
        let name = name.into();
        let definition = ToolDefinition::function(
            name.clone(),
            "Search the web for more information about companies, certifications, \
             or other details of the profile",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query"
                    }
                },
                "required": ["query"]
            }),
        );
        self.tools.insert(name, RegisteredTool { definition, tool });
    }

    /// Get all tool definitions, ordered by name
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool call
    ///
    /// Any failure other than an unknown tool name is reported as a
    /// `ToolInvocation` error so the graph can hand it back to the model.
    pub async fn invoke(&self, name: &str, arguments: &serde_json::Value) -> Result<Vec<Snippet>> {
        let registered = self
            .tools
            .get(name)
            .ok_or_else(|| TwinError::UnknownTool(name.to_string()))?;

        let query = arguments
            .get("query")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| TwinError::tool(format!("{} requires a non-empty 'query' argument", name)))?;

        tracing::debug!(tool = name, query, "invoking tool");

        let call = registered.tool.search(query, self.max_results);
        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                TwinError::tool(format!("{} timed out after {}s", name, limit.as_secs_f32()))
            })?,
            None => call.await,
        };

        let mut snippets = outcome.map_err(|e| match e {
            TwinError::ToolInvocation(_) => e,
            other => TwinError::tool(other.to_string()),
        })?;
        snippets.truncate(self.max_results);
        Ok(snippets)
    }

    /// Render snippets as the content of a tool message
    pub fn render(snippets: &[Snippet]) -> Result<String> {
        Ok(serde_json::to_string(snippets)?)
    }
}
