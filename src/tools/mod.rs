pub mod web_text;
pub mod youtube;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A lookup the oracle asked for. Lives only until its result is recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Oracle-assigned identity, echoed back on the matching result.
    pub id: String,
    pub tool: String,
    pub args: Value,
}

/// Outcome of a single tool execution. Errors are information, not failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    Success(Value),
    Error(String),
}

impl Outcome {
    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Error(_))
    }

    /// The payload as the oracle will read it.
    pub fn render(&self) -> String {
        match self {
            Outcome::Success(Value::String(s)) => s.clone(),
            Outcome::Success(other) => other.to_string(),
            Outcome::Error(err) => format!("Error: {}", err),
        }
    }
}

/// Result of executing a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub tool: String,
    pub outcome: Outcome,
}

impl ToolResult {
    pub fn error(call: &ToolCall, message: impl Into<String>) -> Self {
        Self {
            call_id: call.id.clone(),
            tool: call.tool.clone(),
            outcome: Outcome::Error(message.into()),
        }
    }
}

/// Describes a tool so the oracle knows what's available and how to call it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: Value,
}

/// A side-information lookup the oracle may invoke while reasoning.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> Value;
    async fn execute(&self, args: &Value) -> Result<Value>;
}

/// Pull a required string argument out of a tool's argument object.
pub fn require_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("missing required arg: {}", key))
}

/// The single-`url` argument schema both built-in tools share.
pub fn url_parameters(description: &str) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "url": {"type": "string", "description": description}
        },
        "required": ["url"],
        "additionalProperties": false
    })
}

/// Holds all registered tools. RwLock allows runtime registration + parallel reads.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
        }
    }

    pub async fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.write().await.insert(name, tool);
    }

    /// Run one call. Never fails: unknown tools and tool errors come back as
    /// [`Outcome::Error`] so the oracle can adapt.
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        let tool = self.tools.read().await.get(&call.tool).cloned();
        let outcome = match tool {
            Some(tool) => match tool.execute(&call.args).await {
                Ok(output) => Outcome::Success(output),
                Err(e) => Outcome::Error(e.to_string()),
            },
            None => Outcome::Error(format!("unknown tool: {}", call.tool)),
        };
        ToolResult {
            call_id: call.id.clone(),
            tool: call.tool.clone(),
            outcome,
        }
    }

    /// Specs for every registered tool, sorted by name for a stable request.
    pub async fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self
            .tools
            .read()
            .await
            .values()
            .map(|t| ToolSpec {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters(),
            })
            .collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_unwraps_plain_strings() {
        let out = Outcome::Success(Value::String("page text".to_string()));
        assert_eq!(out.render(), "page text");
    }

    #[test]
    fn render_serializes_objects() {
        let out = Outcome::Success(serde_json::json!({"title": "t"}));
        assert_eq!(out.render(), r#"{"title":"t"}"#);
    }

    #[test]
    fn render_prefixes_errors() {
        let out = Outcome::Error("timed out".to_string());
        assert_eq!(out.render(), "Error: timed out");
        assert!(out.is_error());
    }

    #[test]
    fn require_str_rejects_missing_and_non_string() {
        let args = serde_json::json!({"url": 42});
        assert!(require_str(&args, "url").is_err());
        assert!(require_str(&serde_json::json!({}), "url").is_err());
        let ok = serde_json::json!({"url": "https://a.example"});
        assert_eq!(require_str(&ok, "url").unwrap(), "https://a.example");
    }
}
