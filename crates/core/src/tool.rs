//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what let the agent act for the caller: schedule a meeting,
//! notify colleagues, compose a letter. Handlers receive the parsed argument
//! map and the caller's identity, and return a plain string.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// One concrete request to run a tool, as extracted from a model turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Name of the tool to execute
    pub name: String,

    /// The argument text exactly as the model produced it
    pub raw_arguments: String,

    /// Provider call ID, set only for structured tool calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, raw_arguments: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raw_arguments: raw_arguments.into(),
            call_id: None,
        }
    }

    pub fn with_call_id(mut self, call_id: impl Into<String>) -> Self {
        self.call_id = Some(call_id.into());
        self
    }

    /// The dedup key identifying "the same attempt".
    pub fn key(&self) -> InvocationKey {
        InvocationKey {
            name: self.name.clone(),
            raw_arguments: self.raw_arguments.clone(),
        }
    }
}

/// `(name, raw_arguments)`, compared byte for byte. The provider call ID is
/// deliberately not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InvocationKey {
    pub name: String,
    pub raw_arguments: String,
}

impl std::fmt::Display for InvocationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.name, self.raw_arguments)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Completed,
    Failed,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// The result of dispatching one invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutcome {
    /// The tool that was requested
    pub name: String,

    pub status: OutcomeStatus,

    /// `{"result": ...}` on success, `{"error": ...}` on failure
    pub output: serde_json::Map<String, serde_json::Value>,

    /// Arguments the tool was called with (empty when they did not parse)
    #[serde(default)]
    pub arguments: serde_json::Map<String, serde_json::Value>,

    /// Wall-clock time spent dispatching
    #[serde(default)]
    pub duration_ms: u64,
}

impl ToolOutcome {
    pub fn completed(name: impl Into<String>, result: impl Into<String>) -> Self {
        let mut output = serde_json::Map::new();
        output.insert("result".into(), serde_json::Value::String(result.into()));
        Self {
            name: name.into(),
            status: OutcomeStatus::Completed,
            output,
            arguments: serde_json::Map::new(),
            duration_ms: 0,
        }
    }

    pub fn failed(name: impl Into<String>, error: impl Into<String>) -> Self {
        let mut output = serde_json::Map::new();
        output.insert("error".into(), serde_json::Value::String(error.into()));
        Self {
            name: name.into(),
            status: OutcomeStatus::Failed,
            output,
            arguments: serde_json::Map::new(),
            duration_ms: 0,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == OutcomeStatus::Completed
    }

    /// The result text on success.
    pub fn result_text(&self) -> Option<&str> {
        self.output.get("result").and_then(|v| v.as_str())
    }

    /// The error text on failure.
    pub fn error_message(&self) -> Option<&str> {
        self.output.get("error").and_then(|v| v.as_str())
    }

    /// The text fed back to the model as a tool result.
    pub fn summary(&self) -> String {
        match self.status {
            OutcomeStatus::Completed => self.result_text().unwrap_or_default().to_string(),
            OutcomeStatus::Failed => {
                format!("Error: {}", self.error_message().unwrap_or("unknown error"))
            }
        }
    }
}

/// The core Tool trait.
///
/// Each capability implements this trait and is registered in the
/// [`ToolRegistry`] at startup.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "schedule_meeting").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool on behalf of `caller`.
    async fn execute(
        &self,
        arguments: &serde_json::Map<String, serde_json::Value>,
        caller: &str,
    ) -> std::result::Result<String, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools.
///
/// Populated at startup and read-only while tasks run.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Resolve a tool by name.
    pub fn resolve(&self, name: &str) -> std::result::Result<&dyn Tool, ToolError> {
        self.tools
            .get(name)
            .map(|t| t.as_ref())
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }

    /// Get all tool definitions, sorted by name so prompts are stable.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.values().map(|t| t.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// List all registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str { "echo" }
        fn description(&self) -> &str { "Echoes back the input" }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(
            &self,
            arguments: &serde_json::Map<String, serde_json::Value>,
            caller: &str,
        ) -> std::result::Result<String, ToolError> {
            let text = arguments
                .get("text")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ToolError::InvalidArguments("text is required".into()))?;
            Ok(format!("{caller}: {text}"))
        }
    }

    #[test]
    fn registry_register_and_resolve() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        assert!(registry.resolve("echo").is_ok());
        let err = registry.resolve("ghost").err().unwrap();
        assert!(matches!(err, ToolError::UnknownTool(ref n) if n == "ghost"));
    }

    #[test]
    fn registry_definitions() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let defs = registry.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
        assert_eq!(registry.names(), vec!["echo"]);
    }

    #[tokio::test]
    async fn resolved_tool_receives_caller() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));

        let args = serde_json::json!({"text": "hello"});
        let tool = registry.resolve("echo").unwrap();
        let out = tool
            .execute(args.as_object().unwrap(), "ann@example.com")
            .await
            .unwrap();
        assert_eq!(out, "ann@example.com: hello");
    }

    #[test]
    fn invocation_key_ignores_call_id() {
        let a = ToolInvocation::new("echo", r#"{"text":"x"}"#).with_call_id("call_1");
        let b = ToolInvocation::new("echo", r#"{"text":"x"}"#).with_call_id("call_2");
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn invocation_key_is_byte_exact() {
        let a = ToolInvocation::new("echo", r#"{"text":"x"}"#);
        let b = ToolInvocation::new("echo", r#"{"text": "x"}"#);
        assert_ne!(a.key(), b.key());
        assert_eq!(a.key().to_string(), r#"echo:{"text":"x"}"#);
    }

    #[test]
    fn outcome_summaries() {
        let ok = ToolOutcome::completed("echo", "hi");
        assert!(ok.is_completed());
        assert_eq!(ok.summary(), "hi");

        let bad = ToolOutcome::failed("ghost", "Unknown tool: ghost");
        assert!(!bad.is_completed());
        assert_eq!(bad.error_message(), Some("Unknown tool: ghost"));
        assert_eq!(bad.summary(), "Error: Unknown tool: ghost");
    }

    #[test]
    fn outcome_status_serializes_lowercase() {
        let json = serde_json::to_value(ToolOutcome::failed("x", "boom")).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["output"]["error"], "boom");
    }
}
