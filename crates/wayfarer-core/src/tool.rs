//! Tool trait and registry — the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act: search the city
//! catalog, look up attractions, compute budgets, produce a final answer.
//! Each tool declares a descriptor (parameter schema, timeout, category)
//! and the registry enforces that contract uniformly at execution time.

use crate::error::ToolError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// The JSON type of a declared parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

/// One named parameter in a tool's schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub description: String,
    pub required: bool,
}

impl ParamSpec {
    pub fn required(name: &str, kind: ParamKind, description: &str) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: true,
        }
    }

    pub fn optional(name: &str, kind: ParamKind, description: &str) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: false,
        }
    }
}

/// Immutable metadata describing a registered tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique flat identifier (e.g., "search_cities").
    pub name: String,

    /// Human description, also fed to the planner prompt.
    pub description: String,

    /// Declared parameters with the required set.
    pub params: Vec<ParamSpec>,

    /// Per-call deadline enforced by the registry.
    pub timeout: Duration,

    /// Coarse grouping (e.g., "travel", "answer").
    pub category: String,

    /// Free-form labels.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Whether a successful call marks the task as answered.
    #[serde(default)]
    pub terminal: bool,
}

impl ToolDescriptor {
    /// Names of all required parameters.
    pub fn required_params(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
    }
}

/// Why a tool execution failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NotFound,
    InvalidParams,
    ExecutionError,
    Timeout,
}

/// The uniform result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExecutionResult {
    Success {
        value: serde_json::Value,
    },
    Failure {
        kind: FailureKind,
        message: String,
    },
}

impl ExecutionResult {
    pub fn success(value: serde_json::Value) -> Self {
        Self::Success { value }
    }

    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn value(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Success { value } => Some(value),
            Self::Failure { .. } => None,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }
}

impl From<ToolError> for ExecutionResult {
    fn from(err: ToolError) -> Self {
        let kind = match &err {
            ToolError::NotFound(_) => FailureKind::NotFound,
            ToolError::InvalidParams { .. } => FailureKind::InvalidParams,
            ToolError::ExecutionFailed { .. } => FailureKind::ExecutionError,
            ToolError::Timeout { .. } => FailureKind::Timeout,
        };
        Self::Failure {
            kind,
            message: err.to_string(),
        }
    }
}

/// The core Tool trait.
///
/// Executors receive validated parameters and return a JSON value on
/// success. Deadline enforcement and failure wrapping happen in the
/// registry, not in individual tools.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The descriptor for this tool. Immutable after registration.
    fn descriptor(&self) -> ToolDescriptor;

    /// Execute the tool with the given parameters.
    async fn execute(
        &self,
        params: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, ToolError>;
}

/// A registry of available tools.
///
/// Registration is one-shot at startup; names must be unique. The registry
/// validates required parameters, enforces each tool's declared deadline,
/// and wraps every outcome in the uniform [`ExecutionResult`]. It performs
/// no retries — retry policy lives in the loop.
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
        let name = tool.descriptor().name;
        self.tools.insert(name, tool);
    }

    /// Descriptors of all registered tools.
    pub fn list(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(|t| t.descriptor()).collect()
    }

    /// Descriptor for a single tool.
    pub fn describe(&self, name: &str) -> Option<ToolDescriptor> {
        self.tools.get(name).map(|t| t.descriptor())
    }

    /// Names of tools whose success marks the task as answered.
    pub fn terminal_tools(&self) -> Vec<String> {
        self.tools
            .values()
            .map(|t| t.descriptor())
            .filter(|d| d.terminal)
            .map(|d| d.name)
            .collect()
    }

    /// Whether the named tool is registered and terminal.
    pub fn is_terminal(&self, name: &str) -> bool {
        self.describe(name).is_some_and(|d| d.terminal)
    }

    /// Execute a tool under its declared deadline.
    pub async fn execute(&self, name: &str, params: serde_json::Value) -> ExecutionResult {
        let Some(tool) = self.tools.get(name) else {
            return ExecutionResult::failure(
                FailureKind::NotFound,
                format!("Tool not found: {name}"),
            );
        };

        let descriptor = tool.descriptor();

        // Required-parameter validation happens before the executor runs.
        let missing: Vec<&str> = descriptor
            .required_params()
            .filter(|p| params.get(p).map_or(true, |v| v.is_null()))
            .collect();
        if !missing.is_empty() {
            return ExecutionResult::failure(
                FailureKind::InvalidParams,
                format!("Missing required parameters: {}", missing.join(", ")),
            );
        }

        match tokio::time::timeout(descriptor.timeout, tool.execute(params)).await {
            Ok(Ok(value)) => ExecutionResult::success(value),
            Ok(Err(err)) => err.into(),
            Err(_) => ExecutionResult::failure(
                FailureKind::Timeout,
                format!(
                    "Tool timed out: {} after {}s",
                    descriptor.name,
                    descriptor.timeout.as_secs()
                ),
            ),
        }
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
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

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor {
                name: "echo".into(),
                description: "Echoes back the input".into(),
                params: vec![ParamSpec::required(
                    "text",
                    ParamKind::String,
                    "The text to echo",
                )],
                timeout: Duration::from_secs(5),
                category: "test".into(),
                tags: vec![],
                terminal: false,
            }
        }

        async fn execute(
            &self,
            params: serde_json::Value,
        ) -> std::result::Result<serde_json::Value, ToolError> {
            Ok(serde_json::json!({ "echo": params["text"] }))
        }
    }

    /// A tool that sleeps past its declared deadline.
    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor {
                name: "slow".into(),
                description: "Sleeps forever".into(),
                params: vec![],
                timeout: Duration::from_millis(20),
                category: "test".into(),
                tags: vec![],
                terminal: false,
            }
        }

        async fn execute(
            &self,
            _params: serde_json::Value,
        ) -> std::result::Result<serde_json::Value, ToolError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(serde_json::Value::Null)
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        registry.register(Box::new(SlowTool));
        registry
    }

    #[test]
    fn register_and_describe() {
        let registry = registry();
        assert!(registry.describe("echo").is_some());
        assert!(registry.describe("nonexistent").is_none());
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn execute_success() {
        let registry = registry();
        let result = registry
            .execute("echo", serde_json::json!({"text": "hello"}))
            .await;
        assert!(result.is_success());
        assert_eq!(result.value().unwrap()["echo"], "hello");
    }

    #[tokio::test]
    async fn missing_required_param_is_invalid_params() {
        let registry = registry();
        let result = registry.execute("echo", serde_json::json!({})).await;
        assert_eq!(result.failure_kind(), Some(FailureKind::InvalidParams));
    }

    #[tokio::test]
    async fn null_required_param_is_invalid_params() {
        let registry = registry();
        let result = registry
            .execute("echo", serde_json::json!({"text": null}))
            .await;
        assert_eq!(result.failure_kind(), Some(FailureKind::InvalidParams));
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let registry = registry();
        let result = registry.execute("nonexistent", serde_json::json!({})).await;
        assert_eq!(result.failure_kind(), Some(FailureKind::NotFound));
    }

    #[tokio::test]
    async fn deadline_expiry_is_timeout() {
        let registry = registry();
        let result = registry.execute("slow", serde_json::json!({})).await;
        assert_eq!(result.failure_kind(), Some(FailureKind::Timeout));
    }

    #[test]
    fn terminal_tools_filtered_from_metadata() {
        struct AnswerTool;

        #[async_trait]
        impl Tool for AnswerTool {
            fn descriptor(&self) -> ToolDescriptor {
                ToolDescriptor {
                    name: "answer".into(),
                    description: "Final answer".into(),
                    params: vec![],
                    timeout: Duration::from_secs(1),
                    category: "answer".into(),
                    tags: vec![],
                    terminal: true,
                }
            }

            async fn execute(
                &self,
                _params: serde_json::Value,
            ) -> std::result::Result<serde_json::Value, ToolError> {
                Ok(serde_json::Value::Null)
            }
        }

        let mut registry = registry();
        registry.register(Box::new(AnswerTool));
        assert_eq!(registry.terminal_tools(), vec!["answer".to_string()]);
        assert!(registry.is_terminal("answer"));
        assert!(!registry.is_terminal("echo"));
    }
}
