//! Tool call directives and execution results

use serde::Serialize;
use serde_json::{Map, Value};

/// A model's request to run a named tool, parsed out of its response text
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallDirective {
    pub tool_name: String,
    pub args: Map<String, Value>,
}

impl ToolCallDirective {
    pub fn new(tool_name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            tool_name: tool_name.into(),
            args,
        }
    }

    /// Arguments as a JSON object value
    pub fn args_value(&self) -> Value {
        Value::Object(self.args.clone())
    }
}

/// Outcome of a tool execution
///
/// Failures are data, not errors: they are handed back to the model as tool
/// output so it can explain the problem conversationally.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolExecutionResult {
    Failure { error: String, details: String },
    Success(Value),
}

impl ToolExecutionResult {
    pub fn success(value: impl Into<Value>) -> Self {
        ToolExecutionResult::Success(value.into())
    }

    pub fn failure(error: impl Into<String>, details: impl Into<String>) -> Self {
        ToolExecutionResult::Failure {
            error: error.into(),
            details: details.into(),
        }
    }

    pub fn not_found(tool_name: &str) -> Self {
        Self::failure("Tool not found", format!("Tool {} not found", tool_name))
    }

    pub fn invalid_parameters(tool_name: &str, message: &str) -> Self {
        Self::failure(
            "Invalid parameters",
            format!("Invalid parameters for tool {}: {}", tool_name, message),
        )
    }

    pub fn execution_failed(message: impl Into<String>) -> Self {
        Self::failure("Tool execution failed", message)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ToolExecutionResult::Failure { .. })
    }

    /// Text handed to the model and shown in the tool trace.
    ///
    /// String payloads pass through verbatim; everything else is pretty JSON.
    pub fn render(&self) -> String {
        match self {
            ToolExecutionResult::Success(Value::String(s)) => s.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_else(|_| String::from("null")),
        }
    }
}
