//! Tool registry and executor
//!
//! The registry owns the fixed set of tools the model may call. Execution
//! never fails from the caller's point of view: unknown tools, bad arguments,
//! handler errors, and handler panics all come back as
//! [`ToolExecutionResult::Failure`] so the model can explain them.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::{Map, Value};

use super::schema::ArgSchema;
use crate::logging::Logger;
use crate::types::ToolExecutionResult;

/// Which host setting governs a tool's availability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolScope {
    /// Reads the open folder (files, manifests, git)
    Workspace,
    /// Reads the focused editor buffer
    ActiveFile,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: ArgSchema,
    pub scope: ToolScope,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, scope: ToolScope) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: ArgSchema::empty(),
            scope,
        }
    }

    pub fn with_schema(mut self, schema: ArgSchema) -> Self {
        self.input_schema = schema;
        self
    }
}

/// Errors a tool handler may return
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("No workspace folder is open.")]
    NoWorkspace,

    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ToolError {
    pub fn failed(message: impl Into<String>) -> Self {
        ToolError::Failed(message.into())
    }
}

pub type ToolResult<T> = Result<T, ToolError>;

/// Implementation behind a tool definition
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Run with arguments already validated against the tool's schema
    async fn call(&self, args: Map<String, Value>) -> ToolResult<Value>;
}

/// Adapter turning an async closure into a [`ToolHandler`]
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(Map<String, Value>) -> Fut + Send + Sync,
    Fut: Future<Output = ToolResult<Value>> + Send,
{
    async fn call(&self, args: Map<String, Value>) -> ToolResult<Value> {
        (self.0)(args).await
    }
}

struct RegisteredTool {
    definition: ToolDefinition,
    handler: Arc<dyn ToolHandler>,
}

/// Fixed catalog of tools plus the executor
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    logger: Arc<dyn Logger>,
}

impl ToolRegistry {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self {
            tools: Vec::new(),
            logger,
        }
    }

    /// Add a tool; a tool with the same name is replaced in place
    pub fn register(&mut self, definition: ToolDefinition, handler: Arc<dyn ToolHandler>) {
        let tool = RegisteredTool { definition, handler };
        match self.tools.iter_mut().find(|t| t.definition.name == tool.definition.name) {
            Some(existing) => *existing = tool,
            None => self.tools.push(tool),
        }
    }

    pub fn register_fn<F, Fut>(&mut self, definition: ToolDefinition, f: F)
    where
        F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult<Value>> + Send + 'static,
    {
        self.register(definition, Arc::new(FnHandler(f)));
    }

    /// Definitions in registration order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.find(name).map(|t| &t.definition)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.definition.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    fn find(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.iter().find(|t| t.definition.name == name)
    }

    /// Validate and run a tool; never panics and never returns `Err`
    ///
    /// Missing arguments are treated as an empty object.
    pub async fn execute_tool(&self, name: &str, args: Option<&Value>) -> ToolExecutionResult {
        let Some(tool) = self.find(name) else {
            self.logger.warn(&format!("[ToolRegistry] Tool {} not found", name));
            return ToolExecutionResult::not_found(name);
        };

        let args = match tool.definition.input_schema.validate(args.unwrap_or(&Value::Null)) {
            Ok(args) => args,
            Err(message) => {
                self.logger.warn(&format!("[ToolRegistry] Invalid parameters for {}: {}", name, message));
                return ToolExecutionResult::invalid_parameters(name, &message);
            }
        };

        self.logger.info(&format!("[ToolRegistry] Executing {}", name));
        let outcome = AssertUnwindSafe(tool.handler.call(args)).catch_unwind().await;
        match outcome {
            Ok(Ok(value)) => ToolExecutionResult::success(value),
            Ok(Err(e)) => {
                self.logger.error(&format!("[ToolRegistry] Tool execution failed for '{}': {}", name, e));
                ToolExecutionResult::execution_failed(e.to_string())
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "tool panicked".to_string());
                self.logger.error(&format!("[ToolRegistry] Tool '{}' panicked: {}", name, message));
                ToolExecutionResult::execution_failed(message)
            }
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry").field("tools", &self.names()).finish()
    }
}
