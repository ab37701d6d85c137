//! Tool catalog and executor
//!
//! ```text
//! Orchestrator ──execute_tool(name, args)──▶ ToolRegistry
//!                                               │ validate (ArgSchema)
//!                                               ▼
//!                                           ToolHandler ──▶ Workspace / ContextManager / git
//! ```
//!
//! Every outcome is a [`ToolExecutionResult`](crate::types::ToolExecutionResult);
//! tool failures are handed to the model as data.

mod schema;
mod registry;
mod builtin;

pub use schema::{ArgField, ArgKind, ArgSchema};
pub use registry::{
    FnHandler, ToolDefinition, ToolError, ToolHandler, ToolRegistry, ToolResult, ToolScope,
};
pub use builtin::{
    builtin_registry, extract_doc_comments, CODE_EXPLANATION, DOCUMENTATION, FILE_SEARCH,
    FILE_SEARCH_LIMIT, GIT_INTEGRATION, WORKSPACE_ANALYSIS,
};
