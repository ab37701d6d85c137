//! Workspace tools offered to the model
//!
//! | Tool | Arguments |
//! |------|-----------|
//! | `workspaceAnalysis` | none |
//! | `codeExplanation` | none |
//! | `gitIntegration` | `command`: status, branch, log, diff |
//! | `documentation` | `filePath` (optional, relative to the root) |
//! | `fileSearch` | `globPattern` |

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

use super::registry::{ToolDefinition, ToolError, ToolHandler, ToolRegistry, ToolResult, ToolScope};
use super::schema::{ArgKind, ArgSchema};
use crate::context::git::run_git;
use crate::context::scan::find_files;
use crate::context::{ContextError, ContextManager};
use crate::logging::Logger;
use crate::types::{SharedWorkspace, Workspace};

pub const WORKSPACE_ANALYSIS: &str = "workspaceAnalysis";
pub const CODE_EXPLANATION: &str = "codeExplanation";
pub const GIT_INTEGRATION: &str = "gitIntegration";
pub const DOCUMENTATION: &str = "documentation";
pub const FILE_SEARCH: &str = "fileSearch";

pub const FILE_SEARCH_LIMIT: usize = 100;

static DOC_COMMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s:/\*\*.*?\*/)|(?m:(?:^[ \t]*//[/!].*(?:\n|$))+)").expect("valid doc comment regex")
});

/// Registry with the five workspace tools
pub fn builtin_registry(
    workspace: SharedWorkspace,
    context: Arc<ContextManager>,
    logger: Arc<dyn Logger>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new(logger);

    registry.register(
        ToolDefinition::new(
            WORKSPACE_ANALYSIS,
            "Analyzes the current workspace to identify project metadata, dependencies, and file types.",
            ToolScope::Workspace,
        ),
        Arc::new(WorkspaceAnalysis {
            workspace: workspace.clone(),
            context,
        }),
    );
    registry.register(
        ToolDefinition::new(
            CODE_EXPLANATION,
            "Gets the code from the active text editor (current selection or whole file) to be used for explanation.",
            ToolScope::ActiveFile,
        ),
        Arc::new(CodeExplanation {
            workspace: workspace.clone(),
        }),
    );
    registry.register(
        ToolDefinition::new(
            GIT_INTEGRATION,
            "Provides insights into the current Git repository, such as status, branch, log, and diffs.",
            ToolScope::Workspace,
        )
        .with_schema(ArgSchema::empty().required(
            "command",
            ArgKind::Enum(GitCommand::NAMES.iter().map(|s| s.to_string()).collect()),
            "The Git command to execute.",
        )),
        Arc::new(GitIntegration {
            workspace: workspace.clone(),
        }),
    );
    registry.register(
        ToolDefinition::new(
            DOCUMENTATION,
            "Extracts all doc comments (JSDoc/TSDoc blocks and Rust /// lines) from a file to generate documentation.",
            ToolScope::Workspace,
        )
        .with_schema(ArgSchema::empty().optional(
            "filePath",
            ArgKind::String,
            "Optional path to a file to analyze. If omitted, the active editor is used.",
        )),
        Arc::new(Documentation {
            workspace: workspace.clone(),
        }),
    );
    registry.register(
        ToolDefinition::new(
            FILE_SEARCH,
            "Searches for files within the workspace using a glob pattern.",
            ToolScope::Workspace,
        )
        .with_schema(ArgSchema::empty().required(
            "globPattern",
            ArgKind::String,
            "A glob pattern to search for files in the workspace.",
        )),
        Arc::new(FileSearch { workspace }),
    );

    registry
}

fn snapshot(workspace: &SharedWorkspace) -> Workspace {
    workspace.read().clone()
}

fn require_root(workspace: &Workspace) -> ToolResult<PathBuf> {
    workspace.root().map(Path::to_path_buf).ok_or(ToolError::NoWorkspace)
}

fn str_arg<'a>(args: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    args.get(name).and_then(Value::as_str)
}

struct WorkspaceAnalysis {
    workspace: SharedWorkspace,
    context: Arc<ContextManager>,
}

#[async_trait]
impl ToolHandler for WorkspaceAnalysis {
    async fn call(&self, _args: Map<String, Value>) -> ToolResult<Value> {
        let workspace = snapshot(&self.workspace);
        match self.context.analyze_workspace(&workspace).await {
            Ok(Some(context)) => Ok(Value::String(context.summary())),
            Ok(None) => Err(ToolError::failed(
                "Workspace analysis rate limit reached and no cached analysis is available. Try again in a minute.",
            )),
            Err(ContextError::NoWorkspace) => Err(ToolError::NoWorkspace),
            Err(e) => Err(ToolError::failed(e.to_string())),
        }
    }
}

struct CodeExplanation {
    workspace: SharedWorkspace,
}

#[async_trait]
impl ToolHandler for CodeExplanation {
    async fn call(&self, _args: Map<String, Value>) -> ToolResult<Value> {
        let workspace = snapshot(&self.workspace);
        let file = workspace
            .active_file
            .ok_or_else(|| ToolError::failed("No active text editor found."))?;
        let code = file.focused_text().await?;
        if code.is_empty() {
            return Err(ToolError::failed("No text selected or the active file is empty."));
        }
        Ok(json!({
            "language": file.language_id,
            "code": code,
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GitCommand {
    Status,
    Branch,
    Log,
    Diff,
}

impl GitCommand {
    const NAMES: [&'static str; 4] = ["status", "branch", "log", "diff"];

    fn parse(name: &str) -> Option<Self> {
        match name {
            "status" => Some(GitCommand::Status),
            "branch" => Some(GitCommand::Branch),
            "log" => Some(GitCommand::Log),
            "diff" => Some(GitCommand::Diff),
            _ => None,
        }
    }

    fn args(&self) -> &'static [&'static str] {
        match self {
            GitCommand::Status => &["status"],
            GitCommand::Branch => &["branch", "--show-current"],
            GitCommand::Log => &["log", "-n", "10", "--pretty=format:%h - %an, %ar : %s"],
            GitCommand::Diff => &["diff", "HEAD"],
        }
    }
}

struct GitIntegration {
    workspace: SharedWorkspace,
}

#[async_trait]
impl ToolHandler for GitIntegration {
    async fn call(&self, args: Map<String, Value>) -> ToolResult<Value> {
        let root = require_root(&snapshot(&self.workspace))?;
        let command = str_arg(&args, "command")
            .and_then(GitCommand::parse)
            .ok_or_else(|| ToolError::failed("Unsupported git command"))?;
        let stdout = run_git(&root, command.args()).await.map_err(ToolError::Failed)?;
        Ok(Value::String(stdout))
    }
}

struct Documentation {
    workspace: SharedWorkspace,
}

impl Documentation {
    async fn source_text(&self, file_path: Option<&str>) -> ToolResult<String> {
        let workspace = snapshot(&self.workspace);
        match file_path {
            Some(relative) => {
                let root = require_root(&workspace)?;
                let relative = Path::new(relative);
                let escapes = relative.is_absolute()
                    || relative.components().any(|c| matches!(c, Component::ParentDir));
                if escapes {
                    return Err(ToolError::failed(format!(
                        "File path must be relative to the workspace root: {}",
                        relative.display()
                    )));
                }
                Ok(tokio::fs::read_to_string(root.join(relative)).await?)
            }
            None => {
                let file = workspace
                    .active_file
                    .ok_or_else(|| ToolError::failed("No active editor and no file path provided."))?;
                Ok(file.text().await?)
            }
        }
    }
}

/// Doc comment blocks of `source`, in order of appearance
pub fn extract_doc_comments(source: &str) -> Vec<String> {
    DOC_COMMENT
        .find_iter(source)
        .map(|m| m.as_str().trim_end().to_string())
        .collect()
}

#[async_trait]
impl ToolHandler for Documentation {
    async fn call(&self, args: Map<String, Value>) -> ToolResult<Value> {
        let content = self.source_text(str_arg(&args, "filePath")).await?;
        let comments = extract_doc_comments(&content);
        if comments.is_empty() {
            return Ok(Value::String("No documentation comments found.".to_string()));
        }
        Ok(Value::String(comments.join("\n\n")))
    }
}

struct FileSearch {
    workspace: SharedWorkspace,
}

#[async_trait]
impl ToolHandler for FileSearch {
    async fn call(&self, args: Map<String, Value>) -> ToolResult<Value> {
        let root = require_root(&snapshot(&self.workspace))?;
        let pattern = str_arg(&args, "globPattern").unwrap_or_default().to_string();

        let search_pattern = pattern.clone();
        let files = tokio::task::spawn_blocking(move || find_files(&root, &search_pattern, FILE_SEARCH_LIMIT))
            .await
            .map_err(|e| ToolError::failed(e.to_string()))?
            .map_err(|e| ToolError::failed(e.to_string()))?;

        if files.is_empty() {
            return Ok(Value::String(format!("No files found matching pattern: {}", pattern)));
        }
        Ok(Value::Array(
            files
                .into_iter()
                .map(|p| Value::String(p.to_string_lossy().into_owned()))
                .collect(),
        ))
    }
}
