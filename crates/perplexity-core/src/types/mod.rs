//! Core types shared by the client, tools, and orchestrator

mod message;
mod model;
mod tool;
mod cancellation;
mod workspace;

pub use message::{ChatMessage, MessageRole};
pub use model::{PerplexityModel, UnknownModel};
pub use tool::{ToolCallDirective, ToolExecutionResult};
pub use cancellation::CancellationToken;
pub use workspace::{shared_workspace, ActiveFile, SharedWorkspace, Workspace};
