//! Perplexity Chat Core
//!
//! Runtime-agnostic core of the Perplexity chat extension. The editor host
//! (through napi-rs) supplies the workspace, settings persistence, and secret
//! storage; this crate does everything between a typed query and a streamed
//! answer.
//!
//! ## Query flow
//!
//! ```rust,ignore
//! use perplexity_core::{ChatSession, Command};
//!
//! let (session, mut events) = ChatSession::new(client, tools, settings, secrets, logger);
//! session.handle(Command::Search { text: "list my TypeScript files".into() }).await;
//!
//! while let Ok(event) = events.try_recv() {
//!     post_to_panel(event.to_json());
//! }
//! ```
//!
//! The orchestrator asks the model once (non-streaming) whether a tool
//! applies. If the answer is a `<tool_call .../>` tag it runs the tool, shows
//! both steps to the user, and streams a second completion over the extended
//! history.

pub mod types;
pub mod secrets;
pub mod logging;
pub mod config;
pub mod client;
pub mod context;
pub mod tools;
pub mod orchestrator;
pub mod session;

// Re-export commonly used types
pub use types::{
    ActiveFile, CancellationToken, ChatMessage, MessageRole, PerplexityModel, SharedWorkspace,
    ToolCallDirective, ToolExecutionResult, Workspace,
};

pub use secrets::{
    default_secret_store, ChainSecretStore, EnvSecretStore, KeychainSecretStore, MemorySecretStore,
    SecretStore, SecretStoreError, SecretStoreResult, API_KEY_SECRET,
};

pub use logging::{ConsoleLogger, Logger, NoOpLogger};

pub use config::{ExtensionSettings, FileSettingsStore, MemorySettingsStore, SettingsStore};

pub use client::{
    ClientError, ClientResult, CompletionClient, CompletionRequest, ConnectionTestResult,
    MockCompletionClient, PerplexityClient, RetryPolicy,
};

pub use context::{ContextCache, ContextManager, RateLimiter};

pub use tools::{builtin_registry, ToolDefinition, ToolRegistry};

pub use orchestrator::{Orchestrator, OrchestratorState, RequestId, SearchQuery, StreamCallbacks};

pub use session::{ChatSession, Command, Event};
