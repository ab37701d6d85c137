//! Node.js bindings for the Perplexity chat core via napi-rs
//!
//! The extension host creates one [`ChatSession`] per chat panel, forwards
//! every webview message to `dispatch`, and posts whatever arrives on the
//! event callback back to the webview. Editor state (open folder, focused
//! file) is pushed in with `setWorkspaceRoot` / `setActiveFile`.

#![deny(clippy::all)]

use napi::bindgen_prelude::*;
use napi::threadsafe_function::{ThreadsafeFunction, ThreadsafeFunctionCallMode};
use napi_derive::napi;
use std::sync::Arc;
use std::time::Duration;

use perplexity_core::client::{PerplexityClient, DEFAULT_API_BASE};
use perplexity_core::config::{FileSettingsStore, SettingsStore};
use perplexity_core::context::{ContextCache, ContextManager};
use perplexity_core::logging::{FileLogger, Logger};
use perplexity_core::secrets::{default_secret_store, MemorySecretStore, SecretStore};
use perplexity_core::session::ChatSession as CoreChatSession;
use perplexity_core::tools::builtin_registry;
use perplexity_core::{debug_log, error_log, info_log};
use perplexity_core::types::{
    shared_workspace, ActiveFile as CoreActiveFile, PerplexityModel, SharedWorkspace,
    Workspace as CoreWorkspace,
};

// ============================================================================
// Options
// ============================================================================

#[napi(object)]
#[derive(Default)]
pub struct SessionOptions {
    /// Absolute path of the open folder, if any
    pub workspace_root: Option<String>,
    /// Settings file; defaults to the user config dir
    pub settings_path: Option<String>,
    /// API base URL override (tests, proxies)
    pub api_base: Option<String>,
    /// Request timeout for completion calls
    pub timeout_ms: Option<u32>,
    /// Keep the API key in memory only instead of the OS keychain
    pub ephemeral_secrets: Option<bool>,
}

#[napi(object)]
pub struct ActiveFile {
    pub path: String,
    pub language_id: String,
    pub content: Option<String>,
    pub selection: Option<String>,
}

impl From<ActiveFile> for CoreActiveFile {
    fn from(file: ActiveFile) -> Self {
        let mut core = CoreActiveFile::new(file.path, file.language_id);
        core.content = file.content;
        core.selection = file.selection.filter(|s| !s.is_empty());
        core
    }
}

// ============================================================================
// ChatSession
// ============================================================================

/// One chat panel
#[napi]
pub struct ChatSession {
    inner: Arc<CoreChatSession>,
    workspace: SharedWorkspace,
    context: Arc<ContextManager>,
}

#[napi]
impl ChatSession {
    /// `onEvent` receives every outbound message as a JSON string
    #[napi(constructor)]
    pub fn new(
        options: Option<SessionOptions>,
        #[napi(ts_arg_type = "(err: Error | null, event: string | null) => void")]
        on_event: ThreadsafeFunction<String>,
    ) -> Result<Self> {
        let options = options.unwrap_or_default();
        let logger: Arc<dyn Logger> = Arc::new(FileLogger::new("napi"));

        let workspace = shared_workspace(match &options.workspace_root {
            Some(root) => CoreWorkspace::new(root),
            None => CoreWorkspace::default(),
        });

        let settings: Arc<dyn SettingsStore> = Arc::new(match options.settings_path {
            Some(path) => FileSettingsStore::new(path),
            None => FileSettingsStore::user(),
        });

        let secrets: Arc<dyn SecretStore> = if options.ephemeral_secrets.unwrap_or(false) {
            Arc::new(MemorySecretStore::new())
        } else {
            default_secret_store()
        };

        let client = PerplexityClient::with_options(
            options.api_base.unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            options.timeout_ms.map(|ms| Duration::from_millis(ms as u64)),
            Arc::clone(&logger),
        )
        .map_err(|e| {
            error_log!("Failed to create Perplexity client: {}", e);
            Error::from_reason(e.to_string())
        })?;

        let context = Arc::new(ContextManager::new(Arc::new(ContextCache::default()), Arc::clone(&logger)));
        let tools = Arc::new(builtin_registry(
            Arc::clone(&workspace),
            Arc::clone(&context),
            Arc::clone(&logger),
        ));

        let (session, mut events) =
            CoreChatSession::new(Arc::new(client), tools, settings, secrets, Arc::clone(&logger));

        spawn(async move {
            while let Some(event) = events.recv().await {
                on_event.call(Ok(event.to_json()), ThreadsafeFunctionCallMode::NonBlocking);
            }
        });

        info_log!(
            "ChatSession created: workspace={:?}, secrets={}",
            options.workspace_root,
            if options.ephemeral_secrets.unwrap_or(false) { "memory" } else { "default" }
        );

        Ok(Self {
            inner: Arc::new(session),
            workspace,
            context,
        })
    }

    /// Handle one webview message (a JSON string tagged by `command`)
    ///
    /// Resolves when the command is fully handled; for `search` that is after
    /// the last chunk was emitted.
    #[napi]
    pub async fn dispatch(&self, message: String) -> Result<()> {
        let session = Arc::clone(&self.inner);
        session.handle_json(&message).await;
        Ok(())
    }

    /// Cancel every in-flight query
    #[napi]
    pub fn cancel_all(&self) -> u32 {
        self.inner.orchestrator().cancel_all() as u32
    }

    #[napi]
    pub fn set_workspace_root(&self, root: Option<String>) {
        {
            let mut workspace = self.workspace.write();
            workspace.root = root.as_ref().map(Into::into);
            workspace.active_file = None;
        }
        self.context.invalidate();
        info_log!("Workspace root set to {:?}", root);
    }

    #[napi]
    pub fn set_active_file(&self, file: Option<ActiveFile>) {
        debug_log!("Active file: {:?}", file.as_ref().map(|f| &f.path));
        self.workspace.write().active_file = file.map(Into::into);
    }
}

// ============================================================================
// Module functions
// ============================================================================

/// Model identifiers in display order
#[napi]
pub fn list_models() -> Vec<String> {
    PerplexityModel::all().iter().map(|m| m.as_str().to_string()).collect()
}

// ============================================================================
// Debug Logging
// ============================================================================

/// Get the path to the debug log file
#[napi]
pub fn get_debug_log_path() -> String {
    perplexity_core::logging::log_file_path().to_string_lossy().to_string()
}

/// Clear the debug log file
#[napi]
pub fn clear_debug_log() {
    perplexity_core::logging::clear_log();
}

#[napi]
pub fn set_debug_logging(enabled: bool) {
    perplexity_core::logging::file_logger::set_enabled(enabled);
}

/// Write a message to the debug log
#[napi]
pub fn debug_log(module: String, message: String) {
    perplexity_core::logging::file_logger::info(&module, &message);
}
