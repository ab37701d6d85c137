//! Editor state the host hands to the core

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// The file focused in the editor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveFile {
    pub path: PathBuf,
    /// Editor language identifier (`rust`, `typescript`, ...)
    pub language_id: String,
    /// Buffer text, when it differs from what is on disk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<String>,
}

impl ActiveFile {
    pub fn new(path: impl Into<PathBuf>, language_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            language_id: language_id.into(),
            content: None,
            selection: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_selection(mut self, selection: impl Into<String>) -> Self {
        self.selection = Some(selection.into());
        self
    }

    /// Whole buffer text, falling back to the file on disk
    pub async fn text(&self) -> std::io::Result<String> {
        match &self.content {
            Some(c) => Ok(c.clone()),
            None => tokio::fs::read_to_string(&self.path).await,
        }
    }

    /// Selected text if any, otherwise the whole buffer
    pub async fn focused_text(&self) -> std::io::Result<String> {
        match self.selection.as_deref() {
            Some(s) if !s.is_empty() => Ok(s.to_string()),
            _ => self.text().await,
        }
    }
}

/// Open folder and focused file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default)]
    pub active_file: Option<ActiveFile>,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            active_file: None,
        }
    }

    pub fn with_active_file(mut self, file: ActiveFile) -> Self {
        self.active_file = Some(file);
        self
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }
}

/// Workspace shared between the host bindings and the tools
///
/// Tools take a snapshot per call; the host replaces it whenever the editor
/// focus or folder changes.
pub type SharedWorkspace = Arc<RwLock<Workspace>>;

pub fn shared_workspace(workspace: Workspace) -> SharedWorkspace {
    Arc::new(RwLock::new(workspace))
}
