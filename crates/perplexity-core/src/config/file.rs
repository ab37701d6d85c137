//! File-based settings store (YAML)
//!
//! Lives at `~/.config/perplexity-chat/settings.yaml` for hosts that have no
//! settings storage of their own.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::settings::ExtensionSettings;
use super::traits::{ConfigError, ConfigResult, SettingsStore};

/// File-based settings store
///
/// Reads go through an in-memory cache that is filled on first load and
/// replaced on every save.
///
/// # Example
///
/// ```no_run
/// use perplexity_core::config::FileSettingsStore;
///
/// let store = FileSettingsStore::user();
/// println!("{}", store.path().display());
/// ```
pub struct FileSettingsStore {
    path: PathBuf,
    cache: RwLock<Option<ExtensionSettings>>,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: RwLock::new(None),
        }
    }

    /// User-level store under the platform config directory
    pub fn user() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".config"));
        Self::new(config_dir.join("perplexity-chat").join("settings.yaml"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn read_file(&self) -> ConfigResult<ExtensionSettings> {
        if !self.path.exists() {
            return Ok(ExtensionSettings::default());
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(ExtensionSettings::default());
        }
        // Parse loosely so a hand-edited file with a stale model id still loads
        let raw: serde_json::Value = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Serialization(format!("Failed to parse YAML: {}", e)))?;
        Ok(ExtensionSettings::from_raw(&raw))
    }

    fn write_file(&self, settings: &ExtensionSettings) -> ConfigResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(settings)
            .map_err(|e| ConfigError::Serialization(format!("Failed to serialize YAML: {}", e)))?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn load(&self) -> ConfigResult<ExtensionSettings> {
        if let Some(cached) = self.cache.read().as_ref() {
            return Ok(cached.clone());
        }
        let settings = self.read_file()?;
        *self.cache.write() = Some(settings.clone());
        Ok(settings)
    }

    async fn save(&self, settings: &ExtensionSettings) -> ConfigResult<()> {
        self.write_file(settings)?;
        *self.cache.write() = Some(settings.clone());
        Ok(())
    }
}

impl std::fmt::Debug for FileSettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSettingsStore").field("path", &self.path).finish()
    }
}
