//! Settings store trait

use async_trait::async_trait;
use serde_json::Value;

use super::settings::ExtensionSettings;

/// Settings persistence abstraction
///
/// Implementations:
/// - `MemorySettingsStore`: In-memory for testing
/// - `FileSettingsStore`: YAML file in the user config directory
/// - Editor adapter: the host's global state (kept on the JS side)
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Load the current settings, defaults if nothing was saved yet
    async fn load(&self) -> ConfigResult<ExtensionSettings>;

    /// Persist settings
    async fn save(&self, settings: &ExtensionSettings) -> ConfigResult<()>;

    /// Persist a raw settings object from the UI, coercing invalid fields
    async fn save_raw(&self, raw: &Value) -> ConfigResult<ExtensionSettings> {
        let settings = ExtensionSettings::from_raw(raw);
        self.save(&settings).await?;
        Ok(settings)
    }
}

/// Errors that can occur during configuration operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
