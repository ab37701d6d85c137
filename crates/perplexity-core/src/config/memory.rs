//! In-memory settings store

use async_trait::async_trait;
use parking_lot::RwLock;

use super::settings::ExtensionSettings;
use super::traits::{ConfigResult, SettingsStore};

/// In-memory settings store for testing
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    settings: RwLock<ExtensionSettings>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: ExtensionSettings) -> Self {
        Self {
            settings: RwLock::new(settings),
        }
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn load(&self) -> ConfigResult<ExtensionSettings> {
        Ok(self.settings.read().clone())
    }

    async fn save(&self, settings: &ExtensionSettings) -> ConfigResult<()> {
        *self.settings.write() = settings.clone();
        Ok(())
    }
}
