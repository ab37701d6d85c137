//! Extension settings and their persistence
//!
//! - `MemorySettingsStore`: In-memory for testing
//! - `FileSettingsStore`: YAML file in the user config directory

mod traits;
mod settings;
mod memory;
mod file;

pub use traits::{SettingsStore, ConfigError, ConfigResult};
pub use settings::ExtensionSettings;
pub use memory::MemorySettingsStore;
pub use file::FileSettingsStore;
