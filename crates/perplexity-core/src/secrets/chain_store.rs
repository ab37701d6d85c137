//! Layered secret store with read fallback

use std::sync::Arc;

use super::traits::{SecretInfo, SecretStore, SecretStoreError, SecretStoreResult};

/// Reads from each store in order; writes and deletes go to the first store
///
/// The typical layering is keychain first, environment second: a key saved
/// through the settings panel wins over `PERPLEXITY_API_KEY`, and deleting it
/// falls back to the environment again.
pub struct ChainSecretStore {
    stores: Vec<Arc<dyn SecretStore>>,
}

impl ChainSecretStore {
    pub fn new(stores: Vec<Arc<dyn SecretStore>>) -> SecretStoreResult<Self> {
        if stores.is_empty() {
            return Err(SecretStoreError::Other(
                "ChainSecretStore requires at least one store".to_string(),
            ));
        }
        Ok(Self { stores })
    }

    fn available(&self) -> impl Iterator<Item = &Arc<dyn SecretStore>> {
        self.stores.iter().filter(|s| s.is_available())
    }
}

impl SecretStore for ChainSecretStore {
    fn name(&self) -> &str {
        "chain"
    }

    fn is_available(&self) -> bool {
        self.available().next().is_some()
    }

    fn get(&self, key: &str) -> Option<String> {
        self.available()
            .find_map(|s| s.get(key).filter(|v| !v.is_empty()))
    }

    fn store(&self, key: &str, value: &str) -> SecretStoreResult<()> {
        self.stores[0].store(key, value)
    }

    fn delete(&self, key: &str) -> SecretStoreResult<()> {
        self.stores[0].delete(key)
    }

    fn get_info(&self, key: &str) -> SecretInfo {
        self.available()
            .find(|s| s.has(key))
            .map(|s| SecretInfo::new(true, s.name()))
            .unwrap_or_else(SecretInfo::not_found)
    }
}

impl std::fmt::Debug for ChainSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.stores.iter().map(|s| s.name()).collect();
        f.debug_struct("ChainSecretStore").field("stores", &names).finish()
    }
}
