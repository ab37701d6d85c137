//! In-memory secret store

use std::collections::HashMap;

use parking_lot::RwLock;

use super::traits::{SecretStore, SecretStoreResult};

/// In-memory secret store for tests and hosts that push the key in
///
/// The napi layer fills this from the editor's secret storage on startup,
/// so the core never talks to the host's storage directly.
///
/// # Example
///
/// ```
/// use perplexity_core::secrets::{SecretStore, MemorySecretStore, API_KEY_SECRET};
///
/// let store = MemorySecretStore::new();
/// store.store(API_KEY_SECRET, "pplx-test").unwrap();
/// assert_eq!(store.get(API_KEY_SECRET), Some("pplx-test".to_string()));
/// ```
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: RwLock<HashMap<String, String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding a single secret
    pub fn with_secret(key: impl Into<String>, value: impl Into<String>) -> Self {
        let store = Self::new();
        store.secrets.write().insert(key.into(), value.into());
        store
    }

    pub fn len(&self) -> usize {
        self.secrets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SecretStore for MemorySecretStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn get(&self, key: &str) -> Option<String> {
        self.secrets.read().get(key).cloned()
    }

    fn store(&self, key: &str, value: &str) -> SecretStoreResult<()> {
        self.secrets.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> SecretStoreResult<()> {
        self.secrets.write().remove(key);
        Ok(())
    }
}
