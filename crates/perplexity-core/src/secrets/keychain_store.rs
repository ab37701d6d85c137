//! System keychain secret store
//!
//! Uses the OS keychain for persistent secret storage:
//! - macOS: Keychain
//! - Windows: Credential Manager
//! - Linux: Secret Service (GNOME Keyring, KWallet)

use keyring::Entry;

use super::traits::{SecretStore, SecretStoreError, SecretStoreResult};
use crate::logging::file_logger as log;

const MODULE: &str = "KeychainSecretStore";

/// Secret store backed by the system keychain
///
/// Used by standalone hosts (CLI, tests against a real machine); inside the
/// editor the host's own secret storage is preferred.
pub struct KeychainSecretStore {
    service_name: String,
}

impl KeychainSecretStore {
    /// Create a keychain store with the default service name "perplexity-chat"
    pub fn new() -> Self {
        Self::with_service("perplexity-chat")
    }

    /// Create a keychain store with a custom service name
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service_name: service.into(),
        }
    }

    fn entry(&self, key: &str) -> SecretStoreResult<Entry> {
        Entry::new(&self.service_name, key)
            .map_err(|e| SecretStoreError::NotAvailable(format!("keychain entry: {}", e)))
    }
}

impl Default for KeychainSecretStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretStore for KeychainSecretStore {
    fn name(&self) -> &str {
        "keychain"
    }

    fn is_available(&self) -> bool {
        match Entry::new(&self.service_name, "__perplexity_availability_check__") {
            Ok(_) => true,
            Err(e) => {
                log::warn(MODULE, &format!("keychain unavailable: {:?}", e));
                false
            }
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        let entry = self.entry(key).ok()?;
        match entry.get_password() {
            Ok(password) => Some(password),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                log::warn(MODULE, &format!("get('{}') failed: {:?}", key, e));
                None
            }
        }
    }

    fn store(&self, key: &str, value: &str) -> SecretStoreResult<()> {
        log::info(MODULE, &format!("store('{}') service='{}'", key, self.service_name));
        self.entry(key)?
            .set_password(value)
            .map_err(|e| SecretStoreError::Other(format!("Failed to store in keychain: {}", e)))
    }

    fn delete(&self, key: &str) -> SecretStoreResult<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(SecretStoreError::Other(format!("Failed to delete from keychain: {}", e))),
        }
    }
}
