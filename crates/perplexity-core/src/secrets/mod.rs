//! Secret storage abstractions and implementations
//!
//! The core needs exactly one secret, the Perplexity API key, stored under
//! [`API_KEY_SECRET`]. It is read fresh for every query.

mod traits;
mod env_store;
mod memory_store;
mod chain_store;
mod keychain_store;

use std::sync::Arc;

pub use traits::{SecretStore, SecretInfo, SecretStoreError, SecretStoreResult, API_KEY_SECRET};
pub use env_store::EnvSecretStore;
pub use memory_store::MemorySecretStore;
pub use chain_store::ChainSecretStore;
pub use keychain_store::KeychainSecretStore;

/// Keychain with environment fallback, for hosts without their own storage
pub fn default_secret_store() -> Arc<dyn SecretStore> {
    let keychain: Arc<dyn SecretStore> = Arc::new(KeychainSecretStore::new());
    let env: Arc<dyn SecretStore> = Arc::new(EnvSecretStore::new());
    if !keychain.is_available() {
        return env;
    }
    match ChainSecretStore::new(vec![keychain, Arc::clone(&env)]) {
        Ok(chain) => Arc::new(chain),
        Err(_) => env,
    }
}
