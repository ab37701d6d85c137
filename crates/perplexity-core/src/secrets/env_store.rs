//! Environment variable secret store

use std::env;

use super::traits::{SecretStore, SecretStoreError, SecretStoreResult, API_KEY_SECRET};

/// Environment variables consulted for the API key, in order
const API_KEY_ENV_VARS: &[&str] = &["PERPLEXITY_API_KEY", "PPLX_API_KEY"];

/// Read-only secret store backed by environment variables
///
/// [`API_KEY_SECRET`] maps to `PERPLEXITY_API_KEY` (or `PPLX_API_KEY`). Any
/// other key is looked up as a variable name directly.
#[derive(Debug, Default)]
pub struct EnvSecretStore {
    _private: (),
}

impl EnvSecretStore {
    pub fn new() -> Self {
        Self { _private: () }
    }

    fn lookup(name: &str) -> Option<String> {
        env::var(name).ok().filter(|v| !v.is_empty())
    }
}

impl SecretStore for EnvSecretStore {
    fn name(&self) -> &str {
        "env"
    }

    fn get(&self, key: &str) -> Option<String> {
        if key == API_KEY_SECRET {
            return API_KEY_ENV_VARS.iter().find_map(|var| Self::lookup(var));
        }
        Self::lookup(key)
    }

    fn store(&self, _key: &str, _value: &str) -> SecretStoreResult<()> {
        Err(SecretStoreError::ReadOnly)
    }

    fn delete(&self, _key: &str) -> SecretStoreResult<()> {
        Err(SecretStoreError::ReadOnly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_store_read_only() {
        let store = EnvSecretStore::new();
        assert!(matches!(store.store("x", "y"), Err(SecretStoreError::ReadOnly)));
        assert!(matches!(store.delete("x"), Err(SecretStoreError::ReadOnly)));
    }

    #[test]
    fn test_env_store_direct_lookup() {
        env::set_var("PERPLEXITY_TEST_SECRET_5821", "value");
        let store = EnvSecretStore::new();
        assert_eq!(store.get("PERPLEXITY_TEST_SECRET_5821"), Some("value".to_string()));
        env::remove_var("PERPLEXITY_TEST_SECRET_5821");
        assert_eq!(store.get("PERPLEXITY_TEST_SECRET_5821"), None);
    }

    #[test]
    fn test_env_store_not_found() {
        let store = EnvSecretStore::new();
        assert!(!store.has("PERPLEXITY_DOES_NOT_EXIST_XYZ"));
        assert!(!store.get_info("PERPLEXITY_DOES_NOT_EXIST_XYZ").available);
    }
}
