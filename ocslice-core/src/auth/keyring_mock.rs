//! Mock keyring implementation for testing
//!
//! Provides an in-memory keyring implementation that doesn't require
//! system keyring access. Used in CI environments and for testing.

use crate::auth::CredentialStore;
use crate::error::CredentialError;
use crate::types::{SecretValue, KEYRING_SERVICE};
use std::collections::HashMap;
use std::sync::Mutex;

lazy_static::lazy_static! {
    static ref MOCK_KEYRING: Mutex<HashMap<String, String>> = Mutex::new(HashMap::new());
}

/// Generate a key for the mock keyring
fn make_key(service: &str, account: &str) -> String {
    format!("{}:{}", service, account)
}

/// In-memory stand-in for the system keyring store
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    /// Create a store using the default service name
    pub fn new() -> Self {
        Self::with_service(KEYRING_SERVICE)
    }

    /// Create a store using a custom service name
    pub fn with_service(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for KeyringStore {
    fn get_secret(&self, key: &str) -> Result<SecretValue, CredentialError> {
        let keyring = MOCK_KEYRING
            .lock()
            .map_err(|_| CredentialError::ServiceUnavailable)?;
        keyring
            .get(&make_key(&self.service, key))
            .cloned()
            .map(SecretValue::new)
            .ok_or(CredentialError::NotFound)
    }

    fn set_secret(&self, key: &str, value: &SecretValue) -> Result<(), CredentialError> {
        let mut keyring = MOCK_KEYRING
            .lock()
            .map_err(|_| CredentialError::StoreFailed)?;
        keyring.insert(make_key(&self.service, key), value.expose().to_string());
        Ok(())
    }

    fn delete_secret(&self, key: &str) -> Result<(), CredentialError> {
        let mut keyring = MOCK_KEYRING
            .lock()
            .map_err(|_| CredentialError::DeleteFailed)?;
        keyring.remove(&make_key(&self.service, key));
        Ok(())
    }
}
