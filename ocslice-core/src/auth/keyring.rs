//! Keyring operations for secure credential storage
//!
//! Uses the system keyring (Secret Service on Linux, Keychain on macOS) to
//! store and retrieve session secrets.

use crate::auth::CredentialStore;
use crate::error::CredentialError;
use crate::types::{SecretValue, KEYRING_SERVICE};
use keyring::Entry;
use tracing::debug;

/// Credential store backed by the system keyring
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

    fn entry(&self, key: &str) -> Result<Entry, CredentialError> {
        Entry::new(&self.service, key).map_err(|_| CredentialError::ServiceUnavailable)
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

fn map_read_error(err: keyring::Error) -> CredentialError {
    match err {
        keyring::Error::NoEntry => CredentialError::NotFound,
        keyring::Error::NoStorageAccess(_) | keyring::Error::PlatformFailure(_) => {
            CredentialError::ServiceUnavailable
        }
        _ => CredentialError::RetrieveFailed,
    }
}

impl CredentialStore for KeyringStore {
    fn get_secret(&self, key: &str) -> Result<SecretValue, CredentialError> {
        let password = self.entry(key)?.get_password().map_err(map_read_error)?;
        Ok(SecretValue::new(password.trim().to_string()))
    }

    fn set_secret(&self, key: &str, value: &SecretValue) -> Result<(), CredentialError> {
        self.entry(key)?
            .set_password(value.expose())
            .map_err(|_| CredentialError::StoreFailed)?;
        debug!("Stored keyring entry {}", key);
        Ok(())
    }

    fn delete_secret(&self, key: &str) -> Result<(), CredentialError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(_) => Err(CredentialError::DeleteFailed),
        }
    }
}
