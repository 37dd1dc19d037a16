//! Credential provider
//!
//! Handles secret storage behind the [`CredentialStore`] trait, account key
//! derivation, and loading the per-session [`credentials::CredentialSet`].

pub mod credentials;

// Use mock keyring in test mode or CI environment
#[cfg(any(test, feature = "mock-keyring"))]
#[path = "keyring_mock.rs"]
pub mod keyring;

// Use real keyring in production
#[cfg(not(any(test, feature = "mock-keyring")))]
pub mod keyring;

use crate::error::CredentialError;
use crate::types::SecretValue;

/// Narrow interface onto an opaque key/value secret store
///
/// Implementations must report [`CredentialError::NotFound`] for an absent
/// key and use any other variant only when the store itself failed.
pub trait CredentialStore: Send + Sync {
    /// Fetch the secret stored under `key`
    fn get_secret(&self, key: &str) -> Result<SecretValue, CredentialError>;

    /// Store (or replace) the secret under `key`
    fn set_secret(&self, key: &str, value: &SecretValue) -> Result<(), CredentialError>;

    /// Remove the secret under `key`; removing an absent key succeeds
    fn delete_secret(&self, key: &str) -> Result<(), CredentialError>;
}

pub use credentials::{account_key, CredentialSet, StoredSecrets};
pub use keyring::KeyringStore;
