//! Per-user session secrets
//!
//! Account keys are derived as `<username>_<suffix>` so every user owns an
//! independent triple of secrets in the store.

use crate::auth::CredentialStore;
use crate::error::{CredentialError, VpnError};
use crate::types::{SecretPurpose, SecretValue};
use serde::Serialize;
use tracing::{debug, warn};

/// Derive the store key for a user's secret
pub fn account_key(username: &str, purpose: SecretPurpose) -> String {
    format!("{}_{}", username, purpose.key_suffix())
}

/// Snapshot of the secrets a session may need
///
/// Taken once at the start of a connect or disconnect. Each secret is
/// independently optional; only an unreachable store is an error.
#[derive(Debug, Clone, Default)]
pub struct CredentialSet {
    pub tunnel: Option<SecretValue>,
    pub certificate: Option<SecretValue>,
    pub elevation: Option<SecretValue>,
}

impl CredentialSet {
    /// Load the requested secrets for `username`
    ///
    /// Secrets not listed in `purposes` stay `None`, as does everything when
    /// `username` is empty.
    pub fn load(
        store: &dyn CredentialStore,
        username: &str,
        purposes: &[SecretPurpose],
    ) -> Result<Self, VpnError> {
        let mut set = Self::default();
        if username.is_empty() {
            return Ok(set);
        }

        for &purpose in purposes {
            let secret = load_optional(store, username, purpose).map_err(|source| {
                VpnError::CredentialUnavailable {
                    secret: purpose.label().to_string(),
                    source,
                }
            })?;

            match purpose {
                SecretPurpose::Tunnel => set.tunnel = secret,
                SecretPurpose::Certificate => set.certificate = secret,
                SecretPurpose::Elevation => set.elevation = secret,
            }
        }

        Ok(set)
    }

    /// Tunnel password, if present and non-empty
    pub fn tunnel_password(&self) -> Option<&SecretValue> {
        self.tunnel.as_ref().filter(|s| !s.is_empty())
    }

    /// Certificate password, or an empty secret when none is stored
    pub fn certificate_password(&self) -> SecretValue {
        self.certificate.clone().unwrap_or_else(SecretValue::empty)
    }

    /// Elevation password, if present and non-empty
    pub fn elevation_password(&self) -> Option<&SecretValue> {
        self.elevation.as_ref().filter(|s| !s.is_empty())
    }
}

/// Load a single secret, mapping "not found" to `None`
pub fn load_optional(
    store: &dyn CredentialStore,
    username: &str,
    purpose: SecretPurpose,
) -> Result<Option<SecretValue>, CredentialError> {
    if username.is_empty() {
        return Err(CredentialError::MissingUsername);
    }

    match store.get_secret(&account_key(username, purpose)) {
        Ok(secret) => Ok(Some(secret)),
        Err(CredentialError::NotFound) => Ok(None),
        Err(e) => {
            warn!("Keyring lookup for {} failed: {}", purpose, e);
            Err(e)
        }
    }
}

/// Store a secret for `username`
pub fn store_secret(
    store: &dyn CredentialStore,
    username: &str,
    purpose: SecretPurpose,
    value: &SecretValue,
) -> Result<(), CredentialError> {
    if username.is_empty() {
        return Err(CredentialError::MissingUsername);
    }
    store.set_secret(&account_key(username, purpose), value)?;
    debug!("Stored {} for {}", purpose, username);
    Ok(())
}

/// Which secrets are present for a user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoredSecrets {
    #[serde(rename = "vpn_password")]
    pub tunnel: bool,
    #[serde(rename = "cert_password")]
    pub certificate: bool,
    #[serde(rename = "sudo_password")]
    pub elevation: bool,
}

/// Report which of the three secrets are stored and non-empty
///
/// Store failures are reported as "absent"; this is a display helper.
pub fn stored_secret_status(store: &dyn CredentialStore, username: &str) -> StoredSecrets {
    if username.is_empty() {
        return StoredSecrets::default();
    }

    let present = |purpose| {
        store
            .get_secret(&account_key(username, purpose))
            .map(|s| !s.is_empty())
            .unwrap_or(false)
    };

    StoredSecrets {
        tunnel: present(SecretPurpose::Tunnel),
        certificate: present(SecretPurpose::Certificate),
        elevation: present(SecretPurpose::Elevation),
    }
}

/// Delete all three secrets of `username` (best effort)
pub fn clear_user_secrets(store: &dyn CredentialStore, username: &str) {
    if username.is_empty() {
        return;
    }

    for purpose in SecretPurpose::ALL {
        if let Err(e) = store.delete_secret(&account_key(username, purpose)) {
            warn!("Failed to delete {} for {}: {}", purpose, username, e);
        }
    }
}
