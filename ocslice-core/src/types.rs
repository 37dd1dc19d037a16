//! Type definitions and wrappers for secure data handling
//!
//! This module provides type-safe wrappers for sensitive data using the
//! secrecy crate to prevent accidental exposure in logs or debug output.

use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};

/// Wrapper for any secret kept in the credential store
///
/// Tunnel, certificate and elevation passwords all use this type so they are
/// never accidentally logged or exposed in debug output.
#[derive(Clone, Debug)]
pub struct SecretValue(Secret<String>);

impl SecretValue {
    /// Create a new secret from its cleartext value
    pub fn new(secret: String) -> Self {
        Self(Secret::new(secret))
    }

    /// Create an empty secret
    pub fn empty() -> Self {
        Self::new(String::new())
    }

    /// Expose the secret value (use with caution!)
    ///
    /// This should only be called when writing the secret to the tunnel
    /// process or to the elevation script.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// True when the secret holds no characters
    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }
}

impl From<String> for SecretValue {
    fn from(secret: String) -> Self {
        Self::new(secret)
    }
}

impl From<&str> for SecretValue {
    fn from(secret: &str) -> Self {
        Self::new(secret.to_string())
    }
}

/// The three secrets a session may need
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretPurpose {
    /// Password sent to the tunnel process
    Tunnel,
    /// Password protecting the client certificate
    Certificate,
    /// Password for the elevation mechanism
    Elevation,
}

impl SecretPurpose {
    /// All purposes, in prompt order
    pub const ALL: [SecretPurpose; 3] = [
        SecretPurpose::Tunnel,
        SecretPurpose::Certificate,
        SecretPurpose::Elevation,
    ];

    /// Suffix appended to the username to form the account key
    pub fn key_suffix(self) -> &'static str {
        match self {
            SecretPurpose::Tunnel => "vpn",
            SecretPurpose::Certificate => "cert",
            SecretPurpose::Elevation => "sudo",
        }
    }

    /// Human readable label
    pub fn label(self) -> &'static str {
        match self {
            SecretPurpose::Tunnel => "VPN password",
            SecretPurpose::Certificate => "certificate password",
            SecretPurpose::Elevation => "sudo password",
        }
    }
}

impl std::fmt::Display for SecretPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Service name used for all entries in the system keyring
pub const KEYRING_SERVICE: &str = "ocslice";
