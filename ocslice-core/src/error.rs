//! Error types for the ocslice VPN session manager
//!
//! This module defines all error types used throughout the application,
//! providing consistent error handling and user-friendly error messages.

use thiserror::Error;

/// Main error type for the ocslice application
#[derive(Error, Debug)]
pub enum SliceError {
    /// Errors related to configuration loading/parsing
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Errors related to the credential store
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Errors related to VPN session operations
    #[error("VPN error: {0}")]
    Vpn(#[from] VpnError),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing errors
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {path}")]
    LoadFailed { path: String },

    #[error("Failed to save configuration file: {path}")]
    SaveFailed { path: String },

    #[error("Missing required configuration field: {field}")]
    MissingField { field: String },

    #[error("Configuration validation error: {message}")]
    ValidationError { message: String },

    #[error("Unsupported certificate file: {name} (only .pfx and .p12 are accepted)")]
    UnsupportedCertificate { name: String },

    #[error("I/O error: {message}")]
    IoError { message: String },
}

/// Credential store errors
///
/// `NotFound` is the only variant meaning "the secret is absent"; every other
/// variant means the store itself could not be used.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Credential not found in keyring")]
    NotFound,

    #[error("Keyring service unavailable")]
    ServiceUnavailable,

    #[error("Failed to store credential in keyring")]
    StoreFailed,

    #[error("Failed to retrieve credential from keyring")]
    RetrieveFailed,

    #[error("Failed to delete credential from keyring")]
    DeleteFailed,

    #[error("A username must be configured before secrets can be used")]
    MissingUsername,
}

impl CredentialError {
    /// True when the store answered but holds no such secret
    pub fn is_not_found(&self) -> bool {
        matches!(self, CredentialError::NotFound)
    }
}

/// VPN session operation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VpnError {
    #[error("VPN is already connected")]
    AlreadyConnected,

    #[error("A connection attempt is already in progress")]
    AttemptInProgress,

    #[error("No valid certificate selected")]
    CertificateMissing,

    #[error("Username is required")]
    UsernameMissing,

    #[error("VPN password not found in keyring. Please store it with `ocslice setup`.")]
    TunnelPasswordMissing,

    #[error("Failed to load {secret} from keyring: {source}")]
    CredentialUnavailable {
        secret: String,
        source: CredentialError,
    },

    #[error("{helper} not found")]
    HelperNotFound { helper: String },

    #[error("Failed to launch tunnel process: {reason}")]
    LaunchFailed { reason: String },

    #[error("Connection failed: {line}")]
    AuthenticationFailed { line: String },

    #[error("Connection timeout after {seconds} seconds")]
    ConnectionTimeout { seconds: u64 },

    #[error("Tunnel process exited before reporting a result ({status})")]
    TunnelExited { status: String },

    #[error("Elevated privileges required. Store the sudo password with `ocslice setup` or configure passwordless sudo.")]
    ElevationPasswordMissing,

    #[error("Failed to run disconnect script: {reason}")]
    ScriptFailed { reason: String },

    #[error("Disconnect uncertain: {report}")]
    TeardownUncertain { report: String },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, SliceError>;
