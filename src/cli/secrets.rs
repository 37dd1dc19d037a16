//! Stored secret management

use super::session_manager;
use colored::Colorize;
use ocslice_core::config::toml_config::load_config;
use ocslice_core::error::{CredentialError, SliceError};

/// Delete the three secrets of the configured user
pub fn run_clear() -> Result<(), SliceError> {
    let config = load_config()?;
    let username = &config.vpn_config.username;
    if username.is_empty() {
        return Err(SliceError::Credential(CredentialError::MissingUsername));
    }

    session_manager(&config)?.clear_secrets(username);
    println!("{} Cleared stored secrets for {}", "✓".green(), username);
    Ok(())
}
