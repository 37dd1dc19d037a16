//! CLI command implementations
//!
//! This module contains the implementation of all CLI subcommands.

pub mod secrets;
pub mod setup;
pub mod vpn;

use ocslice_core::config::toml_config::{get_log_dir, TomlConfig};
use ocslice_core::error::SliceError;
use ocslice_core::vpn::{SessionManager, TunnelLog};

/// Session manager for the saved helper and timing settings
pub fn session_manager(config: &TomlConfig) -> Result<SessionManager, SliceError> {
    Ok(SessionManager::system(
        config.helpers.clone(),
        config.timing.clone(),
        TunnelLog::new(get_log_dir()?),
    ))
}
