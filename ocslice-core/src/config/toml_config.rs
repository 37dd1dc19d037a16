//! TOML configuration file I/O
//!
//! Handles loading and saving the session configuration to/from TOML files
//! in the user's configuration directory.

use crate::config::{HelperConfig, TimingConfig, VpnConfig};
use crate::error::{ConfigError, SliceError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Complete TOML configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// VPN connection settings
    #[serde(rename = "vpn")]
    pub vpn_config: VpnConfig,

    /// Helper binary settings
    #[serde(default)]
    pub helpers: HelperConfig,

    /// Protocol delays and timeouts
    #[serde(default)]
    pub timing: TimingConfig,
}

impl TomlConfig {
    /// Create a new TOML configuration with default helpers and timings
    pub fn new(vpn_config: VpnConfig) -> Self {
        Self {
            vpn_config,
            ..Self::default()
        }
    }

    /// Validate every section
    pub fn validate(&self) -> Result<(), SliceError> {
        self.vpn_config
            .validate()
            .and_then(|_| self.timing.validate())
            .map_err(|message| SliceError::Config(ConfigError::ValidationError { message }))
    }
}

/// Default configuration file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Directory holding imported certificates, below the config directory
const CERTIFICATE_DIR_NAME: &str = "certificates";
const LOG_DIR_NAME: &str = "logs";

/// Get the default configuration directory
///
/// Returns ~/.config/ocslice, or OCSLICE_CONFIG_DIR if set. When running
/// under sudo the invoking user's home is used.
pub fn get_config_dir() -> Result<PathBuf, SliceError> {
    if let Ok(config_dir) = std::env::var("OCSLICE_CONFIG_DIR") {
        return Ok(PathBuf::from(config_dir));
    }

    let home = if let Ok(sudo_user) = std::env::var("SUDO_USER") {
        std::env::var("SUDO_HOME").unwrap_or_else(|_| format!("/home/{}", sudo_user))
    } else {
        std::env::var("HOME").map_err(|_| {
            SliceError::Config(ConfigError::IoError {
                message: "HOME environment variable not set".to_string(),
            })
        })?
    };

    Ok(PathBuf::from(home).join(".config").join("ocslice"))
}

/// Get the default configuration file path
pub fn get_config_path() -> Result<PathBuf, SliceError> {
    Ok(get_config_dir()?.join(CONFIG_FILE_NAME))
}

/// Get the private directory imported certificates are copied into
pub fn get_certificate_dir() -> Result<PathBuf, SliceError> {
    Ok(get_config_dir()?.join(CERTIFICATE_DIR_NAME))
}

/// Get the directory the tunnel writes its output into
pub fn get_log_dir() -> Result<PathBuf, SliceError> {
    Ok(get_config_dir()?.join(LOG_DIR_NAME))
}

/// Check if a configuration file exists
pub fn config_exists() -> Result<bool, SliceError> {
    Ok(get_config_path()?.exists())
}

/// Load configuration from the default TOML file
pub fn load_config() -> Result<TomlConfig, SliceError> {
    load_config_from_path(get_config_path()?)
}

/// Load configuration from the default file, or defaults if there is none
pub fn load_config_or_default() -> Result<TomlConfig, SliceError> {
    let path = get_config_path()?;
    if !path.exists() {
        debug!("No configuration at {:?}, using defaults", path);
        return Ok(TomlConfig::default());
    }
    load_config_from_path(path)
}

/// Load configuration from a specific TOML file
pub fn load_config_from_path<P: AsRef<Path>>(path: P) -> Result<TomlConfig, SliceError> {
    let contents = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => SliceError::Config(ConfigError::LoadFailed {
            path: path.as_ref().to_string_lossy().to_string(),
        }),
        _ => SliceError::Config(ConfigError::IoError {
            message: format!("Failed to read config file: {}", e),
        }),
    })?;

    let config: TomlConfig = toml::from_str(&contents)?;
    config.validate()?;

    debug!("Loaded configuration from {:?}", path.as_ref());
    Ok(config)
}

/// Save configuration to the default TOML file
pub fn save_config(config: &mut TomlConfig) -> Result<(), SliceError> {
    save_config_to_path(config, get_config_path()?)
}

/// Save configuration to a specific TOML file
///
/// Stamps the modification time and writes the file with mode 0600.
pub fn save_config_to_path<P: AsRef<Path>>(
    config: &mut TomlConfig,
    path: P,
) -> Result<(), SliceError> {
    config.validate()?;
    config.vpn_config.touch();

    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            SliceError::Config(ConfigError::IoError {
                message: format!("Failed to create config directory: {}", e),
            })
        })?;
    }

    let contents = toml::to_string_pretty(config)?;

    std::fs::write(&path, contents).map_err(|_e| {
        SliceError::Config(ConfigError::SaveFailed {
            path: path.as_ref().to_string_lossy().to_string(),
        })
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
    }

    info!("Saved configuration to {:?}", path.as_ref());
    Ok(())
}
