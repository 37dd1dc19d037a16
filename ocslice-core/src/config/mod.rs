//! Configuration module
//!
//! Handles the VPN session settings, helper overrides and timing parameters,
//! and their TOML persistence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub mod certificate;
pub mod toml_config;

/// Default VPN server offered to new setups
pub const DEFAULT_SERVER: &str = "vpn.server.de";

/// Default networks routed through the tunnel
pub const DEFAULT_NETWORKS: &str = "172.16.1.0/24 192.168.13.0/24 10.33.38.0/24";

/// VPN configuration structure
///
/// Contains all non-sensitive connection parameters. Secrets live in the
/// keyring. Connect and disconnect take this by value, so an attempt in
/// flight never sees later edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpnConfig {
    /// VPN server hostname or IP address
    pub server: String,

    /// Authentication group passed as `--authgroup`
    #[serde(default)]
    pub auth_group: String,

    /// Username for VPN authentication
    #[serde(default)]
    pub username: String,

    /// Space-separated networks routed through the tunnel
    #[serde(default = "default_networks")]
    pub networks: String,

    /// Client certificate path
    #[serde(default)]
    pub certificate_file: Option<PathBuf>,

    /// Original file name of the imported certificate
    #[serde(default)]
    pub certificate_name: Option<String>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
}

fn default_networks() -> String {
    DEFAULT_NETWORKS.to_string()
}

impl VpnConfig {
    /// Create a new VPN configuration
    pub fn new(server: String, username: String) -> Self {
        Self {
            server,
            username,
            ..Self::default()
        }
    }

    /// Iterate over the configured networks
    pub fn network_list(&self) -> impl Iterator<Item = &str> {
        self.networks.split_whitespace()
    }

    /// Update modification timestamps before saving
    pub fn touch(&mut self) {
        let now = Utc::now();
        self.last_modified = Some(now);
        if self.created_at.is_none() {
            self.created_at = Some(now);
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.server.is_empty() {
            return Err("Server cannot be empty".to_string());
        }

        if !self
            .server
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '.' | '-' | ':' | '/'))
        {
            return Err("Server contains invalid characters".to_string());
        }

        for network in self.network_list() {
            if !is_network_token(network) {
                return Err(format!("Invalid network: {}", network));
            }
        }

        Ok(())
    }
}

/// Accept `a.b.c.d`, `a.b.c.d/n` and hostnames (vpn-slice resolves those)
fn is_network_token(token: &str) -> bool {
    let (addr, prefix) = match token.split_once('/') {
        Some((addr, prefix)) => (addr, Some(prefix)),
        None => (token, None),
    };

    if let Some(prefix) = prefix {
        match prefix.parse::<u8>() {
            Ok(bits) if bits <= 32 => {}
            _ => return false,
        }
        return addr.parse::<std::net::Ipv4Addr>().is_ok();
    }

    !addr.is_empty()
        && addr
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-'))
}

impl Default for VpnConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            auth_group: String::new(),
            username: String::new(),
            networks: default_networks(),
            certificate_file: None,
            certificate_name: None,
            created_at: None,
            last_modified: None,
        }
    }
}

/// External helper settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelperConfig {
    /// Explicit tunnel binary; when set, no other location is tried
    #[serde(default)]
    pub tunnel_binary: Option<PathBuf>,

    /// Explicit slicing helper; when set, no other location is tried
    #[serde(default)]
    pub slice_helper: Option<PathBuf>,

    /// Program used to elevate commands
    #[serde(default = "default_elevation_program")]
    pub elevation_program: String,
}

fn default_elevation_program() -> String {
    "sudo".to_string()
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            tunnel_binary: None,
            slice_helper: None,
            elevation_program: default_elevation_program(),
        }
    }
}

/// Delays and timeouts of the interactive protocols
///
/// The tunnel prompts and the elevation prompts give no feedback signal, so
/// every wait here is a fixed delay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Wait before the first credential is written
    pub settle_delay_ms: u64,
    /// Wait between the certificate password and the tunnel password
    pub certificate_delay_ms: u64,
    /// Verdict window of the background connect
    pub connect_timeout_ms: u64,
    /// Verdict window of the blocking connect
    pub direct_timeout_ms: u64,
    /// Extra wait before the post-timeout liveness check
    pub timeout_grace_ms: u64,
    /// Pause after each direct teardown command
    pub teardown_pacing_ms: u64,
    /// Wait before checking the direct teardown result
    pub teardown_settle_ms: u64,
    /// Wait before checking the scripted teardown result
    pub scripted_settle_ms: u64,
    /// Overall timeout written into the elevation script
    pub script_timeout_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 2_000,
            certificate_delay_ms: 2_000,
            connect_timeout_ms: 45_000,
            direct_timeout_ms: 60_000,
            timeout_grace_ms: 3_000,
            teardown_pacing_ms: 1_000,
            teardown_settle_ms: 2_000,
            scripted_settle_ms: 3_000,
            script_timeout_secs: 15,
        }
    }
}

impl TimingConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn certificate_delay(&self) -> Duration {
        Duration::from_millis(self.certificate_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn direct_timeout(&self) -> Duration {
        Duration::from_millis(self.direct_timeout_ms)
    }

    pub fn timeout_grace(&self) -> Duration {
        Duration::from_millis(self.timeout_grace_ms)
    }

    pub fn teardown_pacing(&self) -> Duration {
        Duration::from_millis(self.teardown_pacing_ms)
    }

    pub fn teardown_settle(&self) -> Duration {
        Duration::from_millis(self.teardown_settle_ms)
    }

    pub fn scripted_settle(&self) -> Duration {
        Duration::from_millis(self.scripted_settle_ms)
    }

    /// Validate the timing parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.connect_timeout_ms == 0 || self.direct_timeout_ms == 0 {
            return Err("Connection timeouts cannot be zero".to_string());
        }
        if self.script_timeout_secs == 0 {
            return Err("Script timeout cannot be zero".to_string());
        }
        Ok(())
    }
}
