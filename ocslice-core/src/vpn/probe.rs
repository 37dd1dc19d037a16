//! Connection state probe
//!
//! Answers "is a tunnel active right now?" from the running system alone.
//! Three checks run in order and the first positive one wins:
//!
//! 1. the PID file names a live process (a stale file is deleted),
//! 2. a process with the tunnel binary's name exists,
//! 3. a network interface carries an address in the tunnel subnet.

use crate::vpn::pid_file::TrackingArtifact;
use std::process::Command;
use tracing::debug;

/// Process name searched for by the probe
pub const TUNNEL_PROCESS_NAME: &str = "openconnect";

/// Address prefix assigned to the tunnel interface
pub const TUNNEL_SUBNET_PREFIX: &str = "192.168.255.";

/// Cheap, synchronous liveness check for the tunnel
pub trait SessionProbe: Send + Sync + 'static {
    /// True when a tunnel is currently active
    fn is_connected(&self) -> bool;
}

/// Probe backed by the PID file, the process table and the interface list
#[derive(Debug, Clone)]
pub struct SystemProbe {
    artifact: TrackingArtifact,
    process_name: String,
    subnet_prefix: String,
}

impl SystemProbe {
    pub fn new(artifact: TrackingArtifact, process_name: &str, subnet_prefix: &str) -> Self {
        Self {
            artifact,
            process_name: process_name.to_string(),
            subnet_prefix: subnet_prefix.to_string(),
        }
    }

    pub fn artifact(&self) -> &TrackingArtifact {
        &self.artifact
    }

    /// Tier 1: PID file corroborated by a liveness signal
    pub fn pid_file_alive(&self) -> bool {
        if !self.artifact.exists() {
            return false;
        }
        if self.artifact.is_alive() {
            return true;
        }
        self.artifact.remove();
        false
    }

    /// Tier 2: process table search by exact name
    pub fn process_running(&self) -> bool {
        match Command::new("pgrep").arg("-x").arg(&self.process_name).output() {
            Ok(output) => {
                output.status.success() && !String::from_utf8_lossy(&output.stdout).trim().is_empty()
            }
            Err(e) => {
                debug!("pgrep unavailable: {}", e);
                false
            }
        }
    }

    /// Tier 3: an interface address inside the tunnel subnet
    pub fn tunnel_interface_present(&self) -> bool {
        let addrs = match nix::ifaddrs::getifaddrs() {
            Ok(addrs) => addrs,
            Err(e) => {
                debug!("Failed to list interfaces: {}", e);
                return false;
            }
        };

        addrs
            .filter_map(|ifaddr| ifaddr.address)
            .filter_map(|address| address.as_sockaddr_in().map(|sin| sin.to_string()))
            .any(|addr| addr.starts_with(&self.subnet_prefix))
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new(
            TrackingArtifact::default(),
            TUNNEL_PROCESS_NAME,
            TUNNEL_SUBNET_PREFIX,
        )
    }
}

impl SessionProbe for SystemProbe {
    #[tracing::instrument(level = "debug", skip(self))]
    fn is_connected(&self) -> bool {
        if self.pid_file_alive() {
            debug!("Tunnel alive according to PID file");
            return true;
        }
        if self.process_running() {
            debug!("Tunnel process {} found", self.process_name);
            return true;
        }
        if self.tunnel_interface_present() {
            debug!("Interface in {}* found", self.subnet_prefix);
            return true;
        }
        false
    }
}
