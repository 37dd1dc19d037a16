//! Tunnel PID file
//!
//! OpenConnect writes its PID to the file named by `--pid-file`. The file is
//! only a hint: it is trusted after the PID answers a liveness signal, and
//! removed once it is found stale.

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Well-known PID file location passed to the tunnel process
pub const DEFAULT_PID_FILE: &str = "/tmp/openconnect.pid";

/// PID file written by the tunnel process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingArtifact {
    path: PathBuf,
}

impl TrackingArtifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read the recorded PID, if the file exists and holds one
    pub fn read_pid(&self) -> Option<i32> {
        let content = fs::read_to_string(&self.path).ok()?;
        match content.trim().parse::<i32>() {
            Ok(pid) if pid > 0 => Some(pid),
            _ => {
                debug!("PID file {:?} holds no usable PID", self.path);
                None
            }
        }
    }

    /// Check whether the recorded process answers a liveness signal
    ///
    /// A process we may not signal (EPERM) still exists, so it counts as
    /// alive. The tunnel usually runs as root while the probe does not.
    pub fn is_alive(&self) -> bool {
        let Some(pid) = self.read_pid() else {
            return false;
        };

        match kill(Pid::from_raw(pid), None) {
            Ok(()) | Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }

    /// Delete the file; a missing file is not an error
    pub fn remove(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed stale PID file {:?}", self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove PID file {:?}: {}", self.path, e),
        }
    }
}

impl Default for TrackingArtifact {
    fn default() -> Self {
        Self::new(DEFAULT_PID_FILE)
    }
}
