//! External helper discovery
//!
//! The tunnel binary and the slicing helper are looked up in a short list of
//! well-known install locations, then on `$PATH`. A configured override is
//! the only location tried for its helper. The slicing helper must also
//! answer `--version`.

use crate::config::HelperConfig;
use crate::error::VpnError;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Tunnel binary name
pub const TUNNEL_BINARY: &str = "openconnect";

/// Slicing helper name
pub const SLICE_HELPER: &str = "vpn-slice";

/// Resolved helper locations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperPaths {
    pub tunnel: PathBuf,
    pub slice: PathBuf,
}

impl HelperPaths {
    /// Locate both helpers, honouring configured overrides
    pub fn discover(config: &HelperConfig) -> Result<Self, VpnError> {
        let tunnel = locate_tunnel_binary(config.tunnel_binary.as_deref()).ok_or_else(|| {
            VpnError::HelperNotFound {
                helper: TUNNEL_BINARY.to_string(),
            }
        })?;
        let slice = locate_slice_helper(config.slice_helper.as_deref()).ok_or_else(|| {
            VpnError::HelperNotFound {
                helper: SLICE_HELPER.to_string(),
            }
        })?;

        debug!("Using tunnel binary {:?} and slice helper {:?}", tunnel, slice);
        Ok(Self { tunnel, slice })
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

/// Well-known tunnel binary locations
pub fn tunnel_candidates() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/usr/local/bin/openconnect"),
        PathBuf::from("/opt/homebrew/bin/openconnect"),
    ]
}

/// Well-known slicing helper locations
pub fn slice_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(home) = home_dir() {
        candidates.push(home.join(".bin").join("vpnslice"));
        candidates.push(home.join(".local").join("bin").join("vpn-slice"));
    }
    candidates.push(PathBuf::from("/usr/local/bin/vpn-slice"));
    candidates.push(PathBuf::from("/opt/homebrew/bin/vpn-slice"));
    candidates
}

fn first_match<F>(
    explicit: Option<&Path>,
    candidates: Vec<PathBuf>,
    name: &str,
    accept: F,
) -> Option<PathBuf>
where
    F: Fn(&Path) -> bool,
{
    let usable = |path: &PathBuf| path.exists() && accept(path.as_path());

    match explicit {
        Some(path) => Some(path.to_path_buf()).filter(usable),
        None => candidates
            .into_iter()
            .find(usable)
            .or_else(|| which::which(name).ok().filter(|path| accept(path.as_path()))),
    }
}

/// Locate the tunnel binary
pub fn locate_tunnel_binary(explicit: Option<&Path>) -> Option<PathBuf> {
    first_match(explicit, tunnel_candidates(), TUNNEL_BINARY, |_| true)
}

/// Locate a slicing helper that answers its version query
pub fn locate_slice_helper(explicit: Option<&Path>) -> Option<PathBuf> {
    first_match(explicit, slice_candidates(), SLICE_HELPER, answers_version)
}

/// Run `<path> --version` and report whether it succeeded
pub fn answers_version(path: &Path) -> bool {
    Command::new(path)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
