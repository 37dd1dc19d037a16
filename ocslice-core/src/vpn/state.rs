//! VPN connection state
//!
//! The state is never stored. It is derived either from a probe of the
//! running system or from the outcome of an attempt the caller still holds.

use crate::vpn::ConnectOutcome;
use serde::Serialize;

/// VPN connection states
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum ConnectionState {
    /// Not connected
    #[default]
    Disconnected,

    /// An attempt is in flight
    Connecting,

    /// A tunnel is active
    Connected,

    /// The last attempt failed
    Failed(String),
}

impl ConnectionState {
    /// State as seen by a probe of the system
    pub fn observed(connected: bool) -> Self {
        if connected {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Check if currently connected
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl From<&ConnectOutcome> for ConnectionState {
    fn from(outcome: &ConnectOutcome) -> Self {
        if outcome.is_connected() {
            ConnectionState::Connected
        } else {
            ConnectionState::Failed(outcome.message())
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Failed(msg) => write!(f, "failed: {}", msg),
        }
    }
}
