//! Events produced while supervising a connection attempt

use crate::error::VpnError;

/// Classification of a single output line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// A success marker was seen on stdout
    Connected,

    /// A failure marker was seen on stderr
    Failed { line: String },

    /// Any other line
    Unrecognized,
}

impl ScanEvent {
    /// True for events that end a scanner
    pub fn is_verdict(&self) -> bool {
        !matches!(self, ScanEvent::Unrecognized)
    }
}

/// Final result of a launch-and-classify sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// A success marker was observed; the tunnel keeps running
    Connected,

    /// No marker arrived in time but the post-timeout liveness check passed
    ConnectedAfterTimeout,

    /// A failure marker was observed; the process was killed if still running
    AuthenticationFailed { line: String },

    /// No marker and no live tunnel after the grace period; process killed
    TimedOut { seconds: u64 },

    /// The process ended without a marker and no tunnel came up
    Exited { status: String },

    /// The process could not be spawned or its streams captured
    LaunchFailed { reason: String },
}

impl ConnectOutcome {
    /// True when the tunnel is considered up
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            ConnectOutcome::Connected | ConnectOutcome::ConnectedAfterTimeout
        )
    }

    /// True when the attempt sent a termination signal to the process
    pub fn terminated_process(&self) -> bool {
        matches!(
            self,
            ConnectOutcome::AuthenticationFailed { .. } | ConnectOutcome::TimedOut { .. }
        )
    }

    /// Human readable status line
    pub fn message(&self) -> String {
        match self {
            ConnectOutcome::Connected => "VPN connected successfully".to_string(),
            ConnectOutcome::ConnectedAfterTimeout => {
                "VPN connected (confirmed after timeout)".to_string()
            }
            ConnectOutcome::AuthenticationFailed { line } => {
                format!("Connection failed: {}", line)
            }
            ConnectOutcome::TimedOut { seconds } => {
                format!("Connection timeout after {} seconds", seconds)
            }
            ConnectOutcome::Exited { status } => {
                format!("Tunnel process exited before reporting a result ({})", status)
            }
            ConnectOutcome::LaunchFailed { reason } => {
                format!("Failed to launch tunnel process: {}", reason)
            }
        }
    }
}

impl From<ConnectOutcome> for Result<String, VpnError> {
    fn from(outcome: ConnectOutcome) -> Self {
        match outcome {
            ConnectOutcome::Connected | ConnectOutcome::ConnectedAfterTimeout => {
                Ok(outcome.message())
            }
            ConnectOutcome::AuthenticationFailed { line } => {
                Err(VpnError::AuthenticationFailed { line })
            }
            ConnectOutcome::TimedOut { seconds } => Err(VpnError::ConnectionTimeout { seconds }),
            ConnectOutcome::Exited { status } => Err(VpnError::TunnelExited { status }),
            ConnectOutcome::LaunchFailed { reason } => Err(VpnError::LaunchFailed { reason }),
        }
    }
}

impl std::fmt::Display for ConnectOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}
