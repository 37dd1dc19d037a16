//! Privileged teardown
//!
//! Stops the tunnel with three independent commands. Their exit codes are
//! only reported; the verdict always comes from probing the system again
//! afterwards.

use crate::auth::{CredentialSet, CredentialStore};
use crate::config::TimingConfig;
use crate::error::VpnError;
use crate::types::{SecretPurpose, SecretValue};
use crate::vpn::elevation::{interaction_script, ElevatedCommand, Elevator};
use crate::vpn::pid_file::DEFAULT_PID_FILE;
use crate::vpn::probe::{SessionProbe, TUNNEL_PROCESS_NAME};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Message returned when there was nothing to disconnect
pub const ALREADY_DISCONNECTED: &str = "VPN is already disconnected";

/// The teardown commands, in execution order
pub fn teardown_commands(process_name: &str, pid_file: &Path) -> Vec<ElevatedCommand> {
    vec![
        ElevatedCommand::new(["killall", "-KILL", process_name]),
        ElevatedCommand::new(["pkill", "-KILL", "-f", process_name]),
        ElevatedCommand::new([
            "rm".to_string(),
            "-f".to_string(),
            pid_file.to_string_lossy().to_string(),
        ]),
    ]
}

/// Disconnects the tunnel with elevated commands
pub struct Teardown<E: Elevator, P: SessionProbe> {
    elevator: E,
    probe: Arc<P>,
    timing: TimingConfig,
    commands: Vec<ElevatedCommand>,
}

impl<E: Elevator, P: SessionProbe> Teardown<E, P> {
    pub fn new(elevator: E, probe: Arc<P>, timing: TimingConfig) -> Self {
        Self {
            elevator,
            probe,
            timing,
            commands: teardown_commands(TUNNEL_PROCESS_NAME, Path::new(DEFAULT_PID_FILE)),
        }
    }

    /// Replace the teardown commands
    pub fn with_commands(mut self, commands: Vec<ElevatedCommand>) -> Self {
        self.commands = commands;
        self
    }

    /// Disconnect the tunnel
    ///
    /// Returns the success message, or the reason the tunnel may still be up.
    pub async fn disconnect(
        &self,
        store: &dyn CredentialStore,
        username: &str,
    ) -> Result<String, VpnError> {
        if !self.tunnel_active(false).await {
            info!("Disconnect requested but no tunnel is active");
            return Ok(ALREADY_DISCONNECTED.to_string());
        }

        if self.elevator.can_elevate_non_interactively().await {
            return self.disconnect_direct().await;
        }

        let credentials = CredentialSet::load(store, username, &[SecretPurpose::Elevation])?;
        match credentials.elevation_password() {
            Some(secret) => self.disconnect_scripted(secret).await,
            None => Err(VpnError::ElevationPasswordMissing),
        }
    }

    /// Run the probe off the async workers; `on_error` if it cannot run
    async fn tunnel_active(&self, on_error: bool) -> bool {
        let probe = Arc::clone(&self.probe);
        tokio::task::spawn_blocking(move || probe.is_connected())
            .await
            .unwrap_or(on_error)
    }

    async fn disconnect_direct(&self) -> Result<String, VpnError> {
        let mut report = Vec::with_capacity(self.commands.len());

        for command in &self.commands {
            let line = format!("{} {}", self.elevator.program(), command);
            match self.elevator.run_elevated(command).await {
                Ok(()) => report.push(format!("{} OK", line)),
                Err(e) => {
                    warn!("Teardown command `{}` failed: {}", line, e);
                    report.push(format!("{} FAILED: {}", line, e));
                }
            }
            sleep(self.timing.teardown_pacing()).await;
        }

        sleep(self.timing.teardown_settle()).await;
        self.verdict(report.join("; ")).await
    }

    async fn disconnect_scripted(&self, secret: &SecretValue) -> Result<String, VpnError> {
        let script = interaction_script(
            self.elevator.program(),
            &self.commands,
            secret.expose(),
            self.timing.script_timeout_secs,
        );

        // The temp file is deleted when `file` drops, on every path.
        let file = write_script(&script).map_err(|e| VpnError::ScriptFailed {
            reason: e.to_string(),
        })?;

        // Bounds the whole run; expect's own timeout only bounds each step.
        let limit = Duration::from_secs(self.timing.script_timeout_secs);
        let report = match self.elevator.run_script(file.path(), limit).await {
            Ok(output) => {
                info!(
                    "Disconnect script output: {}",
                    String::from_utf8_lossy(&output.stdout).trim()
                );
                if !output.stderr.is_empty() {
                    warn!(
                        "Disconnect script error: {}",
                        String::from_utf8_lossy(&output.stderr).trim()
                    );
                }
                format!("disconnect script finished ({})", output.status)
            }
            Err(e) => {
                warn!("Disconnect script failed: {}", e);
                format!("disconnect script FAILED: {}", e)
            }
        };

        if let Err(e) = file.close() {
            warn!("Failed to delete disconnect script: {}", e);
        }

        sleep(self.timing.scripted_settle()).await;
        self.verdict(report).await
    }

    /// The post-condition decides the result
    async fn verdict(&self, report: String) -> Result<String, VpnError> {
        if self.tunnel_active(true).await {
            warn!("Tunnel still active after teardown: {}", report);
            Err(VpnError::TeardownUncertain { report })
        } else {
            info!("VPN disconnected");
            Ok(format!("VPN disconnected: {}", report))
        }
    }
}

/// Write the single-use interaction script with owner-only permissions
fn write_script(content: &str) -> std::io::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("vpn-disconnect-")
        .suffix(".exp")
        .tempfile()?;

    file.write_all(content.as_bytes())?;
    file.flush()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o700))?;
    }

    Ok(file)
}
