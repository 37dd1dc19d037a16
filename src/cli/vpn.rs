//! VPN connection management commands

use super::session_manager;
use colored::Colorize;
use ocslice_core::config::toml_config::{get_log_dir, load_config, load_config_or_default};
use ocslice_core::error::{SliceError, VpnError};
use ocslice_core::vpn::{Elevator, SudoElevator};
use std::io::IsTerminal;
use tracing::info;

fn build_runtime() -> Result<tokio::runtime::Runtime, SliceError> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

/// Run the connect command
///
/// The tunnel runs in its own process group with its output in the log
/// directory, so this returns as soon as the attempt has a verdict and the
/// tunnel keeps running afterwards.
pub fn run_connect(direct: bool) -> Result<(), SliceError> {
    let config = load_config()?;
    let manager = session_manager(&config)?;
    let runtime = build_runtime()?;

    runtime.block_on(async {
        let elevator = SudoElevator::new(&config.helpers.elevation_program);
        unlock_elevation(&elevator).await?;

        let message = if direct {
            println!("Connecting to {}...", config.vpn_config.server);
            manager.connect_direct(config.vpn_config.clone()).await?
        } else {
            let accepted = manager.connect(config.vpn_config.clone())?;
            println!("{}", accepted);
            manager
                .wait_for_connect()
                .await
                .unwrap_or(Err(VpnError::LaunchFailed {
                    reason: "connection task was not started".to_string(),
                }))?
        };

        println!("{} {}", "✓".green(), message);
        println!("Tunnel output is written to {}", get_log_dir()?.display());
        println!("Run `ocslice status` to check it and `ocslice disconnect` to stop it.");
        Ok::<(), SliceError>(())
    })
}

/// Cache the elevation credentials while a terminal is available
///
/// The tunnel runs outside the terminal's foreground group, so a password
/// prompt there would stop it.
async fn unlock_elevation(elevator: &SudoElevator) -> Result<(), SliceError> {
    if elevator.can_elevate_non_interactively().await || !std::io::stdin().is_terminal() {
        return Ok(());
    }

    info!(
        "Asking for the {} password before starting the tunnel",
        elevator.program()
    );
    elevator
        .validate_interactively()
        .await
        .map_err(|e| VpnError::LaunchFailed {
            reason: format!("{} could not be unlocked: {}", elevator.program(), e),
        })?;
    Ok(())
}

/// Run the disconnect command
pub fn run_disconnect() -> Result<(), SliceError> {
    let config = load_config_or_default()?;
    let manager = session_manager(&config)?;
    let runtime = build_runtime()?;

    let message = runtime.block_on(manager.disconnect(config.vpn_config))?;
    println!("{} {}", "✓".green(), message);
    Ok(())
}

/// Run the status command
pub fn run_status(json: bool) -> Result<(), SliceError> {
    let config = load_config_or_default()?;
    let manager = session_manager(&config)?;
    let status = manager.status();

    if json {
        let output = serde_json::to_string(&status).map_err(|e| {
            SliceError::Io(std::io::Error::new(std::io::ErrorKind::Other, e))
        })?;
        println!("{}", output);
        return Ok(());
    }

    if status.connected {
        println!("{} VPN is connected", "●".green());
    } else {
        println!("{} VPN is disconnected", "○".dimmed());
    }

    let vpn = &config.vpn_config;
    println!("  Server:      {}", vpn.server);
    if !vpn.username.is_empty() {
        println!("  Username:    {}", vpn.username);
    }
    println!("  Networks:    {}", vpn.networks);
    println!(
        "  Certificate: {}",
        vpn.certificate_name.as_deref().unwrap_or("(none)")
    );

    let secrets = manager.stored_secrets(&vpn.username);
    println!("  Secrets:");
    for (label, present) in [
        ("VPN password", secrets.tunnel),
        ("certificate password", secrets.certificate),
        ("sudo password", secrets.elevation),
    ] {
        let mark = if present { "✓".green() } else { "✗".red() };
        println!("    {} {}", mark, label);
    }

    Ok(())
}
