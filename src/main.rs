//! ocslice - OpenConnect split-tunnel session manager
//!
//! Connects to a VPN through OpenConnect and vpn-slice with credentials kept
//! in the system keyring, reports the tunnel state, and tears it down.

use clap::{Parser, Subcommand};
use ocslice_core::error::{SliceError, VpnError};
use ocslice_core::init_logging;

mod cli;

#[derive(Parser)]
#[command(name = "ocslice")]
#[command(version)]
#[command(about = "OpenConnect split-tunnel VPN session manager")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the VPN session and store its secrets
    Setup,
    /// Connect to the VPN; the tunnel keeps running after the command returns
    Connect {
        /// Block on the connection attempt instead of starting it in the background
        #[arg(long)]
        direct: bool,
    },
    /// Disconnect from the VPN
    Disconnect,
    /// Show whether a tunnel is active
    Status {
        /// Print `{"connected": bool}` only
        #[arg(long)]
        json: bool,
    },
    /// Manage stored secrets
    Secrets {
        #[command(subcommand)]
        action: SecretsCommands,
    },
}

#[derive(Subcommand)]
enum SecretsCommands {
    /// Delete the configured user's secrets from the keyring
    Clear,
}

fn exit_code(error: &SliceError) -> i32 {
    match error {
        // Configuration errors (exit code 2)
        SliceError::Config(_) | SliceError::Toml(_) | SliceError::TomlSerialize(_) => 2,
        // Keyring errors (exit code 2 for configuration/setup issues)
        SliceError::Credential(_) => 2,
        // VPN errors - distinguish missing setup from runtime failures
        SliceError::Vpn(vpn_error) => match vpn_error {
            VpnError::CertificateMissing
            | VpnError::UsernameMissing
            | VpnError::TunnelPasswordMissing
            | VpnError::CredentialUnavailable { .. }
            | VpnError::HelperNotFound { .. }
            | VpnError::ElevationPasswordMissing => 2,
            VpnError::AlreadyConnected
            | VpnError::AttemptInProgress
            | VpnError::LaunchFailed { .. }
            | VpnError::AuthenticationFailed { .. }
            | VpnError::ConnectionTimeout { .. }
            | VpnError::TunnelExited { .. }
            | VpnError::ScriptFailed { .. }
            | VpnError::TeardownUncertain { .. } => 1,
        },
        // IO errors (exit code 1 - runtime)
        SliceError::Io(_) => 1,
    }
}

fn main() {
    if let Err(e) = init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(2);
    }

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Setup => cli::setup::run_setup(),
        Commands::Connect { direct } => cli::vpn::run_connect(direct),
        Commands::Disconnect => cli::vpn::run_disconnect(),
        Commands::Status { json } => cli::vpn::run_status(json),
        Commands::Secrets { action } => match action {
            SecretsCommands::Clear => cli::secrets::run_clear(),
        },
    };

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(exit_code(&e));
        }
    }
}
