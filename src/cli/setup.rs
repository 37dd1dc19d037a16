//! Setup command implementation
//!
//! Interactive command that configures the VPN session and stores its
//! secrets in the system keyring.

use super::session_manager;
use colored::Colorize;
use ocslice_core::{
    auth::{CredentialStore, KeyringStore},
    config::{
        certificate::import_certificate,
        toml_config::{self, TomlConfig},
        VpnConfig,
    },
    error::{ConfigError, CredentialError, SliceError},
    types::{SecretPurpose, SecretValue},
};
use std::io::{self, Write};
use std::path::PathBuf;

/// Run the setup command
pub fn run_setup() -> Result<(), SliceError> {
    println!("{}", "ocslice VPN Setup".bold());
    println!("=================");
    println!();
    println!("This will configure your VPN session.");
    println!("Passwords will be stored in your system keyring.");
    println!(
        "Configuration will be saved to {}",
        toml_config::get_config_path()?.display()
    );
    println!();

    // Check keyring availability
    check_keyring_availability()?;

    let existing = toml_config::load_config_or_default()?;
    let previous_username = existing.vpn_config.username.clone();

    let mut config = existing.clone();
    config.vpn_config = collect_vpn_config(&existing.vpn_config)?;
    collect_certificate(&mut config)?;

    config.validate()?;

    let manager = session_manager(&config)?;
    let username = config.vpn_config.username.clone();

    println!();
    println!("Passwords (leave empty to keep the stored value):");
    println!("---------------------------------------------------");
    let mut stored = Vec::new();
    for purpose in SecretPurpose::ALL {
        let value = SecretValue::new(prompt_password(purpose.label())?);
        if value.is_empty() {
            continue;
        }
        stored.push((purpose, value));
    }

    println!();
    println!("Saving configuration...");
    manager.save_settings(
        &previous_username,
        &mut config,
        &toml_config::get_config_path()?,
    )?;

    for (purpose, value) in &stored {
        manager.store_secret(&username, *purpose, value)?;
        println!("{} Stored {}", "✓".green(), purpose.label());
    }

    println!("{} Setup complete!", "✓".green());
    println!();
    println!("You can now use:");
    println!("  ocslice connect     - Connect to VPN");
    println!("  ocslice disconnect  - Disconnect from VPN");
    println!("  ocslice status      - Show connection status");

    Ok(())
}

/// Check if the keyring is available
fn check_keyring_availability() -> Result<(), SliceError> {
    let store = KeyringStore::new();
    let probe_key = "__ocslice_test__";

    match store.set_secret(probe_key, &SecretValue::from("test")) {
        Ok(()) => {
            let _ = store.delete_secret(probe_key);
            Ok(())
        }
        Err(e) => {
            println!("{} Keyring is not available or locked.", "✗".red());
            println!("Please ensure your system keyring is unlocked and available.");
            Err(SliceError::Credential(match e {
                CredentialError::StoreFailed => CredentialError::ServiceUnavailable,
                other => other,
            }))
        }
    }
}

/// Collect VPN configuration interactively
fn collect_vpn_config(current: &VpnConfig) -> Result<VpnConfig, SliceError> {
    println!("VPN Configuration:");
    println!("-----------------");

    let server = prompt_required("VPN Server", &current.server)?;
    let auth_group = prompt_optional("Auth group", &current.auth_group)?;
    let username = prompt_required("Username", &current.username)?;
    let networks = prompt_required("Networks (space separated)", &current.networks)?;

    Ok(VpnConfig {
        server,
        auth_group,
        username,
        networks,
        ..current.clone()
    })
}

/// Ask for a certificate and import it; empty input keeps the current one
fn collect_certificate(config: &mut TomlConfig) -> Result<(), SliceError> {
    let current = config
        .vpn_config
        .certificate_name
        .clone()
        .unwrap_or_default();
    let input = prompt_optional("Certificate file (.p12/.pfx)", &current)?;

    if input.is_empty() || input == current {
        return Ok(());
    }

    let source = PathBuf::from(&input);
    if !source.is_file() {
        return Err(SliceError::Config(ConfigError::ValidationError {
            message: format!("Certificate file not found: {}", input),
        }));
    }

    let target = import_certificate(
        &mut config.vpn_config,
        &source,
        &toml_config::get_certificate_dir()?,
    )?;
    println!("{} Certificate imported to {}", "✓".green(), target.display());
    Ok(())
}

/// Prompt for a required value with default
fn prompt_required(prompt: &str, default: &str) -> Result<String, SliceError> {
    let prompt_text = if default.is_empty() {
        format!("{}: ", prompt)
    } else {
        format!("{} [{}]: ", prompt, default)
    };

    loop {
        let input = prompt_input(&prompt_text)?;

        if input.trim().is_empty() {
            if !default.is_empty() {
                return Ok(default.to_string());
            }
            println!("{} This field is required. Please enter a value.", "✗".red());
            continue;
        }

        return Ok(input.trim().to_string());
    }
}

/// Prompt for an optional value
fn prompt_optional(prompt: &str, default: &str) -> Result<String, SliceError> {
    let prompt_text = format!("{} [{}]: ", prompt, default);
    let input = prompt_input(&prompt_text)?;

    if input.trim().is_empty() {
        Ok(default.to_string())
    } else {
        Ok(input.trim().to_string())
    }
}

/// Prompt for a password
fn prompt_password(prompt: &str) -> Result<String, SliceError> {
    let prompt_text = format!("{}: ", prompt);
    prompt_input(&prompt_text)
}

/// Low-level input prompting
fn prompt_input(prompt: &str) -> Result<String, SliceError> {
    print!("{}", prompt);
    io::stdout().flush().map_err(SliceError::Io)?;

    let mut input = String::new();
    io::stdin().read_line(&mut input).map_err(SliceError::Io)?;

    Ok(input.trim_end().to_string())
}
