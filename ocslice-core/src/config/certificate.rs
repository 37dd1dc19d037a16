//! Client certificate import
//!
//! Copies a PKCS#12 bundle into the private certificate directory and points
//! the configuration at the copy.

use crate::config::VpnConfig;
use crate::error::{ConfigError, SliceError};
use std::path::{Path, PathBuf};
use tracing::info;

const ACCEPTED_EXTENSIONS: [&str; 2] = ["pfx", "p12"];

/// True when the file name carries an accepted certificate extension
pub fn is_supported_certificate(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ACCEPTED_EXTENSIONS
                .iter()
                .any(|accepted| ext.eq_ignore_ascii_case(accepted))
        })
        .unwrap_or(false)
}

/// Copy `source` into `cert_dir` and record it in `config`
///
/// Returns the path of the imported copy.
pub fn import_certificate(
    config: &mut VpnConfig,
    source: &Path,
    cert_dir: &Path,
) -> Result<PathBuf, SliceError> {
    let name = source
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            SliceError::Config(ConfigError::UnsupportedCertificate {
                name: source.to_string_lossy().to_string(),
            })
        })?
        .to_string();

    if !is_supported_certificate(&name) {
        return Err(SliceError::Config(ConfigError::UnsupportedCertificate { name }));
    }

    std::fs::create_dir_all(cert_dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(cert_dir, std::fs::Permissions::from_mode(0o700))?;
    }

    let target = cert_dir.join(&name);
    std::fs::copy(source, &target)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&target, std::fs::Permissions::from_mode(0o600))?;
    }

    info!("Imported certificate {} into {:?}", name, cert_dir);
    config.certificate_file = Some(target.clone());
    config.certificate_name = Some(name);
    Ok(target)
}
