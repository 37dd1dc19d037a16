//! Tunnel output files
//!
//! The tunnel writes its stdout and stderr straight into two files that the
//! supervisor follows while it classifies the attempt. The tunnel never
//! depends on the supervising process to keep reading its output.

use crate::vpn::output_parser::OutputStream;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

const STDOUT_LOG: &str = "tunnel.out";
const STDERR_LOG: &str = "tunnel.err";

/// Location of the two output files of the current tunnel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelLog {
    dir: PathBuf,
}

impl TunnelLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, stream: OutputStream) -> PathBuf {
        match stream {
            OutputStream::Stdout => self.dir.join(STDOUT_LOG),
            OutputStream::Stderr => self.dir.join(STDERR_LOG),
        }
    }

    /// Truncate both files for a new attempt and open them for the tunnel
    pub fn create(&self) -> io::Result<(File, File)> {
        std::fs::create_dir_all(&self.dir)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.dir, std::fs::Permissions::from_mode(0o700))?;
        }

        Ok((
            self.open_for_writing(OutputStream::Stdout)?,
            self.open_for_writing(OutputStream::Stderr)?,
        ))
    }

    fn open_for_writing(&self, stream: OutputStream) -> io::Result<File> {
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        options.open(self.path(stream))
    }
}

impl Default for TunnelLog {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join("ocslice"))
    }
}
