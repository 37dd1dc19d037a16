//! Shared fakes for the integration tests
#![allow(dead_code)]

use ocslice_core::auth::{account_key, CredentialStore};
use ocslice_core::config::{HelperConfig, TimingConfig, VpnConfig};
use ocslice_core::error::CredentialError;
use ocslice_core::types::{SecretPurpose, SecretValue};
use ocslice_core::vpn::elevation::ElevationError;
use ocslice_core::vpn::{
    ElevatedCommand, Elevator, HelperPaths, SessionProbe, Supervisor, TunnelLog,
};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory credential store
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn with_secrets(username: &str, secrets: &[(SecretPurpose, &str)]) -> Self {
        let store = Self::default();
        for (purpose, value) in secrets {
            store
                .set_secret(&account_key(username, *purpose), &SecretValue::from(*value))
                .unwrap();
        }
        store
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }
}

impl CredentialStore for MemoryStore {
    fn get_secret(&self, key: &str) -> Result<SecretValue, CredentialError> {
        self.entries
            .lock()
            .unwrap()
            .get(key)
            .map(|v| SecretValue::from(v.as_str()))
            .ok_or(CredentialError::NotFound)
    }

    fn set_secret(&self, key: &str, value: &SecretValue) -> Result<(), CredentialError> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.expose().to_string());
        Ok(())
    }

    fn delete_secret(&self, key: &str) -> Result<(), CredentialError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Store whose backend is unreachable
pub struct FailingStore;

impl CredentialStore for FailingStore {
    fn get_secret(&self, _key: &str) -> Result<SecretValue, CredentialError> {
        Err(CredentialError::ServiceUnavailable)
    }

    fn set_secret(&self, _key: &str, _value: &SecretValue) -> Result<(), CredentialError> {
        Err(CredentialError::ServiceUnavailable)
    }

    fn delete_secret(&self, _key: &str) -> Result<(), CredentialError> {
        Err(CredentialError::ServiceUnavailable)
    }
}

/// Probe that reports a tunnel while a marker file exists
pub struct FileProbe {
    marker: PathBuf,
}

impl FileProbe {
    pub fn new(marker: impl Into<PathBuf>) -> Self {
        Self {
            marker: marker.into(),
        }
    }
}

impl SessionProbe for FileProbe {
    fn is_connected(&self) -> bool {
        self.marker.exists()
    }
}

/// Probe answering from a fixed list, repeating the last answer
pub struct ScriptedProbe {
    answers: Mutex<VecDeque<bool>>,
    last: AtomicBool,
}

impl ScriptedProbe {
    pub fn new(answers: &[bool]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().copied().collect()),
            last: AtomicBool::new(false),
        }
    }
}

impl SessionProbe for ScriptedProbe {
    fn is_connected(&self) -> bool {
        match self.answers.lock().unwrap().pop_front() {
            Some(answer) => {
                self.last.store(answer, Ordering::SeqCst);
                answer
            }
            None => self.last.load(Ordering::SeqCst),
        }
    }
}

/// Elevator that records every call instead of running anything
///
/// Clones share their recordings.
#[derive(Clone, Default)]
pub struct RecordingElevator {
    pub non_interactive: bool,
    /// Indexes of commands that report failure
    pub failing: Vec<usize>,
    pub script_fails: bool,
    pub commands: Arc<Mutex<Vec<String>>>,
    pub checks: Arc<Mutex<usize>>,
    /// Path and content of every script run
    pub scripts: Arc<Mutex<Vec<(PathBuf, String)>>>,
    /// Time limit passed with every script run
    pub script_limits: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingElevator {
    pub fn new(non_interactive: bool) -> Self {
        Self {
            non_interactive,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        *self.checks.lock().unwrap()
            + self.commands.lock().unwrap().len()
            + self.scripts.lock().unwrap().len()
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn scripts(&self) -> Vec<(PathBuf, String)> {
        self.scripts.lock().unwrap().clone()
    }

    pub fn script_limits(&self) -> Vec<Duration> {
        self.script_limits.lock().unwrap().clone()
    }
}

impl Elevator for RecordingElevator {
    fn program(&self) -> &str {
        "sudo"
    }

    async fn can_elevate_non_interactively(&self) -> bool {
        *self.checks.lock().unwrap() += 1;
        self.non_interactive
    }

    async fn run_elevated(&self, command: &ElevatedCommand) -> Result<(), ElevationError> {
        let mut commands = self.commands.lock().unwrap();
        let index = commands.len();
        commands.push(command.to_string());

        if self.failing.contains(&index) {
            Err(ElevationError::Exit {
                status: exit_status(1),
            })
        } else {
            Ok(())
        }
    }

    async fn run_script(&self, script: &Path, limit: Duration) -> Result<Output, ElevationError> {
        let content = std::fs::read_to_string(script).unwrap_or_default();
        self.scripts
            .lock()
            .unwrap()
            .push((script.to_path_buf(), content));
        self.script_limits.lock().unwrap().push(limit);

        if self.script_fails {
            return Err(ElevationError::Spawn {
                program: "expect".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "expect not found"),
            });
        }

        Ok(Output {
            status: exit_status(0),
            stdout: b"Disconnect commands finished\n".to_vec(),
            stderr: Vec::new(),
        })
    }
}

fn exit_status(code: i32) -> std::process::ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    std::process::ExitStatus::from_raw(code << 8)
}

/// Millisecond timings so tests finish quickly
pub fn fast_timing() -> TimingConfig {
    TimingConfig {
        settle_delay_ms: 20,
        certificate_delay_ms: 20,
        connect_timeout_ms: 3_000,
        direct_timeout_ms: 3_000,
        timeout_grace_ms: 50,
        teardown_pacing_ms: 1,
        teardown_settle_ms: 1,
        scripted_settle_ms: 1,
        script_timeout_secs: 1,
    }
}

/// A workspace holding a fake tunnel script and a certificate
pub struct TunnelFixture {
    pub dir: tempfile::TempDir,
}

impl TunnelFixture {
    /// Write a shell script standing in for the tunnel binary
    ///
    /// `$DIR` inside `body` points at the fixture directory.
    pub fn new(body: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let script = format!("#!/bin/sh\nDIR='{}'\n{}\n", dir.path().display(), body);
        std::fs::write(dir.path().join("tunnel.sh"), script).unwrap();
        std::fs::write(dir.path().join("client.p12"), b"pkcs12").unwrap();
        Self { dir }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Output files of the fake tunnel
    pub fn log(&self) -> TunnelLog {
        TunnelLog::new(self.path("logs"))
    }

    /// Write an executable helper script into the fixture directory
    pub fn helper(&self, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = self.path(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    pub fn config(&self) -> VpnConfig {
        VpnConfig {
            certificate_file: Some(self.path("client.p12")),
            ..VpnConfig::new("vpn.example.com".to_string(), "alice".to_string())
        }
    }

    /// Supervisor running the script through `sh` instead of sudo
    pub fn supervisor<P: SessionProbe>(&self, probe: Arc<P>, timing: TimingConfig) -> Supervisor<P> {
        let helpers = HelperConfig {
            elevation_program: "/bin/sh".to_string(),
            ..HelperConfig::default()
        };

        Supervisor::new(probe, helpers, timing)
            .with_helper_paths(HelperPaths {
                tunnel: self.path("tunnel.sh"),
                slice: PathBuf::from("/bin/true"),
            })
            .with_pid_file(self.path("oc.pid"))
            .with_log(self.log())
    }

    /// Wait long enough for a surviving script to write its marker
    pub async fn settle(&self) {
        tokio::time::sleep(std::time::Duration::from_millis(1_500)).await;
    }
}
