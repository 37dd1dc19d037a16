// Tests for the connection state probe
#![cfg(unix)]

use ocslice_core::vpn::{SessionProbe, SystemProbe, TrackingArtifact};
use std::process::{Command, Stdio};
use tempfile::tempdir;

/// A probe that only looks at files below `dir`
fn probe_in(dir: &std::path::Path) -> SystemProbe {
    SystemProbe::new(
        TrackingArtifact::new(dir.join("openconnect.pid")),
        "ocslice-absent",
        "198.51.100.254.",
    )
}

#[test]
fn test_pid_file_of_running_process() {
    let dir = tempdir().unwrap();
    let probe = probe_in(dir.path());

    let mut child = Command::new("sleep")
        .arg("30")
        .stdout(Stdio::null())
        .spawn()
        .expect("Failed to spawn sleep");
    std::fs::write(probe.artifact().path(), format!("{}\n", child.id())).unwrap();

    assert!(probe.pid_file_alive());
    assert!(probe.is_connected());

    child.kill().unwrap();
    child.wait().unwrap();

    assert!(!probe.is_connected());
    assert!(!probe.artifact().exists(), "stale PID file should be removed");
}

#[test]
fn test_garbage_pid_file_is_stale() {
    let dir = tempdir().unwrap();
    let probe = probe_in(dir.path());
    std::fs::write(probe.artifact().path(), "not-a-pid").unwrap();

    assert!(!probe.is_connected());
    assert!(!probe.artifact().exists());
}

#[test]
fn test_missing_pid_file_falls_through() {
    let dir = tempdir().unwrap();
    let probe = probe_in(dir.path());

    assert!(!probe.pid_file_alive());
    assert!(!probe.process_running());
    assert!(!probe.tunnel_interface_present());
    assert!(!probe.is_connected());
}

#[test]
fn test_process_name_search() {
    let dir = tempdir().unwrap();
    let mut child = Command::new("sleep")
        .arg("30")
        .stdout(Stdio::null())
        .spawn()
        .expect("Failed to spawn sleep");

    let probe = SystemProbe::new(
        TrackingArtifact::new(dir.path().join("openconnect.pid")),
        "sleep",
        "198.51.100.254.",
    );
    assert!(probe.process_running());
    assert!(probe.is_connected());

    child.kill().unwrap();
    child.wait().unwrap();
}

#[test]
fn test_loopback_matches_interface_prefix() {
    let dir = tempdir().unwrap();
    let probe = SystemProbe::new(
        TrackingArtifact::new(dir.path().join("openconnect.pid")),
        "ocslice-absent",
        "127.0.0.",
    );
    assert!(probe.tunnel_interface_present());
}
