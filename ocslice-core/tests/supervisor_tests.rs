//! Connection supervisor tests
//!
//! A shell script stands in for OpenConnect. It is started through `sh`
//! (standing in for sudo), records what it reads on stdin, and prints the
//! markers under test. Scripts that are not killed touch `survived`.
#![cfg(unix)]

mod common;

use common::{fast_timing, FailingStore, FileProbe, MemoryStore, TunnelFixture};
use ocslice_core::config::HelperConfig;
use ocslice_core::error::{CredentialError, VpnError};
use ocslice_core::types::SecretPurpose;
use ocslice_core::vpn::output_parser::OutputStream;
use ocslice_core::vpn::supervisor::ACCEPTED_MESSAGE;
use ocslice_core::vpn::{ConnectOutcome, Supervisor};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn secrets() -> MemoryStore {
    MemoryStore::with_secrets(
        "alice",
        &[
            (SecretPurpose::Tunnel, "vpn-pw"),
            (SecretPurpose::Certificate, "cert-pw"),
        ],
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_success_marker_leaves_process_running() {
    let fixture = TunnelFixture::new(
        r#"read cert
read pass
printf '%s\n%s\n' "$cert" "$pass" > "$DIR/stdin"
echo "POST https://vpn.example.com/"
echo "Configured as 192.168.255.10"
sleep 1
touch "$DIR/survived""#,
    );
    let probe = Arc::new(FileProbe::new(fixture.path("up")));
    let supervisor = fixture.supervisor(probe, fast_timing());

    let outcome = supervisor
        .connect_direct(fixture.config(), &secrets())
        .await
        .unwrap();

    assert_eq!(outcome, ConnectOutcome::Connected);
    assert!(!outcome.terminated_process());

    fixture.settle().await;
    assert!(fixture.path("survived").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_certificate_password_precedes_tunnel_password() {
    let fixture = TunnelFixture::new(
        r#"read cert
read pass
printf '%s\n%s\n' "$cert" "$pass" > "$DIR/stdin"
echo "CSTP connected""#,
    );
    let probe = Arc::new(FileProbe::new(fixture.path("up")));
    let supervisor = fixture.supervisor(probe, fast_timing());

    let outcome = supervisor
        .connect_direct(fixture.config(), &secrets())
        .await
        .unwrap();
    assert!(outcome.is_connected());

    let recorded = std::fs::read_to_string(fixture.path("stdin")).unwrap();
    assert_eq!(recorded, "cert-pw\nvpn-pw\n");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_empty_certificate_password_is_skipped() {
    let fixture = TunnelFixture::new(
        r#"read pass
echo "$pass" > "$DIR/stdin"
echo "VPN tunnel running""#,
    );
    let probe = Arc::new(FileProbe::new(fixture.path("up")));
    let supervisor = fixture.supervisor(probe, fast_timing());
    let store = MemoryStore::with_secrets("alice", &[(SecretPurpose::Tunnel, "vpn-pw")]);

    let outcome = supervisor
        .connect_direct(fixture.config(), &store)
        .await
        .unwrap();
    assert_eq!(outcome, ConnectOutcome::Connected);

    let recorded = std::fs::read_to_string(fixture.path("stdin")).unwrap();
    assert_eq!(recorded, "vpn-pw\n");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failure_marker_kills_process() {
    let fixture = TunnelFixture::new(
        r#"echo "Login failed." >&2
sleep 1
touch "$DIR/survived""#,
    );
    let probe = Arc::new(FileProbe::new(fixture.path("up")));
    let supervisor = fixture.supervisor(probe, fast_timing());

    let outcome = supervisor
        .connect_direct(fixture.config(), &secrets())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ConnectOutcome::AuthenticationFailed {
            line: "Login failed.".to_string()
        }
    );
    assert!(outcome.terminated_process());

    fixture.settle().await;
    assert!(!fixture.path("survived").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_success_text_on_stderr_is_not_a_verdict() {
    let fixture = TunnelFixture::new(
        r#"echo "CSTP connected" >&2
echo "Login failed." >&2"#,
    );
    let probe = Arc::new(FileProbe::new(fixture.path("up")));
    let supervisor = fixture.supervisor(probe, fast_timing());

    let outcome = supervisor
        .connect_direct(fixture.config(), &secrets())
        .await
        .unwrap();

    assert!(matches!(outcome, ConnectOutcome::AuthenticationFailed { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_timeout_without_tunnel_kills_process() {
    let fixture = TunnelFixture::new(
        r#"sleep 1
touch "$DIR/survived""#,
    );
    let probe = Arc::new(FileProbe::new(fixture.path("up")));
    let timing = ocslice_core::config::TimingConfig {
        direct_timeout_ms: 300,
        ..fast_timing()
    };
    let supervisor = fixture.supervisor(probe, timing);

    let outcome = supervisor
        .connect_direct(fixture.config(), &secrets())
        .await
        .unwrap();

    assert!(matches!(outcome, ConnectOutcome::TimedOut { .. }));
    assert!(outcome.terminated_process());

    fixture.settle().await;
    assert!(!fixture.path("survived").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_timeout_with_live_tunnel_is_success() {
    let fixture = TunnelFixture::new(
        r#"touch "$DIR/up"
sleep 1
touch "$DIR/survived""#,
    );
    let probe = Arc::new(FileProbe::new(fixture.path("up")));
    let timing = ocslice_core::config::TimingConfig {
        direct_timeout_ms: 300,
        ..fast_timing()
    };
    let supervisor = fixture.supervisor(probe, timing);

    let outcome = supervisor
        .connect_direct(fixture.config(), &secrets())
        .await
        .unwrap();

    assert_eq!(outcome, ConnectOutcome::ConnectedAfterTimeout);

    fixture.settle().await;
    assert!(fixture.path("survived").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tunnel_outlives_its_supervisor() {
    let fixture = TunnelFixture::new(
        r#"echo $$ > "$DIR/pid"
echo "CSTP connected"
sleep 1
echo "still running"
touch "$DIR/survived""#,
    );
    let probe = Arc::new(FileProbe::new(fixture.path("up")));
    let supervisor = fixture.supervisor(probe, fast_timing());

    let outcome = supervisor
        .connect_direct(fixture.config(), &secrets())
        .await
        .unwrap();
    assert_eq!(outcome, ConnectOutcome::Connected);
    drop(supervisor);

    // A terminal interrupt goes to the foreground group, which is ours.
    let pid: i32 = std::fs::read_to_string(fixture.path("pid"))
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    let group = nix::unistd::getpgid(Some(nix::unistd::Pid::from_raw(pid))).unwrap();
    assert_eq!(group.as_raw(), pid);
    assert_ne!(group, nix::unistd::getpgrp());

    fixture.settle().await;
    assert!(fixture.path("survived").exists());
    let output = std::fs::read_to_string(fixture.log().path(OutputStream::Stdout)).unwrap();
    assert_eq!(output, "CSTP connected\nstill running\n");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_closed_streams_resolve_before_timeout() {
    let fixture = TunnelFixture::new(
        r#"echo "nothing to see"
exit 3"#,
    );
    let probe = Arc::new(FileProbe::new(fixture.path("up")));
    let timing = ocslice_core::config::TimingConfig {
        direct_timeout_ms: 10_000,
        ..fast_timing()
    };
    let supervisor = fixture.supervisor(probe, timing);

    let started = Instant::now();
    let outcome = supervisor
        .connect_direct(fixture.config(), &secrets())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ConnectOutcome::Exited {
            status: "exit status: 3".to_string()
        }
    );
    assert!(!outcome.terminated_process());
    assert_eq!(
        outcome.message(),
        "Tunnel process exited before reporting a result (exit status: 3)"
    );
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_background_connect_returns_before_verdict() {
    let fixture = TunnelFixture::new(
        r#"sleep 1
echo "Connected tun0 as 192.168.255.10""#,
    );
    let probe = Arc::new(FileProbe::new(fixture.path("up")));
    let supervisor = fixture.supervisor(probe, fast_timing());

    let handle = supervisor.connect(fixture.config(), &secrets()).unwrap();
    assert_eq!(handle.message(), ACCEPTED_MESSAGE);
    assert!(!handle.is_finished());

    assert_eq!(handle.outcome().await, ConnectOutcome::Connected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_launch_failure_is_reported() {
    let fixture = TunnelFixture::new("exit 0");
    let probe = Arc::new(FileProbe::new(fixture.path("up")));
    let helpers = ocslice_core::config::HelperConfig {
        elevation_program: fixture.path("missing-sudo").display().to_string(),
        ..Default::default()
    };
    let supervisor = Supervisor::new(probe, helpers, fast_timing())
        .with_helper_paths(ocslice_core::vpn::HelperPaths {
            tunnel: fixture.path("tunnel.sh"),
            slice: "/bin/true".into(),
        })
        .with_log(fixture.log());

    let outcome = supervisor
        .connect_direct(fixture.config(), &secrets())
        .await
        .unwrap();

    assert!(matches!(outcome, ConnectOutcome::LaunchFailed { .. }));
}

// Precondition failures never spawn the tunnel

const SPAWN_MARKER: &str = r#"touch "$DIR/spawned""#;

#[tokio::test]
async fn test_rejects_when_already_connected() {
    let fixture = TunnelFixture::new(SPAWN_MARKER);
    std::fs::write(fixture.path("up"), b"").unwrap();
    let probe = Arc::new(FileProbe::new(fixture.path("up")));
    let supervisor = fixture.supervisor(probe, fast_timing());

    let result = supervisor.connect(fixture.config(), &secrets());
    assert_eq!(result.unwrap_err(), VpnError::AlreadyConnected);
    assert!(!fixture.path("spawned").exists());
}

#[tokio::test]
async fn test_rejects_missing_certificate() {
    let fixture = TunnelFixture::new(SPAWN_MARKER);
    let probe = Arc::new(FileProbe::new(fixture.path("up")));
    let supervisor = fixture.supervisor(probe, fast_timing());

    let mut config = fixture.config();
    config.certificate_file = Some(fixture.path("absent.p12"));
    assert_eq!(
        supervisor.connect(config, &secrets()).unwrap_err(),
        VpnError::CertificateMissing
    );

    let mut config = fixture.config();
    config.certificate_file = None;
    assert_eq!(
        supervisor.connect(config, &secrets()).unwrap_err(),
        VpnError::CertificateMissing
    );
    assert!(!fixture.path("spawned").exists());
}

#[tokio::test]
async fn test_rejects_empty_username() {
    let fixture = TunnelFixture::new(SPAWN_MARKER);
    let probe = Arc::new(FileProbe::new(fixture.path("up")));
    let supervisor = fixture.supervisor(probe, fast_timing());

    let mut config = fixture.config();
    config.username.clear();
    assert_eq!(
        supervisor.connect(config, &secrets()).unwrap_err(),
        VpnError::UsernameMissing
    );
    assert!(!fixture.path("spawned").exists());
}

#[tokio::test]
async fn test_rejects_missing_tunnel_password() {
    let fixture = TunnelFixture::new(SPAWN_MARKER);
    let probe = Arc::new(FileProbe::new(fixture.path("up")));
    let supervisor = fixture.supervisor(probe, fast_timing());

    let store = MemoryStore::with_secrets("alice", &[(SecretPurpose::Certificate, "cert-pw")]);
    assert_eq!(
        supervisor.connect(fixture.config(), &store).unwrap_err(),
        VpnError::TunnelPasswordMissing
    );

    let store = MemoryStore::with_secrets("alice", &[(SecretPurpose::Tunnel, "")]);
    assert_eq!(
        supervisor.connect(fixture.config(), &store).unwrap_err(),
        VpnError::TunnelPasswordMissing
    );
    assert!(!fixture.path("spawned").exists());
}

#[tokio::test]
async fn test_unreachable_store_is_distinguished_from_missing_secret() {
    let fixture = TunnelFixture::new(SPAWN_MARKER);
    let probe = Arc::new(FileProbe::new(fixture.path("up")));
    let supervisor = fixture.supervisor(probe, fast_timing());

    let err = supervisor
        .connect(fixture.config(), &FailingStore)
        .unwrap_err();
    assert_eq!(
        err,
        VpnError::CredentialUnavailable {
            secret: "VPN password".to_string(),
            source: CredentialError::ServiceUnavailable,
        }
    );
    assert!(!fixture.path("spawned").exists());
}

#[tokio::test]
async fn test_rejects_missing_tunnel_binary() {
    let fixture = TunnelFixture::new(SPAWN_MARKER);
    let probe = Arc::new(FileProbe::new(fixture.path("up")));
    let helpers = HelperConfig {
        tunnel_binary: Some(fixture.path("no-openconnect")),
        slice_helper: Some(fixture.helper("vpn-slice", "exit 0")),
        ..Default::default()
    };
    let supervisor = Supervisor::new(probe, helpers, fast_timing()).with_log(fixture.log());

    assert_eq!(
        supervisor.connect(fixture.config(), &secrets()).unwrap_err(),
        VpnError::HelperNotFound {
            helper: "openconnect".to_string()
        }
    );
    assert!(!fixture.path("spawned").exists());
}

#[tokio::test]
async fn test_rejects_slice_helper_without_version() {
    let fixture = TunnelFixture::new(SPAWN_MARKER);
    let probe = Arc::new(FileProbe::new(fixture.path("up")));
    let helpers = HelperConfig {
        tunnel_binary: Some(fixture.path("tunnel.sh")),
        slice_helper: Some(fixture.helper("vpn-slice", "exit 1")),
        ..Default::default()
    };
    let supervisor = Supervisor::new(probe, helpers, fast_timing()).with_log(fixture.log());

    assert_eq!(
        supervisor.connect(fixture.config(), &secrets()).unwrap_err(),
        VpnError::HelperNotFound {
            helper: "vpn-slice".to_string()
        }
    );
    assert!(!fixture.path("spawned").exists());
}
