//! Connection supervisor
//!
//! Launches OpenConnect under the elevation program, types the credentials
//! into its stdin, and classifies the attempt from its output. The tunnel
//! runs in its own process group and writes its output to files, so it
//! outlives the process that started it. The process handle is given up once
//! a verdict is reached; later operations only see the tunnel through the
//! probe.

use crate::auth::{CredentialSet, CredentialStore};
use crate::config::{HelperConfig, TimingConfig, VpnConfig};
use crate::error::VpnError;
use crate::types::{SecretPurpose, SecretValue};
use crate::vpn::helpers::HelperPaths;
use crate::vpn::output_parser::{OutputParser, OutputStream};
use crate::vpn::pid_file::DEFAULT_PID_FILE;
use crate::vpn::probe::SessionProbe;
use crate::vpn::tunnel_log::TunnelLog;
use crate::vpn::{ConnectOutcome, ScanEvent};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Message returned when a background attempt has been accepted
pub const ACCEPTED_MESSAGE: &str = "VPN connection is starting (poll status for the result)";

/// How often a drained output file is checked for new lines
const FOLLOW_INTERVAL: Duration = Duration::from_millis(50);

static NEXT_ATTEMPT: AtomicU64 = AtomicU64::new(1);

/// Full command line of the tunnel process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelCommand {
    program: String,
    args: Vec<String>,
}

impl TunnelCommand {
    /// Build the elevation-wrapped OpenConnect invocation
    pub fn build(
        elevation_program: &str,
        helpers: &HelperPaths,
        config: &VpnConfig,
        certificate: &Path,
        pid_file: &Path,
    ) -> Self {
        let args = vec![
            helpers.tunnel.to_string_lossy().to_string(),
            config.server.clone(),
            format!("--authgroup={}", config.auth_group),
            format!("--user={}", config.username),
            "-c".to_string(),
            certificate.to_string_lossy().to_string(),
            format!("--pid-file={}", pid_file.display()),
            "-s".to_string(),
            format!("{} {}", helpers.slice.display(), config.networks),
        ];

        Self {
            program: elevation_program.to_string(),
            args,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    fn spawn(&self, stdout: File, stderr: File) -> std::io::Result<Child> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));

        // A terminal interrupt aimed at the caller must not reach the tunnel.
        #[cfg(unix)]
        command.process_group(0);

        command.spawn()
    }
}

/// Acknowledgement of a background connection attempt
///
/// Clones share the attempt. Dropping every clone detaches the attempt; it
/// still runs to its verdict.
#[derive(Debug, Clone)]
pub struct ConnectHandle {
    id: u64,
    message: String,
    verdict: watch::Receiver<Option<ConnectOutcome>>,
}

impl ConnectHandle {
    pub fn message(&self) -> &str {
        &self.message
    }

    /// True when both handles belong to the same attempt
    pub fn is_same_attempt(&self, other: &ConnectHandle) -> bool {
        self.id == other.id
    }

    /// True once the attempt has reached its verdict
    pub fn is_finished(&self) -> bool {
        self.verdict.borrow().is_some()
    }

    /// Wait for the verdict of the attempt
    pub async fn outcome(&self) -> ConnectOutcome {
        let mut verdict = self.verdict.clone();
        verdict
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|outcome| (*outcome).clone())
            .unwrap_or_else(|| ConnectOutcome::LaunchFailed {
                reason: "connection task ended without a verdict".to_string(),
            })
    }
}

/// Starts tunnel processes and classifies their outcome
pub struct Supervisor<P: SessionProbe> {
    probe: Arc<P>,
    parser: Arc<OutputParser>,
    helpers: HelperConfig,
    helper_paths: Option<HelperPaths>,
    timing: TimingConfig,
    pid_file: PathBuf,
    log: TunnelLog,
}

/// Everything an attempt needs, captured before anything is spawned
struct Attempt<P: SessionProbe> {
    command: TunnelCommand,
    tunnel_password: SecretValue,
    certificate_password: SecretValue,
    probe: Arc<P>,
    parser: Arc<OutputParser>,
    timing: TimingConfig,
    log: TunnelLog,
}

impl<P: SessionProbe> Supervisor<P> {
    pub fn new(probe: Arc<P>, helpers: HelperConfig, timing: TimingConfig) -> Self {
        Self {
            probe,
            parser: Arc::new(OutputParser::new()),
            helpers,
            helper_paths: None,
            timing,
            pid_file: PathBuf::from(DEFAULT_PID_FILE),
            log: TunnelLog::default(),
        }
    }

    /// Use fixed helper paths instead of discovering them
    pub fn with_helper_paths(mut self, paths: HelperPaths) -> Self {
        self.helper_paths = Some(paths);
        self
    }

    /// Pass a different `--pid-file` to the tunnel
    pub fn with_pid_file(mut self, pid_file: impl Into<PathBuf>) -> Self {
        self.pid_file = pid_file.into();
        self
    }

    /// Write the tunnel output somewhere else
    pub fn with_log(mut self, log: TunnelLog) -> Self {
        self.log = log;
        self
    }

    pub fn probe(&self) -> &Arc<P> {
        &self.probe
    }

    /// Start a connection in the background
    ///
    /// Preconditions are checked synchronously and nothing is spawned when
    /// one fails. On success the launch-and-classify sequence runs as a
    /// detached task and this returns at once. Must be called from within a
    /// Tokio runtime. At most one attempt per session may be in flight; the
    /// caller serialises connects.
    pub fn connect(
        &self,
        config: VpnConfig,
        store: &dyn CredentialStore,
    ) -> Result<ConnectHandle, VpnError> {
        let attempt = self.prepare(&config, store)?;
        let window = self.timing.connect_timeout();
        let (publish, verdict) = watch::channel(None);

        info!("Starting background connection to {}", config.server);
        tokio::spawn(async move {
            let outcome = attempt.run(window).await;
            // Nobody may be listening any more; the verdict is dropped then.
            let _ = publish.send(Some(outcome));
        });

        Ok(ConnectHandle {
            id: NEXT_ATTEMPT.fetch_add(1, Ordering::Relaxed),
            message: ACCEPTED_MESSAGE.to_string(),
            verdict,
        })
    }

    /// Connect and wait for the verdict
    pub async fn connect_direct(
        &self,
        config: VpnConfig,
        store: &dyn CredentialStore,
    ) -> Result<ConnectOutcome, VpnError> {
        let attempt = self.prepare(&config, store)?;
        info!("Connecting to {}", config.server);
        Ok(attempt.run(self.timing.direct_timeout()).await)
    }

    fn prepare(
        &self,
        config: &VpnConfig,
        store: &dyn CredentialStore,
    ) -> Result<Attempt<P>, VpnError> {
        if self.probe.is_connected() {
            return Err(VpnError::AlreadyConnected);
        }

        let certificate = config
            .certificate_file
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty() && path.exists())
            .ok_or(VpnError::CertificateMissing)?;

        if config.username.is_empty() {
            return Err(VpnError::UsernameMissing);
        }

        let credentials = CredentialSet::load(
            store,
            &config.username,
            &[SecretPurpose::Tunnel, SecretPurpose::Certificate],
        )?;
        let tunnel_password = credentials
            .tunnel_password()
            .cloned()
            .ok_or(VpnError::TunnelPasswordMissing)?;

        let helper_paths = match &self.helper_paths {
            Some(paths) => paths.clone(),
            None => HelperPaths::discover(&self.helpers)?,
        };

        let command = TunnelCommand::build(
            &self.helpers.elevation_program,
            &helper_paths,
            config,
            certificate,
            &self.pid_file,
        );

        Ok(Attempt {
            command,
            tunnel_password,
            certificate_password: credentials.certificate_password(),
            probe: Arc::clone(&self.probe),
            parser: Arc::clone(&self.parser),
            timing: self.timing.clone(),
            log: self.log.clone(),
        })
    }
}

impl<P: SessionProbe> Attempt<P> {
    /// Launch the tunnel and race the verdicts against `window`
    #[tracing::instrument(skip_all, fields(window_ms = window.as_millis() as u64))]
    async fn run(self, window: Duration) -> ConnectOutcome {
        let (stdout, stderr) = match self.log.create() {
            Ok(files) => files,
            Err(e) => {
                warn!("Failed to prepare tunnel output in {:?}: {}", self.log.dir(), e);
                return ConnectOutcome::LaunchFailed {
                    reason: format!(
                        "cannot write tunnel output to {}: {}",
                        self.log.dir().display(),
                        e
                    ),
                };
            }
        };

        let mut child = match self.command.spawn(stdout, stderr) {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to spawn {}: {}", self.command.program(), e);
                return ConnectOutcome::LaunchFailed {
                    reason: e.to_string(),
                };
            }
        };
        info!("Tunnel process started with PID {:?}", child.id());

        let Some(stdin) = child.stdin.take() else {
            terminate(&mut child);
            return ConnectOutcome::LaunchFailed {
                reason: "failed to capture process stdin".to_string(),
            };
        };

        // `cancel` stops every task of this attempt, including when the
        // attempt itself is dropped. `exited` tells the followers that the
        // output files will not grow any more.
        let cancel = CancellationToken::new();
        let _guard = cancel.clone().drop_guard();
        let exited = CancellationToken::new();

        let (verdict_tx, mut verdict_rx) = mpsc::channel::<ScanEvent>(2);

        tokio::spawn(inject_credentials(
            stdin,
            self.certificate_password.clone(),
            self.tunnel_password.clone(),
            self.timing.clone(),
            cancel.child_token(),
        ));
        for stream in [OutputStream::Stdout, OutputStream::Stderr] {
            tokio::spawn(follow_output(
                stream,
                self.log.path(stream),
                Arc::clone(&self.parser),
                verdict_tx.clone(),
                exited.clone(),
                cancel.clone(),
            ));
        }
        drop(verdict_tx);

        let deadline = sleep(window);
        tokio::pin!(deadline);
        let mut exit_status: Option<String> = None;

        let first = loop {
            tokio::select! {
                event = verdict_rx.recv() => break Some(event),
                status = child.wait(), if exit_status.is_none() => {
                    let status = match status {
                        Ok(status) => status.to_string(),
                        Err(e) => format!("unknown status: {}", e),
                    };
                    debug!("Tunnel process exited with {}", status);
                    exit_status = Some(status);
                    exited.cancel();
                }
                _ = &mut deadline => break None,
            }
        };
        cancel.cancel();

        match first {
            Some(Some(ScanEvent::Connected)) => {
                info!(
                    "Connection established, tunnel output continues in {:?}",
                    self.log.dir()
                );
                release(child);
                ConnectOutcome::Connected
            }
            Some(Some(ScanEvent::Failed { line })) => {
                warn!("Connection failed: {}", line);
                if exit_status.is_none() {
                    terminate(&mut child);
                }
                ConnectOutcome::AuthenticationFailed { line }
            }
            Some(Some(ScanEvent::Unrecognized)) | Some(None) => {
                debug!("Tunnel output ended without a verdict");
                self.resolve_without_verdict(child, exit_status, window).await
            }
            None => {
                info!(
                    "No verdict within {} ms, checking whether the tunnel is up",
                    window.as_millis()
                );
                self.resolve_without_verdict(child, exit_status, window).await
            }
        }
    }

    /// Decide an attempt that produced no marker from a liveness re-check
    async fn resolve_without_verdict(
        &self,
        mut child: Child,
        exit_status: Option<String>,
        window: Duration,
    ) -> ConnectOutcome {
        sleep(self.timing.timeout_grace()).await;

        let probe = Arc::clone(&self.probe);
        let alive = tokio::task::spawn_blocking(move || probe.is_connected())
            .await
            .unwrap_or(false);

        if alive {
            info!("VPN connected without a marker");
            release(child);
            return ConnectOutcome::ConnectedAfterTimeout;
        }

        match exit_status {
            Some(status) => {
                warn!("Tunnel process exited with {} before reporting a result", status);
                ConnectOutcome::Exited { status }
            }
            None => {
                warn!("Connection timeout, killing tunnel process");
                terminate(&mut child);
                ConnectOutcome::TimedOut {
                    seconds: window.as_secs(),
                }
            }
        }
    }
}

/// Give up the handle without waiting; the process keeps running
fn release(child: Child) {
    debug!("Detached from tunnel process {:?}", child.id());
    drop(child);
}

/// Send the single termination signal of an attempt
fn terminate(child: &mut Child) {
    match child.start_kill() {
        Ok(()) => info!("Sent SIGKILL to tunnel process {:?}", child.id()),
        Err(e) => warn!("Failed to kill tunnel process {:?}: {}", child.id(), e),
    }
}

async fn write_secret(stdin: &mut ChildStdin, secret: &SecretValue) -> std::io::Result<()> {
    stdin.write_all(secret.expose().as_bytes()).await?;
    stdin.write_all(b"\n").await?;
    stdin.flush().await
}

async fn send_credentials(
    stdin: &mut ChildStdin,
    certificate: &SecretValue,
    tunnel: &SecretValue,
    timing: &TimingConfig,
) -> std::io::Result<()> {
    sleep(timing.settle_delay()).await;

    if !certificate.is_empty() {
        debug!("Sending certificate password");
        write_secret(stdin, certificate).await?;
        sleep(timing.certificate_delay()).await;
    }

    debug!("Sending VPN password");
    write_secret(stdin, tunnel).await
}

/// Type the credentials at fixed delays, then close stdin
///
/// The certificate password always precedes the tunnel password.
async fn inject_credentials(
    mut stdin: ChildStdin,
    certificate: SecretValue,
    tunnel: SecretValue,
    timing: TimingConfig,
    cancel: CancellationToken,
) {
    tokio::select! {
        _ = cancel.cancelled() => debug!("Credential injection cancelled"),
        result = send_credentials(&mut stdin, &certificate, &tunnel, &timing) => {
            if let Err(e) = result {
                warn!("Failed to write credentials to tunnel process: {}", e);
            }
        }
    }
}

/// Follow one output file, reporting the first marker it contains
///
/// Only complete lines are classified while the tunnel runs. Once `exited`
/// fires the rest of the file is drained, a trailing partial line included,
/// and the follower stops. It also stops on cancel.
async fn follow_output(
    stream: OutputStream,
    path: PathBuf,
    parser: Arc<OutputParser>,
    verdicts: mpsc::Sender<ScanEvent>,
    exited: CancellationToken,
    cancel: CancellationToken,
) {
    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) => {
            warn!("Cannot read tunnel {} from {:?}: {}", stream, path, e);
            return;
        }
    };
    let mut reader = BufReader::new(file);
    let mut verdicts = Some(verdicts);
    let mut line = String::new();

    loop {
        let finished = exited.is_cancelled();
        let read = tokio::select! {
            _ = cancel.cancelled() => break,
            read = reader.read_line(&mut line) => read,
        };

        match read {
            Ok(0) if finished => break,
            Ok(0) => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = exited.cancelled() => {}
                    _ = sleep(FOLLOW_INTERVAL) => {}
                }
            }
            Ok(_) if line.ends_with('\n') => {
                report_line(stream, &line, &parser, &mut verdicts).await;
                line.clear();
            }
            Ok(_) => {}
            Err(e) => {
                debug!("Error reading tunnel {}: {}", stream, e);
                break;
            }
        }
    }

    if !line.is_empty() && !cancel.is_cancelled() {
        report_line(stream, &line, &parser, &mut verdicts).await;
    }
    debug!("Stopped reading tunnel {}", stream);
}

async fn report_line(
    stream: OutputStream,
    line: &str,
    parser: &OutputParser,
    verdicts: &mut Option<mpsc::Sender<ScanEvent>>,
) {
    let line = line.trim_end_matches(['\r', '\n']);
    debug!("OpenConnect {}: {}", stream, line);

    if verdicts.is_none() {
        return;
    }
    let event = parser.classify(stream, line);
    if event.is_verdict() {
        if let Some(sender) = verdicts.take() {
            let _ = sender.send(event).await;
        }
    }
}
