//! Elevated command execution
//!
//! Teardown runs its commands through sudo. When sudo needs a password the
//! commands are driven by a generated `expect` script that answers the
//! password prompt.

use std::fmt;
use std::future::Future;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Errors from running an elevated command
#[derive(Debug, thiserror::Error)]
pub enum ElevationError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{status}")]
    Exit { status: std::process::ExitStatus },

    #[error("{program} did not finish within {seconds} seconds")]
    TimedOut { program: String, seconds: u64 },
}

/// One command to run with elevated privileges
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElevatedCommand {
    argv: Vec<String>,
}

impl ElevatedCommand {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
        }
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }
}

impl fmt::Display for ElevatedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.argv.join(" "))
    }
}

/// The privilege mechanism used by teardown
pub trait Elevator: Send + Sync {
    /// Name of the elevation program, as written into scripts
    fn program(&self) -> &str;

    /// True when a benign command runs elevated without a password
    fn can_elevate_non_interactively(&self) -> impl Future<Output = bool> + Send;

    /// Run a command elevated, without any prompt
    fn run_elevated(
        &self,
        command: &ElevatedCommand,
    ) -> impl Future<Output = Result<(), ElevationError>> + Send;

    /// Run an interaction script, killing it once `limit` has passed
    fn run_script(
        &self,
        script: &Path,
        limit: Duration,
    ) -> impl Future<Output = Result<Output, ElevationError>> + Send;
}

/// sudo, with `expect` for password prompts
#[derive(Debug, Clone)]
pub struct SudoElevator {
    program: String,
    interpreter: String,
}

impl SudoElevator {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            interpreter: "expect".to_string(),
        }
    }

    /// Run interaction scripts with `interpreter` instead of `expect`
    pub fn with_interpreter(mut self, interpreter: &str) -> Self {
        self.interpreter = interpreter.to_string();
        self
    }

    /// Let the elevation program ask for its password on the terminal
    ///
    /// Later non-interactive calls from the same terminal reuse the cached
    /// credentials.
    pub async fn validate_interactively(&self) -> Result<(), ElevationError> {
        let status = Command::new(&self.program)
            .arg("-v")
            .status()
            .await
            .map_err(|source| ElevationError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(ElevationError::Exit { status })
        }
    }
}

impl Default for SudoElevator {
    fn default() -> Self {
        Self::new("sudo")
    }
}

impl Elevator for SudoElevator {
    fn program(&self) -> &str {
        &self.program
    }

    async fn can_elevate_non_interactively(&self) -> bool {
        Command::new(&self.program)
            .args(["-n", "true"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    async fn run_elevated(&self, command: &ElevatedCommand) -> Result<(), ElevationError> {
        debug!("Running elevated: {}", command);
        let output = Command::new(&self.program)
            .args(command.argv())
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| ElevationError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(ElevationError::Exit {
                status: output.status,
            })
        }
    }

    async fn run_script(&self, script: &Path, limit: Duration) -> Result<Output, ElevationError> {
        let child = Command::new(&self.interpreter)
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ElevationError::Spawn {
                program: self.interpreter.clone(),
                source,
            })?;

        match tokio::time::timeout(limit, child.wait_with_output()).await {
            Ok(output) => output.map_err(|source| ElevationError::Spawn {
                program: self.interpreter.clone(),
                source,
            }),
            // Dropping the wait future drops the child, which kills it.
            Err(_) => Err(ElevationError::TimedOut {
                program: self.interpreter.clone(),
                seconds: limit.as_secs(),
            }),
        }
    }
}

/// Quote a value as a Tcl double-quoted word
pub fn tcl_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '\\' | '"' | '$' | '[' | ']' => {
                quoted.push('\\');
                quoted.push(c);
            }
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            _ => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

/// Generate the expect script driving `commands` through `program`
///
/// Each command waits for a password prompt and answers it with `secret`;
/// immediate completion or the per-step timeout moves on to the next one.
pub fn interaction_script(
    program: &str,
    commands: &[ElevatedCommand],
    secret: &str,
    timeout_secs: u64,
) -> String {
    let mut script = format!("#!/usr/bin/expect -f\nset timeout {}\n", timeout_secs);
    let answer = tcl_quote(&format!("{}\r", secret));

    for command in commands {
        let words = std::iter::once(program)
            .chain(command.argv().iter().map(String::as_str))
            .map(tcl_quote)
            .collect::<Vec<_>>()
            .join(" ");

        script.push_str(&format!(
            "\nspawn {words}\nexpect {{\n    -re \"\\[Pp\\]assword\" {{\n        send -- {answer}\n        expect eof\n    }}\n    eof {{}}\n    timeout {{}}\n}}\n"
        ));
    }

    script.push_str("\nputs \"Disconnect commands finished\"\nexit 0\n");
    script
}
