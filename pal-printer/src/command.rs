//! External command execution
//!
//! Every interaction with the OS print stack goes through [`run_cmd`]:
//! arguments are passed as a discrete vector (never a shell string), output
//! is captured as text, and a timeout is always enforced. A timed-out child
//! is killed, not leaked.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::debug;

use crate::error::{PalError, PalResult};

/// Captured result of one external command invocation.
///
/// Immutable once produced; owned by the caller.
#[derive(Debug, Clone)]
pub struct CmdResult {
    /// Program name followed by its literal arguments
    pub argv: Vec<String>,
    /// Process exit code (-1 when terminated by signal)
    pub code: i32,
    /// Captured standard output, lossily decoded as UTF-8
    pub stdout: String,
    /// Captured standard error, lossily decoded as UTF-8
    pub stderr: String,
    /// Wall-clock execution time
    pub duration: Duration,
}

impl CmdResult {
    /// Space-joined argv for log and error messages
    pub fn command_line(&self) -> String {
        self.argv.join(" ")
    }
}

/// Run an external command with an enforced timeout.
///
/// With `check` set, a non-zero exit becomes [`PalError::CommandFailed`]
/// carrying the full result. Without it, the caller inspects the result
/// directly - best-effort status probes use this form.
pub async fn run_cmd(argv: &[&str], timeout: Duration, check: bool) -> PalResult<CmdResult> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| PalError::Validation("argv must not be empty".into()))?;

    let started = Instant::now();
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                PalError::NotFound(format!("Command not found: {program}"))
            }
            _ => PalError::Io(e),
        })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(output) => output?,
        // kill_on_drop reaps the child when the future is dropped here
        Err(_) => {
            return Err(PalError::Timeout {
                command: argv.join(" "),
                timeout_s: timeout.as_secs_f64(),
            });
        }
    };

    let result = CmdResult {
        argv: argv.iter().map(|s| s.to_string()).collect(),
        code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        duration: started.elapsed(),
    };

    debug!(
        command = %result.command_line(),
        code = result.code,
        duration_ms = result.duration.as_millis() as u64,
        "command finished"
    );

    if check && result.code != 0 {
        return Err(PalError::CommandFailed(result));
    }

    Ok(result)
}

/// Locate a binary on PATH, like `which(1)`.
pub fn which(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}
