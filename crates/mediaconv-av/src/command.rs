//! Async subprocess runs with captured output and a hard deadline.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::Command;

use crate::{Error, Result};

/// Deadline used when none is set.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// What a successful run printed. Both streams are decoded lossily.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// An external invocation with a wall-clock limit.
///
/// The child is spawned with `kill_on_drop`, so an elapsed timeout drops the
/// pending wait and kills the process.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ToolCommand {
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// - [`Error::ToolNotFound`] if the program does not exist.
    /// - [`Error::Timeout`] if the process outlives the timeout (it is killed).
    /// - [`Error::ToolFailed`] on a non-zero exit (message is stderr, or stdout
    ///   when stderr is empty) or any other spawn/wait failure.
    pub async fn execute(&self) -> Result<ToolOutput> {
        let program_name = self.program_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::tool_not_found(program_name.clone()),
            _ => Error::tool_failed(program_name.clone(), format!("failed to spawn: {e}")),
        })?;

        tracing::debug!(tool = %program_name, args = ?self.args, "Spawned external tool");

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let tool_output = ToolOutput {
                    status: output.status,
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                };

                if !output.status.success() {
                    let detail = match tool_output.stderr.trim() {
                        "" => tool_output.stdout.trim(),
                        stderr => stderr,
                    };
                    let message = if detail.is_empty() {
                        format!("exited with status {}", output.status)
                    } else {
                        detail.to_string()
                    };
                    return Err(Error::tool_failed(program_name, message));
                }

                Ok(tool_output)
            }
            Ok(Err(e)) => Err(Error::tool_failed(
                program_name,
                format!("I/O error waiting for process: {e}"),
            )),
            // The child was moved into the dropped future; kill_on_drop reaps it.
            Err(_elapsed) => Err(Error::timeout(program_name, self.timeout)),
        }
    }
}
