//! Builder for running external tools with a timeout.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{tool}: failed to spawn: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool}: timed out after {timeout:?}")]
    Timeout { tool: String, timeout: Duration },
    #[error("{tool}: exited with status {status}: {stderr}")]
    Failed {
        tool: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("{tool}: unparseable output: {message}")]
    Parse { tool: String, message: String },
}

/// Output captured from a successful run.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// An external tool invocation.
///
/// The child is spawned with `kill_on_drop`, so when the timeout elapses and
/// the wait future is dropped the process is killed rather than left behind.
///
/// ```no_run
/// use mediafile::video::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> Result<(), mediafile::video::ToolError> {
/// let output = ToolCommand::new(PathBuf::from("ffprobe"))
///     .args(["-v", "error", "-show_format"])
///     .arg("/path/to/animation.png")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
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

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// Short name used in error messages.
    pub fn tool_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Run to completion, capturing stdout and stderr.
    ///
    /// A non-zero exit status is an error carrying the trimmed stderr.
    pub async fn execute(&self) -> Result<ToolOutput, ToolError> {
        let tool = self.tool_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ToolError::NotFound(tool.clone())
            } else {
                ToolError::Spawn {
                    tool: tool.clone(),
                    source,
                }
            }
        })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => return Err(ToolError::Spawn { tool, source }),
            Err(_elapsed) => {
                return Err(ToolError::Timeout {
                    tool,
                    timeout: self.timeout,
                });
            }
        };

        let result = ToolOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if !result.status.success() {
            return Err(ToolError::Failed {
                tool,
                status: result.status,
                stderr: result.stderr.trim().to_string(),
            });
        }
        Ok(result)
    }
}
