//! Child-process runner for ffmpeg.
//!
//! ffmpeg is quiet on success (`-loglevel error`), so only stderr matters
//! when something goes wrong; failures carry its last few lines.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::Command;

use crate::{Error, Result};

/// A remux that has not finished in this long is assumed hung.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// stderr lines kept in a failure message.
const STDERR_TAIL_LINES: usize = 8;

/// What a finished process printed.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// One invocation of an external binary.
///
/// ```no_run
/// use std::time::Duration;
/// use trackforged_av::ToolCommand;
///
/// # async fn example() -> trackforged_av::Result<()> {
/// let banner = ToolCommand::new("ffmpeg")
///     .args(["-hide_banner", "-version"])
///     .timeout(Duration::from_secs(10))
///     .execute()
///     .await?;
/// println!("{}", banner.stdout.lines().next().unwrap_or_default());
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
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Binary name used in logs and errors.
    fn label(&self) -> String {
        self.program
            .file_name()
            .unwrap_or(self.program.as_os_str())
            .to_string_lossy()
            .into_owned()
    }

    /// Run to completion with stdin closed.
    ///
    /// A missing binary is [`Error::ToolNotFound`]. A non-zero exit or a
    /// timeout is [`Error::ToolFailed`]; on timeout the child is killed.
    pub async fn execute(&self) -> Result<ToolOutput> {
        let label = self.label();
        tracing::debug!("{} {}", label, self.args.join(" "));

        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => Error::tool_not_found(&label),
                _ => Error::tool_failed(&label, format!("could not start: {e}")),
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                Error::tool_failed(
                    &label,
                    format!("killed after {}s without finishing", self.timeout.as_secs()),
                )
            })?
            .map_err(|e| Error::tool_failed(&label, format!("lost track of process: {e}")))?;

        let result = ToolOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !result.status.success() {
            return Err(Error::tool_failed(
                &label,
                format!("{}: {}", result.status, stderr_tail(&result.stderr)),
            ));
        }

        Ok(result)
    }
}

/// Last few non-empty stderr lines, joined with ` | `.
fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join(" | ")
}
