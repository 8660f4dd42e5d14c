// ABOUTME: Host command execution seam with a bounded timeout on every call.
// ABOUTME: LocalHost runs argv through tokio::process; fakes replace it in tests.

use async_trait::async_trait;
use nonempty::NonEmpty;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// A command to run on the host.
#[derive(Debug, Clone)]
pub struct HostCommand {
    pub argv: NonEmpty<String>,
    pub timeout: Duration,
    pub working_dir: Option<PathBuf>,
}

impl HostCommand {
    pub fn new(argv: NonEmpty<String>, timeout: Duration) -> Self {
        Self {
            argv,
            timeout,
            working_dir: None,
        }
    }

    /// Build from a program name and literal arguments.
    pub fn program(program: &str, args: &[&str], timeout: Duration) -> Self {
        let mut argv = NonEmpty::new(program.to_string());
        argv.extend(args.iter().map(|a| a.to_string()));
        Self::new(argv, timeout)
    }

    pub fn current_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.working_dir = dir;
        self
    }
}

impl std::fmt::Display for HostCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<&str> = self.argv.iter().map(String::as_str).collect();
        write!(f, "{}", parts.join(" "))
    }
}

/// Captured result of a host command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Stderr if non-empty, else stdout, trimmed.
    pub fn message(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{command} timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },
}

/// Runs commands on the machine hosting the edge and the slots.
#[async_trait]
pub trait HostOps: Send + Sync {
    async fn run(&self, command: &HostCommand) -> Result<CommandOutput, HostError>;
}

/// Runs commands on the local machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalHost;

#[async_trait]
impl HostOps for LocalHost {
    async fn run(&self, command: &HostCommand) -> Result<CommandOutput, HostError> {
        let program = command.argv.head.clone();
        tracing::debug!("Running host command: {}", command);

        let mut cmd = Command::new(&program);
        cmd.args(command.argv.tail.iter())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = command.working_dir {
            cmd.current_dir(dir);
        }

        let output = match tokio::time::timeout(command.timeout, cmd.output()).await {
            Ok(result) => result.map_err(|source| HostError::Spawn {
                program: program.clone(),
                source,
            })?,
            Err(_) => {
                return Err(HostError::Timeout {
                    command: command.to_string(),
                    timeout: command.timeout,
                });
            }
        };

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
