//! Connection layer for running actions on hosts.
//!
//! The engine never speaks a remote protocol itself. A [`Connection`] runs a
//! shell command and moves file contents on one host; [`LocalConnection`]
//! does this with local processes and [`SshConnection`] drives the system
//! `ssh` client. A [`ConnectionFactory`] picks the transport for each host.

pub mod local;
pub mod ssh;

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::trace;

pub use local::LocalConnection;
pub use ssh::{SshConnection, SshSettings};

use crate::inventory::{ConnectionType, Host};

/// Errors raised by a transport (not to be confused with a non-zero exit code).
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Failed to establish or use the connection.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Command could not be started or awaited.
    #[error("Command execution failed: {0}")]
    ExecutionFailed(String),

    /// File upload or download failed.
    #[error("File transfer failed: {0}")]
    TransferFailed(String),

    /// Operation timed out.
    #[error("Connection timeout after {0} seconds")]
    Timeout(u64),

    /// I/O error during connection operations.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for connection operations
pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// Output of one command on a host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code of the command (0 indicates success).
    pub exit_code: i32,
    /// Content written to standard output.
    pub stdout: String,
    /// Content written to standard error.
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout and stderr joined, trailing whitespace trimmed.
    pub fn combined_output(&self) -> String {
        let stdout = self.stdout.trim_end();
        let stderr = self.stderr.trim_end();
        match (stdout.is_empty(), stderr.is_empty()) {
            (_, true) => stdout.to_string(),
            (true, false) => stderr.to_string(),
            (false, false) => format!("{}\n{}", stdout, stderr),
        }
    }
}

/// Options for command execution
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Timeout in seconds
    pub timeout: Option<u64>,
    /// Extra environment variables
    pub env: Vec<(String, String)>,
}

/// File statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    /// File size in bytes
    pub size: u64,
    /// Permission bits
    pub mode: u32,
    /// Whether the path is a directory
    pub is_dir: bool,
}

/// Transport for one host.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Host this connection talks to
    fn identifier(&self) -> &str;

    /// Run a shell command on the host
    async fn execute(
        &self,
        command: &str,
        options: Option<ExecuteOptions>,
    ) -> ConnectionResult<CommandOutput>;

    /// Write content to a file on the host, optionally setting its mode
    async fn upload_content(
        &self,
        content: &[u8],
        remote_path: &Path,
        mode: Option<u32>,
    ) -> ConnectionResult<()>;

    /// Read a file from the host; `None` if it does not exist
    async fn download_content(&self, remote_path: &Path) -> ConnectionResult<Option<Vec<u8>>>;

    /// Stat a path; `None` if it does not exist
    async fn stat(&self, path: &Path) -> ConnectionResult<Option<FileStat>>;

    /// Remove a file on the host
    async fn remove(&self, path: &Path) -> ConnectionResult<()>;
}

/// Opens a connection for a host.
pub trait ConnectionFactory: Send + Sync {
    fn connect(&self, host: &Host) -> ConnectionResult<Arc<dyn Connection>>;
}

/// Picks local or SSH transport from the host's connection type.
#[derive(Debug, Clone, Default)]
pub struct TransportFactory {
    ssh: SshSettings,
}

impl TransportFactory {
    pub fn new(ssh: SshSettings) -> Self {
        Self { ssh }
    }
}

impl ConnectionFactory for TransportFactory {
    fn connect(&self, host: &Host) -> ConnectionResult<Arc<dyn Connection>> {
        match host.connection {
            ConnectionType::Local => Ok(Arc::new(LocalConnection::with_identifier(&host.name))),
            ConnectionType::Ssh => Ok(Arc::new(SshConnection::new(host, &self.ssh))),
        }
    }
}

/// Parse an octal mode string such as `0644` or `0o755`.
pub fn parse_mode(mode: &str) -> Option<u32> {
    let digits = mode.trim().trim_start_matches("0o");
    if digits.is_empty() {
        return None;
    }
    u32::from_str_radix(digits, 8).ok()
}

/// Spawn a process, feed it optional stdin, and collect its output.
pub(crate) async fn run_process(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    timeout: Option<u64>,
) -> ConnectionResult<CommandOutput> {
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .map_err(|e| ConnectionError::ExecutionFailed(format!("Failed to spawn process: {}", e)))?;

    if let (Some(data), Some(mut pipe)) = (stdin, child.stdin.take()) {
        pipe.write_all(data).await.map_err(|e| {
            ConnectionError::TransferFailed(format!("Failed to write to stdin: {}", e))
        })?;
        drop(pipe);
    }

    let wait = child.wait_with_output();
    let output = match timeout {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), wait)
            .await
            .map_err(|_| ConnectionError::Timeout(secs))?,
        None => wait.await,
    }
    .map_err(|e| ConnectionError::ExecutionFailed(format!("Failed to wait for process: {}", e)))?;

    let result = CommandOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };
    trace!(
        exit_code = result.exit_code,
        stdout_len = result.stdout.len(),
        stderr_len = result.stderr.len(),
        "process completed"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode("0644"), Some(0o644));
        assert_eq!(parse_mode("755"), Some(0o755));
        assert_eq!(parse_mode("0o600"), Some(0o600));
        assert_eq!(parse_mode("rwx"), None);
        assert_eq!(parse_mode(""), None);
    }

    #[test]
    fn test_combined_output() {
        let out = CommandOutput {
            exit_code: 1,
            stdout: "out\n".into(),
            stderr: "err\n".into(),
        };
        assert_eq!(out.combined_output(), "out\nerr");
        assert_eq!(CommandOutput::failure(2, "boom\n").combined_output(), "boom");
        assert_eq!(CommandOutput::success("ok\n").combined_output(), "ok");
    }

    #[test]
    fn test_factory_picks_transport() {
        let factory = TransportFactory::default();
        let local = Host::new("localhost");
        assert_eq!(factory.connect(&local).unwrap().identifier(), "localhost");

        let remote = Host::new("web1").with_address("10.0.0.5");
        assert_eq!(factory.connect(&remote).unwrap().identifier(), "web1");
    }
}
