//! SSH connection module
//!
//! Drives the system `ssh` client in batch mode. Commands are passed to the
//! remote `sh -c`; file content is streamed over the client's stdin and
//! stdout, so no `scp`/`sftp` subsystem is required on the remote side.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, trace};

use super::{
    run_process, CommandOutput, Connection, ConnectionError, ConnectionResult, ExecuteOptions,
    FileStat,
};
use crate::inventory::Host;

/// Exit status the ssh client reserves for its own failures.
const SSH_ERROR_EXIT: i32 = 255;

/// Exit status used by our remote snippets to signal a missing path.
const MISSING_EXIT: i32 = 44;

/// Settings for the `ssh` client, shared by every SSH connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshSettings {
    /// Client binary
    pub executable: String,
    /// Login user when the host does not set one
    pub remote_user: Option<String>,
    /// Port when the host does not set one
    pub port: Option<u16>,
    /// Identity file passed with `-i`
    pub private_key_file: Option<PathBuf>,
    /// `ConnectTimeout` in seconds
    pub connect_timeout: u64,
    /// Extra arguments appended before the destination
    pub extra_args: Vec<String>,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            executable: "ssh".to_string(),
            remote_user: None,
            port: None,
            private_key_file: None,
            connect_timeout: 10,
            extra_args: Vec::new(),
        }
    }
}

/// Connection to a remote host through the system ssh client.
#[derive(Debug, Clone)]
pub struct SshConnection {
    identifier: String,
    destination: String,
    args: Vec<String>,
    executable: String,
}

impl SshConnection {
    pub fn new(host: &Host, settings: &SshSettings) -> Self {
        let user = host.user.as_ref().or(settings.remote_user.as_ref());
        let destination = match user {
            Some(user) => format!("{}@{}", user, host.address()),
            None => host.address().to_string(),
        };

        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", settings.connect_timeout),
        ];
        if let Some(port) = host.port.or(settings.port) {
            args.push("-p".to_string());
            args.push(port.to_string());
        }
        if let Some(key) = &settings.private_key_file {
            args.push("-i".to_string());
            args.push(key.to_string_lossy().into_owned());
        }
        args.extend(settings.extra_args.iter().cloned());

        Self {
            identifier: host.name.clone(),
            destination,
            args,
            executable: settings.executable.clone(),
        }
    }

    /// Destination in `user@address` form.
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Full argument vector for running `remote` on the host.
    pub fn command_args(&self, remote: &str) -> Vec<String> {
        let mut args = self.args.clone();
        args.push(self.destination.clone());
        args.push("--".to_string());
        args.push(format!("sh -c {}", shell_words::quote(remote)));
        args
    }

    fn command(&self, remote: &str) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.args(self.command_args(remote));
        cmd
    }

    async fn run(
        &self,
        remote: &str,
        stdin: Option<&[u8]>,
        timeout: Option<u64>,
    ) -> ConnectionResult<CommandOutput> {
        trace!(host = %self.identifier, remote = %remote, "spawning ssh");
        let output = run_process(self.command(remote), stdin, timeout).await?;
        if output.exit_code == SSH_ERROR_EXIT {
            return Err(ConnectionError::ConnectionFailed(format!(
                "{}: {}",
                self.destination,
                output.stderr.trim()
            )));
        }
        Ok(output)
    }
}

fn quote_path(path: &Path) -> String {
    shell_words::quote(&path.to_string_lossy()).into_owned()
}

/// Parse `stat -c '%s %a %F'` output.
fn parse_stat(line: &str) -> Option<FileStat> {
    let mut parts = line.trim().splitn(3, ' ');
    let size = parts.next()?.parse().ok()?;
    let mode = u32::from_str_radix(parts.next()?, 8).ok()?;
    let kind = parts.next()?;
    Some(FileStat {
        size,
        mode,
        is_dir: kind == "directory",
    })
}

#[async_trait]
impl Connection for SshConnection {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn execute(
        &self,
        command: &str,
        options: Option<ExecuteOptions>,
    ) -> ConnectionResult<CommandOutput> {
        let options = options.unwrap_or_default();
        debug!(host = %self.identifier, command = %command, "executing remote command");

        let remote = if options.env.is_empty() {
            command.to_string()
        } else {
            let env: Vec<String> = options
                .env
                .iter()
                .map(|(k, v)| format!("{}={}", k, shell_words::quote(v)))
                .collect();
            format!("export {}; {}", env.join(" "), command)
        };

        self.run(&remote, None, options.timeout).await
    }

    async fn upload_content(
        &self,
        content: &[u8],
        remote_path: &Path,
        mode: Option<u32>,
    ) -> ConnectionResult<()> {
        let target = quote_path(remote_path);
        let mut remote = String::new();
        if let Some(parent) = remote_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            remote.push_str(&format!("mkdir -p {} && ", quote_path(parent)));
        }
        remote.push_str(&format!("cat > {}", target));
        if let Some(mode) = mode {
            remote.push_str(&format!(" && chmod {:o} {}", mode, target));
        }

        let output = self.run(&remote, Some(content), None).await?;
        if !output.is_success() {
            return Err(ConnectionError::TransferFailed(format!(
                "upload to {} failed: {}",
                remote_path.display(),
                output.combined_output()
            )));
        }
        Ok(())
    }

    async fn download_content(&self, remote_path: &Path) -> ConnectionResult<Option<Vec<u8>>> {
        let target = quote_path(remote_path);
        let remote = format!("test -e {t} || exit {MISSING_EXIT}; cat {t}", t = target);

        // Content may be binary, so read raw stdout instead of going through run().
        let output = self
            .command(&remote)
            .stdin(std::process::Stdio::null())
            .output()
            .await
            .map_err(|e| ConnectionError::ExecutionFailed(e.to_string()))?;

        match output.status.code() {
            Some(0) => Ok(Some(output.stdout)),
            Some(MISSING_EXIT) => Ok(None),
            Some(SSH_ERROR_EXIT) => Err(ConnectionError::ConnectionFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            )),
            _ => Err(ConnectionError::TransferFailed(format!(
                "download of {} failed: {}",
                remote_path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
        }
    }

    async fn stat(&self, path: &Path) -> ConnectionResult<Option<FileStat>> {
        let target = quote_path(path);
        let remote = format!(
            "test -e {t} || exit {MISSING_EXIT}; stat -c '%s %a %F' {t}",
            t = target
        );
        let output = self.run(&remote, None, None).await?;
        match output.exit_code {
            0 => parse_stat(&output.stdout).map(Some).ok_or_else(|| {
                ConnectionError::ExecutionFailed(format!(
                    "unexpected stat output: {}",
                    output.stdout.trim()
                ))
            }),
            MISSING_EXIT => Ok(None),
            _ => Err(ConnectionError::ExecutionFailed(output.combined_output())),
        }
    }

    async fn remove(&self, path: &Path) -> ConnectionResult<()> {
        let output = self
            .run(&format!("rm -f {}", quote_path(path)), None, None)
            .await?;
        if output.is_success() {
            Ok(())
        } else {
            Err(ConnectionError::ExecutionFailed(output.combined_output()))
        }
    }
}
