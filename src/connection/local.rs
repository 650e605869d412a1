//! Local connection module
//!
//! Runs commands through `sh -c` on the machine running xconfig and performs
//! file operations directly on the local filesystem.

use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, trace};

use super::{
    run_process, CommandOutput, Connection, ConnectionError, ConnectionResult, ExecuteOptions,
    FileStat,
};

/// Local connection for executing commands on the current host
#[derive(Debug, Clone)]
pub struct LocalConnection {
    /// Identifier for this connection
    identifier: String,
}

impl LocalConnection {
    pub fn new() -> Self {
        Self::with_identifier("localhost")
    }

    /// Create a local connection with a custom identifier
    pub fn with_identifier(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
        }
    }
}

impl Default for LocalConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connection for LocalConnection {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn execute(
        &self,
        command: &str,
        options: Option<ExecuteOptions>,
    ) -> ConnectionResult<CommandOutput> {
        let options = options.unwrap_or_default();
        debug!(host = %self.identifier, command = %command, "executing local command");

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        for (key, value) in &options.env {
            cmd.env(key, value);
        }

        run_process(cmd, None, options.timeout).await
    }

    async fn upload_content(
        &self,
        content: &[u8],
        remote_path: &Path,
        mode: Option<u32>,
    ) -> ConnectionResult<()> {
        trace!(path = %remote_path.display(), size = content.len(), "writing local file");

        if let Some(parent) = remote_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    ConnectionError::TransferFailed(format!(
                        "Failed to create directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        tokio::fs::write(remote_path, content).await.map_err(|e| {
            ConnectionError::TransferFailed(format!(
                "Failed to write {}: {}",
                remote_path.display(),
                e
            ))
        })?;

        if let Some(mode) = mode {
            tokio::fs::set_permissions(remote_path, std::fs::Permissions::from_mode(mode)).await?;
        }
        Ok(())
    }

    async fn download_content(&self, remote_path: &Path) -> ConnectionResult<Option<Vec<u8>>> {
        match tokio::fs::read(remote_path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ConnectionError::TransferFailed(format!(
                "Failed to read {}: {}",
                remote_path.display(),
                e
            ))),
        }
    }

    async fn stat(&self, path: &Path) -> ConnectionResult<Option<FileStat>> {
        match tokio::fs::metadata(path).await {
            Ok(meta) => Ok(Some(FileStat {
                size: meta.len(),
                mode: meta.permissions().mode() & 0o7777,
                is_dir: meta.is_dir(),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, path: &Path) -> ConnectionResult<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
