//! Script module - Transfer a local script to a host and run it
//!
//! The script is uploaded to a unique temporary path, executed, and removed
//! again whatever its exit code.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use super::{Module, ModuleContext, ModuleError, ModuleOutput, ModuleResult};
use crate::parser::{Action, Task};

/// Module for running local scripts remotely
pub struct ScriptModule;

impl ScriptModule {
    /// Temporary path the script is uploaded to.
    pub fn remote_path(script: &Path) -> PathBuf {
        let name = script
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "script".to_string());
        PathBuf::from(format!("/tmp/.xconfig-{}-{}", Uuid::new_v4().simple(), name))
    }
}

#[async_trait]
impl Module for ScriptModule {
    fn name(&self) -> &'static str {
        "script"
    }

    async fn execute(&self, ctx: &ModuleContext<'_>, task: &Task) -> ModuleResult<ModuleOutput> {
        let Action::Script(script) = &task.action else {
            return Err(ModuleError::wrong_action(self.name(), task));
        };

        // The first word is the script; the rest are its arguments.
        let words = shell_words::split(script)
            .map_err(|e| ModuleError::InvalidParameter(format!("cannot parse script: {}", e)))?;
        let Some((local, args)) = words.split_first() else {
            return Err(ModuleError::MissingParameter("script".to_string()));
        };

        let body = tokio::fs::read(local)
            .await
            .map_err(|e| ModuleError::ExecutionFailed(format!("cannot read {}: {}", local, e)))?;

        let remote = Self::remote_path(Path::new(local));
        ctx.connection.upload_content(&body, &remote, Some(0o700)).await?;

        let mut cmd = shell_words::quote(&remote.to_string_lossy()).into_owned();
        if !args.is_empty() {
            cmd.push(' ');
            cmd.push_str(&shell_words::join(args));
        }
        let result = ctx.connection.execute(&cmd, None).await;

        if let Err(e) = ctx.connection.remove(&remote).await {
            warn!(host = %ctx.host.name, path = %remote.display(), error = %e, "failed to remove script");
        }

        let out = result?;
        Ok(ModuleOutput::from_command(out.exit_code, out.combined_output()))
    }
}
