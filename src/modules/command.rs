//! Command module - Execute a program without shell processing
//!
//! The command line is split into words and re-quoted before it reaches the
//! remote shell, so pipes, redirects and `$VAR` are passed through literally.

use async_trait::async_trait;

use super::{Module, ModuleContext, ModuleError, ModuleOutput, ModuleResult};
use crate::parser::{Action, Task};

/// Module for executing commands
pub struct CommandModule;

impl CommandModule {
    /// Split and re-quote a command line so the shell sees plain words.
    pub fn quote_command(cmd: &str) -> ModuleResult<String> {
        let words = shell_words::split(cmd)
            .map_err(|e| ModuleError::InvalidParameter(format!("cannot parse command: {}", e)))?;
        if words.is_empty() {
            return Err(ModuleError::MissingParameter("command".to_string()));
        }
        Ok(shell_words::join(words))
    }
}

#[async_trait]
impl Module for CommandModule {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn execute(&self, ctx: &ModuleContext<'_>, task: &Task) -> ModuleResult<ModuleOutput> {
        let Action::Command(cmd) = &task.action else {
            return Err(ModuleError::wrong_action(self.name(), task));
        };
        let cmd = Self::quote_command(cmd)?;

        let out = ctx.connection.execute(&cmd, None).await?;
        Ok(ModuleOutput::from_command(out.exit_code, out.combined_output()))
    }
}
