//! Shell module - Execute shell commands
//!
//! The command runs through the host's `sh -c`, so pipes, redirects and
//! variable expansion work. The command text is sent as written; braces such
//! as `{{.Names}}` reach the shell untouched. Any non-zero exit code is a
//! failure.

use async_trait::async_trait;

use super::{Module, ModuleContext, ModuleError, ModuleOutput, ModuleResult};
use crate::parser::{Action, Task};

/// Module for executing shell commands
pub struct ShellModule;

#[async_trait]
impl Module for ShellModule {
    fn name(&self) -> &'static str {
        "shell"
    }

    async fn execute(&self, ctx: &ModuleContext<'_>, task: &Task) -> ModuleResult<ModuleOutput> {
        let Action::Shell(cmd) = &task.action else {
            return Err(ModuleError::wrong_action(self.name(), task));
        };
        let out = ctx.connection.execute(cmd, None).await?;
        Ok(ModuleOutput::from_command(out.exit_code, out.combined_output()))
    }
}
