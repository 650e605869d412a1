//! Service modules - `systemd` and `service`
//!
//! `started` and `stopped` check the current state first and only act when
//! needed; `restarted` and `reloaded` always act. `enabled: true` enables the
//! unit at boot when it is not already.

use async_trait::async_trait;

use super::{Module, ModuleContext, ModuleError, ModuleOutput, ModuleResult};
use crate::parser::{Action, ServiceArgs, Task};

/// How a [`ServiceModule`] talks to the init system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceManager {
    /// `systemctl <action> <unit>`
    Systemd,
    /// `service <unit> <action>`
    SysV,
}

/// Service management through systemctl or the `service` wrapper.
pub struct ServiceModule {
    manager: ServiceManager,
}

impl ServiceModule {
    pub fn systemd() -> Self {
        Self {
            manager: ServiceManager::Systemd,
        }
    }

    pub fn sysv() -> Self {
        Self {
            manager: ServiceManager::SysV,
        }
    }

    fn args<'t>(&self, task: &'t Task) -> ModuleResult<&'t ServiceArgs> {
        match (&task.action, self.manager) {
            (Action::Systemd(args), ServiceManager::Systemd)
            | (Action::Service(args), ServiceManager::SysV) => Ok(args),
            _ => Err(ModuleError::wrong_action(self.name(), task)),
        }
    }

    fn action_command(&self, action: &str, unit: &str) -> String {
        let unit = shell_words::quote(unit);
        match self.manager {
            ServiceManager::Systemd => format!("systemctl {} {}", action, unit),
            ServiceManager::SysV => format!("service {} {}", unit, action),
        }
    }

    fn active_command(&self, unit: &str) -> String {
        let quoted = shell_words::quote(unit);
        match self.manager {
            ServiceManager::Systemd => format!("systemctl is-active --quiet {}", quoted),
            ServiceManager::SysV => format!("service {} status >/dev/null 2>&1", quoted),
        }
    }

    async fn succeeds(&self, ctx: &ModuleContext<'_>, cmd: &str) -> ModuleResult<bool> {
        Ok(ctx.connection.execute(cmd, None).await?.is_success())
    }

    async fn act(&self, ctx: &ModuleContext<'_>, cmd: &str) -> ModuleResult<()> {
        let out = ctx.connection.execute(cmd, None).await?;
        if out.is_success() {
            Ok(())
        } else {
            Err(ModuleError::CommandFailed {
                code: out.exit_code,
                message: out.combined_output(),
            })
        }
    }
}

#[async_trait]
impl Module for ServiceModule {
    fn name(&self) -> &'static str {
        match self.manager {
            ServiceManager::Systemd => "systemd",
            ServiceManager::SysV => "service",
        }
    }

    async fn execute(&self, ctx: &ModuleContext<'_>, task: &Task) -> ModuleResult<ModuleOutput> {
        let args = self.args(task)?;
        if args.name.is_empty() {
            return Err(ModuleError::MissingParameter("name".to_string()));
        }
        let unit = args.name.as_str();
        let mut changes = Vec::new();

        match args.state.as_deref() {
            None => {}
            Some("started") => {
                if !self.succeeds(ctx, &self.active_command(unit)).await? {
                    self.act(ctx, &self.action_command("start", unit)).await?;
                    changes.push("started");
                }
            }
            Some("stopped") => {
                if self.succeeds(ctx, &self.active_command(unit)).await? {
                    self.act(ctx, &self.action_command("stop", unit)).await?;
                    changes.push("stopped");
                }
            }
            Some("restarted") => {
                self.act(ctx, &self.action_command("restart", unit)).await?;
                changes.push("restarted");
            }
            Some("reloaded") => {
                self.act(ctx, &self.action_command("reload", unit)).await?;
                changes.push("reloaded");
            }
            Some(other) => {
                return Err(ModuleError::InvalidParameter(format!(
                    "state must be started, stopped, restarted or reloaded, got '{}'",
                    other
                )))
            }
        }

        if args.enabled {
            let quoted = shell_words::quote(unit);
            if !self
                .succeeds(ctx, &format!("systemctl is-enabled --quiet {}", quoted))
                .await?
            {
                self.act(ctx, &format!("systemctl enable {}", quoted)).await?;
                changes.push("enabled");
            }
        }

        if changes.is_empty() {
            Ok(ModuleOutput::ok(format!("{} is in the desired state", unit)))
        } else {
            Ok(ModuleOutput::changed(format!("{} {}", unit, changes.join(", "))))
        }
    }
}
