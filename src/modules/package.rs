//! Package modules - `apt` and `yum`
//!
//! Both query the installed state first, so `present` and `absent` report OK
//! without touching the package manager when nothing needs to change.

use async_trait::async_trait;

use super::{Module, ModuleContext, ModuleError, ModuleOutput, ModuleResult};
use crate::parser::{Action, PackageArgs, Task};

/// Package manager backing a [`PackageModule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Apt,
    Yum,
}

/// Desired package state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageState {
    Present,
    Absent,
    Latest,
}

impl PackageState {
    pub fn parse(state: Option<&str>) -> ModuleResult<Self> {
        match state.unwrap_or("present") {
            "present" | "installed" => Ok(PackageState::Present),
            "absent" | "removed" => Ok(PackageState::Absent),
            "latest" => Ok(PackageState::Latest),
            other => Err(ModuleError::InvalidParameter(format!(
                "state must be present, absent or latest, got '{}'",
                other
            ))),
        }
    }
}

impl PackageManager {
    fn query(&self, name: &str) -> String {
        let name = shell_words::quote(name);
        match self {
            PackageManager::Apt => format!(
                "dpkg-query -W -f='${{Status}}' {} 2>/dev/null | grep -q 'install ok installed'",
                name
            ),
            PackageManager::Yum => format!("rpm -q {} >/dev/null 2>&1", name),
        }
    }

    fn install(&self, name: &str) -> String {
        let name = shell_words::quote(name);
        match self {
            PackageManager::Apt => {
                format!("DEBIAN_FRONTEND=noninteractive apt-get install -y {}", name)
            }
            PackageManager::Yum => format!("yum install -y {}", name),
        }
    }

    fn remove(&self, name: &str) -> String {
        let name = shell_words::quote(name);
        match self {
            PackageManager::Apt => {
                format!("DEBIAN_FRONTEND=noninteractive apt-get remove -y {}", name)
            }
            PackageManager::Yum => format!("yum remove -y {}", name),
        }
    }

    fn upgrade(&self, name: &str) -> String {
        let name = shell_words::quote(name);
        match self {
            PackageManager::Apt => format!(
                "DEBIAN_FRONTEND=noninteractive apt-get install -y --only-upgrade {n} || \
                 DEBIAN_FRONTEND=noninteractive apt-get install -y {n}",
                n = name
            ),
            PackageManager::Yum => format!("yum install -y {n} && yum update -y {n}", n = name),
        }
    }

    /// Whether an upgrade run's output says nothing was done.
    fn upgrade_was_noop(&self, output: &str) -> bool {
        match self {
            PackageManager::Apt => output.contains("0 upgraded, 0 newly installed"),
            PackageManager::Yum => {
                output.contains("Nothing to do") || output.contains("No packages marked for update")
            }
        }
    }
}

/// Package installation through apt or yum.
pub struct PackageModule {
    manager: PackageManager,
}

impl PackageModule {
    pub fn apt() -> Self {
        Self {
            manager: PackageManager::Apt,
        }
    }

    pub fn yum() -> Self {
        Self {
            manager: PackageManager::Yum,
        }
    }

    fn args<'t>(&self, task: &'t Task) -> ModuleResult<&'t PackageArgs> {
        match (&task.action, self.manager) {
            (Action::Apt(args), PackageManager::Apt) | (Action::Yum(args), PackageManager::Yum) => {
                Ok(args)
            }
            _ => Err(ModuleError::wrong_action(self.name(), task)),
        }
    }

    async fn run(&self, ctx: &ModuleContext<'_>, cmd: &str) -> ModuleResult<(i32, String)> {
        let out = ctx.connection.execute(cmd, None).await?;
        Ok((out.exit_code, out.combined_output()))
    }
}

#[async_trait]
impl Module for PackageModule {
    fn name(&self) -> &'static str {
        match self.manager {
            PackageManager::Apt => "apt",
            PackageManager::Yum => "yum",
        }
    }

    async fn execute(&self, ctx: &ModuleContext<'_>, task: &Task) -> ModuleResult<ModuleOutput> {
        let args = self.args(task)?;

        if let Some(deb) = args.deb.as_deref().filter(|d| !d.is_empty()) {
            if self.manager != PackageManager::Apt {
                return Err(ModuleError::InvalidParameter("deb is only supported by apt".into()));
            }
            let (rc, output) = self
                .run(ctx, &format!("dpkg -i {}", shell_words::quote(deb)))
                .await?;
            return Ok(ModuleOutput::from_command(rc, output));
        }

        let name = args
            .name
            .as_deref()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ModuleError::MissingParameter("name".to_string()))?;
        let state = PackageState::parse(args.state.as_deref())?;
        let installed = self.run(ctx, &self.manager.query(name)).await?.0 == 0;

        match state {
            PackageState::Present if installed => {
                Ok(ModuleOutput::ok(format!("{} is already installed", name)))
            }
            PackageState::Absent if !installed => {
                Ok(ModuleOutput::ok(format!("{} is not installed", name)))
            }
            PackageState::Present => {
                let (rc, output) = self.run(ctx, &self.manager.install(name)).await?;
                Ok(ModuleOutput::from_command(rc, output))
            }
            PackageState::Absent => {
                let (rc, output) = self.run(ctx, &self.manager.remove(name)).await?;
                Ok(ModuleOutput::from_command(rc, output))
            }
            PackageState::Latest => {
                let (rc, output) = self.run(ctx, &self.manager.upgrade(name)).await?;
                if rc == 0 && installed && self.manager.upgrade_was_noop(&output) {
                    Ok(ModuleOutput::ok(output))
                } else {
                    Ok(ModuleOutput::from_command(rc, output))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::Host;
    use crate::modules::test_support::FakeConnection;
    use crate::modules::TaskStatus;
    use crate::vars::Vars;
    use std::sync::Arc;

    async fn run(
        module: &PackageModule,
        conn: Arc<FakeConnection>,
        action: Action,
    ) -> ModuleResult<ModuleOutput> {
        let host = Host::new("h");
        let vars = Vars::new();
        let ctx = ModuleContext {
            host: &host,
            vars: &vars,
            diff_mode: false,
            connection: conn,
        };
        module.execute(&ctx, &Task::new("pkg", action)).await
    }

    fn args(name: &str, state: Option<&str>) -> PackageArgs {
        PackageArgs {
            name: Some(name.into()),
            deb: None,
            state: state.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_apt_present_when_installed_is_ok() {
        let conn = Arc::new(FakeConnection::default().respond("dpkg-query", 0, ""));
        let out = run(&PackageModule::apt(), conn.clone(), Action::Apt(args("nginx", None)))
            .await
            .unwrap();
        assert_eq!(out.status, TaskStatus::Ok);
        assert_eq!(conn.commands().len(), 1);
    }

    #[tokio::test]
    async fn test_apt_installs_missing_package() {
        let conn = Arc::new(FakeConnection::default().respond("dpkg-query", 1, ""));
        let out = run(&PackageModule::apt(), conn.clone(), Action::Apt(args("nginx", None)))
            .await
            .unwrap();
        assert_eq!(out.status, TaskStatus::Changed);
        assert!(conn.commands()[1].contains("apt-get install -y nginx"));
    }

    #[tokio::test]
    async fn test_yum_absent() {
        let conn = Arc::new(FakeConnection::default().respond("rpm -q", 0, ""));
        let out = run(
            &PackageModule::yum(),
            conn.clone(),
            Action::Yum(args("httpd", Some("absent"))),
        )
        .await
        .unwrap();
        assert_eq!(out.status, TaskStatus::Changed);
        assert_eq!(conn.commands()[1], "yum remove -y httpd");
    }

    #[tokio::test]
    async fn test_latest_noop_is_ok() {
        let conn = Arc::new(
            FakeConnection::default()
                .respond("dpkg-query", 0, "")
                .respond("DEBIAN_FRONTEND", 0, "0 upgraded, 0 newly installed, 0 to remove"),
        );
        let out = run(&PackageModule::apt(), conn, Action::Apt(args("git", Some("latest"))))
            .await
            .unwrap();
        assert_eq!(out.status, TaskStatus::Ok);
    }

    #[tokio::test]
    async fn test_deb_install_and_errors() {
        let conn = Arc::new(FakeConnection::default());
        let deb = PackageArgs {
            deb: Some("/tmp/tool.deb".into()),
            ..Default::default()
        };
        let out = run(&PackageModule::apt(), conn.clone(), Action::Apt(deb.clone()))
            .await
            .unwrap();
        assert_eq!(out.status, TaskStatus::Changed);
        assert_eq!(conn.commands()[0], "dpkg -i /tmp/tool.deb");

        assert!(run(&PackageModule::yum(), conn.clone(), Action::Yum(deb)).await.is_err());
        assert!(matches!(
            run(&PackageModule::apt(), conn.clone(), Action::Apt(PackageArgs::default())).await,
            Err(ModuleError::MissingParameter(_))
        ));
        assert!(matches!(
            run(&PackageModule::apt(), conn.clone(), Action::Apt(args("x", Some("purged")))).await,
            Err(ModuleError::InvalidParameter(_))
        ));
        assert!(run(&PackageModule::yum(), conn, Action::Apt(args("x", None))).await.is_err());
    }
}
