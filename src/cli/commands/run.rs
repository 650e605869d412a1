//! Run command - Execute a playbook

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use xconfig::callback::StdoutCollector;
use xconfig::connection::TransportFactory;
use xconfig::executor::{Executor, ExecutorConfig};
use xconfig::inventory::InventoryFile;
use xconfig::modules::ModuleRegistry;
use xconfig::output::OutputFormatter;
use xconfig::parser::Playbook;

use super::CommandContext;

/// Exit code when at least one host recorded a failure
pub const EXIT_HOST_FAILED: i32 = 2;

/// Arguments for the run command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to the playbook file
    pub playbook: PathBuf,

    /// Path to inventory file
    #[arg(short = 'i', long)]
    pub inventory: Option<PathBuf>,

    /// Report what would run without running it
    #[arg(long)]
    pub check: bool,

    /// Show differences for changed files
    #[arg(long)]
    pub diff: bool,

    /// Group hosts with identical results
    #[arg(long)]
    pub aggregate: bool,

    /// Number of (host, task) units run at once
    #[arg(short = 'f', long)]
    pub forks: Option<usize>,

    /// Print every result as soon as it is produced
    #[arg(long)]
    pub stream: bool,
}

impl RunArgs {
    /// Flags layered over the configured defaults.
    pub fn executor_config(&self, ctx: &CommandContext) -> ExecutorConfig {
        let base = ctx.config.executor_config();
        ExecutorConfig {
            forks: self.forks.unwrap_or(base.forks),
            check_mode: self.check || base.check_mode,
            diff_mode: self.diff || base.diff_mode,
            aggregate_output: self.aggregate || base.aggregate_output,
        }
    }

    /// Execute the run command
    pub async fn execute(&self, ctx: &CommandContext) -> Result<i32> {
        let playbook = Playbook::from_file(&self.playbook)?;
        let inventory = InventoryFile::new(ctx.inventory_path(self.inventory.as_ref())?);
        let config = self.executor_config(ctx);

        info!(
            playbook = %self.playbook.display(),
            plays = playbook.play_count(),
            forks = config.forks,
            check = config.check_mode,
            "running playbook"
        );

        let mut executor = Executor::new(
            config,
            Arc::new(ModuleRegistry::with_builtins()),
            Arc::new(TransportFactory::new(ctx.config.ssh.clone())),
        )
        .with_output(OutputFormatter::stdout(ctx.use_color));
        if self.stream {
            executor = executor.with_collector(Arc::new(StdoutCollector::new()));
        }

        let recap = executor.execute(&playbook.plays, &inventory).await;
        Ok(if recap.has_failures() {
            EXIT_HOST_FAILED
        } else {
            0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xconfig::config::Config;

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn args(playbook: PathBuf, inventory: PathBuf) -> RunArgs {
        RunArgs {
            playbook,
            inventory: Some(inventory),
            check: false,
            diff: false,
            aggregate: false,
            forks: None,
            stream: false,
        }
    }

    fn context() -> CommandContext {
        CommandContext {
            config: Config::default(),
            verbosity: 0,
            use_color: false,
        }
    }

    #[test]
    fn test_flags_override_config() {
        let mut ctx = context();
        ctx.config.defaults.forks = 8;
        ctx.config.defaults.diff = true;

        let mut run = args(PathBuf::from("p.yml"), PathBuf::from("h.ini"));
        let config = run.executor_config(&ctx);
        assert_eq!(config.forks, 8);
        assert!(config.diff_mode);
        assert!(!config.check_mode);

        run.forks = Some(1);
        run.check = true;
        let config = run.executor_config(&ctx);
        assert_eq!(config.forks, 1);
        assert!(config.check_mode);
    }

    #[tokio::test]
    async fn test_run_exit_codes() {
        let dir = tempfile::tempdir().unwrap();
        let inventory = write(&dir, "hosts.ini", "[local]\nlocalhost ansible_connection=local\n");

        let ok = write(
            &dir,
            "ok.yml",
            "- name: greet\n  hosts: local\n  tasks:\n    - name: hi\n      debug:\n        msg: hello\n",
        );
        assert_eq!(args(ok, inventory.clone()).execute(&context()).await.unwrap(), 0);

        let failing = write(
            &dir,
            "fail.yml",
            "- name: stop\n  hosts: local\n  tasks:\n    - name: nope\n      fail:\n        msg: stop here\n",
        );
        assert_eq!(
            args(failing, inventory.clone()).execute(&context()).await.unwrap(),
            EXIT_HOST_FAILED
        );

        let missing = dir.path().join("missing.yml");
        assert!(args(missing, inventory).execute(&context()).await.is_err());
    }
}
