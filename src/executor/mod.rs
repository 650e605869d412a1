//! Core execution engine for xconfig
//!
//! Plays run in order. Within a play, each task is one *step*: the task is
//! started on every target host at once, bounded by a semaphore of `forks`
//! slots, and every host must finish the step before any host starts the
//! next one. A failure on one host never stops other hosts or later steps;
//! only a host pattern that cannot be resolved skips a play.

pub mod condition;

use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, instrument, warn};

use crate::callback::LogCollector;
use crate::connection::ConnectionFactory;
use crate::inventory::{Host, InventorySource};
use crate::modules::{CommandResult, ModuleContext, ModuleRegistry};
use crate::output::{OutputFormatter, RecapStats};
use crate::parser::{Play, Task};
use crate::vars::{host_copy, merge_facts, Vars};

use self::condition::evaluate_when;

/// Configuration for the executor
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum number of (host, task) units running at once
    pub forks: usize,
    /// Report what would run without running it
    pub check_mode: bool,
    /// Ask handlers to include diffs in their output
    pub diff_mode: bool,
    /// Group hosts with identical results when printing a step
    pub aggregate_output: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            forks: 5,
            check_mode: false,
            diff_mode: false,
            aggregate_output: false,
        }
    }
}

/// Shared state of one running step.
#[derive(Default)]
struct StepState {
    results: Mutex<Vec<CommandResult>>,
}

/// The main executor engine
pub struct Executor {
    config: ExecutorConfig,
    registry: Arc<ModuleRegistry>,
    connections: Arc<dyn ConnectionFactory>,
    collector: Option<Arc<dyn LogCollector>>,
    output: OutputFormatter,
    semaphore: Arc<Semaphore>,
}

impl Executor {
    pub fn new(
        config: ExecutorConfig,
        registry: Arc<ModuleRegistry>,
        connections: Arc<dyn ConnectionFactory>,
    ) -> Self {
        let forks = config.forks.max(1);
        Self {
            config,
            registry,
            connections,
            collector: None,
            output: OutputFormatter::stdout(true),
            semaphore: Arc::new(Semaphore::new(forks)),
        }
    }

    /// Stream every outcome to `collector` as it is produced.
    pub fn with_collector(mut self, collector: Arc<dyn LogCollector>) -> Self {
        self.collector = Some(collector);
        self
    }

    pub fn with_output(mut self, output: OutputFormatter) -> Self {
        self.output = output;
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run every play against the hosts `inventory` resolves, then print
    /// the recap.
    pub async fn execute(&self, plays: &[Play], inventory: &dyn InventorySource) -> RecapStats {
        let stats = Arc::new(Mutex::new(RecapStats::new()));

        for play in plays {
            self.run_play(play, inventory, &stats).await;
        }

        let recap = stats.lock().clone();
        self.output.recap(&recap);
        recap
    }

    #[instrument(skip_all, fields(play = %play.name))]
    async fn run_play(
        &self,
        play: &Play,
        inventory: &dyn InventorySource,
        stats: &Arc<Mutex<RecapStats>>,
    ) {
        self.output.play_header(&play.name, &play.hosts);

        let hosts = match inventory.resolve(&play.hosts) {
            Ok(hosts) => hosts,
            Err(e) => {
                error!(pattern = %play.hosts, "failed to resolve hosts: {}", e);
                self.output
                    .play_error(&format!("failed to resolve hosts '{}': {}", play.hosts, e));
                return;
            }
        };
        info!(hosts = hosts.len(), tasks = play.tasks.len(), "starting play");

        {
            let mut stats = stats.lock();
            for host in &hosts {
                stats.ensure_host(&host.name);
            }
        }

        let mut host_vars: Vec<Vars> = hosts.iter().map(|_| host_copy(&play.vars)).collect();

        for task in &play.tasks {
            self.output.task_header(&task.name);
            let (results, vars) = self.run_step(play, task, &hosts, host_vars, stats).await;
            host_vars = vars;

            if self.config.aggregate_output {
                self.output.aggregated(&results);
            } else {
                self.output.host_results(&results);
            }
        }

        debug!("play finished");
    }

    /// Run one task on every host and wait for all of them.
    ///
    /// Takes each host's bindings and hands them back, updated, in host
    /// order. Results are in completion order.
    async fn run_step(
        &self,
        play: &Play,
        task: &Task,
        hosts: &[Host],
        host_vars: Vec<Vars>,
        stats: &Arc<Mutex<RecapStats>>,
    ) -> (Vec<CommandResult>, Vec<Vars>) {
        debug!(task = %task.name, hosts = hosts.len(), "running step");

        let task = Arc::new(task.clone());
        let state = Arc::new(StepState::default());

        let handles: Vec<_> = hosts
            .iter()
            .cloned()
            .zip(host_vars)
            .map(|(host, vars)| {
                let task = Arc::clone(&task);
                let state = Arc::clone(&state);
                let stats = Arc::clone(stats);
                let semaphore = Arc::clone(&self.semaphore);
                let registry = Arc::clone(&self.registry);
                let connections = Arc::clone(&self.connections);
                let collector = self.collector.clone();
                let config = self.config.clone();

                tokio::spawn(async move {
                    let mut vars = vars;
                    let _permit = match semaphore.acquire().await {
                        Ok(permit) => permit,
                        Err(e) => {
                            error!(host = %host.name, "worker pool closed: {}", e);
                            return vars;
                        }
                    };

                    if !evaluate_when(&task.when, &vars) {
                        debug!(host = %host.name, task = %task.name, "guard is false, skipping");
                        return vars;
                    }

                    let result = if config.check_mode {
                        CommandResult::skipped(&host.name, format!("dry-run: {}", task.name))
                    } else {
                        match connections.connect(&host) {
                            Ok(connection) => {
                                let ctx = ModuleContext {
                                    host: &host,
                                    vars: &vars,
                                    diff_mode: config.diff_mode,
                                    connection,
                                };
                                registry.dispatch(&ctx, &task).await
                            }
                            Err(e) => {
                                warn!(host = %host.name, "connection failed: {}", e);
                                CommandResult::failed(&host.name, 1, e.to_string())
                            }
                        }
                    };

                    merge_facts(&mut vars, &result.facts);
                    if let Some(name) = &task.register {
                        vars.insert(name.clone(), result.registered());
                    }

                    stats.lock().record(&result.host, result.status);
                    if let Some(collector) = &collector {
                        collector.collect(task.kind(), &result);
                    }
                    state.results.lock().push(result);
                    vars
                })
            })
            .collect();

        let joined = join_all(handles).await;

        let mut updated = Vec::with_capacity(joined.len());
        for (host, outcome) in hosts.iter().zip(joined) {
            match outcome {
                Ok(vars) => updated.push(vars),
                Err(e) => {
                    error!(host = %host.name, task = %task.name, "worker aborted: {}", e);
                    let result = CommandResult::failed(&host.name, 1, format!("worker aborted: {}", e));
                    stats.lock().record(&host.name, result.status);
                    state.results.lock().push(result);
                    updated.push(host_copy(&play.vars));
                }
            }
        }

        let results = std::mem::take(&mut *state.results.lock());
        (results, updated)
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("collector", &self.collector.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Connection, ConnectionResult};
    use crate::inventory::Inventory;
    use crate::modules::test_support::FakeConnection;
    use crate::output::CaptureBuffer;
    use crate::parser::{Action, MessageArgs, When};
    use serde_json::json;

    struct FakeFactory;

    impl ConnectionFactory for FakeFactory {
        fn connect(&self, _host: &Host) -> ConnectionResult<Arc<dyn Connection>> {
            Ok(Arc::new(FakeConnection::default()))
        }
    }

    fn inventory(names: &[&str]) -> Inventory {
        let mut inv = Inventory::new();
        for name in names {
            inv.add_host_to_group(Host::new(*name), "web");
        }
        inv
    }

    fn executor(config: ExecutorConfig) -> (Executor, CaptureBuffer) {
        let buf = CaptureBuffer::new();
        let exec = Executor::new(
            config,
            Arc::new(ModuleRegistry::with_builtins()),
            Arc::new(FakeFactory),
        )
        .with_output(OutputFormatter::new(Box::new(buf.clone()), false));
        (exec, buf)
    }

    fn debug_task(name: &str, msg: &str) -> Task {
        Task::new(
            name,
            Action::Debug(MessageArgs {
                msg: msg.into(),
                var: None,
            }),
        )
    }

    fn debug_var(var: &str) -> Task {
        Task::new(
            var,
            Action::Debug(MessageArgs {
                msg: String::new(),
                var: Some(var.into()),
            }),
        )
    }

    #[tokio::test]
    async fn test_guard_false_records_nothing() {
        let (exec, buf) = executor(ExecutorConfig::default());
        let play = Play::new("p", "web")
            .with_var("deploy", json!("false"))
            .with_task(debug_task("skipped", "never").with_when(When::new(["deploy"])))
            .with_task(debug_task("shown", "hello"));

        let recap = exec.execute(&[play], &inventory(&["a", "b"])).await;
        assert_eq!(recap.get("a").unwrap().ok, 1);
        assert_eq!(recap.get("b").unwrap().total(), 1);
        assert!(!buf.contents().contains("never"));
    }

    #[tokio::test]
    async fn test_check_mode_skips() {
        let (exec, buf) = executor(ExecutorConfig {
            check_mode: true,
            ..Default::default()
        });
        let play = Play::new("p", "web").with_task(debug_task("say", "hi"));
        let recap = exec.execute(&[play], &inventory(&["a"])).await;

        assert_eq!(recap.get("a").unwrap().skipped, 1);
        assert!(buf.contents().contains("a | SKIPPED | rc=0 >>\ndry-run: say"));
    }

    #[tokio::test]
    async fn test_register_and_facts_flow_to_later_steps() {
        let (exec, buf) = executor(ExecutorConfig::default());
        let mut facts = Vars::new();
        facts.insert("color".into(), json!("blue"));
        let play = Play::new("p", "web")
            .with_task(Task::new("set", Action::SetFact(facts)).with_register("set_out"))
            .with_task(debug_var("color"))
            .with_task(debug_var("set_out.status"));

        let recap = exec.execute(&[play], &inventory(&["a"])).await;
        assert!(!recap.has_failures());
        let text = buf.contents();
        assert!(text.contains("a | OK | rc=0 >>\ncolor: blue\n"));
        assert!(text.contains("a | OK | rc=0 >>\nset_out.status: ok\n"));
    }

    #[tokio::test]
    async fn test_unresolvable_pattern_skips_play() {
        let (exec, buf) = executor(ExecutorConfig::default());
        let plays = [
            Play::new("broken", "nosuchgroup").with_task(debug_task("x", "x")),
            Play::new("fine", "web").with_task(debug_task("y", "y")),
        ];
        let recap = exec.execute(&plays, &inventory(&["a"])).await;
        assert_eq!(recap.get("a").unwrap().ok, 1);
        assert!(buf.contents().contains("ERROR! failed to resolve hosts 'nosuchgroup'"));
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_later_steps() {
        let (exec, _buf) = executor(ExecutorConfig::default());
        let play = Play::new("p", "web")
            .with_task(Task::new("fail", Action::Fail(MessageArgs::default())))
            .with_task(debug_task("after", "still here"));
        let recap = exec.execute(&[play], &inventory(&["a", "b"])).await;

        for host in ["a", "b"] {
            let stats = recap.get(host).unwrap();
            assert_eq!((stats.failed, stats.ok), (1, 1));
        }
        assert!(recap.has_failures());
        assert_eq!(
            recap.hosts.values().map(|s| s.total()).sum::<u32>(),
            4,
            "every host counted once per step"
        );
    }
}
