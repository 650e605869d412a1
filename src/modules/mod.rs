//! Module system for xconfig.
//!
//! A module is the handler behind one task kind (`shell`, `copy`, ...). The
//! [`ModuleRegistry`] maps kinds to handlers; it is filled once at startup and
//! only read while a playbook runs, so it is shared behind an `Arc` without
//! locking.

pub mod command;
pub mod copy;
pub mod debug;
pub mod facts;
pub mod fail;
pub mod package;
pub mod script;
pub mod service;
pub mod set_fact;
pub mod shell;
pub mod stat;
pub mod template;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::connection::{Connection, ConnectionError};
use crate::inventory::Host;
use crate::parser::Task;
use crate::vars::Vars;

/// Errors that can occur during module execution
#[derive(Error, Debug)]
pub enum ModuleError {
    #[error("Module not found: {0}")]
    NotFound(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Command failed with exit code {code}: {message}")]
    CommandFailed { code: i32, message: String },

    #[error("Template error: {0}")]
    TemplateError(String),

    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

impl ModuleError {
    /// The task reached a handler for a different action kind.
    pub fn wrong_action(module: &str, task: &Task) -> Self {
        ModuleError::InvalidParameter(format!(
            "{} handler cannot run a '{}' task",
            module,
            task.kind()
        ))
    }

    /// Return code reported for this failure.
    pub fn rc(&self) -> i32 {
        match self {
            ModuleError::CommandFailed { code, .. } => *code,
            _ => 1,
        }
    }
}

/// Result type for module operations
pub type ModuleResult<T> = Result<T, ModuleError>;

/// Outcome tag of one (host, task) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Ran and needed no change
    Ok,
    /// Ran and changed the host
    Changed,
    /// Failed to run or reported failure
    Failed,
    /// Not run (dry-run)
    Skipped,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Ok => "OK",
            TaskStatus::Changed => "CHANGED",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Skipped => "SKIPPED",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a handler reports, before it is tagged with the host.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleOutput {
    pub status: TaskStatus,
    pub rc: i32,
    pub output: String,
    /// Bindings to merge into the host's variables
    pub facts: Vars,
}

impl ModuleOutput {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Ok,
            rc: 0,
            output: output.into(),
            facts: Vars::new(),
        }
    }

    pub fn changed(output: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Changed,
            ..Self::ok(output)
        }
    }

    pub fn failed(rc: i32, output: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Failed,
            rc,
            ..Self::ok(output)
        }
    }

    /// CHANGED on rc 0, FAILED otherwise.
    pub fn from_command(rc: i32, output: impl Into<String>) -> Self {
        if rc == 0 {
            Self::changed(output)
        } else {
            Self::failed(rc, output)
        }
    }

    pub fn with_facts(mut self, facts: Vars) -> Self {
        self.facts = facts;
        self
    }
}

/// One task outcome for one host.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResult {
    pub host: String,
    pub status: TaskStatus,
    pub rc: i32,
    pub output: String,
    /// Bindings the scheduler merges into this host's variables
    pub facts: Vars,
}

impl CommandResult {
    pub fn new(host: impl Into<String>, output: ModuleOutput) -> Self {
        Self {
            host: host.into(),
            status: output.status,
            rc: output.rc,
            output: output.output,
            facts: output.facts,
        }
    }

    pub fn failed(host: impl Into<String>, rc: i32, output: impl Into<String>) -> Self {
        Self::new(host, ModuleOutput::failed(rc, output))
    }

    pub fn skipped(host: impl Into<String>, output: impl Into<String>) -> Self {
        Self::new(
            host,
            ModuleOutput {
                status: TaskStatus::Skipped,
                ..ModuleOutput::ok(output)
            },
        )
    }

    /// Value stored under a task's `register` name.
    pub fn registered(&self) -> Value {
        json!({
            "status": self.status,
            "rc": self.rc,
            "output": self.output,
            "changed": self.status == TaskStatus::Changed,
            "failed": self.status == TaskStatus::Failed,
            "skipped": self.status == TaskStatus::Skipped,
        })
    }
}

/// Everything a handler may use for one host.
#[derive(Clone)]
pub struct ModuleContext<'a> {
    /// Target host
    pub host: &'a Host,
    /// The host's current bindings
    pub vars: &'a Vars,
    /// Whether to include diffs in output
    pub diff_mode: bool,
    /// Transport to the host
    pub connection: Arc<dyn Connection>,
}

impl fmt::Debug for ModuleContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleContext")
            .field("host", &self.host.name)
            .field("vars", &self.vars.len())
            .field("diff_mode", &self.diff_mode)
            .field("connection", &self.connection.identifier())
            .finish()
    }
}

/// Handler for one task kind.
#[async_trait]
pub trait Module: Send + Sync {
    /// Task kind this module handles
    fn name(&self) -> &'static str;

    /// Run the task against one host.
    async fn execute(&self, ctx: &ModuleContext<'_>, task: &Task) -> ModuleResult<ModuleOutput>;
}

/// Kind-to-handler table.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, Arc<dyn Module>>,
}

impl ModuleRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            modules: HashMap::new(),
        }
    }

    /// Create a registry with all built-in modules
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        // Commands
        registry.register(Arc::new(shell::ShellModule));
        registry.register(Arc::new(command::CommandModule));
        registry.register(Arc::new(script::ScriptModule));

        // Files
        registry.register(Arc::new(template::TemplateModule));
        registry.register(Arc::new(copy::CopyModule));
        registry.register(Arc::new(stat::StatModule));

        // System
        registry.register(Arc::new(package::PackageModule::apt()));
        registry.register(Arc::new(package::PackageModule::yum()));
        registry.register(Arc::new(service::ServiceModule::systemd()));
        registry.register(Arc::new(service::ServiceModule::sysv()));

        // Logic
        registry.register(Arc::new(facts::SetupModule));
        registry.register(Arc::new(set_fact::SetFactModule));
        registry.register(Arc::new(fail::FailModule));
        registry.register(Arc::new(debug::DebugModule));
        registry
    }

    /// Register a module, replacing any handler already bound to its name
    pub fn register(&mut self, module: Arc<dyn Module>) {
        if let Some(previous) = self.modules.insert(module.name().to_string(), module) {
            debug!(kind = previous.name(), "replaced module handler");
        }
    }

    /// Get a module by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Module>> {
        self.modules.get(name).cloned()
    }

    /// Check if a module exists
    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Get all module names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modules.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Run a task through the handler for its kind.
    ///
    /// Always yields exactly one result: a missing handler or a handler error
    /// becomes a FAILED outcome for this host.
    pub async fn dispatch(&self, ctx: &ModuleContext<'_>, task: &Task) -> CommandResult {
        let kind = task.kind();
        let Some(module) = self.get(kind) else {
            let message = if kind.is_empty() {
                format!("task '{}' has no action", task.name)
            } else {
                ModuleError::NotFound(kind.to_string()).to_string()
            };
            warn!(host = %ctx.host.name, task = %task.name, "{}", message);
            return CommandResult::failed(&ctx.host.name, 1, message);
        };

        match module.execute(ctx, task).await {
            Ok(output) => CommandResult::new(&ctx.host.name, output),
            Err(e) => {
                debug!(host = %ctx.host.name, kind, error = %e, "module failed");
                CommandResult::failed(&ctx.host.name, e.rc(), e.to_string())
            }
        }
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.names())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! In-memory connection for handler tests.

    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::connection::{
        CommandOutput, Connection, ConnectionResult, ExecuteOptions, FileStat,
    };

    /// Records commands and answers them from canned responses by prefix.
    #[derive(Default)]
    pub struct FakeConnection {
        pub commands: Mutex<Vec<String>>,
        pub responses: Mutex<Vec<(String, CommandOutput)>>,
        pub files: Mutex<HashMap<PathBuf, (Vec<u8>, u32)>>,
    }

    impl FakeConnection {
        pub fn respond(self, prefix: &str, exit_code: i32, stdout: &str) -> Self {
            self.responses.lock().push((
                prefix.to_string(),
                CommandOutput {
                    exit_code,
                    stdout: stdout.to_string(),
                    stderr: String::new(),
                },
            ));
            self
        }

        pub fn with_file(self, path: &str, content: &str, mode: u32) -> Self {
            self.files
                .lock()
                .insert(PathBuf::from(path), (content.as_bytes().to_vec(), mode));
            self
        }

        pub fn commands(&self) -> Vec<String> {
            self.commands.lock().clone()
        }

        pub fn file(&self, path: &str) -> Option<String> {
            self.files
                .lock()
                .get(Path::new(path))
                .map(|(c, _)| String::from_utf8_lossy(c).into_owned())
        }
    }

    #[async_trait]
    impl Connection for FakeConnection {
        fn identifier(&self) -> &str {
            "fake"
        }

        async fn execute(
            &self,
            command: &str,
            _options: Option<ExecuteOptions>,
        ) -> ConnectionResult<CommandOutput> {
            self.commands.lock().push(command.to_string());
            let responses = self.responses.lock();
            Ok(responses
                .iter()
                .find(|(prefix, _)| command.starts_with(prefix.as_str()))
                .map(|(_, out)| out.clone())
                .unwrap_or_else(|| CommandOutput::success("")))
        }

        async fn upload_content(
            &self,
            content: &[u8],
            remote_path: &Path,
            mode: Option<u32>,
        ) -> ConnectionResult<()> {
            self.files.lock().insert(
                remote_path.to_path_buf(),
                (content.to_vec(), mode.unwrap_or(0o644)),
            );
            Ok(())
        }

        async fn download_content(&self, remote_path: &Path) -> ConnectionResult<Option<Vec<u8>>> {
            Ok(self.files.lock().get(remote_path).map(|(c, _)| c.clone()))
        }

        async fn stat(&self, path: &Path) -> ConnectionResult<Option<FileStat>> {
            Ok(self.files.lock().get(path).map(|(c, mode)| FileStat {
                size: c.len() as u64,
                mode: *mode,
                is_dir: false,
            }))
        }

        async fn remove(&self, path: &Path) -> ConnectionResult<()> {
            self.files.lock().remove(path);
            Ok(())
        }
    }
}
