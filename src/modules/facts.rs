//! Setup module - Gather basic facts about a host
//!
//! Facts are returned to the scheduler, which merges them into the host's
//! bindings so later guards and templates can use them.

use async_trait::async_trait;
use serde_json::Value;

use super::{Module, ModuleContext, ModuleError, ModuleOutput, ModuleResult};
use crate::parser::{Action, Task};
use crate::vars::Vars;

/// Fact names, in the order `uname` prints the matching fields.
const FACTS: [(&str, &str); 4] = [
    ("ansible_hostname", "-n"),
    ("ansible_system", "-s"),
    ("ansible_kernel", "-r"),
    ("ansible_architecture", "-m"),
];

/// Module for gathering system facts
pub struct SetupModule;

impl SetupModule {
    fn command() -> String {
        FACTS
            .iter()
            .map(|(_, flag)| format!("uname {}", flag))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Pair each output line with its fact name.
    pub fn parse(stdout: &str) -> Vars {
        FACTS
            .iter()
            .zip(stdout.lines())
            .map(|((name, _), line)| (name.to_string(), Value::String(line.trim().to_string())))
            .collect()
    }
}

#[async_trait]
impl Module for SetupModule {
    fn name(&self) -> &'static str {
        "setup"
    }

    async fn execute(&self, ctx: &ModuleContext<'_>, task: &Task) -> ModuleResult<ModuleOutput> {
        if !matches!(task.action, Action::Setup) {
            return Err(ModuleError::wrong_action(self.name(), task));
        }

        let out = ctx.connection.execute(&Self::command(), None).await?;
        if !out.is_success() {
            return Err(ModuleError::CommandFailed {
                code: out.exit_code,
                message: out.combined_output(),
            });
        }

        let facts = Self::parse(&out.stdout);
        let summary = facts
            .iter()
            .map(|(k, v)| format!("{}={}", k, v.as_str().unwrap_or_default()))
            .collect::<Vec<_>>()
            .join(" ");
        Ok(ModuleOutput::ok(summary).with_facts(facts))
    }
}
