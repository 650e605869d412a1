//! Set_fact module - Bind variables on the current host
//!
//! Values are stored as written; the scheduler merges them into the host's
//! bindings once the step completes.

use async_trait::async_trait;

use super::{Module, ModuleContext, ModuleError, ModuleOutput, ModuleResult};
use crate::parser::{Action, Task};
use crate::vars::Vars;

/// Module for setting host facts
pub struct SetFactModule;

#[async_trait]
impl Module for SetFactModule {
    fn name(&self) -> &'static str {
        "set_fact"
    }

    async fn execute(&self, _ctx: &ModuleContext<'_>, task: &Task) -> ModuleResult<ModuleOutput> {
        let Action::SetFact(values) = &task.action else {
            return Err(ModuleError::wrong_action(self.name(), task));
        };

        let facts: Vars = values.clone();

        let output = serde_json::to_string(&facts)
            .map_err(|e| ModuleError::ExecutionFailed(e.to_string()))?;
        Ok(ModuleOutput::ok(output).with_facts(facts))
    }
}
