//! Fail module - Fail the task with a custom message

use async_trait::async_trait;

use super::{Module, ModuleContext, ModuleError, ModuleOutput, ModuleResult};
use crate::parser::{Action, Task};

const DEFAULT_MESSAGE: &str = "Failed as requested from task";

pub struct FailModule;

#[async_trait]
impl Module for FailModule {
    fn name(&self) -> &'static str {
        "fail"
    }

    async fn execute(&self, _ctx: &ModuleContext<'_>, task: &Task) -> ModuleResult<ModuleOutput> {
        let Action::Fail(args) = &task.action else {
            return Err(ModuleError::wrong_action(self.name(), task));
        };
        let msg = if args.msg.is_empty() {
            DEFAULT_MESSAGE.to_string()
        } else {
            args.msg.clone()
        };
        Ok(ModuleOutput::failed(1, msg))
    }
}
