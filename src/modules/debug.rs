//! Debug module - Print debug messages and variable values
//!
//! Runs entirely on the control node: the connection is never used.

use async_trait::async_trait;
use serde_json::Value;

use super::{Module, ModuleContext, ModuleError, ModuleOutput, ModuleResult};
use crate::parser::{Action, Task};
use crate::vars::lookup;

/// Module for printing debug messages and variable values
pub struct DebugModule;

impl DebugModule {
    /// Format a variable value for display
    fn format_value(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            _ => serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()),
        }
    }
}

#[async_trait]
impl Module for DebugModule {
    fn name(&self) -> &'static str {
        "debug"
    }

    async fn execute(&self, ctx: &ModuleContext<'_>, task: &Task) -> ModuleResult<ModuleOutput> {
        let Action::Debug(args) = &task.action else {
            return Err(ModuleError::wrong_action(self.name(), task));
        };

        if let Some(var) = args.var.as_deref().filter(|v| !v.is_empty()) {
            let shown = match lookup(ctx.vars, var) {
                Some(value) => Self::format_value(value),
                None => "VARIABLE IS NOT DEFINED!".to_string(),
            };
            return Ok(ModuleOutput::ok(format!("{}: {}", var, shown)));
        }

        Ok(ModuleOutput::ok(args.msg.clone()))
    }
}
