//! Stat module - Report whether a path exists on a host and what it is

use std::path::Path;

use async_trait::async_trait;
use serde_json::json;

use super::{Module, ModuleContext, ModuleError, ModuleOutput, ModuleResult};
use crate::parser::{Action, Task};

/// Module for querying file status
pub struct StatModule;

#[async_trait]
impl Module for StatModule {
    fn name(&self) -> &'static str {
        "stat"
    }

    async fn execute(&self, ctx: &ModuleContext<'_>, task: &Task) -> ModuleResult<ModuleOutput> {
        let Action::Stat(args) = &task.action else {
            return Err(ModuleError::wrong_action(self.name(), task));
        };
        if args.path.is_empty() {
            return Err(ModuleError::MissingParameter("path".to_string()));
        }
        let stat = match ctx.connection.stat(Path::new(&args.path)).await? {
            Some(s) => json!({
                "exists": true,
                "size": s.size,
                "mode": format!("{:04o}", s.mode),
                "is_dir": s.is_dir,
            }),
            None => json!({ "exists": false }),
        };
        Ok(ModuleOutput::ok(stat.to_string()))
    }
}
