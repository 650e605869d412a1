//! Template module - Render templates with minijinja
//!
//! Renders a local Jinja2-style template with the host's bindings and places
//! the result on the host. Undefined variables are an error rather than an
//! empty string.

use async_trait::async_trait;
use minijinja::{Environment, UndefinedBehavior};
use once_cell::sync::Lazy;

use super::copy::place_content;
use super::{Module, ModuleContext, ModuleError, ModuleOutput, ModuleResult};
use crate::parser::{Action, Task};
use crate::vars::{to_context, Vars};

/// Shared rendering environment, configured like Ansible's Jinja2.
static ENV: Lazy<Environment<'static>> = Lazy::new(|| {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.set_keep_trailing_newline(true);
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env
});

/// Render a template string against a host's bindings.
pub fn render_str(source: &str, vars: &Vars) -> ModuleResult<String> {
    ENV.render_str(source, to_context(vars))
        .map_err(|e| ModuleError::TemplateError(e.to_string()))
}

/// Module for rendering templates onto a host
pub struct TemplateModule;

#[async_trait]
impl Module for TemplateModule {
    fn name(&self) -> &'static str {
        "template"
    }

    async fn execute(&self, ctx: &ModuleContext<'_>, task: &Task) -> ModuleResult<ModuleOutput> {
        let Action::Template(args) = &task.action else {
            return Err(ModuleError::wrong_action(self.name(), task));
        };
        if args.src.is_empty() {
            return Err(ModuleError::MissingParameter("src".to_string()));
        }

        let source = tokio::fs::read_to_string(&args.src).await.map_err(|e| {
            ModuleError::ExecutionFailed(format!("cannot read template {}: {}", args.src, e))
        })?;
        let rendered = render_str(&source, ctx.vars)?;

        place_content(ctx, &args.dest, rendered.as_bytes(), args.mode.as_deref()).await
    }
}
