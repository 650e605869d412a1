//! Copy module - Copy local files to a host
//!
//! Also home to [`place_content`], the idempotent write shared with the
//! template module: content and mode are compared with what the host already
//! has, and the file is only rewritten when they differ.

use std::path::Path;

use async_trait::async_trait;
use similar::TextDiff;

use super::{Module, ModuleContext, ModuleError, ModuleOutput, ModuleResult};
use crate::connection::parse_mode;
use crate::parser::{Action, Task};

/// Module for copying files
pub struct CopyModule;

#[async_trait]
impl Module for CopyModule {
    fn name(&self) -> &'static str {
        "copy"
    }

    async fn execute(&self, ctx: &ModuleContext<'_>, task: &Task) -> ModuleResult<ModuleOutput> {
        let Action::Copy(args) = &task.action else {
            return Err(ModuleError::wrong_action(self.name(), task));
        };
        if args.src.is_empty() {
            return Err(ModuleError::MissingParameter("src".to_string()));
        }

        let content = tokio::fs::read(&args.src).await.map_err(|e| {
            ModuleError::ExecutionFailed(format!("cannot read {}: {}", args.src, e))
        })?;

        place_content(ctx, &args.dest, &content, args.mode.as_deref()).await
    }
}

/// Write `content` to `dest` on the host unless it is already there.
///
/// OK when content and mode match, CHANGED after a write. In diff mode the
/// output carries a unified diff of the change.
pub(crate) async fn place_content(
    ctx: &ModuleContext<'_>,
    dest: &str,
    content: &[u8],
    mode: Option<&str>,
) -> ModuleResult<ModuleOutput> {
    if dest.is_empty() {
        return Err(ModuleError::MissingParameter("dest".to_string()));
    }
    let mode = mode
        .map(|m| parse_mode(m).ok_or_else(|| ModuleError::InvalidParameter(format!("mode {}", m))))
        .transpose()?;
    let path = Path::new(dest);

    let current = ctx.connection.download_content(path).await?;
    let content_matches = current.as_deref() == Some(content);
    let mode_matches = match mode {
        Some(wanted) if content_matches => ctx
            .connection
            .stat(path)
            .await?
            .is_some_and(|s| s.mode == wanted),
        _ => true,
    };

    if content_matches && mode_matches {
        return Ok(ModuleOutput::ok(format!("{} is up to date", dest)));
    }

    ctx.connection.upload_content(content, path, mode).await?;

    let mut output = format!("{} updated", dest);
    if ctx.diff_mode {
        let before = current
            .as_deref()
            .map(String::from_utf8_lossy)
            .unwrap_or_default();
        let after = String::from_utf8_lossy(content);
        let diff = TextDiff::from_lines(before.as_ref(), after.as_ref())
            .unified_diff()
            .header(&format!("{} (before)", dest), &format!("{} (after)", dest))
            .to_string();
        if !diff.is_empty() {
            output.push('\n');
            output.push_str(diff.trim_end());
        }
    }
    Ok(ModuleOutput::changed(output))
}
