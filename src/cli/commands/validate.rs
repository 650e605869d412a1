//! Validate command - Load a playbook and describe it without running it

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use xconfig::parser::Playbook;

use super::CommandContext;

/// Arguments for the validate command
#[derive(Parser, Debug, Clone)]
pub struct ValidateArgs {
    /// Playbook file to validate
    pub playbook: PathBuf,
}

impl ValidateArgs {
    /// Execute the validate command
    pub async fn execute(&self, ctx: &CommandContext) -> Result<i32> {
        let playbook = Playbook::from_file(&self.playbook)?;
        let mut out = std::io::stdout().lock();
        describe(&playbook, ctx.use_color, &mut out)?;
        Ok(0)
    }
}

/// Write one line per play and per task, in execution order.
pub fn describe(playbook: &Playbook, use_color: bool, out: &mut impl Write) -> Result<()> {
    for (i, play) in playbook.plays.iter().enumerate() {
        let title = format!("play #{} ({}): {}", i + 1, play.hosts, play.name);
        if use_color {
            writeln!(out, "{}", title.bold())?;
        } else {
            writeln!(out, "{}", title)?;
        }
        for task in &play.tasks {
            let kind = match task.kind() {
                "" => "<no action>",
                kind => kind,
            };
            writeln!(out, "    {} [{}]", task.name, kind)?;
        }
    }
    writeln!(
        out,
        "{} play(s), {} task(s): OK",
        playbook.play_count(),
        playbook.task_count()
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_describe_lists_tasks() {
        let yaml = "- name: web\n  hosts: webservers\n  tasks:\n    - name: ping\n      shell: echo hi\n    - name: empty\n";
        let playbook = Playbook::parse(yaml, Path::new("."), Path::new("inline.yml")).unwrap();

        let mut buf = Vec::new();
        describe(&playbook, false, &mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "play #1 (webservers): web\n    ping [shell]\n    empty [<no action>]\n1 play(s), 2 task(s): OK\n"
        );
    }
}
