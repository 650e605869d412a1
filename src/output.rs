//! Terminal output for xconfig runs
//!
//! Everything is written through an [`OutputFormatter`] so the target can be
//! swapped for a buffer in tests.

use std::io::{self, Write};

use colored::{Color, Colorize};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;

use crate::modules::{CommandResult, TaskStatus};

const LINE_WIDTH: usize = 80;

/// Per-host outcome counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HostStats {
    pub ok: u32,
    pub changed: u32,
    pub failed: u32,
    pub skipped: u32,
}

impl HostStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a task status
    pub fn record(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Ok => self.ok += 1,
            TaskStatus::Changed => self.changed += 1,
            TaskStatus::Failed => self.failed += 1,
            TaskStatus::Skipped => self.skipped += 1,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn total(&self) -> u32 {
        self.ok + self.changed + self.failed + self.skipped
    }
}

/// Recap statistics for all hosts, in the order hosts were first seen.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecapStats {
    pub hosts: IndexMap<String, HostStats>,
}

impl RecapStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure `host` has an entry, even if nothing is ever recorded for it.
    pub fn ensure_host(&mut self, host: &str) {
        if !self.hosts.contains_key(host) {
            self.hosts.insert(host.to_string(), HostStats::default());
        }
    }

    /// Record a task result for a host
    pub fn record(&mut self, host: &str, status: TaskStatus) {
        self.ensure_host(host);
        if let Some(stats) = self.hosts.get_mut(host) {
            stats.record(status);
        }
    }

    pub fn get(&self, host: &str) -> Option<&HostStats> {
        self.hosts.get(host)
    }

    /// Check if any host had failures
    pub fn has_failures(&self) -> bool {
        self.hosts.values().any(HostStats::has_failures)
    }
}

/// Writes headers, results and the recap.
pub struct OutputFormatter {
    out: Mutex<Box<dyn Write + Send>>,
    use_color: bool,
}

impl OutputFormatter {
    /// Formatter on stdout; color is off when `NO_COLOR` is set.
    pub fn stdout(use_color: bool) -> Self {
        let use_color = use_color && std::env::var_os("NO_COLOR").is_none();
        Self::new(Box::new(io::stdout()), use_color)
    }

    pub fn new(out: Box<dyn Write + Send>, use_color: bool) -> Self {
        Self {
            out: Mutex::new(out),
            use_color,
        }
    }

    fn emit(&self, text: &str) {
        let mut out = self.out.lock();
        // A closed stdout is not worth aborting a run over.
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }

    fn banner(&self, header: &str) -> String {
        let stars = "*".repeat(LINE_WIDTH.saturating_sub(header.len() + 1));
        if self.use_color {
            format!("\n{} {}\n", header.bright_white().bold(), stars.bright_black())
        } else {
            format!("\n{} {}\n", header, stars)
        }
    }

    fn paint(&self, text: &str, status: TaskStatus) -> String {
        if !self.use_color {
            return text.to_string();
        }
        match status {
            TaskStatus::Ok => text.green().to_string(),
            TaskStatus::Changed => text.yellow().to_string(),
            TaskStatus::Failed => text.red().bold().to_string(),
            TaskStatus::Skipped => text.cyan().to_string(),
        }
    }

    pub fn play_header(&self, name: &str, hosts: &str) {
        self.emit(&self.banner(&format!("PLAY [{}] ({})", name, hosts)));
    }

    pub fn task_header(&self, name: &str) {
        self.emit(&self.banner(&format!("TASK [{}]", name)));
    }

    fn result_block(&self, hosts: &str, status: TaskStatus, rc: i32, output: &str) -> String {
        let head = format!("{} | {} | rc={} >>", hosts, status.as_str(), rc);
        format!("{}\n{}\n", self.paint(&head, status), output)
    }

    /// One `host | STATUS | rc=N >>` block per result, in the given order.
    pub fn host_results(&self, results: &[CommandResult]) {
        let text: String = results
            .iter()
            .map(|r| self.result_block(&r.host, r.status, r.rc, &r.output))
            .collect();
        self.emit(&text);
    }

    /// Hosts with identical status, rc and output share one block.
    pub fn aggregated(&self, results: &[CommandResult]) {
        let mut groups: IndexMap<(TaskStatus, i32, &str), Vec<&str>> = IndexMap::new();
        for r in results {
            groups
                .entry((r.status, r.rc, r.output.as_str()))
                .or_default()
                .push(r.host.as_str());
        }
        let text: String = groups
            .iter()
            .map(|((status, rc, output), hosts)| {
                self.result_block(&hosts.join(", "), *status, *rc, output)
            })
            .collect();
        self.emit(&text);
    }

    /// Report a play that could not run.
    pub fn play_error(&self, message: &str) {
        let line = format!("ERROR! {}", message);
        if self.use_color {
            self.emit(&format!("{}\n", line.red().bold()));
        } else {
            self.emit(&format!("{}\n", line));
        }
    }

    pub fn recap(&self, stats: &RecapStats) {
        let mut text = self.banner("PLAY RECAP");

        for (host, s) in &stats.hosts {
            if !self.use_color {
                text.push_str(&format!(
                    "{:<30} : ok={:<4} changed={:<4} failed={:<4} skipped={:<4}\n",
                    host, s.ok, s.changed, s.failed, s.skipped
                ));
                continue;
            }

            let host_colored = if s.failed > 0 {
                host.red().bold()
            } else if s.changed > 0 {
                host.yellow()
            } else {
                host.green()
            };
            // dim when zero
            let fmt_stat = |label: &str, value: u32, color: Color| -> String {
                if value > 0 {
                    format!("{}={:<4}", label.color(color), value)
                } else {
                    format!("{}={:<4}", label, value).dimmed().to_string()
                }
            };
            text.push_str(&format!(
                "{:<30} : {} {} {} {}\n",
                host_colored,
                fmt_stat("ok", s.ok, Color::Green),
                fmt_stat("changed", s.changed, Color::Yellow),
                fmt_stat("failed", s.failed, Color::Red),
                fmt_stat("skipped", s.skipped, Color::Cyan),
            ));
        }
        self.emit(&text);
    }
}

impl std::fmt::Debug for OutputFormatter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputFormatter")
            .field("use_color", &self.use_color)
            .finish_non_exhaustive()
    }
}

/// In-memory `Write` target whose contents can be read back.
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer(std::sync::Arc<Mutex<Vec<u8>>>);

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::ModuleOutput;
    use pretty_assertions::assert_eq;

    fn formatter() -> (OutputFormatter, CaptureBuffer) {
        let buf = CaptureBuffer::new();
        (OutputFormatter::new(Box::new(buf.clone()), false), buf)
    }

    #[test]
    fn test_host_stats_record() {
        let mut stats = HostStats::new();
        stats.record(TaskStatus::Ok);
        stats.record(TaskStatus::Changed);
        stats.record(TaskStatus::Changed);
        assert_eq!(stats.changed, 2);
        assert_eq!(stats.total(), 3);
        assert!(!stats.has_failures());
        stats.record(TaskStatus::Failed);
        assert!(stats.has_failures());
    }

    #[test]
    fn test_recap_stats_keeps_first_seen_order() {
        let mut recap = RecapStats::new();
        recap.ensure_host("web2");
        recap.record("web1", TaskStatus::Ok);
        recap.record("web2", TaskStatus::Skipped);
        let names: Vec<_> = recap.hosts.keys().cloned().collect();
        assert_eq!(names, ["web2", "web1"]);
        assert_eq!(recap.get("web2").unwrap().skipped, 1);
        assert!(!recap.has_failures());
    }

    #[test]
    fn test_headers_are_padded() {
        let (fmt, buf) = formatter();
        fmt.task_header("install nginx");
        let line = buf.contents().trim().to_string();
        assert!(line.starts_with("TASK [install nginx] ***"));
        assert_eq!(line.len(), LINE_WIDTH);
    }

    #[test]
    fn test_host_results_in_order() {
        let (fmt, buf) = formatter();
        fmt.host_results(&[
            CommandResult::new("b", ModuleOutput::changed("hi")),
            CommandResult::failed("a", 2, "no such file"),
        ]);
        assert_eq!(
            buf.contents(),
            "b | CHANGED | rc=0 >>\nhi\na | FAILED | rc=2 >>\nno such file\n"
        );
    }

    #[test]
    fn test_aggregated_groups_identical_results() {
        let (fmt, buf) = formatter();
        fmt.aggregated(&[
            CommandResult::new("web1", ModuleOutput::ok("same")),
            CommandResult::failed("db1", 1, "down"),
            CommandResult::new("web2", ModuleOutput::ok("same")),
        ]);
        assert_eq!(
            buf.contents(),
            "web1, web2 | OK | rc=0 >>\nsame\ndb1 | FAILED | rc=1 >>\ndown\n"
        );
    }

    #[test]
    fn test_recap_plain() {
        let (fmt, buf) = formatter();
        let mut recap = RecapStats::new();
        recap.record("web1", TaskStatus::Ok);
        recap.record("web1", TaskStatus::Failed);
        fmt.recap(&recap);

        let text = buf.contents();
        assert!(text.contains("PLAY RECAP"));
        assert!(text.contains(&format!(
            "{:<30} : ok=1    changed=0    failed=1    skipped=0   ",
            "web1"
        )));
    }
}
