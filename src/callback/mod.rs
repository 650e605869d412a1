//! Result streaming for xconfig
//!
//! A [`LogCollector`] receives every task outcome as soon as it is produced,
//! before the step barrier renders the step's output. Collectors are called
//! from many worker tasks at once and must be `Send + Sync`.
//!
//! # Built-in collectors
//!
//! | Collector | Description |
//! |-----------|-------------|
//! | [`StdoutCollector`] | Writes `[kind] output` for every outcome |
//! | [`MemoryCollector`] | Keeps every outcome in memory |
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use xconfig::callback::StdoutCollector;
//!
//! let executor = Executor::new(config, registry, factory)
//!     .with_collector(Arc::new(StdoutCollector::new()));
//! ```

use std::io::{self, Write};

use parking_lot::Mutex;
use tracing::warn;

use crate::modules::CommandResult;

/// Sink receiving each outcome once, tagged with the task kind.
pub trait LogCollector: Send + Sync {
    fn collect(&self, kind: &str, result: &CommandResult);
}

/// Streams `[kind] output` lines to a writer, stdout by default.
pub struct StdoutCollector {
    out: Mutex<Box<dyn Write + Send>>,
}

impl StdoutCollector {
    pub fn new() -> Self {
        Self::with_writer(Box::new(io::stdout()))
    }

    pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

impl Default for StdoutCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl LogCollector for StdoutCollector {
    fn collect(&self, kind: &str, result: &CommandResult) {
        let mut out = self.out.lock();
        if let Err(e) = writeln!(out, "[{}] {}", kind, result.output) {
            warn!(host = %result.host, "failed to stream result: {}", e);
        }
    }
}

/// Keeps every outcome, in arrival order.
#[derive(Debug, Default)]
pub struct MemoryCollector {
    entries: Mutex<Vec<(String, CommandResult)>>,
}

impl MemoryCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of `(kind, result)` pairs collected so far.
    pub fn entries(&self) -> Vec<(String, CommandResult)> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl LogCollector for MemoryCollector {
    fn collect(&self, kind: &str, result: &CommandResult) {
        self.entries.lock().push((kind.to_string(), result.clone()));
    }
}
