//! Shared test utilities and fixtures for the xconfig test suite.
//!
//! This module provides:
//! - A mock [`Connection`] and a factory handing one out per host
//! - A [`RecordingModule`] that logs start/finish events and tracks concurrency
//! - Fixture writers for playbooks and roles on disk
//! - Executor construction with captured output
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;

use xconfig::connection::{
    CommandOutput, Connection, ConnectionError, ConnectionFactory, ConnectionResult,
    ExecuteOptions, FileStat,
};
use xconfig::executor::{Executor, ExecutorConfig};
use xconfig::inventory::{Host, Inventory};
use xconfig::modules::{Module, ModuleContext, ModuleOutput, ModuleRegistry, ModuleResult};
use xconfig::output::{CaptureBuffer, OutputFormatter};
use xconfig::parser::{Action, Task};

// ============================================================================
// Mock Connection
// ============================================================================

/// Connection that records commands and answers every one with success.
#[derive(Debug, Default)]
pub struct MockConnection {
    identifier: String,
    commands: Mutex<Vec<String>>,
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
}

impl MockConnection {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Default::default()
        }
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().clone()
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn execute(
        &self,
        command: &str,
        _options: Option<ExecuteOptions>,
    ) -> ConnectionResult<CommandOutput> {
        self.commands.lock().push(command.to_string());
        Ok(CommandOutput::success(format!("ran: {}", command)))
    }

    async fn upload_content(
        &self,
        content: &[u8],
        remote_path: &Path,
        _mode: Option<u32>,
    ) -> ConnectionResult<()> {
        self.files
            .lock()
            .insert(remote_path.to_path_buf(), content.to_vec());
        Ok(())
    }

    async fn download_content(&self, remote_path: &Path) -> ConnectionResult<Option<Vec<u8>>> {
        Ok(self.files.lock().get(remote_path).cloned())
    }

    async fn stat(&self, path: &Path) -> ConnectionResult<Option<FileStat>> {
        Ok(self.files.lock().get(path).map(|content| FileStat {
            size: content.len() as u64,
            mode: 0o644,
            is_dir: false,
        }))
    }

    async fn remove(&self, path: &Path) -> ConnectionResult<()> {
        self.files.lock().remove(path);
        Ok(())
    }
}

/// Hands out one [`MockConnection`] per host name; hosts listed in
/// `unreachable` fail to connect.
#[derive(Debug, Default)]
pub struct MockConnectionFactory {
    connections: Mutex<HashMap<String, Arc<MockConnection>>>,
    unreachable: Vec<String>,
}

impl MockConnectionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unreachable(mut self, host: &str) -> Self {
        self.unreachable.push(host.to_string());
        self
    }

    pub fn connection(&self, host: &str) -> Option<Arc<MockConnection>> {
        self.connections.lock().get(host).cloned()
    }
}

impl ConnectionFactory for MockConnectionFactory {
    fn connect(&self, host: &Host) -> ConnectionResult<Arc<dyn Connection>> {
        if self.unreachable.contains(&host.name) {
            return Err(ConnectionError::ConnectionFailed(format!(
                "{} is unreachable",
                host.name
            )));
        }
        let conn = self
            .connections
            .lock()
            .entry(host.name.clone())
            .or_insert_with(|| Arc::new(MockConnection::new(&host.name)))
            .clone();
        Ok(conn)
    }
}

// ============================================================================
// Recording Module
// ============================================================================

/// Something a [`RecordingModule`] saw happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start { host: String, task: String },
    End { host: String, task: String },
}

/// Handler for `shell` tasks that records every invocation instead of
/// running anything.
#[derive(Debug, Default)]
pub struct RecordingModule {
    delay: Duration,
    events: Mutex<Vec<Event>>,
    running: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl RecordingModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold each invocation open for `delay` so overlaps are observable.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Most invocations ever in flight at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Module for RecordingModule {
    fn name(&self) -> &'static str {
        "shell"
    }

    async fn execute(&self, ctx: &ModuleContext<'_>, task: &Task) -> ModuleResult<ModuleOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.events.lock().push(Event::Start {
            host: ctx.host.name.clone(),
            task: task.name.clone(),
        });

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.events.lock().push(Event::End {
            host: ctx.host.name.clone(),
            task: task.name.clone(),
        });
        self.running.fetch_sub(1, Ordering::SeqCst);

        let cmd = match &task.action {
            Action::Shell(cmd) => cmd.clone(),
            _ => String::new(),
        };
        Ok(ModuleOutput::changed(format!("{} on {}", cmd, ctx.host.name)))
    }
}

// ============================================================================
// Builders
// ============================================================================

pub fn shell_task(name: &str, cmd: &str) -> Task {
    Task::new(name, Action::Shell(cmd.to_string()))
}

/// Inventory with hosts `h1..=hN`, all in group `web`.
pub fn inventory_with_hosts(count: usize) -> Inventory {
    let mut inventory = Inventory::new();
    for i in 1..=count {
        inventory.add_host_to_group(Host::new(format!("h{}", i)), "web");
    }
    inventory
}

/// Registry holding `module` plus every built-in except `shell`.
pub fn registry_with(module: Arc<RecordingModule>) -> ModuleRegistry {
    let mut registry = ModuleRegistry::with_builtins();
    registry.register(module);
    registry
}

/// Executor over mock connections, with output captured in the returned buffer.
pub fn test_executor(config: ExecutorConfig, registry: ModuleRegistry) -> (Executor, CaptureBuffer) {
    test_executor_with(config, registry, Arc::new(MockConnectionFactory::new()))
}

pub fn test_executor_with(
    config: ExecutorConfig,
    registry: ModuleRegistry,
    factory: Arc<MockConnectionFactory>,
) -> (Executor, CaptureBuffer) {
    let buf = CaptureBuffer::new();
    let executor = Executor::new(config, Arc::new(registry), factory)
        .with_output(OutputFormatter::new(Box::new(buf.clone()), false));
    (executor, buf)
}

// ============================================================================
// On-disk Fixtures
// ============================================================================

/// A temporary project directory holding playbooks and roles.
pub struct Project {
    pub dir: TempDir,
}

impl Project {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `content` to `relative`, creating parent directories.
    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dir");
        }
        std::fs::write(&path, content).expect("write fixture");
        path
    }

    /// Write `roles/<name>/tasks/main.yaml`.
    pub fn role(&self, name: &str, tasks: &str) -> PathBuf {
        self.write(&format!("roles/{}/tasks/main.yaml", name), tasks)
    }
}
