//! # xconfig - A Lightweight Playbook Engine
//!
//! xconfig applies YAML playbooks to a set of hosts. A playbook is an ordered
//! list of plays; each play targets an inventory pattern and runs its tasks
//! in order, one step at a time, across all of its hosts in parallel.
//!
//! ## Core Concepts
//!
//! - **Playbooks**: YAML documents holding an ordered list of plays
//! - **Roles**: Reusable task lists expanded in place when a playbook loads
//! - **Tasks**: A name, an optional guard (`when`), one action and an optional `register`
//! - **Modules**: Handlers that perform one action kind against one host
//! - **Inventory**: Hosts and groups that play patterns resolve against
//! - **Connections**: Transport to a host (local process or the system ssh client)
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                      CLI (clap)                           │
//! └───────────────────────────────────────────────────────────┘
//!                              │
//!          ┌───────────────────┼────────────────────┐
//!          ▼                   ▼                    ▼
//! ┌─────────────────┐ ┌─────────────────┐ ┌──────────────────┐
//! │ Playbook loader │ │    Inventory    │ │  Module registry │
//! │ (serde_yaml +   │ │ (INI / YAML,    │ │  (built-in       │
//! │  role expansion)│ │  host patterns) │ │   handlers)      │
//! └─────────────────┘ └─────────────────┘ └──────────────────┘
//!          │                   │                    │
//!          └───────────────────┼────────────────────┘
//!                              ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │       Executor (tokio, semaphore-bounded, step barrier)   │
//! └───────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │             Connections (local, ssh client)               │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use xconfig::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let plays = load_playbook("site.yml")?;
//!     let inventory = Inventory::load("hosts.ini")?;
//!
//!     let executor = Executor::new(
//!         ExecutorConfig::default(),
//!         Arc::new(ModuleRegistry::with_builtins()),
//!         Arc::new(TransportFactory::default()),
//!     );
//!     let recap = executor.execute(&plays, &inventory).await;
//!     assert!(!recap.has_failures());
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::callback::{LogCollector, StdoutCollector};
    pub use crate::connection::{
        CommandOutput, Connection, ConnectionError, ConnectionFactory, ConnectionResult,
        LocalConnection, SshConnection, TransportFactory,
    };
    pub use crate::error::{Error, Result};
    pub use crate::executor::{Executor, ExecutorConfig};
    pub use crate::inventory::{Group, Host, Inventory, InventoryFile, InventorySource};
    pub use crate::modules::{
        CommandResult, Module, ModuleContext, ModuleOutput, ModuleRegistry, TaskStatus,
    };
    pub use crate::output::{OutputFormatter, RecapStats};
    pub use crate::parser::{load_playbook, Action, Play, Playbook, Task, When};
    pub use crate::roles::Role;
    pub use crate::vars::Vars;
}

// ============================================================================
// Core Modules
// ============================================================================

/// Error types and result aliases for xconfig operations.
pub mod error;

/// Per-host variable bindings.
pub mod vars;

/// Layered configuration (files and environment).
pub mod config;

// ============================================================================
// Playbook Components
// ============================================================================

/// Playbook parsing and representation.
///
/// Plays, tasks, guards and the action payloads decoded from the flexible
/// YAML shapes a task may use.
pub mod parser;

/// Role resolution and loading.
///
/// A role is a directory under `roles/` whose `tasks/main.yaml` (or
/// `main.yml`) is spliced into a play ahead of the play's own tasks.
pub mod roles;

// ============================================================================
// Infrastructure
// ============================================================================

/// Connection layer for host communication.
///
/// Provides the [`Connection`](connection::Connection) trait plus a local
/// transport and one driving the system `ssh` client.
pub mod connection;

/// Host and group inventory management.
pub mod inventory;

// ============================================================================
// Execution Engine
// ============================================================================

/// Task execution engine.
///
/// The [`Executor`](executor::Executor) runs each task on every host of a
/// play concurrently, bounded by `forks`, and waits for all hosts before the
/// next task starts.
///
/// # Example
///
/// ```rust,ignore
/// use xconfig::executor::{Executor, ExecutorConfig};
///
/// let config = ExecutorConfig {
///     forks: 10,
///     check_mode: true,
///     ..Default::default()
/// };
/// let executor = Executor::new(config, registry, connections);
/// let recap = executor.execute(&plays, &inventory).await;
/// ```
pub mod executor;

/// Built-in task handlers and the registry that dispatches to them.
pub mod modules;

/// Streaming of task results as they are produced.
pub mod callback;

/// Terminal rendering of headers, results and the recap.
pub mod output;

pub use error::{Error, Result};
