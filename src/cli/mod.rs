//! CLI module for xconfig
//!
//! Argument parsing and subcommand dispatch for the `xconfig` binary.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use xconfig::config::LogFormat;

/// xconfig - run YAML playbooks against your hosts
#[derive(Parser, Debug, Clone)]
#[command(name = "xconfig")]
#[command(author = "xconfig Contributors")]
#[command(version)]
#[command(about = "A lightweight playbook engine for configuration management", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run a playbook
    Run(commands::run::RunArgs),

    /// Load a playbook and list its plays and tasks
    Validate(commands::validate::ValidateArgs),

    /// List the hosts a pattern selects
    #[command(name = "list-hosts")]
    ListHosts(commands::inventory::ListHostsArgs),
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-3)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(3)
    }
}
