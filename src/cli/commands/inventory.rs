//! Inventory commands - List hosts
//!
//! This module implements the `list-hosts` subcommand.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use xconfig::inventory::{Host, Inventory};

use super::CommandContext;

/// Arguments for list-hosts command
#[derive(Parser, Debug, Clone)]
pub struct ListHostsArgs {
    /// Path to inventory file
    #[arg(short = 'i', long)]
    pub inventory: Option<PathBuf>,

    /// Host pattern to match
    #[arg(default_value = "all")]
    pub pattern: String,
}

impl ListHostsArgs {
    /// Execute the list-hosts command
    pub async fn execute(&self, ctx: &CommandContext) -> Result<i32> {
        let inventory = Inventory::load(ctx.inventory_path(self.inventory.as_ref())?)?;
        let hosts = inventory.get_hosts_for_pattern(&self.pattern)?;
        let mut out = std::io::stdout().lock();
        write_hosts(&self.pattern, &hosts, &mut out)?;
        Ok(0)
    }
}

fn write_hosts(pattern: &str, hosts: &[&Host], out: &mut impl Write) -> Result<()> {
    writeln!(out, "  hosts ({}) matching '{}':", hosts.len(), pattern)?;
    for host in hosts {
        if host.address() == host.name {
            writeln!(out, "    {}", host.name)?;
        } else {
            writeln!(out, "    {} ({})", host.name, host.address())?;
        }
    }
    Ok(())
}
