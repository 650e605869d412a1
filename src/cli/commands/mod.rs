//! Subcommands module for xconfig CLI
//!
//! This module contains all the subcommand implementations.

pub mod inventory;
pub mod run;
pub mod validate;

use std::path::PathBuf;

use anyhow::{bail, Result};
use xconfig::config::Config;

/// Common context shared between commands
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Configuration
    pub config: Config,
    /// Verbosity level
    pub verbosity: u8,
    /// Whether output may use color
    pub use_color: bool,
}

impl CommandContext {
    /// Create a new command context from CLI arguments
    pub fn new(cli: &crate::cli::Cli, config: Config) -> Self {
        Self {
            config,
            verbosity: cli.verbosity(),
            use_color: !cli.no_color,
        }
    }

    /// The `-i` value, falling back to the configured default inventory.
    pub fn inventory_path(&self, flag: Option<&PathBuf>) -> Result<PathBuf> {
        match flag.or(self.config.defaults.inventory.as_ref()) {
            Some(path) => Ok(path.clone()),
            None => bail!("no inventory given; pass -i or set defaults.inventory"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(config: Config) -> CommandContext {
        CommandContext {
            config,
            verbosity: 0,
            use_color: false,
        }
    }

    #[test]
    fn test_inventory_path_precedence() {
        let mut config = Config::default();
        assert!(context(config.clone()).inventory_path(None).is_err());

        config.defaults.inventory = Some(PathBuf::from("default.ini"));
        let ctx = context(config);
        assert_eq!(ctx.inventory_path(None).unwrap(), PathBuf::from("default.ini"));
        assert_eq!(
            ctx.inventory_path(Some(&PathBuf::from("flag.ini"))).unwrap(),
            PathBuf::from("flag.ini")
        );
    }
}
