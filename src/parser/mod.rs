//! Playbook loading.
//!
//! [`load_playbook`] reads a YAML playbook, expands every role reference into
//! concrete tasks, and returns the plays ready for execution. Any failure is
//! fatal: no partially loaded playbook is ever returned.

pub mod args;
pub mod playbook;

use std::path::{Path, PathBuf};

use tracing::{debug, info};

pub use playbook::{
    Action, FileArgs, MessageArgs, PackageArgs, Play, RoleRef, ServiceArgs, StatArgs, Task,
    VultrInstanceArgs, When,
};

use crate::error::{Error, Result};
use crate::roles::Role;

/// A loaded playbook.
#[derive(Debug, Clone, Default)]
pub struct Playbook {
    /// Ordered list of plays
    pub plays: Vec<Play>,

    /// Source file path
    pub source_path: Option<PathBuf>,
}

impl Playbook {
    /// Load a playbook file and expand its roles.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let mut playbook = Self::parse(&content, base, path)?;
        playbook.source_path = Some(path.to_path_buf());
        Ok(playbook)
    }

    /// Parse playbook text; roles are resolved relative to `base_dir`.
    ///
    /// `origin` is only used for error messages.
    pub fn parse(content: &str, base_dir: &Path, origin: &Path) -> Result<Self> {
        let mut plays = parse_yaml_list::<Play>(content, origin)?;

        for play in &mut plays {
            let mut tasks = Vec::new();
            for role_ref in &play.roles {
                let role = Role::load(base_dir, &role_ref.name)?;
                debug!(
                    role = %role.name,
                    tasks = role.tasks.len(),
                    "expanded role"
                );
                tasks.extend(role.tasks);
            }
            tasks.append(&mut play.tasks);
            play.tasks = tasks;
        }

        info!(
            plays = plays.len(),
            tasks = plays.iter().map(|p| p.tasks.len()).sum::<usize>(),
            "loaded playbook {}",
            origin.display()
        );

        Ok(Self {
            plays,
            source_path: None,
        })
    }

    /// Get the number of plays
    pub fn play_count(&self) -> usize {
        self.plays.len()
    }

    /// Get total number of tasks across all plays
    pub fn task_count(&self) -> usize {
        self.plays.iter().map(|p| p.tasks.len()).sum()
    }
}

/// Load a playbook file into its ordered, role-expanded plays.
pub fn load_playbook(path: impl AsRef<Path>) -> Result<Vec<Play>> {
    Playbook::from_file(path).map(|p| p.plays)
}

/// Parse a YAML document holding a sequence; an empty document is an empty list.
pub(crate) fn parse_yaml_list<T>(content: &str, origin: &Path) -> Result<Vec<T>>
where
    T: serde::de::DeserializeOwned,
{
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_yaml::from_str::<Option<Vec<T>>>(content)
        .map(Option::unwrap_or_default)
        .map_err(|e| Error::playbook_parse(origin, e.to_string(), Some(Box::new(e))))
}
