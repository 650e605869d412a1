//! Role resolution and loading.
//!
//! A role is a directory holding `tasks/main.yaml` (or `tasks/main.yml`) and
//! optional `scripts/`, `templates/` and `files/` asset directories. Roles are
//! looked up next to the playbook first, then under its `roles/` directory.

use std::path::{Component, Path, PathBuf};

use tracing::trace;

use crate::error::{Error, Result};
use crate::parser::{parse_yaml_list, Task};

/// A role loaded from disk.
#[derive(Debug, Clone)]
pub struct Role {
    /// Name as referenced by the play
    pub name: String,
    /// Resolved role directory
    pub path: PathBuf,
    /// Tasks in file order, with asset paths rebased into the role
    pub tasks: Vec<Task>,
}

impl Role {
    /// Locate a role directory. The first existing candidate wins.
    pub fn resolve(base: &Path, name: &str) -> Result<PathBuf> {
        let clean = clean_role_name(name);
        let candidates = [base.join(&clean), base.join("roles").join(&clean)];

        for candidate in &candidates {
            trace!(candidate = %candidate.display(), "checking role directory");
            if candidate.is_dir() {
                return Ok(candidate.clone());
            }
        }

        Err(Error::RoleNotFound(name.to_string()))
    }

    /// Resolve a role and load its task file.
    pub fn load(base: &Path, name: &str) -> Result<Self> {
        let path = Self::resolve(base, name)?;
        let tasks_dir = path.join("tasks");
        let mut task_file = tasks_dir.join("main.yaml");
        if !task_file.exists() {
            task_file = tasks_dir.join("main.yml");
        }

        let content = std::fs::read_to_string(&task_file).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::RoleTasksNotFound {
                    role: name.to_string(),
                    path: task_file.clone(),
                }
            } else {
                Error::Io(e)
            }
        })?;

        let mut tasks: Vec<Task> = parse_yaml_list(&content, &task_file)?;
        for task in &mut tasks {
            task.rebase_assets(&path);
        }

        Ok(Self {
            name: name.to_string(),
            path,
            tasks,
        })
    }
}

/// Strip a trailing separator and `.` components from a role reference.
fn clean_role_name(name: &str) -> PathBuf {
    Path::new(name.trim_end_matches(std::path::MAIN_SEPARATOR))
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
