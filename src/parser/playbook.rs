//! Playbook structure definitions.
//!
//! A playbook is a YAML sequence of plays. Each play targets a host pattern,
//! carries its own variables, references roles, and lists tasks. Tasks carry
//! exactly one action, decoded into the [`Action`] sum type.

use std::path::Path;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer};
use serde_yaml::Value;
use tracing::warn;

use super::args::{bool_like, inline_or_mapping, node_kind, null_as_default, string_like, InlineArgs};
use crate::vars::Vars;

/// A play targeting a set of hosts with a list of tasks.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Play {
    /// Play name/description
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,

    /// Host pattern to target, resolved by the inventory
    #[serde(default, deserialize_with = "null_as_default")]
    pub hosts: String,

    /// Play-level variables, copied per host at play start
    #[serde(default, deserialize_with = "null_as_default")]
    pub vars: Vars,

    /// Roles to expand ahead of the inline tasks
    #[serde(default, deserialize_with = "null_as_default")]
    pub roles: Vec<RoleRef>,

    /// Tasks; after loading this holds role tasks followed by inline tasks
    #[serde(default, deserialize_with = "null_as_default")]
    pub tasks: Vec<Task>,
}

impl Play {
    /// Create a new play targeting the specified hosts
    pub fn new(name: impl Into<String>, hosts: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hosts: hosts.into(),
            ..Default::default()
        }
    }

    /// Set a play variable
    pub fn with_var(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.vars.insert(key.into(), value);
        self
    }

    /// Append a task
    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }
}

/// Reference to a role, written as a bare name or `{ role: name }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRef {
    /// Role name or relative path
    pub name: String,
}

impl RoleRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl<'de> Deserialize<'de> for RoleRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::String(name) => Ok(RoleRef { name }),
            Value::Mapping(map) => match map.get("role") {
                Some(Value::String(name)) if !name.is_empty() => Ok(RoleRef { name: name.clone() }),
                _ => Err(D::Error::custom("role mapping missing 'role' key")),
            },
            other => Err(D::Error::custom(format!(
                "unsupported role format: {}",
                node_kind(&other)
            ))),
        }
    }
}

/// Guard expressions attached to a task, AND-ed together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct When {
    expressions: Vec<String>,
}

impl When {
    /// Build a guard, trimming each expression and dropping empty ones.
    pub fn new<I, S>(expressions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            expressions: expressions
                .into_iter()
                .map(|e| e.as_ref().trim().to_string())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    /// Returns true when no expressions are defined.
    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty()
    }

    pub fn expressions(&self) -> &[String] {
        &self.expressions
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl<'de> Deserialize<'de> for When {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        match &value {
            Value::Null => Ok(When::default()),
            Value::Sequence(items) => {
                let mut exprs = Vec::with_capacity(items.len());
                for item in items {
                    let expr = scalar_text(item).ok_or_else(|| {
                        D::Error::custom(format!(
                            "unsupported when entry: {}",
                            node_kind(item)
                        ))
                    })?;
                    exprs.push(expr);
                }
                Ok(When::new(exprs))
            }
            scalar => match scalar_text(scalar) {
                Some(expr) => Ok(When::new([expr])),
                None => Err(D::Error::custom(format!(
                    "unsupported when format: {}",
                    node_kind(scalar)
                ))),
            },
        }
    }
}

/// Source and destination for `template` and `copy`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FileArgs {
    #[serde(default)]
    pub src: String,
    #[serde(default)]
    pub dest: String,
    #[serde(default, deserialize_with = "string_like")]
    pub mode: Option<String>,
}

/// Marker so `template` errors name the right action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct TemplateArgs(pub FileArgs);

impl InlineArgs for TemplateArgs {
    const MODULE: &'static str = "template";
}

/// Marker so `copy` errors name the right action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct CopyArgs(pub FileArgs);

impl InlineArgs for CopyArgs {
    const MODULE: &'static str = "copy";
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StatArgs {
    pub path: String,
}

/// Arguments for `apt` and `yum`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PackageArgs {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub deb: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

impl InlineArgs for PackageArgs {
    const MODULE: &'static str = "package";
}

/// Arguments for `systemd` and `service`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ServiceArgs {
    pub name: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "bool_like")]
    pub enabled: bool,
}

impl InlineArgs for ServiceArgs {
    const MODULE: &'static str = "service";
}

/// Message payload for `fail` and `debug`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MessageArgs {
    #[serde(default)]
    pub msg: String,
    /// Variable to print instead of a message (`debug` only)
    #[serde(default)]
    pub var: Option<String>,
}

/// Parameters for creating a Vultr cloud instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct VultrInstanceArgs {
    #[serde(default)]
    pub api_key: Option<String>,
    pub region: String,
    pub plan: String,
    pub os_id: i64,
    #[serde(default)]
    pub label: Option<String>,
}

/// The single action a task performs.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Shell(String),
    Command(String),
    Script(String),
    Template(FileArgs),
    Copy(FileArgs),
    Stat(StatArgs),
    Apt(PackageArgs),
    Yum(PackageArgs),
    Systemd(ServiceArgs),
    Service(ServiceArgs),
    Setup,
    SetFact(Vars),
    Fail(MessageArgs),
    Debug(MessageArgs),
    VultrInstance(VultrInstanceArgs),
    /// No action field was populated
    None,
}

impl Action {
    /// Name used to dispatch this action through the module registry.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Shell(_) => "shell",
            Action::Command(_) => "command",
            Action::Script(_) => "script",
            Action::Template(_) => "template",
            Action::Copy(_) => "copy",
            Action::Stat(_) => "stat",
            Action::Apt(_) => "apt",
            Action::Yum(_) => "yum",
            Action::Systemd(_) => "systemd",
            Action::Service(_) => "service",
            Action::Setup => "setup",
            Action::SetFact(_) => "set_fact",
            Action::Fail(_) => "fail",
            Action::Debug(_) => "debug",
            Action::VultrInstance(_) => "vultr_instance",
            Action::None => "",
        }
    }
}

/// A task to execute on every host of its play.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "RawTask")]
pub struct Task {
    /// Name of the task
    pub name: String,
    /// Guard deciding per host whether the task runs
    pub when: When,
    /// The action to dispatch
    pub action: Action,
    /// Variable receiving this task's result on each host
    pub register: Option<String>,
}

impl Task {
    pub fn new(name: impl Into<String>, action: Action) -> Self {
        Self {
            name: name.into(),
            when: When::default(),
            action,
            register: None,
        }
    }

    pub fn with_when(mut self, when: When) -> Self {
        self.when = when;
        self
    }

    pub fn with_register(mut self, name: impl Into<String>) -> Self {
        self.register = Some(name.into());
        self
    }

    /// Dispatch kind; `""` when the task has no action.
    pub fn kind(&self) -> &'static str {
        self.action.kind()
    }

    /// Point relative asset paths into a role's `scripts/`, `templates/`
    /// and `files/` directories.
    pub fn rebase_assets(&mut self, role_dir: &Path) {
        fn rebase(path: &mut String, dir: &Path) {
            if !path.is_empty() && !Path::new(path.as_str()).is_absolute() {
                *path = dir.join(path.as_str()).to_string_lossy().into_owned();
            }
        }
        match &mut self.action {
            Action::Script(script) => rebase(script, &role_dir.join("scripts")),
            Action::Template(args) => rebase(&mut args.src, &role_dir.join("templates")),
            Action::Copy(args) => rebase(&mut args.src, &role_dir.join("files")),
            _ => {}
        }
    }
}

/// Wire shape of a task: one optional field per action.
#[derive(Debug, Default, Deserialize)]
struct RawTask {
    #[serde(default, deserialize_with = "null_as_default")]
    name: String,
    #[serde(default)]
    when: When,
    #[serde(default, deserialize_with = "string_like")]
    shell: Option<String>,
    #[serde(default, deserialize_with = "string_like")]
    command: Option<String>,
    #[serde(default, deserialize_with = "string_like")]
    script: Option<String>,
    #[serde(default, deserialize_with = "inline_or_mapping")]
    template: Option<TemplateArgs>,
    #[serde(default, deserialize_with = "inline_or_mapping")]
    copy: Option<CopyArgs>,
    #[serde(default)]
    stat: Option<StatArgs>,
    #[serde(default, deserialize_with = "inline_or_mapping")]
    apt: Option<PackageArgs>,
    #[serde(default, deserialize_with = "inline_or_mapping")]
    yum: Option<PackageArgs>,
    #[serde(default, deserialize_with = "inline_or_mapping")]
    systemd: Option<ServiceArgs>,
    #[serde(default, deserialize_with = "inline_or_mapping")]
    service: Option<ServiceArgs>,
    #[serde(default, deserialize_with = "bool_like")]
    setup: bool,
    #[serde(default)]
    set_fact: Option<Vars>,
    #[serde(default)]
    fail: Option<MessageArgs>,
    #[serde(default)]
    debug: Option<MessageArgs>,
    /// Written as `vultr:` or `vultr_instance:`. Both keys name the same
    /// field, so a task carrying both is a duplicate-field load error.
    #[serde(default, alias = "vultr_instance")]
    vultr: Option<VultrInstanceArgs>,
    #[serde(default)]
    register: Option<String>,
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.is_empty())
}

impl From<RawTask> for Task {
    fn from(raw: RawTask) -> Self {
        // Priority order decides when more than one action is present.
        let candidates: Vec<Action> = [
            non_empty(raw.shell).map(Action::Shell),
            non_empty(raw.command).map(Action::Command),
            non_empty(raw.script).map(Action::Script),
            raw.template.map(|t| Action::Template(t.0)),
            raw.copy.map(|c| Action::Copy(c.0)),
            raw.stat.map(Action::Stat),
            raw.apt.map(Action::Apt),
            raw.yum.map(Action::Yum),
            raw.systemd.map(Action::Systemd),
            raw.service.map(Action::Service),
            raw.setup.then_some(Action::Setup),
            raw.set_fact.filter(|f| !f.is_empty()).map(Action::SetFact),
            raw.fail.map(Action::Fail),
            raw.debug.map(Action::Debug),
            raw.vultr.map(Action::VultrInstance),
        ]
        .into_iter()
        .flatten()
        .collect();

        if candidates.len() > 1 {
            let kinds: Vec<_> = candidates.iter().map(Action::kind).collect();
            warn!(
                task = %raw.name,
                "task declares several actions {:?}; using '{}'",
                kinds,
                kinds[0]
            );
        }

        Task {
            name: raw.name,
            when: raw.when,
            action: candidates.into_iter().next().unwrap_or(Action::None),
            register: non_empty(raw.register),
        }
    }
}
