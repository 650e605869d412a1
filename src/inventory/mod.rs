//! Inventory management for xconfig.
//!
//! This module provides:
//! - Loading from YAML and INI formats
//! - Host pattern matching
//! - The [`InventorySource`] seam the scheduler resolves play targets through

pub mod group;
pub mod host;

pub use group::Group;
pub use host::{ConnectionType, Host, HostParseError};

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use regex::Regex;
use serde_yaml::Value;
use tracing::debug;

use crate::error::{Error, Result};

/// Resolves a play's host pattern into an ordered list of hosts.
pub trait InventorySource: Send + Sync {
    fn resolve(&self, pattern: &str) -> Result<Vec<Host>>;
}

/// The main inventory structure holding all hosts and groups
#[derive(Debug, Clone)]
pub struct Inventory {
    /// All hosts in declaration order
    hosts: IndexMap<String, Host>,

    /// All groups in declaration order
    groups: IndexMap<String, Group>,
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new()
    }
}

impl Inventory {
    /// Create a new empty inventory with default groups
    pub fn new() -> Self {
        let mut groups = IndexMap::new();
        groups.insert("all".to_string(), Group::new("all"));
        groups.insert("ungrouped".to_string(), Group::new("ungrouped"));
        Self {
            hosts: IndexMap::new(),
            groups,
        }
    }

    /// Load inventory from a YAML or INI file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::inventory_load(path, e.to_string()))?;
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let mut inventory = Self::new();
        match extension.to_lowercase().as_str() {
            "yml" | "yaml" => inventory.parse_yaml(&content),
            "ini" => inventory.parse_ini(&content),
            _ if looks_like_ini(&content) => inventory.parse_ini(&content),
            _ => inventory.parse_yaml(&content),
        }
        .map_err(|message| Error::inventory_load(path, message))?;

        debug!(
            hosts = inventory.host_count(),
            groups = inventory.groups.len(),
            "loaded inventory {}",
            path.display()
        );
        Ok(inventory)
    }

    /// Parse inventory text in YAML form.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let mut inventory = Self::new();
        inventory
            .parse_yaml(content)
            .map_err(|message| Error::inventory_load("<inline>", message))?;
        Ok(inventory)
    }

    /// Parse inventory text in INI form.
    pub fn from_ini(content: &str) -> Result<Self> {
        let mut inventory = Self::new();
        inventory
            .parse_ini(content)
            .map_err(|message| Error::inventory_load("<inline>", message))?;
        Ok(inventory)
    }

    fn parse_yaml(&mut self, content: &str) -> std::result::Result<(), String> {
        let data: Value = serde_yaml::from_str(content).map_err(|e| e.to_string())?;
        match data {
            Value::Null => Ok(()),
            Value::Mapping(map) => {
                for (key, value) in map {
                    let name = key
                        .as_str()
                        .ok_or_else(|| "group names must be strings".to_string())?;
                    self.parse_yaml_group(name, &value)?;
                }
                Ok(())
            }
            _ => Err("inventory must be a mapping of groups".to_string()),
        }
    }

    fn parse_yaml_group(&mut self, name: &str, value: &Value) -> std::result::Result<(), String> {
        self.ensure_group(name);

        let map = match value {
            Value::Null => return Ok(()),
            Value::Mapping(map) => map,
            _ => return Err(format!("group '{}' must be a mapping", name)),
        };

        if let Some(hosts) = map.get("hosts") {
            match hosts {
                Value::Null => {}
                Value::Mapping(hosts) => {
                    for (host_key, host_value) in hosts {
                        let host_name = host_key
                            .as_str()
                            .ok_or_else(|| format!("host names in '{}' must be strings", name))?;
                        let mut host = Host::new(host_name);
                        if let Value::Mapping(vars) = host_value {
                            for (k, v) in vars {
                                if let Some(k) = k.as_str() {
                                    host.apply_var(k, v.clone()).map_err(|e| e.to_string())?;
                                }
                            }
                        }
                        self.insert_host(host, name);
                    }
                }
                Value::Sequence(items) => {
                    for item in items {
                        let host_name = item
                            .as_str()
                            .ok_or_else(|| format!("host names in '{}' must be strings", name))?;
                        self.insert_host(Host::new(host_name), name);
                    }
                }
                _ => return Err(format!("'hosts' of group '{}' must be a mapping", name)),
            }
        }

        if let Some(Value::Mapping(children)) = map.get("children") {
            for (child_key, child_value) in children {
                let child = child_key
                    .as_str()
                    .ok_or_else(|| format!("child groups of '{}' must be strings", name))?;
                if let Some(group) = self.groups.get_mut(name) {
                    group.add_child(child);
                }
                self.parse_yaml_group(child, child_value)?;
            }
        }

        if let Some(Value::Mapping(vars)) = map.get("vars") {
            for (k, v) in vars {
                if let (Some(k), Some(group)) = (k.as_str(), self.groups.get_mut(name)) {
                    group.set_var(k, v.clone());
                }
            }
        }

        Ok(())
    }

    fn parse_ini(&mut self, content: &str) -> std::result::Result<(), String> {
        let mut current_group = "ungrouped".to_string();
        let mut is_vars_section = false;
        let mut is_children_section = false;

        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                let section = &line[1..line.len() - 1];
                match section.rsplit_once(':') {
                    Some((group, suffix)) => {
                        current_group = group.to_string();
                        is_vars_section = suffix == "vars";
                        is_children_section = suffix == "children";
                    }
                    None => {
                        current_group = section.to_string();
                        is_vars_section = false;
                        is_children_section = false;
                    }
                }
                self.ensure_group(&current_group);
                continue;
            }

            if is_vars_section {
                let (key, value) = line
                    .split_once('=')
                    .ok_or_else(|| format!("line {}: expected key=value", lineno + 1))?;
                if let Some(group) = self.groups.get_mut(&current_group) {
                    group.set_var(key.trim(), host::parse_ini_value(value));
                }
            } else if is_children_section {
                if let Some(group) = self.groups.get_mut(&current_group) {
                    group.add_child(line);
                }
                self.ensure_group(line);
            } else {
                let host = Host::parse(line).map_err(|e| format!("line {}: {}", lineno + 1, e))?;
                self.insert_host(host, &current_group);
            }
        }

        Ok(())
    }

    fn ensure_group(&mut self, name: &str) {
        self.groups
            .entry(name.to_string())
            .or_insert_with(|| Group::new(name));
    }

    /// Insert or merge a host and record its membership in `group`.
    fn insert_host(&mut self, mut host: Host, group: &str) {
        let name = host.name.clone();
        self.ensure_group(group);
        if let Some(g) = self.groups.get_mut(group) {
            g.add_host(name.clone());
        }
        if let Some(all) = self.groups.get_mut("all") {
            all.add_host(name.clone());
        }

        match self.hosts.get_mut(&name) {
            Some(existing) => {
                existing.add_to_group(group);
                existing.vars.extend(host.vars);
                if host.address.is_some() {
                    existing.address = host.address;
                }
                if host.port.is_some() {
                    existing.port = host.port;
                }
                if host.user.is_some() {
                    existing.user = host.user;
                }
            }
            None => {
                host.add_to_group(group);
                host.add_to_group("all");
                self.hosts.insert(name, host);
            }
        }
    }

    /// Add a host, placing it in `ungrouped`.
    pub fn add_host(&mut self, host: Host) {
        self.insert_host(host, "ungrouped");
    }

    /// Add a host to a named group, creating the group if needed.
    pub fn add_host_to_group(&mut self, host: Host, group: &str) {
        self.insert_host(host, group);
    }

    /// Get a host by name
    pub fn get_host(&self, name: &str) -> Option<&Host> {
        self.hosts.get(name)
    }

    /// Get a group by name
    pub fn get_group(&self, name: &str) -> Option<&Group> {
        self.groups.get(name)
    }

    /// Get all hosts
    pub fn hosts(&self) -> impl Iterator<Item = &Host> {
        self.hosts.values()
    }

    /// Get all groups
    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    /// Count total hosts
    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    /// Get hosts matching a pattern, in inventory order.
    ///
    /// Supported patterns:
    /// - `all` or `*` - all hosts
    /// - `hostname` - specific host
    /// - `groupname` - all hosts in group and its children
    /// - `host1:host2` or `host1,host2` - union
    /// - `group1:&group2` - intersection
    /// - `group1:!group2` - exclusion
    /// - `~regex` - regex match on hostname
    /// - `web*` - glob match on hostname
    pub fn get_hosts_for_pattern(&self, pattern: &str) -> Result<Vec<&Host>> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(Error::InvalidHostPattern(pattern.to_string()));
        }

        // Host names such as IPv6 literals contain separators.
        if !self.groups.contains_key(pattern) {
            if let Some(host) = self.hosts.get(pattern) {
                return Ok(vec![host]);
            }
        }

        let parts = split_pattern(pattern);
        let mut selected: HashSet<&str> = HashSet::new();
        let mut seen_union = false;

        for part in parts.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
            if let Some(sub) = part.strip_prefix('&') {
                let other = self.match_single(sub)?;
                selected.retain(|name| other.contains(name));
            } else if let Some(sub) = part.strip_prefix('!') {
                // A leading exclusion starts from all hosts.
                if !seen_union {
                    seen_union = true;
                    selected = self.hosts.keys().map(String::as_str).collect();
                }
                for name in self.match_single(sub)? {
                    selected.remove(name);
                }
            } else {
                seen_union = true;
                selected.extend(self.match_single(part)?);
            }
        }

        Ok(self
            .hosts
            .values()
            .filter(|h| selected.contains(h.name.as_str()))
            .collect())
    }

    /// Match one pattern element without operators.
    fn match_single(&self, pattern: &str) -> Result<HashSet<&str>> {
        if pattern == "all" || pattern == "*" {
            return Ok(self.hosts.keys().map(String::as_str).collect());
        }

        if let Some(expr) = pattern.strip_prefix('~') {
            let regex =
                Regex::new(expr).map_err(|_| Error::InvalidHostPattern(pattern.to_string()))?;
            return self.non_empty(pattern, |h| regex.is_match(&h.name));
        }

        if pattern.contains('*') || pattern.contains('?') {
            let regex = Regex::new(&glob_to_regex(pattern))
                .map_err(|_| Error::InvalidHostPattern(pattern.to_string()))?;
            return self.non_empty(pattern, |h| regex.is_match(&h.name));
        }

        if let Some(group) = self.groups.get(pattern) {
            let mut names = HashSet::new();
            self.collect_group(group, &mut names, &mut HashSet::new());
            return Ok(names);
        }

        if let Some((name, _)) = self.hosts.get_key_value(pattern) {
            return Ok(HashSet::from([name.as_str()]));
        }

        Err(Error::InvalidHostPattern(pattern.to_string()))
    }

    fn non_empty<'a>(
        &'a self,
        pattern: &str,
        pred: impl Fn(&Host) -> bool,
    ) -> Result<HashSet<&'a str>> {
        let names: HashSet<&str> = self
            .hosts
            .values()
            .filter(|h| pred(h))
            .map(|h| h.name.as_str())
            .collect();
        if names.is_empty() {
            return Err(Error::InvalidHostPattern(pattern.to_string()));
        }
        Ok(names)
    }

    /// Collect hosts of a group and its children; cycles are visited once.
    fn collect_group<'a>(
        &'a self,
        group: &'a Group,
        names: &mut HashSet<&'a str>,
        visited: &mut HashSet<&'a str>,
    ) {
        if !visited.insert(group.name.as_str()) {
            return;
        }
        names.extend(group.hosts.iter().map(String::as_str));
        for child in &group.children {
            if let Some(child) = self.groups.get(child) {
                self.collect_group(child, names, visited);
            }
        }
    }
}

impl InventorySource for Inventory {
    fn resolve(&self, pattern: &str) -> Result<Vec<Host>> {
        Ok(self
            .get_hosts_for_pattern(pattern)?
            .into_iter()
            .cloned()
            .collect())
    }
}

/// An inventory file read on every resolution, so a broken file fails
/// each play on its own instead of the whole run.
#[derive(Debug, Clone)]
pub struct InventoryFile {
    path: PathBuf,
}

impl InventoryFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl InventorySource for InventoryFile {
    fn resolve(&self, pattern: &str) -> Result<Vec<Host>> {
        Inventory::load(&self.path)?.resolve(pattern)
    }
}

/// Split pattern on `:` and `,` outside brackets
fn split_pattern(pattern: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut bracket_depth: usize = 0;

    for (i, ch) in pattern.char_indices() {
        // A regex element runs to the end of the pattern.
        if i == start && is_regex_element(&pattern[start..]) {
            break;
        }
        match ch {
            '[' => bracket_depth += 1,
            ']' => bracket_depth = bracket_depth.saturating_sub(1),
            ':' | ',' if bracket_depth == 0 => {
                parts.push(&pattern[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    parts.push(&pattern[start..]);
    parts
}

fn is_regex_element(rest: &str) -> bool {
    let rest = rest.trim_start();
    let rest = rest.strip_prefix(['&', '!']).unwrap_or(rest);
    rest.trim_start().starts_with('~')
}

/// Convert a glob pattern to regex
fn glob_to_regex(pattern: &str) -> String {
    let mut regex = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            '[' | ']' | '(' | ')' | '{' | '}' | '.' | '+' | '^' | '$' | '|' | '\\' => {
                regex.push('\\');
                regex.push(ch);
            }
            _ => regex.push(ch),
        }
    }
    regex.push('$');
    regex
}

/// INI inventories have section headers or bare host lines; YAML ones have `key:`.
fn looks_like_ini(content: &str) -> bool {
    content
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with(';'))
        .map(|l| l.starts_with('[') || !l.contains(':'))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const INI: &str = r#"
# comment
[webservers]
web1 ansible_host=10.0.0.1
web2 ansible_host=10.0.0.2 ansible_user=deploy

[databases]
db1 ansible_port=5433

[production:children]
webservers
databases

[webservers:vars]
http_port=80
"#;

    const YAML: &str = r#"
all:
  hosts:
    bastion:
      ansible_host: 1.2.3.4
  children:
    web:
      hosts:
        web1:
        web2:
          ansible_port: 2222
      vars:
        tier: front
    local:
      hosts:
        localhost:
"#;

    fn names(hosts: Vec<&Host>) -> Vec<&str> {
        hosts.into_iter().map(|h| h.name.as_str()).collect()
    }

    #[test]
    fn test_parse_ini() {
        let inv = Inventory::from_ini(INI).unwrap();
        assert_eq!(inv.host_count(), 3);
        let web2 = inv.get_host("web2").unwrap();
        assert_eq!(web2.address(), "10.0.0.2");
        assert_eq!(web2.user.as_deref(), Some("deploy"));
        assert!(web2.in_group("webservers"));
        assert_eq!(inv.get_host("db1").unwrap().port, Some(5433));
        assert_eq!(
            inv.get_group("webservers").unwrap().vars["http_port"],
            Value::Number(80.into())
        );
    }

    #[test]
    fn test_parse_yaml() {
        let inv = Inventory::from_yaml(YAML).unwrap();
        assert_eq!(inv.host_count(), 4);
        assert_eq!(inv.get_host("web2").unwrap().port, Some(2222));
        assert!(inv.get_host("localhost").unwrap().is_local());
        assert_eq!(names(inv.get_hosts_for_pattern("web").unwrap()), ["web1", "web2"]);
    }

    #[test]
    fn test_yaml_host_list_form() {
        let inv = Inventory::from_yaml("web:\n  hosts: [a, b]\n").unwrap();
        assert_eq!(names(inv.get_hosts_for_pattern("web").unwrap()), ["a", "b"]);
    }

    #[test]
    fn test_pattern_matching() {
        let inv = Inventory::from_ini(INI).unwrap();
        assert_eq!(names(inv.get_hosts_for_pattern("all").unwrap()), ["web1", "web2", "db1"]);
        assert_eq!(names(inv.get_hosts_for_pattern("*").unwrap()).len(), 3);
        assert_eq!(
            names(inv.get_hosts_for_pattern("production").unwrap()),
            ["web1", "web2", "db1"]
        );
        assert_eq!(names(inv.get_hosts_for_pattern("db1").unwrap()), ["db1"]);
        assert_eq!(
            names(inv.get_hosts_for_pattern("databases:web1").unwrap()),
            ["web1", "db1"]
        );
        assert_eq!(
            names(inv.get_hosts_for_pattern("webservers,databases").unwrap()),
            ["web1", "web2", "db1"]
        );
        assert_eq!(
            names(inv.get_hosts_for_pattern("production:!databases").unwrap()),
            ["web1", "web2"]
        );
        assert_eq!(
            names(inv.get_hosts_for_pattern("production:&databases").unwrap()),
            ["db1"]
        );
        assert_eq!(names(inv.get_hosts_for_pattern("!webservers").unwrap()), ["db1"]);
    }

    #[test]
    fn test_glob_and_regex_patterns() {
        let inv = Inventory::from_ini(INI).unwrap();
        assert_eq!(names(inv.get_hosts_for_pattern("web*").unwrap()), ["web1", "web2"]);
        assert_eq!(names(inv.get_hosts_for_pattern("~^db\\d$").unwrap()), ["db1"]);
        assert!(inv.get_hosts_for_pattern("~(").is_err());
    }

    #[test]
    fn test_regex_element_keeps_separators() {
        let mut inv = Inventory::from_ini(INI).unwrap();
        assert_eq!(
            names(inv.get_hosts_for_pattern("~^web\\d{1,3}$").unwrap()),
            ["web1", "web2"]
        );
        assert_eq!(
            names(inv.get_hosts_for_pattern("db1:~^web[12]{1,1}$").unwrap()),
            ["web1", "web2", "db1"]
        );
        assert_eq!(
            names(inv.get_hosts_for_pattern("production:!~^web(1|3)$").unwrap()),
            ["web2", "db1"]
        );

        inv.add_host(Host::new("fe80::1"));
        assert_eq!(names(inv.get_hosts_for_pattern("fe80::1").unwrap()), ["fe80::1"]);
    }

    #[test]
    fn test_unmatched_pattern_is_error() {
        let inv = Inventory::from_ini(INI).unwrap();
        assert!(matches!(
            inv.get_hosts_for_pattern("nosuchgroup"),
            Err(Error::InvalidHostPattern(p)) if p == "nosuchgroup"
        ));
        assert!(inv.get_hosts_for_pattern("mail*").is_err());
        assert!(inv.get_hosts_for_pattern("").is_err());
    }

    #[test]
    fn test_child_cycle_terminates() {
        let inv = Inventory::from_ini("[a:children]\nb\n[b:children]\na\n[a]\nh1\n").unwrap();
        assert_eq!(names(inv.get_hosts_for_pattern("b").unwrap()), ["h1"]);
    }

    #[test]
    fn test_inventory_file_reports_load_error() {
        let source = InventoryFile::new("/nonexistent/hosts.ini");
        assert!(matches!(
            source.resolve("all"),
            Err(Error::InventoryLoad { .. })
        ));
    }

    #[test]
    fn test_looks_like_ini() {
        assert!(looks_like_ini("# c\n[web]\nweb1\n"));
        assert!(looks_like_ini("web1 ansible_host=1.2.3.4\n"));
        assert!(!looks_like_ini("all:\n  hosts:\n"));
    }
}
