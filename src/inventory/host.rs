//! Host definition for the xconfig inventory.
//!
//! A `Host` is the identity the scheduler fans out over, plus the connection
//! settings the transport layer needs to reach it.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Connection type for a host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    /// SSH connection (default)
    #[default]
    Ssh,
    /// Local execution, no transport
    Local,
}

impl ConnectionType {
    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "ssh" | "smart" => Some(ConnectionType::Ssh),
            "local" => Some(ConnectionType::Local),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionType::Ssh => write!(f, "ssh"),
            ConnectionType::Local => write!(f, "local"),
        }
    }
}

/// A managed host in the inventory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    /// Inventory name
    pub name: String,

    /// Address to connect to, when different from the name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// SSH port override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Login user override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Transport used to reach the host
    #[serde(default)]
    pub connection: ConnectionType,

    /// Host-specific variables that are not connection settings
    #[serde(default)]
    pub vars: IndexMap<String, serde_yaml::Value>,

    /// Groups this host belongs to
    #[serde(skip)]
    pub groups: BTreeSet<String>,
}

impl Host {
    /// Create a new host. `localhost` and loopback addresses default to a local connection.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let connection = if is_loopback(&name) {
            ConnectionType::Local
        } else {
            ConnectionType::Ssh
        };
        Self {
            name,
            address: None,
            port: None,
            user: None,
            connection,
            vars: IndexMap::new(),
            groups: BTreeSet::new(),
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_connection(mut self, connection: ConnectionType) -> Self {
        self.connection = connection;
        self
    }

    /// Get the actual address to connect to
    pub fn address(&self) -> &str {
        self.address.as_deref().unwrap_or(&self.name)
    }

    pub fn is_local(&self) -> bool {
        self.connection == ConnectionType::Local
    }

    /// Add this host to a group
    pub fn add_to_group(&mut self, group: impl Into<String>) {
        self.groups.insert(group.into());
    }

    /// Check if host belongs to a specific group
    pub fn in_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }

    /// Apply one inventory variable. Connection keys configure the host,
    /// everything else is kept in `vars`.
    pub fn apply_var(&mut self, key: &str, value: serde_yaml::Value) -> Result<(), HostParseError> {
        match key {
            "ansible_host" | "xconfig_host" => self.address = Some(scalar_string(&value)),
            "ansible_port" | "xconfig_port" => {
                let raw = scalar_string(&value);
                self.port = Some(raw.parse().map_err(|_| HostParseError::InvalidPort(raw))?);
            }
            "ansible_user" | "xconfig_user" => self.user = Some(scalar_string(&value)),
            "ansible_connection" | "xconfig_connection" => {
                let raw = scalar_string(&value);
                self.connection = ConnectionType::parse(&raw)
                    .ok_or(HostParseError::InvalidConnectionType(raw))?;
            }
            _ => {
                self.vars.insert(key.to_string(), value);
            }
        }
        Ok(())
    }

    /// Parse an INI host line (e.g., "web1 ansible_host=10.0.0.1 ansible_port=2222")
    pub fn parse(input: &str) -> Result<Self, HostParseError> {
        let mut parts = input.split_whitespace();
        let name = parts.next().ok_or(HostParseError::EmptyInput)?;
        let mut host = Host::new(name);

        for part in parts {
            match part.split_once('=') {
                Some((key, value)) => host.apply_var(key, parse_ini_value(value))?,
                None => return Err(HostParseError::InvalidVariable(part.to_string())),
            }
        }

        Ok(host)
    }
}

fn is_loopback(name: &str) -> bool {
    matches!(name, "localhost" | "127.0.0.1" | "::1")
}

fn scalar_string(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Parse an INI value into a YAML scalar (quoted strings, booleans, integers).
pub(crate) fn parse_ini_value(value: &str) -> serde_yaml::Value {
    let value = value.trim();

    if value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')))
    {
        return serde_yaml::Value::String(value[1..value.len() - 1].to_string());
    }

    match value.to_lowercase().as_str() {
        "true" | "yes" | "on" => return serde_yaml::Value::Bool(true),
        "false" | "no" | "off" => return serde_yaml::Value::Bool(false),
        _ => {}
    }

    if let Ok(n) = value.parse::<i64>() {
        return serde_yaml::Value::Number(n.into());
    }

    serde_yaml::Value::String(value.to_string())
}

impl PartialEq for Host {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Host {}

impl std::fmt::Display for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(addr) = &self.address {
            write!(f, " ({})", addr)?;
        }
        Ok(())
    }
}

/// Errors that can occur when parsing a host definition
#[derive(Debug, thiserror::Error)]
pub enum HostParseError {
    #[error("empty input")]
    EmptyInput,
    #[error("invalid port: {0}")]
    InvalidPort(String),
    #[error("invalid connection type: {0}")]
    InvalidConnectionType(String),
    #[error("expected key=value, got '{0}'")]
    InvalidVariable(String),
}
