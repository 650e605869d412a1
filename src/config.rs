//! Configuration module for xconfig
//!
//! Handles loading and merging configuration from multiple sources:
//! - Default values
//! - System configuration (/etc/xconfig/xconfig.toml)
//! - User configuration (~/.xconfig.toml)
//! - Project configuration (./xconfig.toml)
//! - Environment variables
//!
//! Command-line flags are applied on top by the CLI.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::connection::ssh::SshSettings;
use crate::error::{Error, ErrorContext, Result};
use crate::executor::ExecutorConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default run settings
    pub defaults: Defaults,

    /// SSH client settings
    pub ssh: SshSettings,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Default run settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Inventory used when `-i` is not given
    pub inventory: Option<PathBuf>,
    /// Maximum concurrent (host, task) units
    pub forks: usize,
    /// Dry-run by default
    pub check: bool,
    /// Show diffs by default
    pub diff: bool,
    /// Group identical host results in output
    pub aggregate_output: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            inventory: None,
            forks: 5,
            check: false,
            diff: false,
            aggregate_output: false,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive such as `info` or `xconfig=debug`; verbosity decides
    /// when unset
    pub level: Option<String>,
    pub format: LogFormat,
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// An explicit path replaces the standard locations and must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let paths = match explicit {
            Some(path) if !path.exists() => return Err(Error::FileNotFound(path.to_path_buf())),
            Some(path) => vec![path.to_path_buf()],
            None => Self::standard_paths(),
        };

        let mut merged = Value::Object(Default::default());
        for path in paths.iter().filter(|p| p.exists()) {
            debug!(path = %path.display(), "reading config file");
            merge_values(&mut merged, Self::read_file(path)?);
        }

        let mut config: Config = serde_json::from_value(merged)
            .map_err(|e| Error::Config(format!("invalid configuration: {}", e)))?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Standard locations, lowest precedence first.
    fn standard_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/xconfig/xconfig.toml")];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".xconfig.toml"));
        }
        paths.push(PathBuf::from("xconfig.toml"));
        paths
    }

    fn read_file(path: &Path) -> Result<Value> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let parsed = match extension {
            "yml" | "yaml" => serde_yaml::from_str::<Value>(&content).map_err(|e| e.to_string()),
            "json" => serde_json::from_str::<Value>(&content).map_err(|e| e.to_string()),
            _ => toml::from_str::<Value>(&content).map_err(|e| e.to_string()),
        };
        // An empty YAML document is null.
        match parsed {
            Ok(Value::Null) => Ok(Value::Object(Default::default())),
            Ok(value) => Ok(value),
            Err(message) => Err(Error::Config(format!("{}: {}", path.display(), message))),
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("XCONFIG_INVENTORY") {
            self.defaults.inventory = Some(PathBuf::from(path));
        }

        if let Ok(forks) = std::env::var("XCONFIG_FORKS") {
            self.defaults.forks = forks
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("XCONFIG_FORKS is not a number: {}", forks)))?;
        }

        if let Ok(value) = std::env::var("XCONFIG_CHECK") {
            self.defaults.check = env_flag("XCONFIG_CHECK", &value)?;
        }

        if let Ok(value) = std::env::var("XCONFIG_DIFF") {
            self.defaults.diff = env_flag("XCONFIG_DIFF", &value)?;
        }

        if let Ok(user) = std::env::var("XCONFIG_REMOTE_USER") {
            self.ssh.remote_user = Some(user);
        }

        if let Ok(executable) = std::env::var("XCONFIG_SSH_EXECUTABLE") {
            self.ssh.executable = executable;
        }

        if let Ok(level) = std::env::var("XCONFIG_LOG_LEVEL") {
            self.logging.level = Some(level);
        }

        Ok(())
    }

    /// Executor settings from the `defaults` section.
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            forks: self.defaults.forks,
            check_mode: self.defaults.check,
            diff_mode: self.defaults.diff,
            aggregate_output: self.defaults.aggregate_output,
        }
    }
}

fn env_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!("{} must be a boolean, got '{}'", name, other))),
    }
}

/// Deep-merge `overlay` into `base`; mappings merge key by key, anything
/// else is replaced.
fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;
    use std::io::Write;

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.defaults.forks, 5);
        assert!(!config.defaults.check);
        assert_eq!(config.ssh.executable, "ssh");
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_merge_values_is_deep() {
        let mut base = json!({"defaults": {"forks": 5, "check": false}, "ssh": {"port": 22}});
        merge_values(&mut base, json!({"defaults": {"forks": 10}}));
        assert_eq!(
            base,
            json!({"defaults": {"forks": 10, "check": false}, "ssh": {"port": 22}})
        );
    }

    #[test]
    #[serial]
    fn test_load_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "xconfig.toml",
            "[defaults]\nforks = 12\naggregate_output = true\n\n[ssh]\nremote_user = \"deploy\"\n\n[logging]\nformat = \"json\"\n",
        );
        let config = Config::load(Some(path.as_path())).unwrap();
        assert_eq!(config.defaults.forks, 12);
        assert!(config.defaults.aggregate_output);
        assert_eq!(config.ssh.remote_user.as_deref(), Some("deploy"));
        assert_eq!(config.ssh.connect_timeout, 10);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    #[serial]
    fn test_load_yaml_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = write(&dir, "c.yaml", "defaults:\n  check: true\n");
        assert!(Config::load(Some(yaml.as_path())).unwrap().defaults.check);

        let json = write(&dir, "c.json", r#"{"defaults": {"diff": true}}"#);
        assert!(Config::load(Some(json.as_path())).unwrap().defaults.diff);

        let empty = write(&dir, "empty.yml", "");
        assert_eq!(Config::load(Some(empty.as_path())).unwrap(), Config::default());
    }

    #[test]
    #[serial]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            Config::load(Some(missing.as_path())),
            Err(Error::FileNotFound(_))
        ));

        let bad = write(&dir, "bad.toml", "[defaults\nforks = ");
        assert!(matches!(Config::load(Some(bad.as_path())), Err(Error::Config(_))));

        let wrong_type = write(&dir, "wrong.toml", "[defaults]\nforks = \"many\"\n");
        assert!(matches!(Config::load(Some(wrong_type.as_path())), Err(Error::Config(_))));

        let unreadable = dir.path().join("dir.toml");
        std::fs::create_dir(&unreadable).unwrap();
        let err = Config::load(Some(unreadable.as_path())).unwrap_err();
        assert!(err.to_string().starts_with("cannot read config file"), "{}", err);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "x.toml", "[defaults]\nforks = 3\n");

        std::env::set_var("XCONFIG_FORKS", "20");
        std::env::set_var("XCONFIG_CHECK", "yes");
        std::env::set_var("XCONFIG_REMOTE_USER", "ops");
        std::env::set_var("XCONFIG_SSH_EXECUTABLE", "/usr/local/bin/ssh");
        let config = Config::load(Some(path.as_path()));
        std::env::remove_var("XCONFIG_FORKS");
        std::env::remove_var("XCONFIG_CHECK");
        std::env::remove_var("XCONFIG_REMOTE_USER");
        std::env::remove_var("XCONFIG_SSH_EXECUTABLE");

        let config = config.unwrap();
        assert_eq!(config.defaults.forks, 20);
        assert!(config.defaults.check);
        assert_eq!(config.ssh.remote_user.as_deref(), Some("ops"));
        assert_eq!(config.ssh.executable, "/usr/local/bin/ssh");
        assert_eq!(config.executor_config().forks, 20);
    }

    #[test]
    #[serial]
    fn test_env_override_rejects_garbage() {
        std::env::set_var("XCONFIG_DIFF", "maybe");
        let mut config = Config::default();
        let result = config.apply_env_overrides();
        std::env::remove_var("XCONFIG_DIFF");
        assert!(result.is_err());
    }
}
