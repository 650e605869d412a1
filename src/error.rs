//! Error types for xconfig.
//!
//! Load-time failures (playbook syntax, inline arguments, roles) are fatal to
//! loading a playbook. Inventory failures abort a single play. Module and connection
//! failures never escape the scheduler: they are folded into a FAILED
//! [`CommandResult`](crate::modules::CommandResult) for that host.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for xconfig operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for xconfig.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Playbook Errors
    // ========================================================================
    /// Error parsing a playbook or role task file.
    #[error("Failed to parse playbook '{path}': {message}")]
    PlaybookParse {
        /// Path to the file being parsed
        path: PathBuf,
        /// Error message
        message: String,
        /// Source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // ========================================================================
    // Role Errors
    // ========================================================================
    /// Role directory not found in any candidate location.
    #[error("Role '{0}' not found")]
    RoleNotFound(String),

    /// Role exists but has no task file.
    #[error("Role '{role}' has no task file at '{path}'")]
    RoleTasksNotFound {
        /// Role name
        role: String,
        /// Last candidate path tried
        path: PathBuf,
    },

    // ========================================================================
    // Inventory Errors
    // ========================================================================
    /// Error loading inventory.
    #[error("Failed to load inventory from '{path}': {message}")]
    InventoryLoad {
        /// Path to inventory
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Invalid or unmatched host pattern.
    #[error("Invalid host pattern: '{0}'")]
    InvalidHostPattern(String),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // IO Errors
    // ========================================================================
    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ========================================================================
    // Serialization Errors
    // ========================================================================
    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    // ========================================================================
    // Other Errors
    // ========================================================================
    /// Generic error with source.
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
        /// Source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Creates a new playbook parse error.
    pub fn playbook_parse(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::PlaybookParse {
            path: path.into(),
            message: message.into(),
            source,
        }
    }

    /// Creates a new inventory load error.
    pub fn inventory_load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InventoryLoad {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns true if the error belongs to the load phase.
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            Error::PlaybookParse { .. }
                | Error::RoleNotFound(_)
                | Error::RoleTasksNotFound { .. }
                | Error::YamlParse(_)
        )
    }

    /// Returns the error code for CLI exit status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::PlaybookParse { .. }
            | Error::RoleNotFound(_)
            | Error::RoleTasksNotFound { .. } => 4,
            Error::InventoryLoad { .. } | Error::InvalidHostPattern(_) => 5,
            _ => 1,
        }
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Adds context with a closure that is only evaluated on error.
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Other {
            message: message.into(),
            source: Some(Box::new(e)),
        })
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| Error::Other {
            message: f().into(),
            source: Some(Box::new(e)),
        })
    }
}
