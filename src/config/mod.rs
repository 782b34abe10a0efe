//! Layered workspace configuration.
//!
//! ```rust,no_run
//! use bcasl::config::WorkspaceConfigLoader;
//!
//! # async fn example() {
//! let config = WorkspaceConfigLoader::new().load("./project").await;
//! assert!(!config.file_patterns.is_empty());
//! # }
//! ```

pub mod composite;
pub mod env;
pub mod file;
pub mod loader;
pub mod merge;
pub mod project;
pub mod provider;
pub mod settings;

pub use composite::CompositeConfigProvider;
pub use env::{EnvConfigProvider, PLUGIN_TIMEOUT_ENV};
pub use file::{ConfigFormat, FileConfigProvider};
pub use loader::{
    CONFIG_FILE_NAMES, DEFAULT_CONFIG_FILE, DEFAULT_PLUGIN_TIMEOUT_SECS, WorkspaceConfigLoader,
    resolve_timeout, timeout_budget,
};
pub use merge::{deep_merge, union_dedup};
pub use project::{PROJECT_CONFIG_FILE, ProjectConfig};
pub use provider::ConfigProvider;
pub use settings::{BcaslConfig, BcaslOptions, PluginSetting};

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading configuration sources.
///
/// The workspace loader recovers from all of these locally; they surface
/// only through the individual providers.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON syntax or shape error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML syntax or shape error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_bw::Error),

    /// Document parsed but is not a mapping
    #[error("Invalid configuration at {path}: {reason}")]
    InvalidShape {
        /// File the document came from
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// Environment variable error
    #[error("Environment error: {0}")]
    Env(#[from] std::env::VarError),
}

/// Result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
