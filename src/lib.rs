//! # bcasl
//!
//! Pre-compile plugin orchestration for project workspaces.
//!
//! Plugins are registered once in a [`PluginRegistry`]. Each run loads the
//! workspace configuration, drops disabled and incompatible plugins, orders
//! the rest by priority, and executes them one at a time under a timeout
//! budget. Failures are isolated per plugin and collected in an
//! [`ExecutionReport`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use bcasl::{FnPlugin, Orchestrator, PluginMetadata, PluginRegistry};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), bcasl::Error> {
//!     let check = FnPlugin::builder(PluginMetadata::new("has_main", "Main check", "1.0.0")?)
//!         .priority(10)
//!         .handler(|ctx| async move {
//!             if ctx.workspace_root().join("main.py").is_file() {
//!                 Ok(())
//!             } else {
//!                 Err(bcasl::Error::Workspace("main.py is missing".into()))
//!             }
//!         })
//!         .build()?;
//!
//!     let registry = PluginRegistry::new().with(check)?;
//!     let orchestrator = Orchestrator::new(Arc::new(registry));
//!     if let Some(report) = orchestrator
//!         .run(Some(Path::new("./project")), &CancellationToken::new())
//!         .await
//!     {
//!         println!("{}", report.summary());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Background runs
//!
//! [`AsyncRunner`] drives the same run on a tokio task and hands the report to
//! a completion callback, with cooperative cancellation and a bounded
//! [`AsyncRunner::ensure_stopped`] teardown.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod config;
pub mod context;
pub mod orchestrator;
pub mod plugins;
pub mod runner;

pub use config::{
    BcaslConfig, BcaslOptions, ConfigError, ConfigProvider, EnvConfigProvider, PluginSetting,
    ProjectConfig, WorkspaceConfigLoader,
};
pub use context::{ExecutionContext, FileIter, WorkspaceMetadata};
pub use orchestrator::{
    ExecutionItem, ExecutionReport, Orchestrator, ProgressSink, RunPhase, SkippedPlugin,
    TracingSink,
};
pub use plugins::{
    CompatibilityResult, ComponentVersions, Deactivation, ExecutionPlan, FnPlugin, HostComponent,
    PluginError, PluginMetadata, PluginRecord, PluginRegistry, PluginUnit, Version,
};
pub use runner::{AsyncRunner, StartOutcome};

/// Error type for bcasl operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Plugin registration or execution failed.
    #[error(transparent)]
    Plugin(#[from] PluginError),

    /// File system operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization failed.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// The workspace is missing or unusable.
    #[error("Workspace error: {0}")]
    Workspace(String),

    /// Operation exceeded timeout.
    #[error("Operation timed out after {:.1}s", .0.as_secs_f64())]
    Timeout(std::time::Duration),

    /// The run was cancelled.
    #[error("Operation cancelled")]
    Cancelled,

    /// Unexpected internal state.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error category for unified error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Configuration, parsing, or setup errors
    Configuration,
    /// Faults raised by or about a plugin
    Plugin,
    /// Missing or invalid workspace
    Workspace,
    /// Timeouts and cancellation
    Interrupted,
    /// Internal errors (IO, JSON, unexpected states)
    Internal,
}

impl Error {
    /// Error raised from a plugin body, attributed to `plugin`.
    pub fn plugin(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Plugin(PluginError::execution(plugin, message))
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) => ErrorCategory::Configuration,
            Error::Plugin(PluginError::Timeout { .. }) => ErrorCategory::Interrupted,
            Error::Plugin(PluginError::Io(_)) => ErrorCategory::Internal,
            Error::Plugin(_) => ErrorCategory::Plugin,
            Error::Workspace(_) => ErrorCategory::Workspace,
            Error::Timeout(_) | Error::Cancelled => ErrorCategory::Interrupted,
            Error::Io(_) | Error::Json(_) | Error::Internal(_) => ErrorCategory::Internal,
        }
    }

    pub fn is_configuration_error(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }

    pub fn is_interrupted(&self) -> bool {
        self.category() == ErrorCategory::Interrupted
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Io(e) => Error::Io(e),
            ConfigError::Json(e) => Error::Json(e),
            other => Error::Config(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
