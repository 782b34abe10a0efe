use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("Invalid plugin metadata: {reason}")]
    InvalidMetadata { reason: String },

    #[error("Duplicate plugin id '{id}'")]
    DuplicateId { id: String },

    #[error("Plugin '{plugin}' failed: {message}")]
    Execution { plugin: String, message: String },

    #[error("Plugin '{plugin}' timed out after {:.1}s", timeout.as_secs_f64())]
    Timeout { plugin: String, timeout: Duration },

    #[error("Plugin '{plugin}' panicked: {message}")]
    Panicked { plugin: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PluginError {
    pub fn execution(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            plugin: plugin.into(),
            message: message.into(),
        }
    }
}
