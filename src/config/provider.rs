//! Configuration Provider Trait

use serde_json::{Map, Value};

use super::ConfigResult;

/// A single configuration document source.
#[async_trait::async_trait]
pub trait ConfigProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &str;

    /// Load the document as a mapping.
    ///
    /// Returns `Ok(None)` when the source does not exist, and an error when it
    /// exists but cannot be read or is not a mapping.
    async fn load(&self) -> ConfigResult<Option<Map<String, Value>>>;
}
