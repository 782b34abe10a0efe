//! Composite Configuration Provider
//!
//! Chains multiple configuration providers with priority ordering.
//! Earlier providers have higher priority; the first one that yields a
//! usable mapping wins outright.

use serde_json::{Map, Value};

use super::ConfigResult;
use super::provider::ConfigProvider;

/// Composite configuration provider that chains multiple providers
pub struct CompositeConfigProvider {
    providers: Vec<Box<dyn ConfigProvider>>,
}

impl CompositeConfigProvider {
    /// Create a new empty composite provider
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Add a provider and return self (first added = highest priority)
    pub fn provider(mut self, provider: Box<dyn ConfigProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Get provider names
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Load the first usable mapping together with the name of its provider.
    ///
    /// Providers that fail are logged and skipped, so this never errors.
    pub async fn load_first(&self) -> Option<(&str, Map<String, Value>)> {
        for provider in &self.providers {
            match provider.load().await {
                Ok(Some(map)) => return Some((provider.name(), map)),
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(
                        source = provider.name(),
                        error = %e,
                        "Skipping unusable configuration source"
                    );
                }
            }
        }
        None
    }
}

impl Default for CompositeConfigProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ConfigProvider for CompositeConfigProvider {
    fn name(&self) -> &str {
        "composite"
    }

    async fn load(&self) -> ConfigResult<Option<Map<String, Value>>> {
        Ok(self.load_first().await.map(|(_, map)| map))
    }
}

impl std::fmt::Debug for CompositeConfigProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeConfigProvider")
            .field("provider_count", &self.providers.len())
            .field("provider_names", &self.provider_names())
            .finish()
    }
}
