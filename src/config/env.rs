//! Environment Variable Configuration Provider
//!
//! Provides read-only access to configuration via environment variables.
//! Environment variables are immutable at runtime for thread-safety.

use std::collections::HashMap;

use super::{ConfigError, ConfigResult};

/// Environment override for the per-plugin timeout, in seconds.
pub const PLUGIN_TIMEOUT_ENV: &str = "PYCOMPILER_BCASL_PLUGIN_TIMEOUT";

/// Read-only environment variable configuration provider.
///
/// Environment variables are treated as immutable at runtime because
/// modifying them is not thread-safe (requires unsafe in Rust 1.80+).
/// A fixed variable set can be supplied instead with [`Self::from_vars`].
#[derive(Debug, Clone, Default)]
pub struct EnvConfigProvider {
    vars: Option<HashMap<String, String>>,
}

impl EnvConfigProvider {
    /// Read from the process environment
    pub fn new() -> Self {
        Self { vars: None }
    }

    /// Read from a fixed set of variables instead of the process environment
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: Some(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    pub fn get_raw(&self, key: &str) -> ConfigResult<Option<String>> {
        if let Some(vars) = &self.vars {
            return Ok(vars.get(key).cloned());
        }
        match std::env::var(key) {
            Ok(value) => Ok(Some(value)),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(e) => Err(ConfigError::Env(e)),
        }
    }

    /// Strictly-positive timeout from [`PLUGIN_TIMEOUT_ENV`], if set and valid.
    pub fn plugin_timeout(&self) -> Option<f64> {
        let raw = match self.get_raw(PLUGIN_TIMEOUT_ENV) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::debug!(var = PLUGIN_TIMEOUT_ENV, error = %e, "Ignoring environment override");
                return None;
            }
        };
        match raw.trim().parse::<f64>() {
            Ok(secs) if secs.is_finite() && secs > 0.0 => Some(secs),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(var = PLUGIN_TIMEOUT_ENV, value = %raw, error = %e, "Ignoring non-numeric timeout");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_vars() {
        let provider = EnvConfigProvider::from_vars([(PLUGIN_TIMEOUT_ENV, "10")]);
        assert_eq!(
            provider.get_raw(PLUGIN_TIMEOUT_ENV).unwrap(),
            Some("10".to_string())
        );
        assert_eq!(provider.get_raw("OTHER").unwrap(), None);
        assert_eq!(provider.plugin_timeout(), Some(10.0));
    }

    #[test]
    fn test_plugin_timeout_rejects_non_positive_and_garbage() {
        for raw in ["0", "-2", "abc", "", "NaN", "inf"] {
            let provider = EnvConfigProvider::from_vars([(PLUGIN_TIMEOUT_ENV, raw)]);
            assert_eq!(provider.plugin_timeout(), None, "value {raw:?}");
        }
        let provider = EnvConfigProvider::from_vars([(PLUGIN_TIMEOUT_ENV, " 3.3 ")]);
        assert_eq!(provider.plugin_timeout(), Some(3.3));
    }

    #[test]
    fn test_process_env_not_found() {
        let provider = EnvConfigProvider::new();
        let value = provider
            .get_raw("BCASL_TEST_SURELY_UNSET_VARIABLE_42")
            .unwrap();
        assert_eq!(value, None);
    }
}
