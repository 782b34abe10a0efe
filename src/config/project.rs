//! Project-level configuration overlay (`ARK_Main_Config.yml`).

use std::path::Path;

use serde_json::{Map, Value};

use super::file::FileConfigProvider;
use super::merge::union_dedup;
use super::provider::ConfigProvider;
use super::settings::{BcaslConfig, string_list};

pub const PROJECT_CONFIG_FILE: &str = "ARK_Main_Config.yml";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectConfig {
    pub inclusion_patterns: Vec<String>,
    pub exclusion_patterns: Vec<String>,
    pub plugins: ProjectPluginSection,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectPluginSection {
    pub bcasl_enabled: Option<bool>,
    pub plugin_timeout: Option<f64>,
}

impl ProjectPluginSection {
    fn from_value(raw: Option<Value>) -> Self {
        let mut map = match raw {
            Some(Value::Object(map)) => map,
            None | Some(Value::Null) => return Self::default(),
            Some(other) => {
                tracing::warn!(found = ?other, "`plugins` in project configuration is not a mapping, ignoring");
                return Self::default();
            }
        };

        let bcasl_enabled = match map.remove("bcasl_enabled") {
            None | Some(Value::Null) => None,
            Some(Value::Bool(b)) => Some(b),
            Some(other) => {
                tracing::warn!(found = ?other, "Expected a boolean for `bcasl_enabled`, ignoring");
                None
            }
        };
        let plugin_timeout = match map.remove("plugin_timeout") {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            Some(other) => {
                tracing::warn!(found = ?other, "Expected a number for `plugin_timeout`, ignoring");
                None
            }
        };
        Self {
            bcasl_enabled,
            plugin_timeout,
        }
    }
}

impl ProjectConfig {
    /// Read the project file under `root`.
    ///
    /// Missing files and files that are not a mapping yield `None`; the
    /// latter is logged. Fields with an unexpected shape are dropped one by
    /// one so the rest of the file still applies.
    pub async fn load(root: &Path) -> Option<Self> {
        let provider = FileConfigProvider::new(root.join(PROJECT_CONFIG_FILE));
        match provider.load().await {
            Ok(Some(map)) => Some(Self::from_mapping(map)),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(file = PROJECT_CONFIG_FILE, error = %e, "Ignoring project configuration");
                None
            }
        }
    }

    /// Leniently coerce a raw project document.
    pub fn from_mapping(mut map: Map<String, Value>) -> Self {
        Self {
            inclusion_patterns: string_list(&mut map, "inclusion_patterns"),
            exclusion_patterns: string_list(&mut map, "exclusion_patterns"),
            plugins: ProjectPluginSection::from_value(map.remove("plugins")),
        }
    }

    /// Overlay project settings onto a loaded configuration.
    ///
    /// Inclusion patterns replace `file_patterns`; exclusion patterns are
    /// unioned after the existing ones. A positive `plugin_timeout` sets the
    /// per-plugin budget and `bcasl_enabled: false` disables the run.
    pub fn apply(&self, config: &mut BcaslConfig) {
        let inclusion: Vec<String> = self
            .inclusion_patterns
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        if !inclusion.is_empty() {
            config.file_patterns = inclusion;
        }

        if !self.exclusion_patterns.is_empty() {
            config.exclude_patterns =
                union_dedup(&config.exclude_patterns, &self.exclusion_patterns);
        }

        if let Some(timeout) = self.plugins.plugin_timeout
            && timeout.is_finite()
            && timeout > 0.0
        {
            config.options.plugin_timeout_s = timeout;
        }

        if self.plugins.bcasl_enabled == Some(false) {
            config.options.enabled = false;
        }
    }
}
