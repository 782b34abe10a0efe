//! Normalized workspace configuration.
//!
//! Raw documents are coerced leniently: values of the wrong type fall back to
//! their defaults with a warning instead of rejecting the whole document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::merge::deep_merge;

pub const DEFAULT_FILE_PATTERNS: &[&str] = &["**/*.py"];

pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    "**/__pycache__/**",
    "**/*.pyc",
    ".git/**",
    ".venv/**",
    "venv/**",
    "build/**",
    "dist/**",
];

/// Entry point and dependency manifest expected in every workspace.
pub const DEFAULT_REQUIRED_FILES: &[&str] = &["main.py", "requirements.txt"];

/// Additional manifests recorded as required when present on disk.
pub const KNOWN_MANIFESTS: &[&str] = &["pyproject.toml", "setup.py", "setup.cfg"];

/// Runtime switches under the `options` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BcaslOptions {
    pub enabled: bool,
    /// Per-plugin budget in seconds; `0.0` means unset.
    pub plugin_timeout_s: f64,
    /// Drop discovered files that resolve outside the workspace root.
    pub sandbox: bool,
    pub iter_files_cache: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for BcaslOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            plugin_timeout_s: 0.0,
            sandbox: true,
            iter_files_cache: true,
            extra: Map::new(),
        }
    }
}

/// Per-plugin entry under the `plugins` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PluginSetting {
    Toggle(bool),
    Settings(Map<String, Value>),
}

impl PluginSetting {
    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Toggle(enabled) => *enabled,
            Self::Settings(map) => map.get("enabled").and_then(Value::as_bool).unwrap_or(true),
        }
    }

    /// Plugin-specific settings, if the entry is a mapping.
    pub fn settings(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Toggle(_) => None,
            Self::Settings(map) => Some(map),
        }
    }
}

/// The normalized configuration handed to a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BcaslConfig {
    pub file_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub required_files: Vec<String>,
    pub options: BcaslOptions,
    pub plugins: BTreeMap<String, PluginSetting>,
    pub plugin_order: Vec<String>,
    /// Unknown top-level keys, preserved as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for BcaslConfig {
    fn default() -> Self {
        Self {
            file_patterns: owned(DEFAULT_FILE_PATTERNS),
            exclude_patterns: owned(DEFAULT_EXCLUDE_PATTERNS),
            required_files: owned(DEFAULT_REQUIRED_FILES),
            options: BcaslOptions::default(),
            plugins: BTreeMap::new(),
            plugin_order: Vec::new(),
            extra: Map::new(),
        }
    }
}

impl BcaslConfig {
    /// The default configuration as a raw document.
    pub fn defaults_document() -> Value {
        json!({
            "file_patterns": DEFAULT_FILE_PATTERNS,
            "exclude_patterns": DEFAULT_EXCLUDE_PATTERNS,
            "required_files": DEFAULT_REQUIRED_FILES,
            "options": {
                "enabled": true,
                "plugin_timeout_s": 0.0,
                "sandbox": true,
                "iter_files_cache": true,
            },
            "plugins": {},
            "plugin_order": [],
        })
    }

    /// Merge `raw` over the defaults and normalize the result.
    pub fn from_mapping(raw: Map<String, Value>) -> Self {
        let mut doc = Self::defaults_document();
        deep_merge(&mut doc, Value::Object(raw));
        Self::normalize(doc)
    }

    /// Coerce an arbitrary document into a complete configuration.
    pub fn normalize(doc: Value) -> Self {
        let mut map = match doc {
            Value::Object(map) => map,
            other => {
                tracing::warn!(found = ?other, "Configuration is not a mapping, using defaults");
                Map::new()
            }
        };

        let mut config = Self {
            file_patterns: string_list(&mut map, "file_patterns"),
            exclude_patterns: string_list(&mut map, "exclude_patterns"),
            required_files: string_list(&mut map, "required_files"),
            options: normalize_options(map.remove("options")),
            plugins: normalize_plugins(map.remove("plugins")),
            plugin_order: string_list(&mut map, "plugin_order"),
            extra: Map::new(),
        };
        if config.file_patterns.is_empty() {
            config.file_patterns = owned(DEFAULT_FILE_PATTERNS);
        }
        if config.required_files.is_empty() {
            config.required_files = owned(DEFAULT_REQUIRED_FILES);
        }
        config.extra = map;
        config
    }

    pub fn plugin_setting(&self, id: &str) -> Option<&PluginSetting> {
        self.plugins.get(id)
    }

    /// Plugins are enabled unless their entry explicitly disables them.
    pub fn is_plugin_enabled(&self, id: &str) -> bool {
        self.plugins.get(id).is_none_or(PluginSetting::is_enabled)
    }

    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub(super) fn string_list(map: &mut Map<String, Value>, key: &str) -> Vec<String> {
    match map.remove(key) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                Vec::new()
            } else {
                vec![s.to_string()]
            }
        }
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                _ => None,
            })
            .collect(),
        Some(other) => {
            tracing::warn!(key, found = ?other, "Expected a list of strings, ignoring");
            Vec::new()
        }
    }
}

fn normalize_options(raw: Option<Value>) -> BcaslOptions {
    let mut options = BcaslOptions::default();
    let mut map = match raw {
        Some(Value::Object(map)) => map,
        None | Some(Value::Null) => return options,
        Some(other) => {
            tracing::warn!(found = ?other, "`options` is not a mapping, using defaults");
            return options;
        }
    };

    if let Some(v) = map.remove("enabled") {
        options.enabled = v.as_bool().unwrap_or(options.enabled);
    }
    if let Some(v) = map.remove("plugin_timeout_s") {
        let secs = match &v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        options.plugin_timeout_s = secs.filter(|s| s.is_finite() && *s >= 0.0).unwrap_or(0.0);
    }
    if let Some(v) = map.remove("sandbox") {
        options.sandbox = v.as_bool().unwrap_or(options.sandbox);
    }
    if let Some(v) = map.remove("iter_files_cache") {
        options.iter_files_cache = v.as_bool().unwrap_or(options.iter_files_cache);
    }
    options.extra = map;
    options
}

fn normalize_plugins(raw: Option<Value>) -> BTreeMap<String, PluginSetting> {
    let map = match raw {
        Some(Value::Object(map)) => map,
        None | Some(Value::Null) => return BTreeMap::new(),
        Some(other) => {
            tracing::warn!(found = ?other, "`plugins` is not a mapping, ignoring");
            return BTreeMap::new();
        }
    };

    map.into_iter()
        .filter_map(|(id, value)| match value {
            Value::Bool(enabled) => Some((id, PluginSetting::Toggle(enabled))),
            Value::Object(settings) => Some((id, PluginSetting::Settings(settings))),
            other => {
                tracing::warn!(plugin = %id, found = ?other, "Ignoring malformed plugin entry");
                None
            }
        })
        .collect()
}
