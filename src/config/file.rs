//! File-based Configuration Provider
//!
//! Loads a configuration document from a YAML or JSON file.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use super::provider::ConfigProvider;
use super::{ConfigError, ConfigResult};

/// Serialization format of a configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Infer the format from the file extension; anything that is not
    /// `.yaml`/`.yml` is read as JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Self::Yaml
            }
            _ => Self::Json,
        }
    }

    pub fn parse(&self, content: &str) -> ConfigResult<Value> {
        if content.trim().is_empty() {
            return Ok(Value::Null);
        }
        match self {
            Self::Yaml => Ok(serde_yaml_bw::from_str(content)?),
            Self::Json => Ok(serde_json::from_str(content)?),
        }
    }

    pub fn render(&self, value: &Value) -> ConfigResult<String> {
        match self {
            Self::Yaml => Ok(serde_yaml_bw::to_string(value)?),
            Self::Json => Ok(serde_json::to_string_pretty(value)?),
        }
    }
}

/// File-based configuration provider
#[derive(Debug, Clone)]
pub struct FileConfigProvider {
    path: PathBuf,
    format: ConfigFormat,
    name: String,
}

impl FileConfigProvider {
    /// Create a provider whose format follows the file extension
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = ConfigFormat::from_path(&path);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        Self { path, format, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> ConfigFormat {
        self.format
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Write `value` to the file, creating parent directories as needed.
    pub async fn save(&self, value: &Value) -> ConfigResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = self.format.render(value)?;
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

#[async_trait::async_trait]
impl ConfigProvider for FileConfigProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self) -> ConfigResult<Option<Map<String, Value>>> {
        if !self.exists() {
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(&self.path).await?;
        match self.format.parse(&content)? {
            Value::Object(map) => Ok(Some(map)),
            Value::Null => Ok(Some(Map::new())),
            other => Err(ConfigError::InvalidShape {
                path: self.path.clone(),
                reason: format!("expected a mapping, found {}", value_kind(&other)),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("bcasl.yaml")),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("bcasl.YML")),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new(".bcasl.json")),
            ConfigFormat::Json
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_none() {
        let dir = tempdir().unwrap();
        let provider = FileConfigProvider::new(dir.path().join("bcasl.yaml"));
        assert!(provider.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_yaml_mapping() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bcasl.yaml");
        std::fs::write(&path, "options:\n  enabled: false\n").unwrap();

        let map = FileConfigProvider::new(&path).load().await.unwrap().unwrap();
        assert_eq!(map["options"]["enabled"], Value::Bool(false));
    }

    #[tokio::test]
    async fn test_sequence_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bcasl.yaml");
        std::fs::write(&path, "[]").unwrap();

        let err = FileConfigProvider::new(&path).load().await.unwrap_err();
        assert!(matches!(err, ConfigError::InvalidShape { .. }));
        assert!(err.to_string().contains("sequence"));
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".bcasl.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = FileConfigProvider::new(&path).load().await.unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[tokio::test]
    async fn test_empty_document_is_empty_mapping() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bcasl.yml");
        std::fs::write(&path, "  \n").unwrap();

        let map = FileConfigProvider::new(&path).load().await.unwrap().unwrap();
        assert!(map.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let provider = FileConfigProvider::new(dir.path().join("nested/bcasl.json"));
        let value = serde_json::json!({"plugin_order": ["a", "b"]});

        provider.save(&value).await.unwrap();
        let map = provider.load().await.unwrap().unwrap();
        assert_eq!(Value::Object(map), value);
    }
}
