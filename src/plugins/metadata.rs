//! Immutable plugin metadata.

use serde::Serialize;

use super::PluginError;
use super::version::{ComponentVersions, HostComponent, Version};

/// Identity and requirements of a plugin.
///
/// The id is trimmed on construction and must not be empty. Tags are stored
/// lower-cased with blank entries dropped; duplicates are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginMetadata {
    id: String,
    name: String,
    version: String,
    description: String,
    author: String,
    tags: Vec<String>,
    requirements: ComponentVersions,
}

impl PluginMetadata {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Result<Self, PluginError> {
        let id = id.into().trim().to_string();
        if id.is_empty() {
            return Err(PluginError::InvalidMetadata {
                reason: "id is required".into(),
            });
        }
        Ok(Self {
            id,
            name: name.into(),
            version: version.into(),
            description: String::new(),
            author: String::new(),
            tags: Vec::new(),
            requirements: ComponentVersions::default(),
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = normalize_tags(tags);
        self
    }

    /// Tags given as one comma-separated string, e.g. `"lint, Format"`.
    pub fn with_tag_list(self, tags: &str) -> Self {
        self.with_tags(tags.split(','))
    }

    /// Minimum host version for `component`.
    pub fn requires_version(mut self, component: HostComponent, version: impl Into<String>) -> Self {
        let version: String = version.into();
        self.requirements.set(component, version.trim());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn parsed_version(&self) -> Version {
        Version::parse(&self.version)
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        let tag = tag.trim().to_lowercase();
        self.tags.iter().any(|t| *t == tag)
    }

    pub fn requirements(&self) -> &ComponentVersions {
        &self.requirements
    }
}

pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}
