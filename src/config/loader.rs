//! Workspace configuration loader.
//!
//! Resolution order, highest first: `bcasl.yaml`, `bcasl.yml`, `bcasl.json`,
//! `.bcasl.json`, then generated defaults. The project file
//! (`ARK_Main_Config.yml`) is overlaid on whichever source won.

use std::path::Path;
use std::time::Duration;

use super::composite::CompositeConfigProvider;
use super::env::EnvConfigProvider;
use super::file::FileConfigProvider;
use super::project::ProjectConfig;
use super::settings::{BcaslConfig, KNOWN_MANIFESTS};
use super::{ConfigError, ConfigResult};

pub const CONFIG_FILE_NAMES: [&str; 4] = ["bcasl.yaml", "bcasl.yml", "bcasl.json", ".bcasl.json"];

/// File written when no usable configuration exists.
pub const DEFAULT_CONFIG_FILE: &str = "bcasl.json";

/// Used when neither configuration nor environment sets a budget.
/// Non-positive means plugins run without a time limit.
pub const DEFAULT_PLUGIN_TIMEOUT_SECS: f64 = 0.0;

#[derive(Debug, Clone)]
pub struct WorkspaceConfigLoader {
    write_default: bool,
}

impl Default for WorkspaceConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkspaceConfigLoader {
    pub fn new() -> Self {
        Self {
            write_default: true,
        }
    }

    /// Never write a default file to disk.
    pub fn read_only(mut self) -> Self {
        self.write_default = false;
        self
    }

    /// Candidate configuration files for `root`, highest priority first.
    pub fn providers(root: &Path) -> CompositeConfigProvider {
        CONFIG_FILE_NAMES
            .iter()
            .fold(CompositeConfigProvider::new(), |composite, name| {
                composite.provider(Box::new(FileConfigProvider::new(root.join(name))))
            })
    }

    /// Load the normalized configuration for `root`.
    ///
    /// This never fails: unusable sources are logged and skipped, and the
    /// defaults are used when nothing else is available.
    pub async fn load(&self, root: impl AsRef<Path>) -> BcaslConfig {
        let root = root.as_ref();

        let mut config = match Self::providers(root).load_first().await {
            Some((source, map)) => {
                tracing::debug!(source, root = %root.display(), "Loaded workspace configuration");
                BcaslConfig::from_mapping(map)
            }
            None => {
                let config = Self::generated_default(root);
                if self.write_default
                    && root.is_dir()
                    && let Err(e) = Self::write_default_file(root, &config).await
                {
                    tracing::warn!(
                        file = DEFAULT_CONFIG_FILE,
                        error = %e,
                        "Could not write default configuration"
                    );
                }
                config
            }
        };

        if let Some(project) = ProjectConfig::load(root).await {
            project.apply(&mut config);
        }
        config
    }

    /// Defaults, plus any well-known manifest present in `root` as a required file.
    pub fn generated_default(root: &Path) -> BcaslConfig {
        let mut config = BcaslConfig::default();
        for manifest in KNOWN_MANIFESTS {
            if root.join(manifest).is_file() && !config.required_files.iter().any(|f| f == manifest)
            {
                config.required_files.push(manifest.to_string());
            }
        }
        config
    }

    async fn write_default_file(root: &Path, config: &BcaslConfig) -> ConfigResult<()> {
        let provider = FileConfigProvider::new(root.join(DEFAULT_CONFIG_FILE));
        if provider.exists() {
            // Present but unusable; leave the user's file alone.
            return Ok(());
        }
        let value = config.to_value().map_err(ConfigError::Json)?;
        provider.save(&value).await?;
        tracing::info!(path = %provider.path().display(), "Wrote default configuration");
        Ok(())
    }
}

/// Resolve the per-plugin budget in seconds.
///
/// A strictly positive `options.plugin_timeout_s` wins, then the environment
/// override, then [`DEFAULT_PLUGIN_TIMEOUT_SECS`]. Zero in the configuration
/// counts as unset.
pub fn resolve_timeout(config: &BcaslConfig, env: &EnvConfigProvider) -> f64 {
    let configured = config.options.plugin_timeout_s;
    if configured.is_finite() && configured > 0.0 {
        return configured;
    }
    env.plugin_timeout().unwrap_or(DEFAULT_PLUGIN_TIMEOUT_SECS)
}

/// Convert a resolved budget into a duration; `None` means unlimited.
///
/// Values too large to represent are treated as unlimited.
pub fn timeout_budget(secs: f64) -> Option<Duration> {
    if !(secs.is_finite() && secs > 0.0) {
        return None;
    }
    match Duration::try_from_secs_f64(secs) {
        Ok(budget) => Some(budget),
        Err(e) => {
            tracing::warn!(
                timeout_secs = secs,
                error = %e,
                "Plugin timeout out of range, running without a limit"
            );
            None
        }
    }
}
