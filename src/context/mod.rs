//! Workspace-scoped context handed to every plugin in a run.

mod files;

pub use files::{ALL_FILES, ExcludeSet, FileIter, PatternKey};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::config::{BcaslConfig, CONFIG_FILE_NAMES};
use files::normalize_patterns;

/// Read-only facts about the workspace, derived from its configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceMetadata {
    pub workspace_name: String,
    pub workspace_path: PathBuf,
    pub file_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub required_files: Vec<String>,
}

impl WorkspaceMetadata {
    fn derive(root: &Path, config: &BcaslConfig) -> Self {
        Self {
            workspace_name: root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            workspace_path: root.to_path_buf(),
            file_patterns: config.file_patterns.clone(),
            exclude_patterns: config.exclude_patterns.clone(),
            required_files: config.required_files.clone(),
        }
    }
}

struct ContextInner {
    root: PathBuf,
    canonical_root: Option<PathBuf>,
    config: Arc<BcaslConfig>,
    metadata: WorkspaceMetadata,
    cache: DashMap<PatternKey, Arc<[PathBuf]>>,
    cancel: CancellationToken,
}

/// Shared, cheaply cloneable view of one run's workspace.
///
/// The configuration is an immutable snapshot. File discovery results are
/// cached per pattern set for the lifetime of the context when
/// `options.iter_files_cache` is on.
#[derive(Clone)]
pub struct ExecutionContext {
    inner: Arc<ContextInner>,
}

impl ExecutionContext {
    pub fn new(root: impl Into<PathBuf>, config: Arc<BcaslConfig>) -> Self {
        Self::with_cancellation(root, config, CancellationToken::new())
    }

    /// Create a context whose plugins can observe `cancel`.
    pub fn with_cancellation(
        root: impl Into<PathBuf>,
        config: Arc<BcaslConfig>,
        cancel: CancellationToken,
    ) -> Self {
        let root = root.into();
        let canonical_root = std::fs::canonicalize(&root).ok();
        let metadata = WorkspaceMetadata::derive(&root, &config);
        Self {
            inner: Arc::new(ContextInner {
                root,
                canonical_root,
                config,
                metadata,
                cache: DashMap::new(),
                cancel,
            }),
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.inner.root
    }

    pub fn workspace_name(&self) -> &str {
        &self.inner.metadata.workspace_name
    }

    pub fn workspace_metadata(&self) -> &WorkspaceMetadata {
        &self.inner.metadata
    }

    pub fn config(&self) -> &BcaslConfig {
        &self.inner.config
    }

    pub fn file_patterns(&self) -> &[String] {
        &self.inner.config.file_patterns
    }

    pub fn exclude_patterns(&self) -> &[String] {
        &self.inner.config.exclude_patterns
    }

    pub fn required_files(&self) -> &[String] {
        &self.inner.config.required_files
    }

    /// Whether `name` is a required file and exists in the workspace.
    pub fn has_required_file(&self, name: &str) -> bool {
        self.required_files().iter().any(|f| f == name) && self.inner.root.join(name).is_file()
    }

    /// Settings mapping for a plugin, when its entry is a mapping.
    pub fn plugin_settings(&self, id: &str) -> Option<&Map<String, Value>> {
        self.inner
            .config
            .plugin_setting(id)
            .and_then(|s| s.settings())
    }

    /// The root is a directory and carries a workspace configuration file.
    pub fn is_workspace_valid(&self) -> bool {
        let root = &self.inner.root;
        root.is_dir() && CONFIG_FILE_NAMES.iter().any(|n| root.join(n).is_file())
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.inner.cancel
    }

    /// Whether `path` falls under the configured exclude patterns.
    ///
    /// Relative paths are taken as workspace-relative.
    pub fn is_excluded(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.inner.root).unwrap_or(path);
        ExcludeSet::new(self.exclude_patterns()).is_excluded(relative)
    }

    /// With `options.sandbox` on, only paths under the canonical root pass.
    pub fn is_within(&self, canonical: &Path) -> bool {
        if !self.inner.config.options.sandbox {
            return true;
        }
        match &self.inner.canonical_root {
            Some(root) => canonical.starts_with(root),
            None => true,
        }
    }

    /// Files matching any `include` glob and no `exclude` glob.
    ///
    /// An empty `include` means every file. Matches are deduplicated by
    /// canonical path and ordered by include pattern, then glob order. With
    /// caching on, a repeated call for the same pattern sets (in any order)
    /// returns the first complete result even if the filesystem changed.
    pub fn iter_files<S: AsRef<str>>(&self, include: &[S], exclude: &[S]) -> FileIter {
        let mut include = normalize_patterns(include);
        if include.is_empty() {
            include.push(ALL_FILES.to_string());
        }
        let exclude = normalize_patterns(exclude);

        if !self.inner.config.options.iter_files_cache {
            return FileIter::scan(self.clone(), include, &exclude, None);
        }

        let key = PatternKey::new(&include, &exclude);
        if let Some(hit) = self.inner.cache.get(&key) {
            return FileIter::cached(Arc::clone(hit.value()));
        }
        FileIter::scan(self.clone(), include, &exclude, Some(key))
    }

    /// [`Self::iter_files`] with the configured patterns.
    pub fn configured_files(&self) -> FileIter {
        self.iter_files(self.file_patterns(), self.exclude_patterns())
    }

    /// Every file matching a single glob, without exclusion or caching.
    pub fn workspace_files(&self, pattern: &str) -> Vec<PathBuf> {
        let pattern = normalize_patterns(&[pattern]);
        let include = if pattern.is_empty() {
            vec![ALL_FILES.to_string()]
        } else {
            pattern
        };
        FileIter::scan(self.clone(), include, &[], None).collect()
    }

    /// Run discovery on the blocking pool and collect the result.
    pub async fn collect_files(
        &self,
        include: Vec<String>,
        exclude: Vec<String>,
    ) -> crate::Result<Vec<PathBuf>> {
        let ctx = self.clone();
        tokio::task::spawn_blocking(move || {
            ctx.iter_files(&include[..], &exclude[..]).collect::<Vec<_>>()
        })
        .await
        .map_err(|e| crate::Error::Internal(format!("file discovery task failed: {e}")))
    }

    /// Number of pattern sets with a cached result.
    pub fn cached_pattern_sets(&self) -> usize {
        self.inner.cache.len()
    }

    pub(crate) fn store_cached(&self, key: PatternKey, paths: Arc<[PathBuf]>) {
        self.inner.cache.entry(key).or_insert(paths);
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("root", &self.inner.root)
            .field("cached_pattern_sets", &self.inner.cache.len())
            .field("cancelled", &self.inner.cancel.is_cancelled())
            .finish()
    }
}
