//! Include/exclude file discovery relative to a workspace root.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glob::{MatchOptions, Pattern};

use super::ExecutionContext;

/// Include pattern used when none is given.
pub const ALL_FILES: &str = "**/*";

/// Shell-style matching: `*` also crosses `/`, dotfiles match wildcards.
const EXCLUDE_MATCH: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Cache key: sorted include and exclude pattern sets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatternKey {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl PatternKey {
    pub fn new(include: &[String], exclude: &[String]) -> Self {
        let mut include = include.to_vec();
        let mut exclude = exclude.to_vec();
        include.sort();
        exclude.sort();
        Self { include, exclude }
    }
}

pub(crate) fn normalize_patterns<S: AsRef<str>>(patterns: &[S]) -> Vec<String> {
    patterns
        .iter()
        .map(|p| {
            let p = p.as_ref().trim();
            p.strip_prefix("./").unwrap_or(p).to_string()
        })
        .filter(|p| !p.is_empty())
        .collect()
}

/// Compiled exclude patterns; invalid ones are dropped with a warning.
#[derive(Debug, Clone, Default)]
pub struct ExcludeSet {
    patterns: Vec<Pattern>,
}

impl ExcludeSet {
    pub fn new(patterns: &[String]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|raw| match Pattern::new(raw) {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::warn!(pattern = %raw, error = %e, "Skipping invalid exclude pattern");
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    /// Match a workspace-relative path, using `/` as separator.
    pub fn is_excluded(&self, relative: &Path) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        let rel = to_slash(relative);
        self.patterns
            .iter()
            .any(|p| p.matches_with(&rel, EXCLUDE_MATCH))
    }
}

pub(crate) fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Lazy iterator over discovered files.
///
/// Paths are yielded as found. The full result is cached only once the
/// iterator has been drained, so a partially consumed scan leaves the cache
/// untouched.
pub struct FileIter {
    state: State,
}

enum State {
    Cached {
        paths: Arc<[PathBuf]>,
        pos: usize,
    },
    Scanning(Box<Scan>),
    Done,
}

struct Scan {
    ctx: ExecutionContext,
    key: Option<PatternKey>,
    includes: std::vec::IntoIter<String>,
    current: Option<glob::Paths>,
    excludes: ExcludeSet,
    seen: HashSet<PathBuf>,
    collected: Vec<PathBuf>,
}

impl FileIter {
    pub(crate) fn cached(paths: Arc<[PathBuf]>) -> Self {
        Self {
            state: State::Cached { paths, pos: 0 },
        }
    }

    pub(crate) fn scan(
        ctx: ExecutionContext,
        include: Vec<String>,
        exclude: &[String],
        key: Option<PatternKey>,
    ) -> Self {
        Self {
            state: State::Scanning(Box::new(Scan {
                ctx,
                key,
                includes: include.into_iter(),
                current: None,
                excludes: ExcludeSet::new(exclude),
                seen: HashSet::new(),
                collected: Vec::new(),
            })),
        }
    }

    /// Whether the paths come from the context cache.
    pub fn is_cached(&self) -> bool {
        matches!(self.state, State::Cached { .. })
    }
}

impl Iterator for FileIter {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        match &mut self.state {
            State::Cached { paths, pos } => {
                let next = paths.get(*pos).cloned();
                *pos += 1;
                next
            }
            State::Scanning(scan) => match scan.advance() {
                Some(path) => Some(path),
                None => {
                    if let State::Scanning(scan) = std::mem::replace(&mut self.state, State::Done) {
                        scan.finish();
                    }
                    None
                }
            },
            State::Done => None,
        }
    }
}

impl Scan {
    fn advance(&mut self) -> Option<PathBuf> {
        let root = self.ctx.workspace_root().to_path_buf();
        loop {
            let Some(paths) = self.current.as_mut() else {
                let pattern = self.includes.next()?;
                self.current = expand(&root, &pattern);
                continue;
            };

            let path = match paths.next() {
                Some(Ok(path)) => path,
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "Unreadable path during discovery");
                    continue;
                }
                None => {
                    self.current = None;
                    continue;
                }
            };

            if !path.is_file() {
                continue;
            }
            let relative = path.strip_prefix(&root).unwrap_or(path.as_path());
            if self.excludes.is_excluded(relative) {
                continue;
            }
            let canonical = std::fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
            if !self.ctx.is_within(&canonical) {
                tracing::debug!(path = %path.display(), "Dropping file outside the workspace");
                continue;
            }
            if self.seen.insert(canonical) {
                self.collected.push(path.clone());
                return Some(path);
            }
        }
    }

    fn finish(self) {
        if let Some(key) = self.key {
            self.ctx.store_cached(key, Arc::from(self.collected));
        }
    }
}

fn expand(root: &Path, pattern: &str) -> Option<glob::Paths> {
    let full = if Path::new(pattern).is_absolute() {
        pattern.to_string()
    } else {
        let base = Pattern::escape(&root.to_string_lossy());
        format!("{}/{}", base.trim_end_matches(['/', '\\']), pattern)
    };
    match glob::glob(&full) {
        Ok(paths) => Some(paths),
        Err(e) => {
            tracing::warn!(pattern, error = %e, "Skipping invalid include pattern");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(patterns: &[&str]) -> ExcludeSet {
        let owned: Vec<String> = patterns.iter().map(|s| s.to_string()).collect();
        ExcludeSet::new(&owned)
    }

    #[test]
    fn test_exclude_wildcards_cross_directories() {
        let excludes = set(&["*.pyc", "build/**", "**/__pycache__/**"]);
        assert!(excludes.is_excluded(Path::new("pkg/mod.pyc")));
        assert!(excludes.is_excluded(Path::new("build/lib/a.py")));
        assert!(excludes.is_excluded(Path::new("pkg/__pycache__/a.cpython.pyc")));
        assert!(excludes.is_excluded(Path::new("__pycache__/a.pyc")));
        assert!(!excludes.is_excluded(Path::new("src/build.py")));
    }

    #[test]
    fn test_exclude_dotfiles() {
        let excludes = set(&[".venv/**", "*/.hidden"]);
        assert!(excludes.is_excluded(Path::new(".venv/lib/site.py")));
        assert!(excludes.is_excluded(Path::new("a/.hidden")));
    }

    #[test]
    fn test_invalid_exclude_dropped() {
        let excludes = set(&["[", "*.tmp"]);
        assert!(excludes.is_excluded(Path::new("x.tmp")));
        assert!(!excludes.is_excluded(Path::new("x.py")));
    }

    #[test]
    fn test_pattern_key_ignores_order() {
        let a = PatternKey::new(
            &["src/**/*.py".into(), "*.py".into()],
            &["b/**".into(), "a/**".into()],
        );
        let b = PatternKey::new(
            &["*.py".into(), "src/**/*.py".into()],
            &["a/**".into(), "b/**".into()],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_normalize_patterns() {
        assert_eq!(
            normalize_patterns(&["./src/*.py", "  ", " *.txt "]),
            vec!["src/*.py", "*.txt"]
        );
    }
}
