//! Aggregated outcome of a run.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Outcome of one plugin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionItem {
    pub plugin_id: String,
    pub name: String,
    pub success: bool,
    pub duration: Duration,
    /// Empty on success.
    pub error: String,
}

impl ExecutionItem {
    pub fn succeeded(plugin_id: impl Into<String>, name: impl Into<String>, duration: Duration) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            name: name.into(),
            success: true,
            duration,
            error: String::new(),
        }
    }

    pub fn failed(
        plugin_id: impl Into<String>,
        name: impl Into<String>,
        duration: Duration,
        error: impl Into<String>,
    ) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            name: name.into(),
            success: false,
            duration,
            error: error.into(),
        }
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration.as_secs_f64() * 1000.0
    }
}

/// A registered plugin that was left out of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedPlugin {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub items: Vec<ExecutionItem>,
    pub skipped: Vec<SkippedPlugin>,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
}

impl Default for ExecutionReport {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionReport {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            skipped: Vec::new(),
            cancelled: false,
            started_at: Utc::now(),
        }
    }

    pub fn add(&mut self, item: ExecutionItem) {
        self.items.push(item);
    }

    pub fn skip(&mut self, id: impl Into<String>, reason: impl Into<String>) {
        self.skipped.push(SkippedPlugin {
            id: id.into(),
            reason: reason.into(),
        });
    }

    /// True when every executed plugin succeeded. An empty report is ok.
    pub fn ok(&self) -> bool {
        self.items.iter().all(|i| i.success)
    }

    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|i| i.success).count()
    }

    pub fn failed(&self) -> usize {
        self.items.len() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ExecutionItem> {
        self.items.iter().filter(|i| !i.success)
    }

    pub fn get(&self, plugin_id: &str) -> Option<&ExecutionItem> {
        self.items.iter().find(|i| i.plugin_id == plugin_id)
    }

    pub fn total_duration(&self) -> Duration {
        self.items.iter().map(|i| i.duration).sum()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ExecutionItem> {
        self.items.iter()
    }

    /// `Plugins: <ok>/<total> ok, <failed> failed, total time <ms> ms`
    pub fn summary(&self) -> String {
        format!(
            "Plugins: {}/{} ok, {} failed, total time {:.1} ms",
            self.succeeded(),
            self.items.len(),
            self.failed(),
            self.total_duration().as_secs_f64() * 1000.0
        )
    }
}

impl IntoIterator for ExecutionReport {
    type Item = ExecutionItem;
    type IntoIter = std::vec::IntoIter<ExecutionItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a ExecutionReport {
    type Item = &'a ExecutionItem;
    type IntoIter = std::slice::Iter<'a, ExecutionItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
