//! Plugin registry and per-run execution planning.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::PluginError;
use super::unit::{PluginUnit, describe};
use super::version::{
    CompatibilityResult, ComponentVersions, check_compatibility, incompatible_components,
};
use crate::config::BcaslConfig;

/// Registered plugins, kept in registration order.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn PluginUnit>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: PluginUnit + 'static>(&mut self, plugin: P) -> Result<(), PluginError> {
        self.register_arc(Arc::new(plugin))
    }

    pub fn register_arc(&mut self, plugin: Arc<dyn PluginUnit>) -> Result<(), PluginError> {
        let id = plugin.metadata().id();
        if self.has_plugin(id) {
            return Err(PluginError::DuplicateId { id: id.to_string() });
        }
        tracing::debug!(plugin = id, priority = plugin.priority(), "Registered plugin");
        self.plugins.push(plugin);
        Ok(())
    }

    /// Builder-style registration.
    pub fn with<P: PluginUnit + 'static>(mut self, plugin: P) -> Result<Self, PluginError> {
        self.register(plugin)?;
        Ok(self)
    }

    pub fn unregister(&mut self, id: &str) -> bool {
        let before = self.plugins.len();
        self.plugins.retain(|p| p.metadata().id() != id);
        self.plugins.len() != before
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn PluginUnit>> {
        self.plugins.iter().find(|p| p.metadata().id() == id)
    }

    pub fn has_plugin(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn plugin_ids(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.metadata().id()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn PluginUnit>> {
        self.plugins.iter()
    }

    /// Decide eligibility and execution order for one run.
    ///
    /// A plugin is skipped when its configuration entry disables it or when
    /// any of its component requirements exceeds the host version. Eligible
    /// plugins are ordered by `(priority, registration index)`. Declared
    /// `requires` and `plugin_order` never change that order; deviations are
    /// recorded as advisories.
    pub fn plan(&self, config: &BcaslConfig, host: &ComponentVersions) -> ExecutionPlan {
        let mut records: Vec<PluginRecord> = self
            .plugins
            .iter()
            .enumerate()
            .map(|(index, unit)| {
                let id = unit.metadata().id();
                let deactivation = if !config.is_plugin_enabled(id) {
                    Some(Deactivation::Disabled)
                } else {
                    let results = check_compatibility(unit.metadata().requirements(), host);
                    let failed: Vec<CompatibilityResult> = incompatible_components(&results)
                        .into_iter()
                        .cloned()
                        .collect();
                    (!failed.is_empty()).then_some(Deactivation::Incompatible(failed))
                };
                if let Some(reason) = &deactivation {
                    tracing::info!(plugin = id, reason = %reason, "Plugin skipped");
                }
                PluginRecord {
                    unit: Arc::clone(unit),
                    insertion_index: index,
                    order: None,
                    deactivation,
                }
            })
            .collect();

        let mut schedule: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_active())
            .map(|(i, _)| i)
            .collect();
        schedule.sort_by_key(|&i| (records[i].priority(), records[i].insertion_index));
        for (position, &i) in schedule.iter().enumerate() {
            records[i].order = Some(position);
        }

        let advisories = advisories(&records, &schedule, &config.plugin_order);
        for note in &advisories {
            tracing::info!(note = %note, "Scheduling advisory");
        }

        ExecutionPlan {
            records,
            schedule,
            advisories,
        }
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.plugin_ids())
            .finish()
    }
}

fn advisories(records: &[PluginRecord], schedule: &[usize], plugin_order: &[String]) -> Vec<String> {
    let position: HashMap<&str, usize> = schedule
        .iter()
        .map(|&i| (records[i].id(), records[i].order.unwrap_or(i)))
        .collect();

    let mut notes = Vec::new();
    for &i in schedule {
        let record = &records[i];
        for dep in record.unit.requires() {
            match position.get(dep.as_str()) {
                Some(&p) if Some(p) < record.order => {}
                Some(_) => notes.push(format!(
                    "'{}' requires '{dep}', which is scheduled after it",
                    record.id()
                )),
                None => notes.push(format!(
                    "'{}' requires '{dep}', which is not scheduled",
                    record.id()
                )),
            }
        }
    }

    let hinted: Vec<&str> = plugin_order
        .iter()
        .map(String::as_str)
        .filter(|id| position.contains_key(id))
        .collect();
    let mut actual = hinted.clone();
    actual.sort_by_key(|id| position[id]);
    if hinted != actual {
        notes.push(format!(
            "plugin_order [{}] differs from priority order [{}]",
            hinted.join(", "),
            actual.join(", ")
        ));
    }
    notes
}

/// Why a plugin was left out of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum Deactivation {
    Disabled,
    Incompatible(Vec<CompatibilityResult>),
}

impl fmt::Display for Deactivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("disabled by configuration"),
            Self::Incompatible(results) => {
                let parts: Vec<&str> = results.iter().map(|r| r.message.as_str()).collect();
                write!(f, "incompatible: {}", parts.join("; "))
            }
        }
    }
}

/// Per-run view of a registered plugin.
#[derive(Clone)]
pub struct PluginRecord {
    unit: Arc<dyn PluginUnit>,
    insertion_index: usize,
    order: Option<usize>,
    deactivation: Option<Deactivation>,
}

impl PluginRecord {
    pub fn unit(&self) -> &Arc<dyn PluginUnit> {
        &self.unit
    }

    pub fn id(&self) -> &str {
        self.unit.metadata().id()
    }

    pub fn name(&self) -> &str {
        self.unit.metadata().name()
    }

    pub fn priority(&self) -> i32 {
        self.unit.priority()
    }

    pub fn insertion_index(&self) -> usize {
        self.insertion_index
    }

    pub fn is_active(&self) -> bool {
        self.deactivation.is_none()
    }

    pub fn deactivation(&self) -> Option<&Deactivation> {
        self.deactivation.as_ref()
    }

    /// Position in the run, for active plugins.
    pub fn order(&self) -> Option<usize> {
        self.order
    }
}

impl fmt::Display for PluginRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&describe(self.unit.as_ref()))
    }
}

impl fmt::Debug for PluginRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRecord")
            .field("id", &self.id())
            .field("insertion_index", &self.insertion_index)
            .field("order", &self.order)
            .field("deactivation", &self.deactivation)
            .finish()
    }
}

/// Result of [`PluginRegistry::plan`].
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    records: Vec<PluginRecord>,
    schedule: Vec<usize>,
    advisories: Vec<String>,
}

impl ExecutionPlan {
    /// Active plugins in execution order.
    pub fn scheduled(&self) -> impl Iterator<Item = &PluginRecord> {
        self.schedule.iter().map(|&i| &self.records[i])
    }

    /// Inactive plugins in registration order.
    pub fn skipped(&self) -> impl Iterator<Item = &PluginRecord> {
        self.records.iter().filter(|r| !r.is_active())
    }

    /// Every plugin in registration order.
    pub fn records(&self) -> &[PluginRecord] {
        &self.records
    }

    pub fn scheduled_ids(&self) -> Vec<&str> {
        self.scheduled().map(PluginRecord::id).collect()
    }

    pub fn advisories(&self) -> &[String] {
        &self.advisories
    }

    pub fn len(&self) -> usize {
        self.schedule.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedule.is_empty()
    }
}
