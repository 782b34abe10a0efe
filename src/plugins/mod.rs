//! Plugin contract, registry and compatibility gate.
//!
//! Plugins implement [`PluginUnit`] and are registered once in a
//! [`PluginRegistry`]. Each run the registry builds an [`ExecutionPlan`]:
//!
//! - plugins disabled under `plugins.<id>` in the configuration are skipped
//! - plugins whose component requirements exceed the host versions are skipped
//! - the rest run by ascending priority, ties broken by registration order

mod error;
mod metadata;
mod registry;
mod unit;
pub mod version;

pub use error::PluginError;
pub use metadata::{PluginMetadata, normalize_tags};
pub use registry::{Deactivation, ExecutionPlan, PluginRecord, PluginRegistry};
pub use unit::{DEFAULT_PRIORITY, FnPlugin, FnPluginBuilder, PluginUnit, describe, normalize_requires};
pub use version::{
    BASELINE_VERSION, CompareOp, CompatibilityResult, ComponentVersions, HostComponent, Version,
    check_compatibility, compare_versions, compatibility_report, incompatible_components,
};
