//! Lenient semantic versions and the host compatibility gate.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Version every component requirement defaults to.
pub const BASELINE_VERSION: &str = "1.0.0";

/// A `major.minor.patch` triple compared lexicographically.
///
/// Parsing never fails: pre-release and build suffixes are dropped, missing
/// parts are zero and anything unparsable becomes `0.0.0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn parse(input: &str) -> Self {
        Self::parse_strict(input).unwrap_or_default()
    }

    fn parse_strict(input: &str) -> Option<Self> {
        let s = input.trim();
        let s = s.strip_suffix('+').map(str::trim_end).unwrap_or(s);
        let s = s.split('+').next().unwrap_or_default();
        let s = s.split('-').next().unwrap_or_default();

        let mut parts = s.split('.');
        let mut next = |required: bool| -> Option<u64> {
            match parts.next() {
                Some(p) => p.trim().parse().ok(),
                None if required => None,
                None => Some(0),
            }
        };
        Some(Self::new(next(true)?, next(false)?, next(false)?))
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Comparison modes accepted by [`compare_versions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Gte,
    Gt,
    Eq,
    Lte,
    Lt,
}

impl CompareOp {
    pub fn holds(self, left: Version, right: Version) -> bool {
        match self {
            Self::Gte => left >= right,
            Self::Gt => left > right,
            Self::Eq => left == right,
            Self::Lte => left <= right,
            Self::Lt => left < right,
        }
    }
}

impl FromStr for CompareOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gte" | ">=" => Ok(Self::Gte),
            "gt" | ">" => Ok(Self::Gt),
            "eq" | "==" => Ok(Self::Eq),
            "lte" | "<=" => Ok(Self::Lte),
            "lt" | "<" => Ok(Self::Lt),
            other => Err(format!("unknown comparison mode '{other}'")),
        }
    }
}

/// Compare two version strings; an unknown `mode` yields `false`.
pub fn compare_versions(left: &str, right: &str, mode: &str) -> bool {
    mode.parse::<CompareOp>()
        .map(|op| op.holds(Version::parse(left), Version::parse(right)))
        .unwrap_or(false)
}

/// Host components a plugin can declare a minimum version for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostComponent {
    Bcasl,
    Core,
    PluginsSdk,
    BcPluginContext,
    GeneralContext,
}

impl HostComponent {
    pub const ALL: [HostComponent; 5] = [
        Self::Bcasl,
        Self::Core,
        Self::PluginsSdk,
        Self::BcPluginContext,
        Self::GeneralContext,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Bcasl => "BCASL",
            Self::Core => "Core",
            Self::PluginsSdk => "Plugins SDK",
            Self::BcPluginContext => "BcPluginContext",
            Self::GeneralContext => "GeneralContext",
        }
    }

    /// Short label used in plugin listings.
    pub fn label(self) -> &'static str {
        match self {
            Self::Bcasl => "bcasl",
            Self::Core => "core",
            Self::PluginsSdk => "sdk",
            Self::BcPluginContext => "bc",
            Self::GeneralContext => "gc",
        }
    }
}

impl fmt::Display for HostComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One version string per [`HostComponent`].
///
/// Used both for the versions a host provides and for the minimum versions a
/// plugin requires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentVersions {
    pub bcasl: String,
    pub core: String,
    pub plugins_sdk: String,
    pub bc_plugin_context: String,
    pub general_context: String,
}

impl Default for ComponentVersions {
    fn default() -> Self {
        Self {
            bcasl: BASELINE_VERSION.into(),
            core: BASELINE_VERSION.into(),
            plugins_sdk: BASELINE_VERSION.into(),
            bc_plugin_context: BASELINE_VERSION.into(),
            general_context: BASELINE_VERSION.into(),
        }
    }
}

impl ComponentVersions {
    pub fn get(&self, component: HostComponent) -> &str {
        match component {
            HostComponent::Bcasl => &self.bcasl,
            HostComponent::Core => &self.core,
            HostComponent::PluginsSdk => &self.plugins_sdk,
            HostComponent::BcPluginContext => &self.bc_plugin_context,
            HostComponent::GeneralContext => &self.general_context,
        }
    }

    pub fn set(&mut self, component: HostComponent, version: impl Into<String>) {
        let slot = match component {
            HostComponent::Bcasl => &mut self.bcasl,
            HostComponent::Core => &mut self.core,
            HostComponent::PluginsSdk => &mut self.plugins_sdk,
            HostComponent::BcPluginContext => &mut self.bc_plugin_context,
            HostComponent::GeneralContext => &mut self.general_context,
        };
        *slot = version.into();
    }

    pub fn with(mut self, component: HostComponent, version: impl Into<String>) -> Self {
        self.set(component, version);
        self
    }

    /// Components whose version differs from [`BASELINE_VERSION`].
    pub fn non_baseline(&self) -> impl Iterator<Item = (HostComponent, &str)> {
        HostComponent::ALL
            .into_iter()
            .map(move |c| (c, self.get(c)))
            .filter(|(_, v)| v.trim() != BASELINE_VERSION)
    }
}

/// Outcome of checking one component requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompatibilityResult {
    pub is_compatible: bool,
    pub component: HostComponent,
    pub component_name: String,
    pub component_version: String,
    pub required_version: String,
    pub message: String,
}

impl CompatibilityResult {
    pub fn check(component: HostComponent, actual: &str, required: &str) -> Self {
        let is_compatible = Version::parse(actual) >= Version::parse(required);
        let message = if is_compatible {
            format!("Compatible: {} {actual} satisfies >= {required}", component.name())
        } else {
            format!(
                "{} {actual} does not meet the required version {required}",
                component.name()
            )
        };
        Self {
            is_compatible,
            component,
            component_name: component.name().to_string(),
            component_version: actual.to_string(),
            required_version: required.to_string(),
            message,
        }
    }
}

/// Check every component requirement against the host versions.
pub fn check_compatibility(
    required: &ComponentVersions,
    host: &ComponentVersions,
) -> Vec<CompatibilityResult> {
    HostComponent::ALL
        .into_iter()
        .map(|c| CompatibilityResult::check(c, host.get(c), required.get(c)))
        .collect()
}

pub fn incompatible_components(results: &[CompatibilityResult]) -> Vec<&CompatibilityResult> {
    results.iter().filter(|r| !r.is_compatible).collect()
}

/// Multi-line human-readable report ending in a count summary.
pub fn compatibility_report(results: &[CompatibilityResult]) -> String {
    let mut out = String::new();
    for r in results {
        let mark = if r.is_compatible { "ok" } else { "!!" };
        out.push_str(&format!("[{mark}] {}: {}\n", r.component_name, r.message));
    }
    let bad = incompatible_components(results).len();
    out.push_str(&format!(
        "{} compatible, {} incompatible",
        results.len() - bad,
        bad
    ));
    out
}
