//! Sequential, fault-isolated execution of the registered plugins.

mod progress;
mod report;

pub use progress::{ProgressSink, RunPhase, TracingSink};
pub use report::{ExecutionItem, ExecutionReport, SkippedPlugin};

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::config::{EnvConfigProvider, WorkspaceConfigLoader, resolve_timeout, timeout_budget};
use crate::context::ExecutionContext;
use crate::plugins::{ComponentVersions, PluginError, PluginRecord, PluginRegistry};

/// Runs every eligible plugin against a workspace and aggregates the results.
///
/// Configuration is reloaded on each run. A failing, panicking or timed-out
/// plugin is recorded in the report and the run moves on to the next one.
pub struct Orchestrator {
    registry: Arc<PluginRegistry>,
    host: ComponentVersions,
    env: EnvConfigProvider,
    loader: WorkspaceConfigLoader,
    progress: Arc<dyn ProgressSink>,
}

impl Orchestrator {
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self {
            registry,
            host: ComponentVersions::default(),
            env: EnvConfigProvider::new(),
            loader: WorkspaceConfigLoader::new(),
            progress: Arc::new(TracingSink),
        }
    }

    pub fn with_host_versions(mut self, host: ComponentVersions) -> Self {
        self.host = host;
        self
    }

    pub fn with_env(mut self, env: EnvConfigProvider) -> Self {
        self.env = env;
        self
    }

    pub fn with_loader(mut self, loader: WorkspaceConfigLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_progress(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.progress = Arc::new(sink);
        self
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn host_versions(&self) -> &ComponentVersions {
        &self.host
    }

    /// Execute one run.
    ///
    /// Returns `None` when there is no workspace, the root is not a
    /// directory, or the configuration disables the engine. A cancelled run
    /// still yields a report holding the plugins that completed.
    #[instrument(name = "bcasl_run", skip_all, fields(workspace = ?workspace))]
    pub async fn run(
        &self,
        workspace: Option<&Path>,
        cancel: &CancellationToken,
    ) -> Option<ExecutionReport> {
        let Some(root) = workspace else {
            self.progress.message("No workspace selected");
            return None;
        };
        if !root.is_dir() {
            tracing::warn!(root = %root.display(), "Workspace is not a directory");
            self.progress
                .message(&format!("Workspace not found: {}", root.display()));
            return None;
        }

        self.enter(RunPhase::LoadingConfig);
        let config = Arc::new(self.loader.load(root).await);
        if !config.options.enabled {
            self.progress.message("BCASL disabled by configuration");
            self.enter(RunPhase::Idle);
            return None;
        }
        let budget = timeout_budget(resolve_timeout(&config, &self.env));

        self.enter(RunPhase::FilteringPlugins);
        let plan = self.registry.plan(&config, &self.host);
        let mut report = ExecutionReport::new();
        for record in plan.skipped() {
            let reason = record
                .deactivation()
                .map(ToString::to_string)
                .unwrap_or_default();
            self.progress
                .message(&format!("Skipping {}: {reason}", record.id()));
            report.skip(record.id(), reason);
        }

        self.enter(RunPhase::Ordering);
        for advisory in plan.advisories() {
            self.progress.message(advisory);
        }
        let order = plan.scheduled_ids();
        if order.is_empty() {
            self.progress.message("No plugins to run");
        } else {
            self.progress
                .message(&format!("Execution order: {}", order.join(", ")));
        }

        self.enter(RunPhase::Running);
        let ctx = ExecutionContext::with_cancellation(root, config, cancel.clone());
        for record in plan.scheduled() {
            if cancel.is_cancelled() {
                tracing::info!(next = record.id(), "Run cancelled");
                self.progress.message("Run cancelled");
                report.cancelled = true;
                break;
            }

            self.progress.message(&format!("Running {record}"));
            let item = execute_record(record, &ctx, budget).await;
            if item.success {
                self.progress.message(&format!(
                    "{} finished in {:.1} ms",
                    item.plugin_id,
                    item.duration_ms()
                ));
            } else {
                self.progress
                    .message(&format!("{} failed: {}", item.plugin_id, item.error));
            }
            report.add(item);
        }

        self.enter(RunPhase::Reporting);
        let summary = report.summary();
        tracing::info!(
            ok = report.ok(),
            cancelled = report.cancelled,
            skipped = report.skipped.len(),
            "{summary}"
        );
        self.progress.message(&summary);
        self.enter(RunPhase::Idle);
        Some(report)
    }

    fn enter(&self, phase: RunPhase) {
        tracing::debug!(phase = %phase, "Entering phase");
        self.progress.phase_changed(phase);
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("plugins", &self.registry.plugin_ids())
            .field("host", &self.host)
            .finish()
    }
}

async fn execute_record(
    record: &PluginRecord,
    ctx: &ExecutionContext,
    budget: Option<Duration>,
) -> ExecutionItem {
    let id = record.id();
    let started = Instant::now();
    let guarded = AssertUnwindSafe(record.unit().execute(ctx)).catch_unwind();

    let outcome = match budget {
        Some(limit) => match timeout(limit, guarded).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!(plugin = id, timeout_secs = limit.as_secs_f64(), "Plugin timed out");
                let err = PluginError::Timeout {
                    plugin: id.to_string(),
                    timeout: limit,
                };
                return ExecutionItem::failed(id, record.name(), started.elapsed(), err.to_string());
            }
        },
        None => guarded.await,
    };
    let elapsed = started.elapsed();

    match outcome {
        Ok(Ok(())) => ExecutionItem::succeeded(id, record.name(), elapsed),
        Ok(Err(e)) => {
            tracing::warn!(plugin = id, error = %e, "Plugin execution failed");
            ExecutionItem::failed(id, record.name(), elapsed, e.to_string())
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(plugin = id, panic = %message, "Plugin panicked during execution");
            let err = PluginError::Panicked {
                plugin: id.to_string(),
                message,
            };
            ExecutionItem::failed(id, record.name(), elapsed, err.to_string())
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
