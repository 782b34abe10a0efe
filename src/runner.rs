//! Background execution of an [`Orchestrator`] run with a completion callback.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::orchestrator::{ExecutionReport, Orchestrator};

type DoneCallback = Box<dyn FnOnce(Option<ExecutionReport>) + Send + 'static>;

/// What [`AsyncRunner::start`] did with the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    NoWorkspace,
    Busy,
    /// Called outside a tokio runtime.
    NoRuntime,
}

impl StartOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started)
    }
}

struct ActiveRun {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

/// Runs one orchestration at a time on a background task.
///
/// The completion callback fires exactly once per `start` call: with the
/// report, or with `None` when the run was rejected, disabled, or aborted.
pub struct AsyncRunner {
    orchestrator: Arc<Orchestrator>,
    running: Arc<AtomicBool>,
    active: Mutex<Option<ActiveRun>>,
}

impl AsyncRunner {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            running: Arc::new(AtomicBool::new(false)),
            active: Mutex::new(None),
        }
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn start<F>(&self, workspace: Option<PathBuf>, on_done: F) -> StartOutcome
    where
        F: FnOnce(Option<ExecutionReport>) + Send + 'static,
    {
        let Some(workspace) = workspace else {
            tracing::info!("No workspace selected, nothing to run");
            on_done(None);
            return StartOutcome::NoWorkspace;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("AsyncRunner::start called outside a tokio runtime");
            on_done(None);
            return StartOutcome::NoRuntime;
        };
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            drop(active);
            tracing::warn!(workspace = %workspace.display(), "A run is already in progress");
            on_done(None);
            return StartOutcome::Busy;
        }

        let cancel = CancellationToken::new();
        let guard = DoneGuard {
            running: Arc::clone(&self.running),
            callback: Some(Box::new(on_done)),
        };
        let orchestrator = Arc::clone(&self.orchestrator);
        let token = cancel.clone();
        let handle = runtime.spawn(async move {
            let report = orchestrator.run(Some(workspace.as_path()), &token).await;
            guard.complete(report);
        });

        // Still under the lock taken for the busy check.
        *active = Some(ActiveRun { handle, cancel });
        StartOutcome::Started
    }

    /// Request cooperative cancellation without waiting.
    pub fn cancel(&self) {
        if let Some(run) = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            run.cancel.cancel();
        }
    }

    /// Cancel any active run and wait up to `grace` for it, aborting after.
    ///
    /// The wait after aborting is bounded by `grace` as well. A task stuck in
    /// blocking code is detached at that point. Safe to call repeatedly; a
    /// no-op when idle.
    pub async fn ensure_stopped(&self, grace: Duration) {
        let run = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(ActiveRun { mut handle, cancel }) = run else {
            return;
        };

        cancel.cancel();
        if timeout(grace, &mut handle).await.is_ok() {
            return;
        }
        tracing::warn!(
            grace_ms = grace.as_millis() as u64,
            "Run did not stop within grace period, aborting"
        );
        handle.abort();
        match timeout(grace, handle).await {
            Ok(Err(e)) if !e.is_cancelled() => {
                tracing::error!(error = %e, "Run task failed while stopping");
            }
            Ok(_) => {}
            Err(_) => {
                tracing::warn!(
                    grace_ms = grace.as_millis() as u64,
                    "Run is blocked and ignored the abort, detaching it"
                );
            }
        }
    }
}

impl Drop for AsyncRunner {
    fn drop(&mut self) {
        let run = self
            .active
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(run) = run {
            run.cancel.cancel();
            run.handle.abort();
        }
    }
}

impl std::fmt::Debug for AsyncRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncRunner")
            .field("running", &self.is_running())
            .finish()
    }
}

/// Delivers the callback once, with `None` if the task ends without a report.
struct DoneGuard {
    running: Arc<AtomicBool>,
    callback: Option<DoneCallback>,
}

impl DoneGuard {
    fn complete(mut self, report: Option<ExecutionReport>) {
        self.deliver(report);
    }

    fn deliver(&mut self, report: Option<ExecutionReport>) {
        if let Some(callback) = self.callback.take() {
            self.running.store(false, Ordering::Release);
            callback(report);
        }
    }
}

impl Drop for DoneGuard {
    fn drop(&mut self) {
        self.deliver(None);
    }
}
