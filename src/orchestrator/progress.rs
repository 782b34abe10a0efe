//! Run phases and progress reporting.

use std::fmt;

/// Lifecycle of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RunPhase {
    #[default]
    Idle,
    LoadingConfig,
    FilteringPlugins,
    Ordering,
    Running,
    Reporting,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::LoadingConfig => "loading_config",
            Self::FilteringPlugins => "filtering_plugins",
            Self::Ordering => "ordering",
            Self::Running => "running",
            Self::Reporting => "reporting",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives human-readable progress lines during a run.
pub trait ProgressSink: Send + Sync {
    fn message(&self, line: &str);

    fn phase_changed(&self, phase: RunPhase) {
        let _ = phase;
    }
}

impl<F> ProgressSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn message(&self, line: &str) {
        self(line)
    }
}

/// Default sink: forwards progress to `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn message(&self, line: &str) {
        tracing::info!(target: "bcasl::progress", "{line}");
    }

    fn phase_changed(&self, phase: RunPhase) {
        tracing::debug!(target: "bcasl::progress", phase = %phase, "Run phase changed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_closure_sink() {
        let lines = Mutex::new(Vec::new());
        let sink = |line: &str| lines.lock().unwrap().push(line.to_string());
        sink.message("one");
        sink.phase_changed(RunPhase::Running);
        sink.message("two");
        assert_eq!(*lines.lock().unwrap(), vec!["one", "two"]);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(RunPhase::default(), RunPhase::Idle);
        assert_eq!(RunPhase::FilteringPlugins.to_string(), "filtering_plugins");
    }
}
