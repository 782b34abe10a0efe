//! Orchestrator & Runner Tests
//!
//! End-to-end runs against temporary workspaces: ordering, fault isolation,
//! compatibility gating, timeouts, file discovery caching and background runs.
//!
//! Run: cargo nextest run --test orchestrator_tests

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bcasl::plugins::HostComponent;
use bcasl::{
    AsyncRunner, ComponentVersions, EnvConfigProvider, ExecutionReport, FnPlugin, Orchestrator,
    PluginMetadata, PluginRegistry, StartOutcome, WorkspaceConfigLoader,
};
use tempfile::tempdir;
use tokio::fs;
use tokio::sync::{Notify, oneshot};
use tokio_util::sync::CancellationToken;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("bcasl=debug")
        .with_test_writer()
        .try_init();
}

fn meta(id: &str) -> PluginMetadata {
    PluginMetadata::new(id, format!("Plugin {id}"), "1.0.0").unwrap()
}

fn ok_plugin(id: &str, priority: i32) -> FnPlugin {
    FnPlugin::builder(meta(id))
        .priority(priority)
        .handler(|_| async { Ok(()) })
        .build()
        .unwrap()
}

fn failing_plugin(id: &str, priority: i32) -> FnPlugin {
    let owner = id.to_string();
    FnPlugin::builder(meta(id))
        .priority(priority)
        .handler(move |_| {
            let owner = owner.clone();
            async move { Err(bcasl::Error::plugin(owner, "missing main.py")) }
        })
        .build()
        .unwrap()
}

fn orchestrator(registry: PluginRegistry) -> Orchestrator {
    Orchestrator::new(Arc::new(registry))
        .with_env(EnvConfigProvider::from_vars(Vec::<(String, String)>::new()))
}

async fn run(orch: &Orchestrator, root: &Path) -> Option<ExecutionReport> {
    orch.run(Some(root), &CancellationToken::new()).await
}

async fn write(root: &Path, name: &str, content: &str) {
    fs::write(root.join(name), content).await.unwrap();
}

fn ids(report: &ExecutionReport) -> Vec<&str> {
    report.iter().map(|i| i.plugin_id.as_str()).collect()
}

// =============================================================================
// Fault isolation
// =============================================================================

mod fault_isolation_tests {
    use super::*;

    #[tokio::test]
    async fn test_failing_plugin_does_not_stop_run() {
        init_tracing();
        let dir = tempdir().unwrap();
        let registry = PluginRegistry::new()
            .with(ok_plugin("a", 1))
            .unwrap()
            .with(failing_plugin("b", 2))
            .unwrap()
            .with(ok_plugin("c", 3))
            .unwrap();

        let report = run(&orchestrator(registry), dir.path()).await.unwrap();

        assert_eq!(ids(&report), ["a", "b", "c"]);
        assert!(!report.ok());
        let b = report.get("b").unwrap();
        assert!(!b.success);
        assert!(b.error.contains("missing main.py"));
        assert!(report.get("a").unwrap().error.is_empty());
        assert!(report.summary().starts_with("Plugins: 2/3 ok, 1 failed, total time "));
    }

    #[tokio::test]
    async fn test_panicking_plugin_is_contained() {
        init_tracing();
        let dir = tempdir().unwrap();
        let panicky = FnPlugin::builder(meta("boom"))
            .priority(2)
            .handler(|_| async {
                if true {
                    panic!("plugin exploded");
                }
                Ok(())
            })
            .build()
            .unwrap();
        let registry = PluginRegistry::new()
            .with(ok_plugin("before", 1))
            .unwrap()
            .with(panicky)
            .unwrap()
            .with(ok_plugin("after", 3))
            .unwrap();

        let report = run(&orchestrator(registry), dir.path()).await.unwrap();

        assert_eq!(ids(&report), ["before", "boom", "after"]);
        let boom = report.get("boom").unwrap();
        assert!(!boom.success);
        assert!(boom.error.contains("panicked"));
        assert!(boom.error.contains("plugin exploded"));
        assert!(report.get("after").unwrap().success);
    }

    #[tokio::test]
    async fn test_timeout_from_configuration() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "bcasl.json",
            r#"{"options": {"plugin_timeout_s": 0.05}}"#,
        )
        .await;

        let slow = FnPlugin::builder(meta("slow"))
            .priority(1)
            .handler(|_| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .build()
            .unwrap();
        let registry = PluginRegistry::new()
            .with(slow)
            .unwrap()
            .with(ok_plugin("next", 2))
            .unwrap();

        let report = run(&orchestrator(registry), dir.path()).await.unwrap();

        let slow = report.get("slow").unwrap();
        assert!(!slow.success);
        assert!(slow.error.contains("timed out"));
        assert!(slow.duration < Duration::from_secs(5));
        assert!(report.get("next").unwrap().success);
    }

    #[tokio::test]
    async fn test_timeout_from_environment() {
        let dir = tempdir().unwrap();
        let slow = FnPlugin::builder(meta("slow"))
            .handler(|_| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .build()
            .unwrap();
        let orch = Orchestrator::new(Arc::new(PluginRegistry::new().with(slow).unwrap()))
            .with_env(EnvConfigProvider::from_vars([(
                "PYCOMPILER_BCASL_PLUGIN_TIMEOUT",
                "0.05",
            )]));

        let report = run(&orch, dir.path()).await.unwrap();
        assert!(report.get("slow").unwrap().error.contains("timed out"));
    }

    #[tokio::test]
    async fn test_huge_timeout_runs_unlimited() {
        init_tracing();
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "bcasl.json",
            r#"{"options": {"plugin_timeout_s": 1e20}}"#,
        )
        .await;
        let registry = PluginRegistry::new().with(ok_plugin("a", 1)).unwrap();

        let report = run(&orchestrator(registry), dir.path()).await.unwrap();
        assert!(report.ok());
        assert_eq!(ids(&report), ["a"]);
    }
}

// =============================================================================
// Eligibility and ordering
// =============================================================================

mod eligibility_tests {
    use super::*;

    fn gated() -> FnPlugin {
        FnPlugin::builder(meta("gated").requires_version(HostComponent::Core, "2.0.0"))
            .handler(|_| async { Ok(()) })
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_compatibility_gate() {
        let cases = [
            ("1.9.9", false),
            ("2.0.0", true),
            ("2.0.0-rc.1", true),
            ("2.1.0", true),
        ];
        for (core, runs) in cases {
            let dir = tempdir().unwrap();
            let orch = orchestrator(PluginRegistry::new().with(gated()).unwrap())
                .with_host_versions(ComponentVersions::default().with(HostComponent::Core, core));

            let report = run(&orch, dir.path()).await.unwrap();
            assert_eq!(report.get("gated").is_some(), runs, "core {core}");
            if !runs {
                assert_eq!(report.skipped.len(), 1);
                assert_eq!(report.skipped[0].id, "gated");
                assert!(report.skipped[0].reason.contains("incompatible"));
            }
        }
    }

    #[tokio::test]
    async fn test_disabled_plugins_are_skipped() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "bcasl.yaml",
            "plugins:\n  b: false\n  c:\n    enabled: false\n    level: 3\n",
        )
        .await;
        let registry = PluginRegistry::new()
            .with(ok_plugin("a", 1))
            .unwrap()
            .with(ok_plugin("b", 2))
            .unwrap()
            .with(ok_plugin("c", 3))
            .unwrap();

        let report = run(&orchestrator(registry), dir.path()).await.unwrap();

        assert_eq!(ids(&report), ["a"]);
        let skipped: Vec<&str> = report.skipped.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(skipped, ["b", "c"]);
    }

    #[tokio::test]
    async fn test_plugin_order_is_informational() {
        let dir = tempdir().unwrap();
        write(dir.path(), "bcasl.json", r#"{"plugin_order": ["z", "a"]}"#).await;
        let registry = PluginRegistry::new()
            .with(ok_plugin("z", 20))
            .unwrap()
            .with(ok_plugin("a", 10))
            .unwrap();

        let report = run(&orchestrator(registry), dir.path()).await.unwrap();
        assert_eq!(ids(&report), ["a", "z"]);
    }

    #[tokio::test]
    async fn test_disabled_engine_returns_none() {
        let dir = tempdir().unwrap();
        write(dir.path(), "bcasl.json", r#"{"options": {"enabled": false}}"#).await;
        let orch = orchestrator(PluginRegistry::new().with(ok_plugin("a", 1)).unwrap());
        assert!(run(&orch, dir.path()).await.is_none());
    }

    #[tokio::test]
    async fn test_project_file_can_disable_engine() {
        let dir = tempdir().unwrap();
        write(dir.path(), "bcasl.json", "{}").await;
        write(dir.path(), "ARK_Main_Config.yml", "plugins:\n  bcasl_enabled: false\n").await;
        let orch = orchestrator(PluginRegistry::new().with(ok_plugin("a", 1)).unwrap());
        assert!(run(&orch, dir.path()).await.is_none());
    }

    #[tokio::test]
    async fn test_run_writes_default_configuration() {
        let dir = tempdir().unwrap();
        let orch = orchestrator(PluginRegistry::new());
        let report = run(&orch, dir.path()).await.unwrap();

        assert!(report.is_empty());
        assert!(report.ok());
        assert!(dir.path().join("bcasl.json").is_file());
    }

    #[tokio::test]
    async fn test_read_only_loader_leaves_workspace_untouched() {
        let dir = tempdir().unwrap();
        let orch = orchestrator(PluginRegistry::new())
            .with_loader(WorkspaceConfigLoader::new().read_only());
        run(&orch, dir.path()).await.unwrap();
        assert!(!dir.path().join("bcasl.json").exists());
    }
}

// =============================================================================
// File discovery through the context
// =============================================================================

mod discovery_tests {
    use super::*;

    /// Lists the configured files, adds `late.py`, then lists again.
    fn lister(counts: Arc<Mutex<Vec<usize>>>) -> FnPlugin {
        FnPlugin::builder(meta("lister"))
            .handler(move |ctx| {
                let counts = Arc::clone(&counts);
                async move {
                    let first = ctx.configured_files().count();
                    fs::write(ctx.workspace_root().join("late.py"), "").await?;
                    let second = ctx.configured_files().count();
                    counts.lock().unwrap().extend([first, second]);
                    Ok::<_, bcasl::Error>(())
                }
            })
            .build()
            .unwrap()
    }

    async fn counts_with_cache(cache: bool) -> Vec<usize> {
        let dir = tempdir().unwrap();
        write(dir.path(), "main.py", "").await;
        fs::create_dir_all(dir.path().join("build")).await.unwrap();
        write(&dir.path().join("build"), "generated.py", "").await;
        write(
            dir.path(),
            "bcasl.json",
            &format!(r#"{{"options": {{"iter_files_cache": {cache}}}}}"#),
        )
        .await;

        let counts = Arc::new(Mutex::new(Vec::new()));
        let orch = orchestrator(PluginRegistry::new().with(lister(Arc::clone(&counts))).unwrap());
        let report = run(&orch, dir.path()).await.unwrap();
        assert!(report.ok(), "{:?}", report.items);

        let counts = counts.lock().unwrap().clone();
        counts
    }

    #[tokio::test]
    async fn test_cached_listing_is_stable_within_a_run() {
        assert_eq!(counts_with_cache(true).await, [1, 1]);
    }

    #[tokio::test]
    async fn test_uncached_listing_sees_new_files() {
        assert_eq!(counts_with_cache(false).await, [1, 2]);
    }
}

// =============================================================================
// Background runner
// =============================================================================

mod runner_tests {
    use super::*;

    fn runner(registry: PluginRegistry) -> AsyncRunner {
        AsyncRunner::new(Arc::new(orchestrator(registry)))
    }

    #[tokio::test]
    async fn test_runner_delivers_report() {
        let dir = tempdir().unwrap();
        let runner = runner(
            PluginRegistry::new()
                .with(ok_plugin("a", 1))
                .unwrap()
                .with(failing_plugin("b", 2))
                .unwrap(),
        );
        let (tx, rx) = oneshot::channel();

        let outcome = runner.start(Some(dir.path().to_path_buf()), move |report| {
            let _ = tx.send(report);
        });
        assert_eq!(outcome, StartOutcome::Started);

        let report = rx.await.unwrap().unwrap();
        assert_eq!(ids(&report), ["a", "b"]);
        runner.ensure_stopped(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_runner_disabled_workspace_reports_none() {
        let dir = tempdir().unwrap();
        write(dir.path(), "bcasl.json", r#"{"options": {"enabled": false}}"#).await;
        let runner = runner(PluginRegistry::new().with(ok_plugin("a", 1)).unwrap());
        let (tx, rx) = oneshot::channel();

        runner.start(Some(dir.path().to_path_buf()), move |report| {
            let _ = tx.send(report.is_none());
        });
        assert!(rx.await.unwrap());
    }

    #[tokio::test]
    async fn test_runner_cancellation_marks_report() {
        let dir = tempdir().unwrap();
        let started = Arc::new(Notify::new());
        let signal = Arc::clone(&started);
        let slow = FnPlugin::builder(meta("slow"))
            .priority(1)
            .handler(move |ctx| {
                let signal = Arc::clone(&signal);
                async move {
                    signal.notify_one();
                    ctx.cancellation_token().cancelled().await;
                    Ok(())
                }
            })
            .build()
            .unwrap();
        let runner = runner(
            PluginRegistry::new()
                .with(slow)
                .unwrap()
                .with(ok_plugin("skipped", 2))
                .unwrap(),
        );
        let (tx, rx) = oneshot::channel();

        runner.start(Some(dir.path().to_path_buf()), move |report| {
            let _ = tx.send(report);
        });
        started.notified().await;
        runner.ensure_stopped(Duration::from_secs(5)).await;

        let report = rx.await.unwrap().unwrap();
        assert!(report.cancelled);
        assert_eq!(ids(&report), ["slow"]);
        assert!(!runner.is_running());
    }
}
