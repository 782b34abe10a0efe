//! The plugin contract.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::PluginError;
use super::metadata::PluginMetadata;
use crate::context::ExecutionContext;

/// Priority given to plugins that do not choose one.
pub const DEFAULT_PRIORITY: i32 = 100;

/// A pre-compile action run against a workspace.
///
/// Implementations must tolerate being run repeatedly and must not mutate
/// state other plugins observe through the context.
///
/// # Example
///
/// ```rust,no_run
/// use async_trait::async_trait;
/// use bcasl::{ExecutionContext, PluginMetadata, PluginUnit};
///
/// struct HeaderCheck {
///     meta: PluginMetadata,
/// }
///
/// #[async_trait]
/// impl PluginUnit for HeaderCheck {
///     fn metadata(&self) -> &PluginMetadata {
///         &self.meta
///     }
///
///     fn priority(&self) -> i32 {
///         10
///     }
///
///     async fn execute(&self, ctx: &ExecutionContext) -> bcasl::Result<()> {
///         for path in ctx.iter_files(&["**/*.py"], &[]) {
///             let _ = path;
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait PluginUnit: Send + Sync {
    fn metadata(&self) -> &PluginMetadata;

    /// Ids of plugins this one expects to have run earlier.
    ///
    /// Informational only; scheduling follows priority and registration order.
    fn requires(&self) -> &[String] {
        &[]
    }

    /// Lower runs earlier.
    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    async fn execute(&self, ctx: &ExecutionContext) -> crate::Result<()>;
}

/// `<Plugin id vX prio=P [core>=2.0.0]>`, listing only non-baseline requirements.
pub fn describe(unit: &dyn PluginUnit) -> String {
    let meta = unit.metadata();
    let reqs: Vec<String> = meta
        .requirements()
        .non_baseline()
        .map(|(component, version)| format!("{}>={version}", component.label()))
        .collect();
    let reqs = if reqs.is_empty() {
        String::new()
    } else {
        format!(" [{}]", reqs.join(", "))
    };
    format!(
        "<Plugin {} v{} prio={}{reqs}>",
        meta.id(),
        meta.version(),
        unit.priority()
    )
}

/// Trim dependency ids and drop blank ones.
pub fn normalize_requires<I, S>(requires: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    requires
        .into_iter()
        .map(|r| r.as_ref().trim().to_string())
        .filter(|r| !r.is_empty())
        .collect()
}

type Handler = dyn Fn(ExecutionContext) -> BoxFuture<'static, crate::Result<()>> + Send + Sync;

/// A plugin backed by a closure.
///
/// ```rust,no_run
/// use bcasl::{FnPlugin, PluginMetadata};
///
/// # fn example() -> bcasl::Result<()> {
/// let plugin = FnPlugin::builder(PluginMetadata::new("touch", "Touch", "1.0.0")?)
///     .priority(5)
///     .handler(|ctx| async move {
///         tokio::fs::write(ctx.workspace_root().join(".stamp"), b"ok").await?;
///         Ok::<_, bcasl::Error>(())
///     })
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct FnPlugin {
    metadata: PluginMetadata,
    requires: Vec<String>,
    priority: i32,
    handler: Arc<Handler>,
}

impl FnPlugin {
    pub fn builder(metadata: PluginMetadata) -> FnPluginBuilder {
        FnPluginBuilder {
            metadata,
            requires: Vec::new(),
            priority: DEFAULT_PRIORITY,
            handler: None,
        }
    }
}

impl fmt::Debug for FnPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnPlugin")
            .field("id", &self.metadata.id())
            .field("priority", &self.priority)
            .field("requires", &self.requires)
            .finish()
    }
}

#[async_trait]
impl PluginUnit for FnPlugin {
    fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    fn requires(&self) -> &[String] {
        &self.requires
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn execute(&self, ctx: &ExecutionContext) -> crate::Result<()> {
        (self.handler)(ctx.clone()).await
    }
}

pub struct FnPluginBuilder {
    metadata: PluginMetadata,
    requires: Vec<String>,
    priority: i32,
    handler: Option<Arc<Handler>>,
}

impl FnPluginBuilder {
    pub fn requires<I, S>(mut self, requires: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.requires = normalize_requires(requires);
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn handler<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = crate::Result<()>> + Send + 'static,
    {
        let handler: Arc<Handler> = Arc::new(
            move |ctx: ExecutionContext| -> BoxFuture<'static, crate::Result<()>> {
                Box::pin(f(ctx))
            },
        );
        self.handler = Some(handler);
        self
    }

    pub fn build(self) -> Result<FnPlugin, PluginError> {
        let handler = self.handler.ok_or_else(|| PluginError::InvalidMetadata {
            reason: format!("plugin '{}' has no handler", self.metadata.id()),
        })?;
        Ok(FnPlugin {
            metadata: self.metadata,
            requires: self.requires,
            priority: self.priority,
            handler,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::HostComponent;

    fn meta(id: &str) -> PluginMetadata {
        PluginMetadata::new(id, id.to_uppercase(), "1.2.0").unwrap()
    }

    #[test]
    fn test_describe_without_requirements() {
        let plugin = FnPlugin::builder(meta("fmt"))
            .handler(|_| async { Ok(()) })
            .build()
            .unwrap();
        assert_eq!(describe(&plugin), "<Plugin fmt v1.2.0 prio=100>");
    }

    #[test]
    fn test_describe_lists_non_default_requirements() {
        let metadata = meta("lint")
            .requires_version(HostComponent::Core, "2.0.0")
            .requires_version(HostComponent::PluginsSdk, "1.1.0");
        let plugin = FnPlugin::builder(metadata)
            .priority(5)
            .handler(|_| async { Ok(()) })
            .build()
            .unwrap();
        assert_eq!(
            describe(&plugin),
            "<Plugin lint v1.2.0 prio=5 [core>=2.0.0, sdk>=1.1.0]>"
        );
    }

    #[test]
    fn test_requires_normalized() {
        let plugin = FnPlugin::builder(meta("b"))
            .requires([" a ", "", "  ", "c"])
            .handler(|_| async { Ok(()) })
            .build()
            .unwrap();
        assert_eq!(plugin.requires(), ["a", "c"]);
    }

    #[test]
    fn test_missing_handler() {
        let err = FnPlugin::builder(meta("x")).build().unwrap_err();
        assert!(err.to_string().contains("no handler"));
    }

    #[test]
    fn test_trait_defaults() {
        struct Bare(PluginMetadata);

        #[async_trait]
        impl PluginUnit for Bare {
            fn metadata(&self) -> &PluginMetadata {
                &self.0
            }

            async fn execute(&self, _ctx: &ExecutionContext) -> crate::Result<()> {
                Ok(())
            }
        }

        let bare = Bare(meta("bare"));
        assert_eq!(bare.priority(), DEFAULT_PRIORITY);
        assert!(bare.requires().is_empty());
    }
}
