//! Plugin harness: registration and concurrent fan-out execution.
//!
//! The registry is an explicit object constructed once at process start
//! and passed by reference — plugins opt in by being registered, not by
//! mutating hidden global state. Execution launches one task per plugin,
//! all sharing one cancellation signal, waits for every task to finish,
//! and reports each plugin's terminal result for operator visibility.
//!
//! Cancellation is cooperative: a running plugin must itself observe the
//! token and return promptly.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::errors::{NodeupError, NodeupResult};

/// What a registered unit is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginKind {
    Plugin,
    Daemon,
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginKind::Plugin => write!(f, "plugin"),
            PluginKind::Daemon => write!(f, "daemon"),
        }
    }
}

/// A named, kind-tagged unit with a single blocking run operation.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;
    fn kind(&self) -> PluginKind;

    /// Run until done or until `stop` is cancelled.
    async fn run(&self, stop: CancellationToken) -> NodeupResult<()>;
}

/// Terminal result of one plugin's execution.
pub struct PluginOutcome {
    pub name: String,
    pub kind: PluginKind,
    pub result: NodeupResult<()>,
}

/// Append-only registry of plugins, built during process initialization.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin. Each unit registers exactly once; a duplicate
    /// name is a programming error surfaced to the caller.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) -> NodeupResult<()> {
        if self.plugins.iter().any(|p| p.name() == plugin.name()) {
            return Err(NodeupError::Plugin(format!(
                "plugin {:?} is already registered",
                plugin.name()
            )));
        }
        tracing::debug!(name = plugin.name(), kind = %plugin.kind(), "registered plugin");
        self.plugins.push(plugin);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Run every registered plugin concurrently, sharing one stop token,
    /// and wait for all of them. Every plugin's terminal result is
    /// returned; failures are additionally logged here so they are
    /// operator-visible even if the caller discards the outcomes.
    pub async fn run_all(&self, stop: CancellationToken) -> Vec<PluginOutcome> {
        let mut tasks: JoinSet<PluginOutcome> = JoinSet::new();
        for plugin in &self.plugins {
            let plugin = Arc::clone(plugin);
            let stop = stop.clone();
            tasks.spawn(async move {
                let result = plugin.run(stop).await;
                PluginOutcome {
                    name: plugin.name().to_string(),
                    kind: plugin.kind(),
                    result,
                }
            });
        }

        let mut outcomes = Vec::with_capacity(self.plugins.len());
        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => PluginOutcome {
                    name: "<unknown>".to_string(),
                    kind: PluginKind::Plugin,
                    result: Err(NodeupError::Plugin(format!("task failed: {}", e))),
                },
            };
            match &outcome.result {
                Ok(()) => {
                    tracing::info!(name = %outcome.name, kind = %outcome.kind, "plugin finished")
                }
                Err(e) => {
                    tracing::error!(name = %outcome.name, kind = %outcome.kind, error = %e, "plugin failed")
                }
            }
            outcomes.push(outcome);
        }
        outcomes
    }
}
