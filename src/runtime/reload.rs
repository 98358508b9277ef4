//! Periodic configuration reload.
//!
//! A reloader polls a [`ConfigurationSource`] on a fixed interval and hands
//! changed documents to [`ResourceGroupManager::reconfigure_json`]. A document
//! that fails validation is logged once and the active configuration stays in
//! force until the source changes again.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::core::{AppResult, ReconfigurationReport, ResourceGroupManager};
use crate::runtime::Spawn;

/// Where configuration documents come from.
#[async_trait]
pub trait ConfigurationSource: Send + Sync {
    /// Short description for log lines.
    fn describe(&self) -> String;

    /// Fetch the current document text.
    async fn fetch(&self) -> AppResult<String>;
}

/// Reads the document from a file on every fetch.
#[derive(Debug, Clone)]
pub struct FileConfigurationSource {
    path: PathBuf,
}

impl FileConfigurationSource {
    /// Source backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File being watched.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConfigurationSource for FileConfigurationSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> AppResult<String> {
        tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading resource group config {}", self.path.display()))
    }
}

/// Stops a spawned reloader when told to or when dropped.
#[derive(Debug)]
pub struct ReloadHandle {
    stop: watch::Sender<bool>,
}

impl ReloadHandle {
    /// Ask the reloader to exit after its current iteration.
    pub fn stop(self) {
        let _ = self.stop.send(true);
    }
}

/// Polls a source and reconfigures a manager when the document changes.
pub struct ConfigurationReloader<C> {
    manager: Arc<ResourceGroupManager>,
    source: C,
    interval: Duration,
    last_seen: Option<String>,
}

impl<C: ConfigurationSource + 'static> ConfigurationReloader<C> {
    /// Reloader for `manager` polling `source` every `interval`.
    pub const fn new(manager: Arc<ResourceGroupManager>, source: C, interval: Duration) -> Self {
        Self {
            manager,
            source,
            interval,
            last_seen: None,
        }
    }

    /// Treat `document` as already applied, so an unchanged source does not
    /// trigger a reconfiguration on the first poll.
    #[must_use]
    pub fn with_baseline(mut self, document: impl Into<String>) -> Self {
        self.last_seen = Some(document.into());
        self
    }

    /// Poll once. Returns `Ok(None)` when the document is unchanged.
    ///
    /// # Errors
    ///
    /// Fails when the source cannot be read or the new document is invalid.
    pub async fn reload_once(&mut self) -> AppResult<Option<ReconfigurationReport>> {
        let document = self.source.fetch().await?;
        if self.last_seen.as_deref() == Some(document.as_str()) {
            return Ok(None);
        }
        let result = self.manager.reconfigure_json(&document);
        self.last_seen = Some(document);
        let report = result
            .with_context(|| format!("applying configuration from {}", self.source.describe()))?;
        Ok(Some(report))
    }

    /// Run the polling loop on `spawner` until the returned handle is
    /// stopped or dropped.
    pub fn spawn<S: Spawn>(mut self, spawner: &S) -> ReloadHandle {
        let (stop, mut stopped) = watch::channel(false);
        spawner.spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(
                "reloading resource group configuration from {} every {}",
                self.source.describe(),
                humantime::format_duration(self.interval)
            );
            loop {
                tokio::select! {
                    _ = ticker.tick() => match self.reload_once().await {
                        Ok(Some(report)) => tracing::info!(
                            "reloaded resource group configuration version {}",
                            report.version
                        ),
                        Ok(None) => tracing::debug!("resource group configuration unchanged"),
                        Err(e) => tracing::warn!("resource group reload failed: {:#}", e),
                    },
                    changed = stopped.changed() => {
                        if changed.is_err() || *stopped.borrow() {
                            tracing::info!("resource group reloader stopping");
                            break;
                        }
                    }
                }
            }
        });
        ReloadHandle { stop }
    }
}
