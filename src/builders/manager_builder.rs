//! Build a [`ResourceGroupManager`] from a document, a file, or the
//! environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;

use crate::config::{EnvSettings, ResourceGroupsConfig};
use crate::core::{AppResult, AuditSink, ManagerSpec, ResourceGroupManager};

/// Assembles a manager and remembers where its configuration came from.
#[derive(Default)]
pub struct ResourceGroupManagerBuilder {
    config: Option<ResourceGroupsConfig>,
    config_path: Option<PathBuf>,
    refresh_interval: Option<Duration>,
    audit: Option<Box<dyn AuditSink>>,
}

impl ResourceGroupManagerBuilder {
    /// Empty builder; a configuration source must be supplied.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an in-memory document.
    #[must_use]
    pub fn with_config(mut self, config: ResourceGroupsConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Read the document from `path` at build time.
    #[must_use]
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Take the document path and refresh interval from the environment.
    ///
    /// # Errors
    ///
    /// See [`EnvSettings::from_env`].
    pub fn from_env() -> AppResult<Self> {
        let settings = EnvSettings::from_env()?;
        Ok(Self::from_settings(settings))
    }

    /// Use already-read environment settings.
    #[must_use]
    pub fn from_settings(settings: EnvSettings) -> Self {
        Self {
            config_path: Some(settings.config_path),
            refresh_interval: settings.refresh_interval,
            ..Self::default()
        }
    }

    /// Attach an audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Box<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// File the configuration is read from, if any.
    #[must_use]
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Reload interval requested through the environment, if any.
    #[must_use]
    pub const fn refresh_interval(&self) -> Option<Duration> {
        self.refresh_interval
    }

    /// Validate the configuration and create the manager.
    ///
    /// # Errors
    ///
    /// Fails when no source was given, the file cannot be read, or the
    /// document is invalid.
    pub fn build(self) -> AppResult<ResourceGroupManager> {
        let config = match (self.config, &self.config_path) {
            (Some(config), _) => config,
            (None, Some(path)) => ResourceGroupsConfig::from_file(path)?,
            (None, None) => anyhow::bail!("no resource group configuration supplied"),
        };
        let spec = ManagerSpec::from_config(&config).context("validating resource group config")?;
        tracing::info!(
            "built resource group manager with {} root groups and {} selectors",
            spec.root_groups().len(),
            spec.selectors().len()
        );
        let manager = ResourceGroupManager::new(spec);
        Ok(match self.audit {
            Some(audit) => manager.with_audit(audit),
            None => manager,
        })
    }
}
