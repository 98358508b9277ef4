//! Environment-driven settings.
//!
//! A `.env` file in the working directory is honored if present.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context};

use crate::core::error::AppResult;

/// Path of the resource group document.
pub const CONFIG_PATH_VAR: &str = "RESOURCE_GROUPS_CONFIG";
/// Optional reload interval, e.g. `30s` or `5m`.
pub const REFRESH_INTERVAL_VAR: &str = "RESOURCE_GROUPS_REFRESH";

/// Settings read from the process environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvSettings {
    /// Configuration document to load.
    pub config_path: PathBuf,
    /// How often to re-read the document, if at all.
    pub refresh_interval: Option<Duration>,
}

impl EnvSettings {
    /// Load `.env` (if any) and read the settings.
    ///
    /// # Errors
    ///
    /// Fails when [`CONFIG_PATH_VAR`] is unset or [`REFRESH_INTERVAL_VAR`]
    /// is not a valid duration.
    pub fn from_env() -> AppResult<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the settings through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`Self::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let config_path = lookup(CONFIG_PATH_VAR)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow!("{CONFIG_PATH_VAR} is not set"))?;
        let refresh_interval = lookup(REFRESH_INTERVAL_VAR)
            .filter(|v| !v.trim().is_empty())
            .map(|raw| {
                humantime::parse_duration(raw.trim())
                    .with_context(|| format!("{REFRESH_INTERVAL_VAR}={raw} is not a duration"))
            })
            .transpose()?;
        Ok(Self {
            config_path: PathBuf::from(config_path),
            refresh_interval,
        })
    }
}
