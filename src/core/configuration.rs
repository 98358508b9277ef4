//! Active configuration holder with copy-on-write hot swap.
//!
//! The active [`ManagerSpec`] lives behind an `Arc` that is cloned on every
//! read and replaced wholesale on reconfiguration. The `RwLock` only guards
//! the pointer, so readers never wait on validation work.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::config::ResourceGroupsConfig;
use crate::core::context::QueryContext;
use crate::core::error::Result;
use crate::core::selector::{Resolution, SelectorSummary};
use crate::core::spec::{GroupSettings, ManagerSpec};

/// Read-only view of the active configuration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationSummary {
    /// Version of the snapshot described.
    pub version: u64,
    /// Global quota period in milliseconds, if configured.
    pub cpu_quota_period_ms: Option<u64>,
    /// Selectors in declaration order.
    pub selectors: Vec<SelectorSummary>,
    /// Specification settings keyed by template path.
    pub groups: BTreeMap<String, GroupSettings>,
}

/// Loads, validates, and atomically swaps configuration snapshots.
pub struct ConfigurationManager {
    active: RwLock<Arc<ManagerSpec>>,
    next_version: AtomicU64,
}

impl ConfigurationManager {
    /// Install an already validated specification as version 1.
    #[must_use]
    pub fn new(spec: ManagerSpec) -> Self {
        Self {
            active: RwLock::new(Arc::new(spec.with_version(1))),
            next_version: AtomicU64::new(2),
        }
    }

    /// Parse and validate a JSON document, then install it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::core::ResourceGroupError::InvalidConfig`] on any
    /// parse or validation failure.
    pub fn load(source: &str) -> Result<Self> {
        Ok(Self::new(Self::parse(source)?))
    }

    /// Parse and validate a JSON document without installing it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::core::ResourceGroupError::InvalidConfig`] on any
    /// parse or validation failure.
    pub fn parse(source: &str) -> Result<ManagerSpec> {
        let config = ResourceGroupsConfig::from_json_str(source)?;
        ManagerSpec::from_config(&config)
    }

    /// Current snapshot.
    #[must_use]
    pub fn current(&self) -> Arc<ManagerSpec> {
        self.active.read().clone()
    }

    /// Version of the current snapshot.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.active.read().version()
    }

    /// Swap in a validated specification and return the installed snapshot.
    pub fn install(&self, spec: ManagerSpec) -> Arc<ManagerSpec> {
        let version = self.next_version.fetch_add(1, Ordering::AcqRel);
        let installed = Arc::new(spec.with_version(version));
        *self.active.write() = Arc::clone(&installed);
        tracing::info!("installed resource group configuration version {}", version);
        installed
    }

    /// Validate `source` and swap it in. On failure the active snapshot is
    /// left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`crate::core::ResourceGroupError::InvalidConfig`] on any
    /// parse or validation failure.
    pub fn reconfigure(&self, source: &str) -> Result<Arc<ManagerSpec>> {
        match Self::parse(source) {
            Ok(spec) => Ok(self.install(spec)),
            Err(e) => {
                tracing::warn!("rejected resource group configuration: {}", e);
                Err(e)
            }
        }
    }

    /// Route a query against the current snapshot.
    ///
    /// # Errors
    ///
    /// See [`crate::core::selector::resolve`].
    pub fn resolve(&self, context: &QueryContext) -> Result<Resolution> {
        self.current().resolve(context)
    }

    /// Describe the current snapshot.
    #[must_use]
    pub fn summary(&self) -> ConfigurationSummary {
        summarize(&self.current())
    }
}

/// Describe a specification snapshot.
#[must_use]
pub fn summarize(spec: &ManagerSpec) -> ConfigurationSummary {
    ConfigurationSummary {
        version: spec.version(),
        cpu_quota_period_ms: spec
            .cpu_quota_period()
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
        selectors: spec.selectors().iter().map(|s| s.summary()).collect(),
        groups: spec.specs_by_template().into_iter().collect(),
    }
}
