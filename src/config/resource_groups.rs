//! Resource-group configuration document.
//!
//! The document is JSON with camelCase keys:
//!
//! ```json
//! {
//!   "rootGroups": [
//!     { "name": "global", "hardConcurrencyLimit": 100, "maxQueued": 1000,
//!       "schedulingPolicy": "WEIGHTED",
//!       "subGroups": [
//!         { "name": "adhoc", "hardConcurrencyLimit": 10, "maxQueued": 100, "weight": 1,
//!           "subGroups": [ { "name": "${USER}", "hardConcurrencyLimit": 2, "maxQueued": 10 } ] },
//!         { "name": "etl", "hardConcurrencyLimit": 50, "maxQueued": 500, "weight": 3 }
//!       ] }
//!   ],
//!   "selectors": [
//!     { "source": "airflow.*", "group": "global.etl" },
//!     { "group": "global.adhoc.${USER}" }
//!   ],
//!   "cpuQuotaPeriod": "1h"
//! }
//! ```

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::error::{AppResult, ResourceGroupError, Result};
use crate::core::spec::SchedulingPolicy;

/// One group in the configuration tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupConfig {
    /// Segment name, possibly with `${VAR}` placeholders.
    pub name: String,
    /// Target running count; defaults to the hard limit.
    #[serde(default)]
    pub soft_concurrency_limit: Option<u32>,
    /// Absolute ceiling on running entries.
    pub hard_concurrency_limit: u32,
    /// Maximum queued entries at this group.
    pub max_queued: u32,
    /// Policy for choosing among this group's descendants.
    #[serde(default)]
    pub scheduling_policy: Option<SchedulingPolicy>,
    /// Weight used by a weighted parent.
    #[serde(default)]
    pub weight: Option<u32>,
    /// Child groups in declaration order.
    #[serde(default)]
    pub sub_groups: Vec<GroupConfig>,
}

impl GroupConfig {
    /// Group with the given name and limits and no children.
    pub fn new(name: impl Into<String>, hard_concurrency_limit: u32, max_queued: u32) -> Self {
        Self {
            name: name.into(),
            soft_concurrency_limit: None,
            hard_concurrency_limit,
            max_queued,
            scheduling_policy: None,
            weight: None,
            sub_groups: Vec::new(),
        }
    }

    /// Set the soft limit.
    #[must_use]
    pub const fn with_soft_limit(mut self, soft: u32) -> Self {
        self.soft_concurrency_limit = Some(soft);
        self
    }

    /// Set the scheduling policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: SchedulingPolicy) -> Self {
        self.scheduling_policy = Some(policy);
        self
    }

    /// Set the weight.
    #[must_use]
    pub const fn with_weight(mut self, weight: u32) -> Self {
        self.weight = Some(weight);
        self
    }

    /// Append a child group.
    #[must_use]
    pub fn with_sub_group(mut self, child: Self) -> Self {
        self.sub_groups.push(child);
        self
    }
}

/// One selector rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorConfig {
    /// Regular expression over the user name.
    #[serde(default)]
    pub user: Option<String>,
    /// Regular expression over the query source.
    #[serde(default)]
    pub source: Option<String>,
    /// Accepted query types.
    #[serde(default)]
    pub query_type: Option<Vec<String>>,
    /// Client tags that must all be present.
    #[serde(default)]
    pub client_tags: Option<Vec<String>>,
    /// Target group template.
    pub group: String,
}

impl SelectorConfig {
    /// Unconstrained selector targeting `group`.
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            user: None,
            source: None,
            query_type: None,
            client_tags: None,
            group: group.into(),
        }
    }

    /// Constrain the user pattern.
    #[must_use]
    pub fn with_user(mut self, pattern: impl Into<String>) -> Self {
        self.user = Some(pattern.into());
        self
    }

    /// Constrain the source pattern.
    #[must_use]
    pub fn with_source(mut self, pattern: impl Into<String>) -> Self {
        self.source = Some(pattern.into());
        self
    }
}

/// Root configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroupsConfig {
    /// Root groups of the specification forest.
    pub root_groups: Vec<GroupConfig>,
    /// Ordered selectors.
    #[serde(default)]
    pub selectors: Vec<SelectorConfig>,
    /// Optional global quota period as a duration string.
    #[serde(default)]
    pub cpu_quota_period: Option<String>,
}

impl ResourceGroupsConfig {
    /// Parse a configuration document from a JSON string.
    ///
    /// Only the document shape is checked here; semantic validation happens
    /// when the document is turned into a [`crate::core::ManagerSpec`].
    ///
    /// # Errors
    ///
    /// Returns [`ResourceGroupError::InvalidConfig`] when the JSON is malformed.
    pub fn from_json_str(input: &str) -> Result<Self> {
        serde_json::from_str(input)
            .map_err(|e| ResourceGroupError::InvalidConfig(format!("parse error: {e}")))
    }

    /// Read and parse a configuration file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or does not parse.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading resource group config {}", path.display()))?;
        Self::from_json_str(&text)
            .with_context(|| format!("parsing resource group config {}", path.display()))
    }

    /// Serialize back to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceGroupError::InvalidConfig`] if serialization fails.
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ResourceGroupError::InvalidConfig(format!("serialize error: {e}")))
    }
}
