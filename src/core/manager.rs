//! Resource group manager: the admission entry point.
//!
//! All mutation of the group tree goes through one `parking_lot::Mutex`.
//! Configuration lives in a separate copy-on-write holder. When both are
//! needed the tree lock is taken first; the configuration lock is never held
//! while waiting for the tree.
//!
//! Selector resolution normally happens before the tree lock is taken, against
//! a cloned configuration snapshot. If a reconfiguration lands in between,
//! the query is re-resolved under the lock so it is never routed by a stale
//! snapshot.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::config::ResourceGroupsConfig;
use crate::core::audit::{build_audit_event, AuditAction, AuditEvent, AuditSink};
use crate::core::configuration::{ConfigurationManager, ConfigurationSummary};
use crate::core::context::{QueryContext, QueryId};
use crate::core::error::Result;
use crate::core::identifier::ResourceGroupId;
use crate::core::info::{QueryStatus, QueueSnapshot, ResourceGroupInfo, StartedQuery};
use crate::core::spec::ManagerSpec;
use crate::core::tree::GroupTree;
use crate::util::clock::now_ms;

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdmissionOutcome {
    /// Running now; the caller may start execution.
    Admitted {
        /// Leaf group charged for the query.
        group: ResourceGroupId,
    },
    /// Waiting for capacity; a later completion will start it.
    Queued {
        /// Leaf group holding the entry.
        group: ResourceGroupId,
        /// 1-based position in the group's drain order at enqueue time.
        position: usize,
    },
}

impl AdmissionOutcome {
    /// Leaf group the query was routed to.
    #[must_use]
    pub const fn group(&self) -> &ResourceGroupId {
        match self {
            Self::Admitted { group } | Self::Queued { group, .. } => group,
        }
    }

    /// Whether the query may run immediately.
    #[must_use]
    pub const fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted { .. })
    }
}

/// What a successful reconfiguration changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconfigurationReport {
    /// Version now active.
    pub version: u64,
    /// Queued queries started because limits were raised.
    pub started: Vec<StartedQuery>,
    /// Groups whose path no longer exists.
    pub deprecated: Vec<ResourceGroupId>,
    /// Deprecated groups removed because they were idle.
    pub retired: Vec<ResourceGroupId>,
}

/// Hierarchical admission controller.
pub struct ResourceGroupManager {
    configuration: ConfigurationManager,
    tree: Mutex<GroupTree>,
    /// Last copy handed to observers; served when the tree is busy.
    last_snapshot: RwLock<Arc<QueueSnapshot>>,
    audit: Option<Arc<Mutex<Box<dyn AuditSink>>>>,
}

impl ResourceGroupManager {
    /// Create a manager running `spec` as configuration version 1.
    #[must_use]
    pub fn new(spec: ManagerSpec) -> Self {
        let configuration = ConfigurationManager::new(spec);
        let version = configuration.version();
        Self {
            configuration,
            tree: Mutex::new(GroupTree::new(version)),
            last_snapshot: RwLock::new(Arc::new(QueueSnapshot {
                config_version: version,
                ..QueueSnapshot::default()
            })),
            audit: None,
        }
    }

    /// Validate a configuration document and create a manager from it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::core::ResourceGroupError::InvalidConfig`] when the
    /// document is invalid.
    pub fn from_config(config: &ResourceGroupsConfig) -> Result<Self> {
        Ok(Self::new(ManagerSpec::from_config(config)?))
    }

    /// Parse, validate, and create a manager from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`crate::core::ResourceGroupError::InvalidConfig`] when the
    /// document is malformed or invalid.
    pub fn from_json_str(source: &str) -> Result<Self> {
        Ok(Self::new(ConfigurationManager::parse(source)?))
    }

    /// Attach an audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Box<dyn AuditSink>) -> Self {
        self.audit = Some(Arc::new(Mutex::new(audit)));
        self
    }

    /// Route and admit, queue, or reject a query.
    ///
    /// # Errors
    ///
    /// - [`crate::core::ResourceGroupError::NoMatchingSelector`] when no selector matches.
    /// - [`crate::core::ResourceGroupError::MissingVariable`] or
    ///   [`crate::core::ResourceGroupError::InvalidIdentifier`] when the winning
    ///   selector's template cannot be instantiated.
    /// - [`crate::core::ResourceGroupError::QueueFull`] when the leaf queue is full.
    /// - [`crate::core::ResourceGroupError::DuplicateQuery`] when the id is already tracked.
    pub fn admit_query(&self, context: &QueryContext) -> Result<AdmissionOutcome> {
        let snapshot = self.configuration.current();
        let early = snapshot.resolve(context);

        let mut tree = self.tree.lock();
        let (spec, resolution) = if tree.config_version() == snapshot.version() {
            (snapshot, early)
        } else {
            tracing::debug!("re-resolving query {} after reconfiguration", context.query_id);
            let current = self.configuration.current();
            let resolution = current.resolve(context);
            (current, resolution)
        };
        let result =
            resolution.and_then(|resolution| tree.submit(&spec, &resolution, context, now_ms()));
        drop(tree);

        let event = match &result {
            Ok(AdmissionOutcome::Admitted { group }) => {
                tracing::info!("query {} admitted to {}", context.query_id, group);
                build_audit_event(AuditAction::Admit, Some(&context.query_id), Some(group), None)
            }
            Ok(AdmissionOutcome::Queued { group, position }) => {
                tracing::info!(
                    "query {} queued in {} at position {}",
                    context.query_id,
                    group,
                    position
                );
                build_audit_event(
                    AuditAction::Enqueue,
                    Some(&context.query_id),
                    Some(group),
                    Some(format!("position {position}")),
                )
            }
            Err(e) => {
                tracing::warn!("query {} rejected: {}", context.query_id, e);
                build_audit_event(
                    AuditAction::Reject,
                    Some(&context.query_id),
                    None,
                    Some(e.reason().to_string()),
                )
            }
        };
        self.record_audit(vec![event]);
        result
    }

    /// Release a running query's slots and start whatever queued work now
    /// fits under its root.
    ///
    /// # Errors
    ///
    /// [`crate::core::ResourceGroupError::UnknownQuery`] for an untracked id,
    /// [`crate::core::ResourceGroupError::NotRunning`] for a queued one.
    pub fn notify_completion(&self, query_id: &QueryId) -> Result<Vec<StartedQuery>> {
        let mut tree = self.tree.lock();
        let (group, root) = tree.complete(query_id).inspect_err(|e| {
            tracing::warn!("completion of query {} ignored: {}", query_id, e);
        })?;
        let started = tree.drain(root);
        let retired = tree.retire_idle();
        drop(tree);

        tracing::info!(
            "query {} completed in {}; {} queued queries started",
            query_id,
            group,
            started.len()
        );
        let mut events = vec![build_audit_event(
            AuditAction::Complete,
            Some(query_id),
            Some(&group),
            None,
        )];
        events.extend(start_events(&started));
        events.extend(retire_events(&retired));
        self.record_audit(events);
        Ok(started)
    }

    /// Remove a queued query before it starts.
    ///
    /// # Errors
    ///
    /// [`crate::core::ResourceGroupError::UnknownQuery`] for an untracked id,
    /// [`crate::core::ResourceGroupError::NotQueued`] for a running one.
    pub fn withdraw(&self, query_id: &QueryId) -> Result<()> {
        let mut tree = self.tree.lock();
        let group = tree.withdraw(query_id)?;
        let retired = tree.retire_idle();
        drop(tree);

        tracing::info!("query {} withdrawn from {}", query_id, group);
        let mut events = vec![build_audit_event(
            AuditAction::Withdraw,
            Some(query_id),
            Some(&group),
            None,
        )];
        events.extend(retire_events(&retired));
        self.record_audit(events);
        Ok(())
    }

    /// Validate and install a new configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`crate::core::ResourceGroupError::InvalidConfig`]; the
    /// previous configuration and all runtime state are left untouched.
    pub fn reconfigure(&self, config: &ResourceGroupsConfig) -> Result<ReconfigurationReport> {
        let spec = ManagerSpec::from_config(config).inspect_err(|e| {
            tracing::warn!("rejected resource group configuration: {}", e);
        })?;
        Ok(self.install(spec))
    }

    /// [`Self::reconfigure`] from JSON text.
    ///
    /// # Errors
    ///
    /// See [`Self::reconfigure`].
    pub fn reconfigure_json(&self, source: &str) -> Result<ReconfigurationReport> {
        let spec = ConfigurationManager::parse(source).inspect_err(|e| {
            tracing::warn!("rejected resource group configuration: {}", e);
        })?;
        Ok(self.install(spec))
    }

    fn install(&self, spec: ManagerSpec) -> ReconfigurationReport {
        let mut tree = self.tree.lock();
        let installed = self.configuration.install(spec);
        let deprecated = tree.apply_spec(&installed);
        let started = tree.drain_all();
        let retired = tree.retire_idle();
        drop(tree);

        tracing::info!(
            "reconfigured to version {}: {} started, {} deprecated, {} retired",
            installed.version(),
            started.len(),
            deprecated.len(),
            retired.len()
        );
        let mut events = vec![build_audit_event(
            AuditAction::Reconfigure,
            None,
            None,
            Some(format!("version {}", installed.version())),
        )];
        events.extend(start_events(&started));
        events.extend(retire_events(&retired));
        self.record_audit(events);

        ReconfigurationReport {
            version: installed.version(),
            started,
            deprecated,
            retired,
        }
    }

    /// Read-only view of the active configuration.
    #[must_use]
    pub fn configuration_summary(&self) -> ConfigurationSummary {
        self.configuration.summary()
    }

    /// Version of the active configuration.
    #[must_use]
    pub fn configuration_version(&self) -> u64 {
        self.configuration.version()
    }

    /// Copy of the group forest and queues.
    ///
    /// Never waits for the tree: when it is busy the most recent copy is
    /// returned instead, so observers may see slightly stale positions.
    /// Only the raw copy is taken under the lock.
    #[must_use]
    pub fn queue_snapshot(&self) -> Arc<QueueSnapshot> {
        let Some(tree) = self.tree.try_lock() else {
            return self.last_snapshot.read().clone();
        };
        let capture = tree.capture();
        drop(tree);

        let snapshot = Arc::new(capture.into_snapshot(now_ms()));
        *self.last_snapshot.write() = Arc::clone(&snapshot);
        snapshot
    }

    /// Counters for one live group.
    ///
    /// Exact when the tree is free; otherwise read from the most recent
    /// snapshot.
    #[must_use]
    pub fn group_info(&self, id: &ResourceGroupId) -> Option<ResourceGroupInfo> {
        let Some(tree) = self.tree.try_lock() else {
            return self.last_snapshot.read().group(id).cloned();
        };
        tree.index_of(id).map(|index| tree.group_info(index))
    }

    /// Where a tracked query currently sits.
    ///
    /// Exact when the tree is free; otherwise read from the most recent
    /// snapshot.
    #[must_use]
    pub fn query_state(&self, query_id: &QueryId) -> Option<QueryStatus> {
        let Some(tree) = self.tree.try_lock() else {
            return self.last_snapshot.read().query_state(query_id);
        };
        tree.query_status(query_id)
            .map(|(state, group)| QueryStatus { state, group })
    }

    fn record_audit(&self, events: Vec<AuditEvent>) {
        if let Some(audit_sink) = &self.audit {
            let mut sink = audit_sink.lock();
            for event in events {
                sink.record(event);
            }
        }
    }
}

fn start_events(started: &[StartedQuery]) -> impl Iterator<Item = AuditEvent> + '_ {
    started.iter().map(|s| {
        build_audit_event(AuditAction::Start, Some(&s.query_id), Some(&s.group), None)
    })
}

fn retire_events(retired: &[ResourceGroupId]) -> impl Iterator<Item = AuditEvent> + '_ {
    retired
        .iter()
        .map(|group| build_audit_event(AuditAction::Retire, None, Some(group), None))
}
