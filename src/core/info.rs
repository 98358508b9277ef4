//! Introspection types returned by the manager.

use serde::Serialize;

use crate::core::context::QueryId;
use crate::core::identifier::ResourceGroupId;
use crate::core::spec::SchedulingPolicy;
use crate::core::tree::{GroupState, QueryState};

/// Point-in-time description of one live group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroupInfo {
    /// Concrete identifier.
    pub id: ResourceGroupId,
    /// Specification path the group was created from.
    pub template: String,
    /// Load state derived from the counters.
    pub state: GroupState,
    /// Running queries in this group's subtree.
    pub running: u32,
    /// Entries waiting in this group's own queue.
    pub queued: usize,
    /// Entries waiting anywhere in this group's subtree.
    pub queued_in_subtree: usize,
    /// Soft concurrency limit in force.
    pub soft_concurrency_limit: u32,
    /// Hard concurrency limit in force.
    pub hard_concurrency_limit: u32,
    /// Queue capacity in force.
    pub max_queued: usize,
    /// Policy in force.
    pub scheduling_policy: SchedulingPolicy,
    /// Weight in force.
    pub weight: u32,
    /// Queries routed into this subtree.
    pub submitted: u64,
    /// Queries that finished running in this subtree.
    pub completed: u64,
    /// Queries rejected because a queue in this subtree was full.
    pub rejected: u64,
    /// Set once a reconfiguration dropped this group's path.
    pub deprecated: bool,
    /// Live children.
    pub children: Vec<ResourceGroupId>,
}

/// A queued query as seen by an observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedQueryInfo {
    /// Query identifier.
    pub query_id: QueryId,
    /// Leaf group holding the entry.
    pub group: ResourceGroupId,
    /// Root of that group's tree.
    pub root_group: ResourceGroupId,
    /// Submission priority.
    pub priority: i32,
    /// Enqueue time, milliseconds since the Unix epoch.
    pub queued_at_ms: u128,
    /// 1-based position within the group's own drain order.
    pub approximate_position: usize,
}

/// Copy of the group forest, its queues, and its running queries.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    /// When the copy was taken.
    pub taken_at_ms: u128,
    /// Configuration version the tree was running under.
    pub config_version: u64,
    /// Every live group, sorted by identifier.
    pub groups: Vec<ResourceGroupInfo>,
    /// Every queued entry.
    pub queued: Vec<QueuedQueryInfo>,
    /// Every running query, sorted by id.
    pub running: Vec<StartedQuery>,
}

impl QueueSnapshot {
    /// Info for one group, if it was live when the copy was taken.
    #[must_use]
    pub fn group(&self, id: &ResourceGroupId) -> Option<&ResourceGroupInfo> {
        self.groups.iter().find(|g| &g.id == id)
    }

    /// Where `query_id` sat when the copy was taken.
    #[must_use]
    pub fn query_state(&self, query_id: &QueryId) -> Option<QueryStatus> {
        if let Some(entry) = self.queued.iter().find(|q| &q.query_id == query_id) {
            return Some(QueryStatus {
                state: QueryState::Queued,
                group: entry.group.clone(),
            });
        }
        self.running
            .binary_search_by(|r| r.query_id.cmp(query_id))
            .ok()
            .map(|i| QueryStatus {
                state: QueryState::Running,
                group: self.running[i].group.clone(),
            })
    }

    /// Total running queries across all roots.
    #[must_use]
    pub fn total_running(&self) -> u32 {
        self.groups
            .iter()
            .filter(|g| g.id.is_root())
            .map(|g| g.running)
            .sum()
    }
}

/// A queued query that was moved to running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedQuery {
    /// Query identifier.
    pub query_id: QueryId,
    /// Leaf group it runs in.
    pub group: ResourceGroupId,
}

/// Where a tracked query currently sits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryStatus {
    /// Queued or running.
    pub state: QueryState,
    /// Leaf group holding the query.
    pub group: ResourceGroupId,
}
