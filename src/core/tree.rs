//! Runtime group tree and admission accounting.
//!
//! Groups live in an index-addressed arena. A node owns its child indices and
//! keeps a plain parent index for bubble-up accounting; nothing holds a
//! reference into the arena across calls. Every method here runs under the
//! manager's tree lock.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::context::{QueryContext, QueryId};
use crate::core::error::{ResourceGroupError, Result};
use crate::core::identifier::{ResourceGroupId, ResourceGroupIdTemplate};
use crate::core::info::{QueueSnapshot, QueuedQueryInfo, ResourceGroupInfo, StartedQuery};
use crate::core::manager::AdmissionOutcome;
use crate::core::queue::{GroupQueue, PriorityKey, QueueOrder, QueuedQuery, Sequence};
use crate::core::selector::Resolution;
use crate::core::spec::{GroupSettings, ManagerSpec, SchedulingPolicy};

/// Descriptive load state of a group.
///
/// Only used as a scheduling heuristic and for introspection; the hard limit
/// is always enforced by comparing counters directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupState {
    /// Nothing running or queued.
    Empty,
    /// Running below the soft limit.
    BelowSoft,
    /// At or above the soft limit, below the hard limit.
    AtSoftBelowHard,
    /// At or above the hard limit.
    AtHard,
}

impl GroupState {
    /// Classify a group from its counters.
    #[must_use]
    pub const fn from_counts(running: u32, queued: usize, settings: &GroupSettings) -> Self {
        if running == 0 && queued == 0 {
            Self::Empty
        } else if running >= settings.hard_concurrency_limit {
            Self::AtHard
        } else if running >= settings.soft_concurrency_limit {
            Self::AtSoftBelowHard
        } else {
            Self::BelowSoft
        }
    }
}

/// Lifecycle state of a tracked query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryState {
    /// Waiting for capacity.
    Queued,
    /// Holding a running slot at every level of its chain.
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct GroupIndex(usize);

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct GroupCounters {
    pub(crate) submitted: u64,
    pub(crate) completed: u64,
    pub(crate) rejected: u64,
}

#[derive(Debug)]
pub(crate) struct GroupNode {
    pub(crate) id: ResourceGroupId,
    pub(crate) template: ResourceGroupIdTemplate,
    pub(crate) parent: Option<GroupIndex>,
    pub(crate) children: Vec<GroupIndex>,
    pub(crate) settings: GroupSettings,
    pub(crate) running: u32,
    pub(crate) queue: GroupQueue,
    /// Entries queued at this node or any descendant.
    pub(crate) queued_in_subtree: usize,
    pub(crate) counters: GroupCounters,
    pub(crate) deprecated: bool,
    /// Next child position for round robin.
    pub(crate) rr_cursor: usize,
    /// Smooth weighted round robin credit, as seen by the parent.
    pub(crate) wrr_credit: i64,
}

impl GroupNode {
    pub(crate) const fn has_headroom(&self) -> bool {
        self.running < self.settings.hard_concurrency_limit
    }

    pub(crate) const fn below_soft(&self) -> bool {
        self.running < self.settings.soft_concurrency_limit
    }

    pub(crate) fn queue_order(&self) -> QueueOrder {
        if self.settings.scheduling_policy == SchedulingPolicy::QueryPriority {
            QueueOrder::Priority
        } else {
            QueueOrder::Fifo
        }
    }

    pub(crate) const fn state(&self) -> GroupState {
        GroupState::from_counts(self.running, self.queued_in_subtree, &self.settings)
    }
}

#[derive(Debug)]
struct QueryRecord {
    group: GroupIndex,
    state: QueryState,
    sequence: Sequence,
}

/// Live mirror of the specification forest.
#[derive(Debug, Default)]
pub(crate) struct GroupTree {
    nodes: Vec<Option<GroupNode>>,
    free: Vec<usize>,
    by_id: HashMap<ResourceGroupId, GroupIndex>,
    roots: Vec<GroupIndex>,
    queries: HashMap<QueryId, QueryRecord>,
    next_sequence: Sequence,
    config_version: u64,
}

impl GroupTree {
    pub(crate) fn new(config_version: u64) -> Self {
        Self {
            config_version,
            ..Self::default()
        }
    }

    pub(crate) const fn config_version(&self) -> u64 {
        self.config_version
    }

    pub(crate) fn node(&self, index: GroupIndex) -> &GroupNode {
        self.nodes[index.0]
            .as_ref()
            .expect("group index refers to a retired node")
    }

    pub(crate) fn node_mut(&mut self, index: GroupIndex) -> &mut GroupNode {
        self.nodes[index.0]
            .as_mut()
            .expect("group index refers to a retired node")
    }

    fn live_indices(&self) -> Vec<GroupIndex> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(i, _)| GroupIndex(i))
            .collect()
    }

    pub(crate) fn roots(&self) -> Vec<GroupIndex> {
        self.roots.clone()
    }

    pub(crate) fn index_of(&self, id: &ResourceGroupId) -> Option<GroupIndex> {
        self.by_id.get(id).copied()
    }

    /// Indices from `index` up to its root, leaf first.
    pub(crate) fn chain(&self, index: GroupIndex) -> Vec<GroupIndex> {
        let mut chain = vec![index];
        let mut current = self.node(index).parent;
        while let Some(parent) = current {
            chain.push(parent);
            current = self.node(parent).parent;
        }
        chain
    }

    fn root_of(&self, index: GroupIndex) -> GroupIndex {
        let mut current = index;
        while let Some(parent) = self.node(current).parent {
            current = parent;
        }
        current
    }

    /// Make sure every group on the resolved path exists, creating missing
    /// ones from the specification. Nothing is created unless the whole
    /// chain has a specification.
    pub(crate) fn ensure_group(
        &mut self,
        spec: &ManagerSpec,
        resolution: &Resolution,
    ) -> Result<GroupIndex> {
        let path = resolution.group.path_from_root();
        if path.len() != resolution.template.depth() {
            return Err(ResourceGroupError::MissingResourceGroupSpec(
                resolution.group.to_string(),
            ));
        }

        let mut levels = Vec::with_capacity(path.len());
        for (depth, id) in path.into_iter().enumerate() {
            let template = resolution.template.prefix(depth + 1);
            let settings = spec.settings_for(&template).map_err(|_| {
                ResourceGroupError::MissingResourceGroupSpec(resolution.group.to_string())
            })?;
            levels.push((id, template, settings));
        }

        let mut parent = None;
        for (id, template, settings) in levels {
            let index = if let Some(existing) = self.index_of(&id) {
                // A live group stays bound to the template that created it,
                // even when a sibling template instantiates to the same id.
                // Only a deprecated group is rebound.
                let node = self.node_mut(existing);
                if node.deprecated {
                    tracing::info!("resource group {} revived as {}", id, template);
                    node.template = template;
                    node.settings = settings;
                    node.deprecated = false;
                } else if node.template != template {
                    tracing::debug!(
                        "resource group {} reached through {}, kept on {}",
                        id,
                        template,
                        node.template
                    );
                }
                existing
            } else {
                self.insert_node(id, template, settings, parent)
            };
            parent = Some(index);
        }

        parent.ok_or_else(|| {
            ResourceGroupError::MissingResourceGroupSpec(resolution.group.to_string())
        })
    }

    fn insert_node(
        &mut self,
        id: ResourceGroupId,
        template: ResourceGroupIdTemplate,
        settings: GroupSettings,
        parent: Option<GroupIndex>,
    ) -> GroupIndex {
        tracing::debug!("materializing resource group {}", id);
        let node = GroupNode {
            id: id.clone(),
            template,
            parent,
            children: Vec::new(),
            settings,
            running: 0,
            queue: GroupQueue::default(),
            queued_in_subtree: 0,
            counters: GroupCounters::default(),
            deprecated: false,
            rr_cursor: 0,
            wrr_credit: 0,
        };
        let index = if let Some(slot) = self.free.pop() {
            self.nodes[slot] = Some(node);
            GroupIndex(slot)
        } else {
            self.nodes.push(Some(node));
            GroupIndex(self.nodes.len() - 1)
        };
        self.by_id.insert(id, index);
        match parent {
            Some(parent) => self.node_mut(parent).children.push(index),
            None => self.roots.push(index),
        }
        index
    }

    /// Admit, queue, or reject a resolved query.
    pub(crate) fn submit(
        &mut self,
        spec: &ManagerSpec,
        resolution: &Resolution,
        context: &QueryContext,
        now_ms: u128,
    ) -> Result<AdmissionOutcome> {
        if self.queries.contains_key(&context.query_id) {
            return Err(ResourceGroupError::DuplicateQuery(
                context.query_id.to_string(),
            ));
        }

        let leaf = self.ensure_group(spec, resolution)?;
        let chain = self.chain(leaf);
        for &index in &chain {
            self.node_mut(index).counters.submitted += 1;
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        // All-or-nothing: every level must have headroom at once, and older
        // queued work at the leaf goes first.
        let can_run = self.node(leaf).queue.is_empty()
            && chain.iter().all(|&index| self.node(index).has_headroom());
        if can_run {
            for &index in &chain {
                self.node_mut(index).running += 1;
            }
            self.queries.insert(
                context.query_id.clone(),
                QueryRecord {
                    group: leaf,
                    state: QueryState::Running,
                    sequence,
                },
            );
            return Ok(AdmissionOutcome::Admitted {
                group: resolution.group.clone(),
            });
        }

        let node = self.node(leaf);
        if node.queue.len() >= node.settings.max_queued {
            let max_queued = node.settings.max_queued;
            for &index in &chain {
                self.node_mut(index).counters.rejected += 1;
            }
            return Err(ResourceGroupError::QueueFull(format!(
                "{} (max queued {max_queued})",
                resolution.group
            )));
        }

        self.node_mut(leaf).queue.push(QueuedQuery {
            query_id: context.query_id.clone(),
            sequence,
            priority: context.priority,
            queued_at_ms: now_ms,
        });
        for &index in &chain {
            self.node_mut(index).queued_in_subtree += 1;
        }
        self.queries.insert(
            context.query_id.clone(),
            QueryRecord {
                group: leaf,
                state: QueryState::Queued,
                sequence,
            },
        );

        let node = self.node(leaf);
        let position = node
            .queue
            .position(sequence, node.queue_order())
            .unwrap_or_else(|| node.queue.len());
        Ok(AdmissionOutcome::Queued {
            group: resolution.group.clone(),
            position,
        })
    }

    /// Release a running query's slot at every level; returns the root whose
    /// subtree gained capacity.
    pub(crate) fn complete(&mut self, query_id: &QueryId) -> Result<(ResourceGroupId, GroupIndex)> {
        let record = self
            .queries
            .get(query_id)
            .ok_or_else(|| ResourceGroupError::UnknownQuery(query_id.to_string()))?;
        if record.state != QueryState::Running {
            return Err(ResourceGroupError::NotRunning(query_id.to_string()));
        }
        let leaf = record.group;
        self.queries.remove(query_id);

        for index in self.chain(leaf) {
            let node = self.node_mut(index);
            debug_assert!(node.running > 0, "running underflow at {}", node.id);
            node.running = node.running.saturating_sub(1);
            node.counters.completed += 1;
        }
        Ok((self.node(leaf).id.clone(), self.root_of(leaf)))
    }

    /// Remove a queued query.
    pub(crate) fn withdraw(&mut self, query_id: &QueryId) -> Result<ResourceGroupId> {
        let record = self
            .queries
            .get(query_id)
            .ok_or_else(|| ResourceGroupError::UnknownQuery(query_id.to_string()))?;
        if record.state != QueryState::Queued {
            return Err(ResourceGroupError::NotQueued(query_id.to_string()));
        }
        let (leaf, sequence) = (record.group, record.sequence);
        self.queries.remove(query_id);

        self.node_mut(leaf).queue.remove(sequence);
        for index in self.chain(leaf) {
            let node = self.node_mut(index);
            debug_assert!(node.queued_in_subtree > 0, "queued underflow at {}", node.id);
            node.queued_in_subtree = node.queued_in_subtree.saturating_sub(1);
        }
        Ok(self.node(leaf).id.clone())
    }

    /// Move a queued entry to running along its whole chain.
    fn start_queued(&mut self, group: GroupIndex, sequence: Sequence) -> Option<StartedQuery> {
        let entry = self.node_mut(group).queue.remove(sequence)?;
        for index in self.chain(group) {
            let node = self.node_mut(index);
            debug_assert!(node.queued_in_subtree > 0, "queued underflow at {}", node.id);
            node.queued_in_subtree = node.queued_in_subtree.saturating_sub(1);
            node.running += 1;
        }
        if let Some(record) = self.queries.get_mut(&entry.query_id) {
            record.state = QueryState::Running;
        }
        Some(StartedQuery {
            query_id: entry.query_id,
            group: self.node(group).id.clone(),
        })
    }

    /// Admit queued work under `root` until the scheduler finds nothing
    /// eligible.
    pub(crate) fn drain(&mut self, root: GroupIndex) -> Vec<StartedQuery> {
        let mut started = Vec::new();
        while let Some((group, sequence)) = self.select_next(root) {
            match self.start_queued(group, sequence) {
                Some(query) => started.push(query),
                None => break,
            }
        }
        started
    }

    pub(crate) fn drain_all(&mut self) -> Vec<StartedQuery> {
        self.roots()
            .into_iter()
            .flat_map(|root| self.drain(root))
            .collect()
    }

    /// Apply a new specification snapshot to every live group.
    ///
    /// Surviving paths pick up their new settings immediately. Groups whose
    /// path disappeared are marked deprecated and keep their last settings.
    /// Returns the groups deprecated by this call.
    pub(crate) fn apply_spec(&mut self, spec: &ManagerSpec) -> Vec<ResourceGroupId> {
        let mut deprecated = Vec::new();
        for index in self.live_indices() {
            let node = self.node_mut(index);
            if let Ok(settings) = spec.settings_for(&node.template) {
                node.settings = settings;
                node.deprecated = false;
            } else if !node.deprecated {
                tracing::info!("resource group {} deprecated by reconfiguration", node.id);
                node.deprecated = true;
                deprecated.push(node.id.clone());
            }
        }
        self.config_version = spec.version();
        deprecated
    }

    /// Remove deprecated groups that hold no work and have no children.
    pub(crate) fn retire_idle(&mut self) -> Vec<ResourceGroupId> {
        let mut retired = Vec::new();
        loop {
            let idle: Vec<GroupIndex> = self
                .live_indices()
                .into_iter()
                .filter(|&index| {
                    let node = self.node(index);
                    node.deprecated
                        && node.running == 0
                        && node.queued_in_subtree == 0
                        && node.children.is_empty()
                })
                .collect();
            if idle.is_empty() {
                return retired;
            }
            for index in idle {
                retired.push(self.remove_node(index));
            }
        }
    }

    fn remove_node(&mut self, index: GroupIndex) -> ResourceGroupId {
        let node = self.nodes[index.0]
            .take()
            .expect("group index refers to a retired node");
        self.by_id.remove(&node.id);
        match node.parent {
            Some(parent) => self.node_mut(parent).children.retain(|&c| c != index),
            None => self.roots.retain(|&r| r != index),
        }
        self.free.push(index.0);
        tracing::info!("retired resource group {}", node.id);
        node.id
    }

    pub(crate) fn query_status(&self, query_id: &QueryId) -> Option<(QueryState, ResourceGroupId)> {
        self.queries
            .get(query_id)
            .map(|record| (record.state, self.node(record.group).id.clone()))
    }

    pub(crate) fn group_info(&self, index: GroupIndex) -> ResourceGroupInfo {
        let node = self.node(index);
        ResourceGroupInfo {
            id: node.id.clone(),
            template: node.template.to_string(),
            state: node.state(),
            running: node.running,
            queued: node.queue.len(),
            queued_in_subtree: node.queued_in_subtree,
            soft_concurrency_limit: node.settings.soft_concurrency_limit,
            hard_concurrency_limit: node.settings.hard_concurrency_limit,
            max_queued: node.settings.max_queued,
            scheduling_policy: node.settings.scheduling_policy,
            weight: node.settings.weight,
            submitted: node.counters.submitted,
            completed: node.counters.completed,
            rejected: node.counters.rejected,
            deprecated: node.deprecated,
            children: node
                .children
                .iter()
                .map(|&c| self.node(c).id.clone())
                .collect(),
        }
    }

    /// Copy the raw state observers need. Sorting and position numbering
    /// are left to [`TreeCapture::into_snapshot`], outside the tree lock.
    pub(crate) fn capture(&self) -> TreeCapture {
        let live = self.live_indices();
        let mut groups = Vec::with_capacity(live.len());
        let mut queues = Vec::new();
        for index in live {
            let node = self.node(index);
            groups.push(self.group_info(index));
            if !node.queue.is_empty() {
                queues.push(CapturedQueue {
                    group: node.id.clone(),
                    order: node.queue_order(),
                    entries: node.queue.entries().cloned().collect(),
                });
            }
        }
        let running = self
            .queries
            .iter()
            .filter(|(_, record)| record.state == QueryState::Running)
            .map(|(query_id, record)| StartedQuery {
                query_id: query_id.clone(),
                group: self.node(record.group).id.clone(),
            })
            .collect();
        TreeCapture {
            config_version: self.config_version,
            groups,
            queues,
            running,
        }
    }
}

/// One group's queued entries, in enqueue order.
#[derive(Debug)]
pub(crate) struct CapturedQueue {
    group: ResourceGroupId,
    order: QueueOrder,
    entries: Vec<QueuedQuery>,
}

/// Unsorted copy of the tree taken under its lock.
#[derive(Debug)]
pub(crate) struct TreeCapture {
    config_version: u64,
    groups: Vec<ResourceGroupInfo>,
    queues: Vec<CapturedQueue>,
    running: Vec<StartedQuery>,
}

impl TreeCapture {
    pub(crate) fn into_snapshot(self, taken_at_ms: u128) -> QueueSnapshot {
        let mut groups = self.groups;
        groups.sort_by(|a, b| a.id.cmp(&b.id));

        let mut queued = Vec::new();
        for CapturedQueue {
            group,
            order,
            mut entries,
        } in self.queues
        {
            if order == QueueOrder::Priority {
                entries.sort_by_key(|entry| PriorityKey {
                    priority: entry.priority,
                    sequence: entry.sequence,
                });
            }
            let root = group.root_id();
            queued.extend(entries.into_iter().enumerate().map(|(i, entry)| QueuedQueryInfo {
                query_id: entry.query_id,
                group: group.clone(),
                root_group: root.clone(),
                priority: entry.priority,
                queued_at_ms: entry.queued_at_ms,
                approximate_position: i + 1,
            }));
        }

        let mut running = self.running;
        running.sort_by(|a, b| a.query_id.cmp(&b.query_id));
        QueueSnapshot {
            taken_at_ms,
            config_version: self.config_version,
            groups,
            queued,
            running,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GroupConfig, ResourceGroupsConfig, SelectorConfig};

    fn spec(roots: Vec<GroupConfig>, selectors: Vec<SelectorConfig>) -> ManagerSpec {
        ManagerSpec::from_config(&ResourceGroupsConfig {
            root_groups: roots,
            selectors,
            cpu_quota_period: None,
        })
        .unwrap()
        .with_version(1)
    }

    fn nested() -> ManagerSpec {
        spec(
            vec![GroupConfig::new("global", 3, 10)
                .with_sub_group(GroupConfig::new("${USER}", 2, 1))],
            vec![SelectorConfig::new("global.${USER}")],
        )
    }

    fn submit(tree: &mut GroupTree, spec: &ManagerSpec, id: &str, user: &str) -> Result<AdmissionOutcome> {
        let ctx = QueryContext::new(id, user);
        let resolution = spec.resolve(&ctx)?;
        tree.submit(spec, &resolution, &ctx, 0)
    }

    fn assert_sum_invariant(tree: &GroupTree) {
        for index in tree.live_indices() {
            let node = tree.node(index);
            assert!(node.running <= node.settings.hard_concurrency_limit || node.deprecated);
            if !node.children.is_empty() {
                let children: u32 = node.children.iter().map(|&c| tree.node(c).running).sum();
                let direct = tree
                    .queries
                    .values()
                    .filter(|r| r.group == index && r.state == QueryState::Running)
                    .count();
                assert_eq!(node.running, children + u32::try_from(direct).unwrap());
            }
        }
    }

    #[test]
    fn materializes_ancestors_lazily() {
        let spec = nested();
        let mut tree = GroupTree::new(1);
        assert!(tree.roots().is_empty());
        submit(&mut tree, &spec, "q1", "alice").unwrap();
        let alice = ResourceGroupId::parse("global.alice").unwrap();
        let index = tree.index_of(&alice).unwrap();
        assert_eq!(tree.chain(index).len(), 2);
        assert_eq!(tree.roots().len(), 1);
        assert_eq!(tree.node(index).template.to_string(), "global.${USER}");
    }

    #[test]
    fn nested_quota_blocks_at_parent() {
        let spec = nested();
        let mut tree = GroupTree::new(1);
        assert!(matches!(submit(&mut tree, &spec, "a1", "alice"), Ok(AdmissionOutcome::Admitted { .. })));
        assert!(matches!(submit(&mut tree, &spec, "a2", "alice"), Ok(AdmissionOutcome::Admitted { .. })));
        // alice's own hard limit is 2
        assert!(matches!(submit(&mut tree, &spec, "a3", "alice"), Ok(AdmissionOutcome::Queued { position: 1, .. })));
        assert!(matches!(submit(&mut tree, &spec, "a4", "alice"), Err(ResourceGroupError::QueueFull(_))));
        // global has one slot left
        assert!(matches!(submit(&mut tree, &spec, "b1", "bob"), Ok(AdmissionOutcome::Admitted { .. })));
        assert!(matches!(submit(&mut tree, &spec, "b2", "bob"), Ok(AdmissionOutcome::Queued { .. })));
        assert_sum_invariant(&tree);

        let (_, root) = tree.complete(&QueryId::from("b1")).unwrap();
        let started = tree.drain(root);
        assert_eq!(started.len(), 1);
        assert_sum_invariant(&tree);
    }

    #[test]
    fn complete_and_withdraw_check_state() {
        let spec = nested();
        let mut tree = GroupTree::new(1);
        submit(&mut tree, &spec, "a1", "alice").unwrap();
        submit(&mut tree, &spec, "a2", "alice").unwrap();
        submit(&mut tree, &spec, "a3", "alice").unwrap();

        assert!(matches!(tree.withdraw(&"a1".into()), Err(ResourceGroupError::NotQueued(_))));
        assert!(matches!(tree.complete(&"a3".into()), Err(ResourceGroupError::NotRunning(_))));
        assert!(matches!(tree.complete(&"zz".into()), Err(ResourceGroupError::UnknownQuery(_))));
        assert!(matches!(submit(&mut tree, &spec, "a1", "alice"), Err(ResourceGroupError::DuplicateQuery(_))));

        tree.withdraw(&"a3".into()).unwrap();
        let alice = tree.index_of(&ResourceGroupId::parse("global.alice").unwrap()).unwrap();
        assert_eq!(tree.node(alice).queued_in_subtree, 0);
        assert_eq!(tree.node(tree.root_of(alice)).queued_in_subtree, 0);
    }

    #[test]
    fn deprecated_idle_groups_are_retired() {
        let old = nested();
        let mut tree = GroupTree::new(1);
        submit(&mut tree, &old, "a1", "alice").unwrap();

        let new = spec(
            vec![GroupConfig::new("other", 1, 1)],
            vec![SelectorConfig::new("other")],
        )
        .with_version(2);
        assert_eq!(tree.apply_spec(&new).len(), 2);
        assert!(tree.retire_idle().is_empty(), "alice still has a running query");

        let (_, _) = tree.complete(&"a1".into()).unwrap();
        let retired = tree.retire_idle();
        let names: Vec<String> = retired.iter().map(ToString::to_string).collect();
        assert_eq!(names, ["global.alice", "global"]);
        assert!(tree.roots().is_empty());
    }

    #[test]
    fn live_group_keeps_its_first_binding() {
        let spec = spec(
            vec![GroupConfig::new("g", 10, 10)
                .with_sub_group(GroupConfig::new("alice", 5, 10))
                .with_sub_group(GroupConfig::new("${USER}", 1, 10))],
            vec![
                SelectorConfig::new("g.alice").with_source("x"),
                SelectorConfig::new("g.${USER}"),
            ],
        );
        let mut tree = GroupTree::new(1);
        let via_literal = QueryContext::new("q1", "alice").with_source("x");
        let resolution = spec.resolve(&via_literal).unwrap();
        tree.submit(&spec, &resolution, &via_literal, 0).unwrap();
        let alice = tree.index_of(&ResourceGroupId::parse("g.alice").unwrap()).unwrap();
        assert_eq!(tree.node(alice).settings.hard_concurrency_limit, 5);

        // Same concrete id through the variable template: still one group,
        // still charged under the literal specification.
        assert!(matches!(
            submit(&mut tree, &spec, "q2", "alice"),
            Ok(AdmissionOutcome::Admitted { .. })
        ));
        let node = tree.node(alice);
        assert_eq!(node.settings.hard_concurrency_limit, 5);
        assert_eq!(node.template.to_string(), "g.alice");
        assert_eq!(node.running, 2);
        assert_eq!(tree.node(tree.root_of(alice)).children.len(), 1);
    }

    #[test]
    fn counters_return_to_zero_after_every_exit_path() {
        let spec = nested();
        let mut tree = GroupTree::new(1);
        for (id, user) in [("a1", "alice"), ("a2", "alice"), ("a3", "alice"), ("b1", "bob"), ("b2", "bob")] {
            let _ = submit(&mut tree, &spec, id, user);
        }
        tree.withdraw(&"b2".into()).unwrap();
        let mut pending = vec![QueryId::from("a1"), QueryId::from("a2"), QueryId::from("b1")];
        while let Some(query) = pending.pop() {
            let (_, root) = tree.complete(&query).unwrap();
            pending.extend(tree.drain(root).into_iter().map(|s| s.query_id));
            assert_sum_invariant(&tree);
        }

        for index in tree.live_indices() {
            let node = tree.node(index);
            assert_eq!((node.running, node.queued_in_subtree), (0, 0), "{}", node.id);
        }
        // Everything submitted finished, except the one withdrawn entry.
        let root = tree.node(tree.roots()[0]);
        assert_eq!(root.counters.submitted, root.counters.completed + 1);
        assert!(tree.queries.is_empty());
    }

    #[test]
    fn state_classification() {
        let settings = GroupSettings {
            soft_concurrency_limit: 1,
            hard_concurrency_limit: 2,
            max_queued: 1,
            scheduling_policy: SchedulingPolicy::Fair,
            weight: 1,
        };
        assert_eq!(GroupState::from_counts(0, 0, &settings), GroupState::Empty);
        assert_eq!(GroupState::from_counts(0, 1, &settings), GroupState::BelowSoft);
        assert_eq!(GroupState::from_counts(1, 0, &settings), GroupState::AtSoftBelowHard);
        assert_eq!(GroupState::from_counts(2, 0, &settings), GroupState::AtHard);
    }
}
