//! Selection of the next queued entry to start.
//!
//! Selection descends from a root, applying each internal node's policy to
//! pick a child, until it reaches a node with its own queued work. The two
//! recursive policies instead rank every queue in the deciding node's
//! subtree, its own queue included.
//! All traversals use explicit stacks so deep trees cannot exhaust the call
//! stack.

use std::cmp::Reverse;

use crate::core::queue::{PriorityKey, QueueOrder, QueuedQuery, Sequence};
use crate::core::spec::SchedulingPolicy;
use crate::core::tree::{GroupIndex, GroupTree};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum CandidateKey {
    Priority(PriorityKey),
    /// Path weights below the deciding node, higher first, then enqueue order.
    WeightedFifo(Vec<Reverse<u32>>, Sequence),
}

impl GroupTree {
    /// Next `(group, sequence)` that may start under `start`, if any.
    pub(crate) fn select_next(&mut self, start: GroupIndex) -> Option<(GroupIndex, Sequence)> {
        let mut current = start;
        loop {
            let node = self.node(current);
            if !node.has_headroom() || node.queued_in_subtree == 0 {
                return None;
            }
            let policy = node.settings.scheduling_policy;
            if policy.is_recursive() {
                return self.pick_subtree_wide(current, policy);
            }
            // A node that gained children after a reconfiguration may still
            // hold entries of its own; those go first.
            if let Some(head) = node.queue.peek(node.queue_order()) {
                return Some((current, head.sequence));
            }
            current = if policy == SchedulingPolicy::Weighted {
                self.pick_weighted(current)?
            } else {
                self.pick_fair(current)?
            };
        }
    }

    /// Whether anything under `start` could be started right now.
    fn has_eligible(&self, start: GroupIndex) -> bool {
        let mut stack = vec![start];
        while let Some(index) = stack.pop() {
            let node = self.node(index);
            if !node.has_headroom() || node.queued_in_subtree == 0 {
                continue;
            }
            if !node.queue.is_empty() {
                return true;
            }
            stack.extend(node.children.iter().copied());
        }
        false
    }

    /// Eligible children with their positions, restricted to those below
    /// their soft limit when any are.
    fn candidate_children(&self, parent: GroupIndex) -> Vec<(usize, GroupIndex)> {
        let eligible: Vec<(usize, GroupIndex)> = self
            .node(parent)
            .children
            .iter()
            .copied()
            .enumerate()
            .filter(|&(_, child)| self.has_eligible(child))
            .collect();
        let below_soft: Vec<(usize, GroupIndex)> = eligible
            .iter()
            .copied()
            .filter(|&(_, child)| self.node(child).below_soft())
            .collect();
        if below_soft.is_empty() {
            eligible
        } else {
            below_soft
        }
    }

    fn pick_fair(&mut self, parent: GroupIndex) -> Option<GroupIndex> {
        let candidates = self.candidate_children(parent);
        let node = self.node(parent);
        let cursor = node.rr_cursor % node.children.len().max(1);
        let &(position, chosen) = candidates
            .iter()
            .find(|&&(position, _)| position >= cursor)
            .or_else(|| candidates.first())?;
        self.node_mut(parent).rr_cursor = position + 1;
        Some(chosen)
    }

    /// Smooth weighted round robin over the eligible children.
    fn pick_weighted(&mut self, parent: GroupIndex) -> Option<GroupIndex> {
        let candidates = self.candidate_children(parent);
        let total: i64 = candidates
            .iter()
            .map(|&(_, child)| i64::from(self.node(child).settings.weight))
            .sum();

        let mut best: Option<(GroupIndex, i64)> = None;
        for &(_, child) in &candidates {
            let node = self.node_mut(child);
            node.wrr_credit += i64::from(node.settings.weight);
            let credit = node.wrr_credit;
            if best.is_none_or(|(_, top)| credit > top) {
                best = Some((child, credit));
            }
        }
        let (chosen, _) = best?;
        self.node_mut(chosen).wrr_credit -= total;
        Some(chosen)
    }

    /// Best queued entry anywhere below `start` under a recursive policy.
    fn pick_subtree_wide(
        &self,
        start: GroupIndex,
        policy: SchedulingPolicy,
    ) -> Option<(GroupIndex, Sequence)> {
        let order = if policy == SchedulingPolicy::QueryPriority {
            QueueOrder::Priority
        } else {
            QueueOrder::Fifo
        };

        // Entries left at the deciding node itself compete on an empty path.
        let own = self.node(start).queue.peek(order);
        let mut best: Option<(CandidateKey, GroupIndex, Sequence)> =
            own.map(|head| (candidate_key(policy, head, Vec::new()), start, head.sequence));
        let mut stack: Vec<(GroupIndex, Vec<Reverse<u32>>)> = self
            .node(start)
            .children
            .iter()
            .map(|&child| (child, Vec::new()))
            .collect();

        while let Some((index, mut path)) = stack.pop() {
            let node = self.node(index);
            if !node.has_headroom() || node.queued_in_subtree == 0 {
                continue;
            }
            path.push(Reverse(node.settings.weight));

            if let Some(head) = node.queue.peek(order) {
                let key = candidate_key(policy, head, path.clone());
                if best.as_ref().is_none_or(|(top, _, _)| key < *top) {
                    best = Some((key, index, head.sequence));
                }
            }
            stack.extend(node.children.iter().map(|&child| (child, path.clone())));
        }

        best.map(|(_, index, sequence)| (index, sequence))
    }
}

fn candidate_key(
    policy: SchedulingPolicy,
    head: &QueuedQuery,
    path: Vec<Reverse<u32>>,
) -> CandidateKey {
    if policy == SchedulingPolicy::QueryPriority {
        CandidateKey::Priority(PriorityKey {
            priority: head.priority,
            sequence: head.sequence,
        })
    } else {
        CandidateKey::WeightedFifo(path, head.sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GroupConfig, ResourceGroupsConfig, SelectorConfig};
    use crate::core::context::{QueryContext, QueryId};
    use crate::core::spec::ManagerSpec;

    fn spec(root: GroupConfig, selectors: Vec<SelectorConfig>) -> ManagerSpec {
        ManagerSpec::from_config(&ResourceGroupsConfig {
            root_groups: vec![root],
            selectors,
            cpu_quota_period: None,
        })
        .unwrap()
        .with_version(1)
    }

    fn by_source(group: &str) -> SelectorConfig {
        SelectorConfig::new(group).with_source(group.rsplit('.').next().unwrap())
    }

    fn submit(tree: &mut GroupTree, spec: &ManagerSpec, id: &str, source: &str, priority: i32) {
        let ctx = QueryContext::new(id, "u").with_source(source).with_priority(priority);
        let resolution = spec.resolve(&ctx).unwrap();
        tree.submit(spec, &resolution, &ctx, 0).unwrap();
    }

    /// Complete `running`, drain, and return whatever started.
    fn cycle(tree: &mut GroupTree, running: &str) -> Vec<String> {
        let (_, root) = tree.complete(&QueryId::from(running)).unwrap();
        tree.drain(root)
            .into_iter()
            .map(|s| s.query_id.as_str().to_string())
            .collect()
    }

    fn two_children(policy: SchedulingPolicy, a_weight: u32, b_weight: u32) -> ManagerSpec {
        spec(
            GroupConfig::new("root", 1, 100)
                .with_policy(policy)
                .with_sub_group(GroupConfig::new("a", 1, 100).with_weight(a_weight))
                .with_sub_group(GroupConfig::new("b", 1, 100).with_weight(b_weight)),
            vec![by_source("root.a"), by_source("root.b")],
        )
    }

    #[test]
    fn fair_alternates_between_children() {
        let spec = two_children(SchedulingPolicy::Fair, 1, 1);
        let mut tree = GroupTree::new(1);
        submit(&mut tree, &spec, "first", "a", 1);
        for i in 0..3 {
            submit(&mut tree, &spec, &format!("a{i}"), "a", 1);
            submit(&mut tree, &spec, &format!("b{i}"), "b", 1);
        }

        let mut order = Vec::new();
        let mut running = "first".to_string();
        for _ in 0..6 {
            let started = cycle(&mut tree, &running);
            assert_eq!(started.len(), 1);
            running = started[0].clone();
            order.push(running.chars().next().unwrap());
        }
        assert_eq!(order, ['a', 'b', 'a', 'b', 'a', 'b']);
    }

    #[test]
    fn weighted_follows_weights() {
        let spec = two_children(SchedulingPolicy::Weighted, 2, 1);
        let mut tree = GroupTree::new(1);
        submit(&mut tree, &spec, "first", "a", 1);
        for i in 0..6 {
            submit(&mut tree, &spec, &format!("a{i}"), "a", 1);
            submit(&mut tree, &spec, &format!("b{i}"), "b", 1);
        }

        let mut running = "first".to_string();
        let (mut a, mut b) = (0, 0);
        for _ in 0..6 {
            let started = cycle(&mut tree, &running);
            running = started[0].clone();
            if running.starts_with('a') {
                a += 1;
            } else {
                b += 1;
            }
        }
        assert_eq!((a, b), (4, 2));
    }

    #[test]
    fn query_priority_scans_whole_subtree() {
        let spec = two_children(SchedulingPolicy::QueryPriority, 1, 1);
        let mut tree = GroupTree::new(1);
        submit(&mut tree, &spec, "first", "a", 1);
        submit(&mut tree, &spec, "a-low", "a", 1);
        submit(&mut tree, &spec, "b-high", "b", 9);
        submit(&mut tree, &spec, "a-mid", "a", 5);

        assert_eq!(cycle(&mut tree, "first"), ["b-high"]);
        assert_eq!(cycle(&mut tree, "b-high"), ["a-mid"]);
        assert_eq!(cycle(&mut tree, "a-mid"), ["a-low"]);
    }

    #[test]
    fn weighted_fifo_prefers_heavier_path_then_age() {
        let spec = two_children(SchedulingPolicy::WeightedFifo, 1, 5);
        let mut tree = GroupTree::new(1);
        submit(&mut tree, &spec, "first", "a", 1);
        submit(&mut tree, &spec, "a-old", "a", 1);
        submit(&mut tree, &spec, "b-new", "b", 1);
        submit(&mut tree, &spec, "b-newer", "b", 1);

        assert_eq!(cycle(&mut tree, "first"), ["b-new"]);
        assert_eq!(cycle(&mut tree, "b-new"), ["b-newer"]);
        assert_eq!(cycle(&mut tree, "b-newer"), ["a-old"]);
    }

    #[test]
    fn child_at_hard_limit_is_skipped() {
        let spec = spec(
            GroupConfig::new("root", 3, 100)
                .with_sub_group(GroupConfig::new("a", 1, 100))
                .with_sub_group(GroupConfig::new("b", 2, 100)),
            vec![by_source("root.a"), by_source("root.b")],
        );
        let mut tree = GroupTree::new(1);
        submit(&mut tree, &spec, "a1", "a", 1);
        submit(&mut tree, &spec, "a2", "a", 1);
        submit(&mut tree, &spec, "b1", "b", 1);
        submit(&mut tree, &spec, "b2", "b", 1);
        submit(&mut tree, &spec, "b3", "b", 1);

        // root is full (a1, b1, b2); finishing b1 must start b3, not a2.
        assert_eq!(cycle(&mut tree, "b1"), ["b3"]);
    }
}
