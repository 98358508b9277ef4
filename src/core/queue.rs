//! Per-group queue with FIFO and priority views.
//!
//! Entries are indexed twice: by enqueue sequence (FIFO order) and by
//! `(priority desc, sequence asc)`. Which view is consulted depends on the
//! group's policy and may change on reconfiguration without rebuilding.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::core::context::QueryId;

/// Monotonic enqueue sequence; lower means earlier.
pub(crate) type Sequence = u64;

/// Order in which a group's own queue is drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QueueOrder {
    Fifo,
    Priority,
}

/// A query waiting at a group.
#[derive(Debug, Clone)]
pub(crate) struct QueuedQuery {
    pub(crate) query_id: QueryId,
    pub(crate) sequence: Sequence,
    pub(crate) priority: i32,
    pub(crate) queued_at_ms: u128,
}

/// Ordering key: higher priority first, earlier sequence within a priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PriorityKey {
    pub(crate) priority: i32,
    pub(crate) sequence: Sequence,
}

impl PartialOrd for PriorityKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PriorityKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| self.sequence.cmp(&other.sequence))
    }
}

#[derive(Debug, Default)]
pub(crate) struct GroupQueue {
    fifo: BTreeMap<Sequence, QueuedQuery>,
    by_priority: BTreeSet<PriorityKey>,
}

impl GroupQueue {
    pub(crate) fn push(&mut self, entry: QueuedQuery) {
        self.by_priority.insert(PriorityKey {
            priority: entry.priority,
            sequence: entry.sequence,
        });
        self.fifo.insert(entry.sequence, entry);
    }

    pub(crate) fn remove(&mut self, sequence: Sequence) -> Option<QueuedQuery> {
        let entry = self.fifo.remove(&sequence)?;
        self.by_priority.remove(&PriorityKey {
            priority: entry.priority,
            sequence,
        });
        Some(entry)
    }

    /// Next entry under `order`.
    pub(crate) fn peek(&self, order: QueueOrder) -> Option<&QueuedQuery> {
        match order {
            QueueOrder::Fifo => self.fifo.values().next(),
            QueueOrder::Priority => self
                .by_priority
                .first()
                .and_then(|key| self.fifo.get(&key.sequence)),
        }
    }

    /// 1-based position of `sequence` under `order`.
    pub(crate) fn position(&self, sequence: Sequence, order: QueueOrder) -> Option<usize> {
        let entry = self.fifo.get(&sequence)?;
        let ahead = match order {
            QueueOrder::Fifo => self.fifo.range(..sequence).count(),
            QueueOrder::Priority => self
                .by_priority
                .range(
                    ..PriorityKey {
                        priority: entry.priority,
                        sequence,
                    },
                )
                .count(),
        };
        Some(ahead + 1)
    }

    /// Entries in enqueue order.
    pub(crate) fn entries(&self) -> impl Iterator<Item = &QueuedQuery> {
        self.fifo.values()
    }

    pub(crate) fn len(&self) -> usize {
        self.fifo.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.fifo.is_empty()
    }
}
