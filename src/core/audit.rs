//! Audit sink implementations.
//!
//! The manager emits one event per admission decision, queue transition, and
//! reconfiguration. Events are built after the tree lock is released.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

use crate::core::context::QueryId;
use crate::core::identifier::ResourceGroupId;
use crate::util::clock::now_ms;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    /// Started immediately on submission.
    Admit,
    /// Parked in a leaf queue.
    Enqueue,
    /// Refused at submission.
    Reject,
    /// Moved from a queue to running.
    Start,
    /// Finished running.
    Complete,
    /// Removed from a queue by its owner.
    Withdraw,
    /// A new configuration was installed.
    Reconfigure,
    /// A deprecated group was removed.
    Retire,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Admit => "admit",
            Self::Enqueue => "enqueue",
            Self::Reject => "reject",
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Withdraw => "withdraw",
            Self::Reconfigure => "reconfigure",
            Self::Retire => "retire",
        };
        f.write_str(name)
    }
}

/// Audit event structure.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    /// Event identifier.
    pub event_id: String,
    /// Related query, if any.
    pub query_id: Option<QueryId>,
    /// Related group, if any.
    pub group: Option<ResourceGroupId>,
    /// Action taken.
    pub action: AuditAction,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
    /// Additional context, e.g. a rejection reason.
    pub detail: Option<String>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send {
    /// Record an audit event.
    fn record(&mut self, event: AuditEvent);
}

/// In-memory audit sink for testing and dev.
pub struct InMemoryAuditSink {
    events: VecDeque<AuditEvent>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_events),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.iter().cloned().collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&mut self, event: AuditEvent) {
        if self.max_events == 0 {
            return;
        }
        if self.events.len() >= self.max_events {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

/// Shared handle, so a caller can keep reading a sink it handed to the
/// manager.
impl<S: AuditSink> AuditSink for Arc<Mutex<S>> {
    fn record(&mut self, event: AuditEvent) {
        self.lock().record(event);
    }
}

/// Sink that forwards every event to `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&mut self, event: AuditEvent) {
        tracing::debug!(
            event_id = %event.event_id,
            action = %event.action,
            query = ?event.query_id.as_ref().map(QueryId::as_str),
            group = ?event.group.as_ref().map(ToString::to_string),
            detail = ?event.detail,
            "resource group audit"
        );
    }
}

/// Helper to build an audit event with a fresh identifier.
#[must_use]
pub fn build_audit_event(
    action: AuditAction,
    query_id: Option<&QueryId>,
    group: Option<&ResourceGroupId>,
    detail: Option<String>,
) -> AuditEvent {
    AuditEvent {
        event_id: Uuid::new_v4().to_string(),
        query_id: query_id.cloned(),
        group: group.cloned(),
        action,
        created_at_ms: now_ms(),
        detail,
    }
}
