//! Group identifiers, routing, specification, and admission accounting.

pub mod audit;
pub mod configuration;
pub mod context;
pub mod error;
pub mod identifier;
pub mod info;
pub mod manager;
mod queue;
mod scheduler;
pub mod selector;
pub mod spec;
mod tree;

pub use audit::{
    build_audit_event, AuditAction, AuditEvent, AuditSink, InMemoryAuditSink, TracingAuditSink,
};
pub use configuration::{summarize, ConfigurationManager, ConfigurationSummary};
pub use context::{QueryContext, QueryId, DEFAULT_QUERY_PRIORITY};
pub use error::{AppResult, ResourceGroupError, Result};
pub use identifier::{ResourceGroupId, ResourceGroupIdTemplate, SegmentTemplate};
pub use info::{QueryStatus, QueueSnapshot, QueuedQueryInfo, ResourceGroupInfo, StartedQuery};
pub use manager::{AdmissionOutcome, ReconfigurationReport, ResourceGroupManager};
pub use selector::{resolve, PatternPredicate, Resolution, Selector, SelectorSummary, SetPredicate};
pub use spec::{GroupSettings, ManagerSpec, ResourceGroupSpec, SchedulingPolicy};
pub use tree::{GroupState, QueryState};
