//! Tests for audit sink

use prometheus_resource_groups::core::{
    build_audit_event, AuditAction, AuditSink, InMemoryAuditSink, QueryId, ResourceGroupId,
    TracingAuditSink,
};

#[test]
fn test_in_memory_audit_sink() {
    let mut sink = InMemoryAuditSink::new(10);
    let query = QueryId::from("q1");
    let group = ResourceGroupId::parse("global.alice").unwrap();

    let event = build_audit_event(AuditAction::Enqueue, Some(&query), Some(&group), Some("position 1".into()));
    sink.record(event.clone());

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_id, event.event_id);
    assert_eq!(events[0].query_id.as_ref().unwrap().as_str(), "q1");
    assert_eq!(events[0].group.as_ref().unwrap().to_string(), "global.alice");
    assert_eq!(events[0].action, AuditAction::Enqueue);
}

#[test]
fn test_audit_sink_overflow() {
    let mut sink = InMemoryAuditSink::new(2);
    for id in ["q1", "q2", "q3"] {
        sink.record(build_audit_event(AuditAction::Admit, Some(&id.into()), None, None));
    }

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].query_id.as_ref().unwrap().as_str(), "q2"); // First one popped
    assert_eq!(events[1].query_id.as_ref().unwrap().as_str(), "q3");
}

#[test]
fn test_build_audit_event() {
    let a = build_audit_event(AuditAction::Reconfigure, None, None, Some("version 2".into()));
    let b = build_audit_event(AuditAction::Reconfigure, None, None, None);

    assert_ne!(a.event_id, b.event_id);
    assert!(uuid::Uuid::parse_str(&a.event_id).is_ok());
    assert_eq!(a.action.to_string(), "reconfigure");
    assert_eq!(a.detail.as_deref(), Some("version 2"));
    assert!(a.created_at_ms > 0);
}

#[test]
fn test_audit_event_serializes_camel_case() {
    let event = build_audit_event(AuditAction::Reject, Some(&"q9".into()), None, Some("queue_full".into()));
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["action"], "reject");
    assert_eq!(json["queryId"], "q9");
    assert!(json["group"].is_null());
}

#[test]
fn test_tracing_sink_accepts_events() {
    let mut sink = TracingAuditSink;
    sink.record(build_audit_event(AuditAction::Start, Some(&"q1".into()), None, None));
}
