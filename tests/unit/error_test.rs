//! Tests for error types

use prometheus_resource_groups::core::ResourceGroupError;

#[test]
fn test_queue_full_error() {
    let err = ResourceGroupError::QueueFull("global.alice".to_string());
    assert_eq!(format!("{}", err), "queue full: global.alice");
    assert_eq!(err.reason(), "queue_full");
}

#[test]
fn test_missing_variable_error() {
    let err = ResourceGroupError::MissingVariable("SOURCE".to_string());
    assert_eq!(format!("{}", err), "missing template variable: SOURCE");
    assert_eq!(err.reason(), "missing_variable");
}

#[test]
fn test_bookkeeping_errors() {
    assert_eq!(
        ResourceGroupError::NotQueued("q1".into()).to_string(),
        "query q1 is not queued"
    );
    assert_eq!(
        ResourceGroupError::NotRunning("q1".into()).to_string(),
        "query q1 is not running"
    );
    assert_eq!(
        ResourceGroupError::UnknownQuery("q1".into()).reason(),
        "unknown_query"
    );
}

#[test]
fn test_invalid_config_converts_to_anyhow() {
    let err: anyhow::Error = ResourceGroupError::InvalidConfig("bad".into()).into();
    assert_eq!(err.to_string(), "invalid configuration: bad");
}
