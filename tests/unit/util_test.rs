//! Tests for utility functions

use prometheus_resource_groups::util::{init_tracing, now_ms, DEFAULT_LOG_FILTER};

#[test]
fn test_now_ms_advances() {
    let a = now_ms();
    std::thread::sleep(std::time::Duration::from_millis(2));
    assert!(now_ms() > a);
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
    assert_eq!(DEFAULT_LOG_FILTER, "info");
}
