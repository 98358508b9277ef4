//! Tests for selector routing through a validated configuration

use prometheus_resource_groups::core::{ConfigurationManager, QueryContext, ResourceGroupError};

const DOC: &str = r#"{
    "rootGroups": [{
        "name": "global", "hardConcurrencyLimit": 10, "maxQueued": 10,
        "subGroups": [
            { "name": "etl", "hardConcurrencyLimit": 5, "maxQueued": 10 },
            { "name": "dashboards", "hardConcurrencyLimit": 5, "maxQueued": 10 },
            { "name": "svc-${SOURCE}", "hardConcurrencyLimit": 2, "maxQueued": 10 },
            { "name": "${USER}", "hardConcurrencyLimit": 1, "maxQueued": 10 }
        ]
    }],
    "selectors": [
        { "source": "airflow-.*", "group": "global.etl" },
        { "clientTags": ["dashboard"], "queryType": ["SELECT"], "group": "global.dashboards" },
        { "user": "svc_.*", "group": "global.svc-${SOURCE}" },
        { "group": "global.${USER}" }
    ]
}"#;

#[test]
fn test_source_selector() {
    let manager = ConfigurationManager::load(DOC).unwrap();
    let ctx = QueryContext::new("q1", "alice").with_source("airflow-prod");
    assert_eq!(manager.resolve(&ctx).unwrap().group.to_string(), "global.etl");
}

#[test]
fn test_tags_and_type_selector() {
    let manager = ConfigurationManager::load(DOC).unwrap();
    let tagged = QueryContext::new("q1", "alice")
        .with_client_tag("dashboard")
        .with_client_tag("finance")
        .with_query_type("SELECT");
    assert_eq!(manager.resolve(&tagged).unwrap().group.to_string(), "global.dashboards");

    let insert = QueryContext::new("q2", "alice")
        .with_client_tag("dashboard")
        .with_query_type("INSERT");
    assert_eq!(manager.resolve(&insert).unwrap().group.to_string(), "global.alice");
}

#[test]
fn test_winning_selector_with_unbound_variable_rejects() {
    let manager = ConfigurationManager::load(DOC).unwrap();
    let err = manager.resolve(&QueryContext::new("q1", "svc_batch")).unwrap_err();
    assert_eq!(err, ResourceGroupError::MissingVariable("SOURCE".into()));
}

#[test]
fn test_fallback_selector() {
    let manager = ConfigurationManager::load(DOC).unwrap();
    let resolution = manager.resolve(&QueryContext::new("q1", "bob")).unwrap();
    assert_eq!(resolution.group.to_string(), "global.bob");
    assert_eq!(resolution.selector_index, 3);
}
