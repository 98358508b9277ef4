//! Tests for builder modules

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use prometheus_resource_groups::builders::ResourceGroupManagerBuilder;
use prometheus_resource_groups::config::{EnvSettings, GroupConfig, ResourceGroupsConfig, SelectorConfig};
use prometheus_resource_groups::core::{AuditAction, InMemoryAuditSink, QueryContext};

fn config() -> ResourceGroupsConfig {
    ResourceGroupsConfig {
        root_groups: vec![GroupConfig::new("global", 1, 1)],
        selectors: vec![SelectorConfig::new("global")],
        cpu_quota_period: None,
    }
}

#[test]
fn test_builder_from_config_with_audit() {
    let sink = Arc::new(Mutex::new(InMemoryAuditSink::new(8)));
    let manager = ResourceGroupManagerBuilder::new()
        .with_config(config())
        .with_audit(Box::new(Arc::clone(&sink)))
        .build()
        .unwrap();

    assert!(manager.admit_query(&QueryContext::new("q1", "alice")).unwrap().is_admitted());
    assert_eq!(sink.lock().events()[0].action, AuditAction::Admit);
}

#[test]
fn test_builder_from_file() {
    let path = std::env::temp_dir().join(format!("builder-{}.json", uuid::Uuid::new_v4()));
    std::fs::write(&path, serde_json::to_string(&config()).unwrap()).unwrap();

    let builder = ResourceGroupManagerBuilder::new().with_config_path(&path);
    assert_eq!(builder.config_path(), Some(path.as_path()));
    let manager = builder.build().unwrap();
    assert_eq!(manager.configuration_version(), 1);

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_builder_from_settings_keeps_interval() {
    let builder = ResourceGroupManagerBuilder::from_settings(EnvSettings {
        config_path: PathBuf::from("/nonexistent/groups.json"),
        refresh_interval: Some(Duration::from_secs(5)),
    });
    assert_eq!(builder.refresh_interval(), Some(Duration::from_secs(5)));
    let err = builder.build().err().unwrap();
    assert!(format!("{err:#}").contains("/nonexistent/groups.json"));
}

#[test]
fn test_builder_requires_source() {
    assert!(ResourceGroupManagerBuilder::new().build().is_err());
}

#[test]
fn test_builder_rejects_invalid_document() {
    let mut cfg = config();
    cfg.root_groups[0].soft_concurrency_limit = Some(9);
    let err = ResourceGroupManagerBuilder::new().with_config(cfg).build().err().unwrap();
    assert!(format!("{err:#}").contains("validating resource group config"));
}
