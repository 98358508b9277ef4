//! Tests for configuration parsing and validation

use prometheus_resource_groups::config::{GroupConfig, ResourceGroupsConfig, SelectorConfig};
use prometheus_resource_groups::core::{ManagerSpec, ResourceGroupError, SchedulingPolicy};

fn validate(json: &str) -> Result<ManagerSpec, ResourceGroupError> {
    ManagerSpec::from_config(&ResourceGroupsConfig::from_json_str(json)?)
}

#[test]
fn test_valid_document() {
    let spec = validate(
        r#"{
            "rootGroups": [{
                "name": "global", "hardConcurrencyLimit": 10, "maxQueued": 100,
                "schedulingPolicy": "WEIGHTED",
                "subGroups": [
                    { "name": "adhoc", "hardConcurrencyLimit": 4, "maxQueued": 10, "weight": 1 },
                    { "name": "etl", "softConcurrencyLimit": 3, "hardConcurrencyLimit": 6, "maxQueued": 10, "weight": 3 }
                ]
            }],
            "selectors": [
                { "source": "airflow.*", "group": "global.etl" },
                { "group": "global.adhoc" }
            ],
            "cpuQuotaPeriod": "1h"
        }"#,
    )
    .unwrap();

    assert_eq!(spec.root_groups().len(), 1);
    assert_eq!(spec.root_groups()[0].sub_groups().len(), 2);
    assert_eq!(spec.selectors().len(), 2);
    assert_eq!(spec.cpu_quota_period(), Some(std::time::Duration::from_secs(3600)));
}

#[test]
fn test_soft_limit_defaults_to_hard() {
    let spec = validate(
        r#"{ "rootGroups": [{ "name": "g", "hardConcurrencyLimit": 5, "maxQueued": 1 }],
             "selectors": [{ "group": "g" }] }"#,
    )
    .unwrap();
    let settings = spec.root_groups()[0].settings();
    assert_eq!(settings.soft_concurrency_limit, 5);
    assert_eq!(settings.scheduling_policy, SchedulingPolicy::Fair);
}

#[test]
fn test_hard_below_soft_is_invalid() {
    let err = validate(
        r#"{ "rootGroups": [{ "name": "g", "softConcurrencyLimit": 3, "hardConcurrencyLimit": 2, "maxQueued": 1 }] }"#,
    )
    .unwrap_err();
    assert!(matches!(err, ResourceGroupError::InvalidConfig(_)));
}

#[test]
fn test_duplicate_sibling_is_invalid() {
    let cfg = ResourceGroupsConfig {
        root_groups: vec![GroupConfig::new("g", 2, 2)
            .with_sub_group(GroupConfig::new("a", 1, 1))
            .with_sub_group(GroupConfig::new("a", 1, 1))],
        selectors: vec![],
        cpu_quota_period: None,
    };
    let err = ManagerSpec::from_config(&cfg).unwrap_err();
    assert!(err.to_string().contains("duplicate"), "{err}");
}

#[test]
fn test_missing_weight_under_weighted_parent() {
    let cfg = ResourceGroupsConfig {
        root_groups: vec![GroupConfig::new("g", 2, 2)
            .with_policy(SchedulingPolicy::Weighted)
            .with_sub_group(GroupConfig::new("a", 1, 1).with_weight(2))
            .with_sub_group(GroupConfig::new("b", 1, 1))],
        selectors: vec![SelectorConfig::new("g.a")],
        cpu_quota_period: None,
    };
    assert!(matches!(
        ManagerSpec::from_config(&cfg),
        Err(ResourceGroupError::InvalidConfig(_))
    ));
}

#[test]
fn test_selector_to_unknown_group() {
    let err = validate(
        r#"{ "rootGroups": [{ "name": "g", "hardConcurrencyLimit": 1, "maxQueued": 1 }],
             "selectors": [{ "group": "g.nope" }] }"#,
    )
    .unwrap_err();
    assert!(matches!(err, ResourceGroupError::InvalidConfig(_)));
}

#[test]
fn test_bad_selector_pattern() {
    let err = validate(
        r#"{ "rootGroups": [{ "name": "g", "hardConcurrencyLimit": 1, "maxQueued": 1 }],
             "selectors": [{ "user": "(unclosed", "group": "g" }] }"#,
    )
    .unwrap_err();
    assert!(matches!(err, ResourceGroupError::InvalidConfig(_)));
}

#[test]
fn test_bad_quota_period() {
    let err = validate(
        r#"{ "rootGroups": [{ "name": "g", "hardConcurrencyLimit": 1, "maxQueued": 1 }],
             "cpuQuotaPeriod": "eventually" }"#,
    )
    .unwrap_err();
    assert!(matches!(err, ResourceGroupError::InvalidConfig(_)));
}

#[test]
fn test_config_from_file() {
    let path = std::env::temp_dir().join(format!("resource-groups-{}.json", uuid::Uuid::new_v4()));
    std::fs::write(
        &path,
        r#"{ "rootGroups": [{ "name": "g", "hardConcurrencyLimit": 1, "maxQueued": 1 }] }"#,
    )
    .unwrap();
    let cfg = ResourceGroupsConfig::from_file(&path).unwrap();
    assert_eq!(cfg.root_groups[0].name, "g");
    std::fs::remove_file(&path).unwrap();

    let err = ResourceGroupsConfig::from_file(&path).unwrap_err();
    assert!(format!("{err:#}").contains("reading resource group config"));
}
