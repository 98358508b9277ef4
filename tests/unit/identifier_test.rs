//! Tests for group identifiers and templates

use std::collections::HashMap;

use prometheus_resource_groups::core::{
    ResourceGroupError, ResourceGroupId, ResourceGroupIdTemplate,
};

fn bindings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

#[test]
fn test_template_instantiation() {
    let template = ResourceGroupIdTemplate::parse("global.${USER}").unwrap();
    let id = template.instantiate(&bindings(&[("USER", "alice")])).unwrap();
    assert_eq!(id.to_string(), "global.alice");
    assert_eq!(id.parent().unwrap().to_string(), "global");
}

#[test]
fn test_unbound_variable() {
    let template = ResourceGroupIdTemplate::parse("global.${USER}").unwrap();
    let err = template.instantiate(&HashMap::new()).unwrap_err();
    assert_eq!(err, ResourceGroupError::MissingVariable("USER".into()));
}

#[test]
fn test_mixed_segment() {
    let template = ResourceGroupIdTemplate::parse("etl.team-${SOURCE}").unwrap();
    assert_eq!(template.variables(), ["SOURCE"]);
    let id = template.instantiate(&bindings(&[("SOURCE", "airflow")])).unwrap();
    assert_eq!(id.name(), "team-airflow");
}

#[test]
fn test_value_with_separator_is_invalid() {
    let template = ResourceGroupIdTemplate::parse("global.${USER}").unwrap();
    let err = template.instantiate(&bindings(&[("USER", "a.b")])).unwrap_err();
    assert!(matches!(err, ResourceGroupError::InvalidIdentifier(_)));
}

#[test]
fn test_identifier_relations() {
    let root = ResourceGroupId::root("global").unwrap();
    let leaf = root.child("adhoc").unwrap().child("bob").unwrap();
    assert!(root.is_root());
    assert_eq!(leaf.depth(), 3);
    assert!(root.is_ancestor_of(&leaf));
    assert!(!leaf.is_ancestor_of(&root));
    assert_eq!(leaf.root_id(), root);
    let path: Vec<String> = leaf.path_from_root().iter().map(ToString::to_string).collect();
    assert_eq!(path, ["global", "global.adhoc", "global.adhoc.bob"]);
}

#[test]
fn test_identifier_serde() {
    let id: ResourceGroupId = serde_json::from_str("\"global.etl\"").unwrap();
    assert_eq!(id.segments(), ["global", "etl"]);
    assert_eq!(serde_json::to_string(&id).unwrap(), "\"global.etl\"");
    assert!(serde_json::from_str::<ResourceGroupId>("\"global..etl\"").is_err());
}
