//! Tests for the API surface and tokio spawner utilities

use prometheus_resource_groups::core::ResourceGroupManager;
use prometheus_resource_groups::runtime::{
    complete_query, health, submit_query, AdmissionResponse, QuerySubmission, Spawn, TokioSpawner,
};

fn manager() -> ResourceGroupManager {
    ResourceGroupManager::from_json_str(
        r#"{ "rootGroups": [{ "name": "global", "hardConcurrencyLimit": 1, "maxQueued": 1 }],
             "selectors": [{ "group": "global" }] }"#,
    )
    .unwrap()
}

fn submission(id: &str) -> QuerySubmission {
    serde_json::from_value(serde_json::json!({ "queryId": id, "user": "alice" })).unwrap()
}

#[test]
fn test_submit_query_responses() {
    let manager = manager();
    assert!(matches!(submit_query(&manager, submission("q1")), AdmissionResponse::Admitted { .. }));
    assert!(matches!(
        submit_query(&manager, submission("q2")),
        AdmissionResponse::Queued { position: 1, .. }
    ));

    let rejected = submit_query(&manager, submission("q3"));
    let json = serde_json::to_value(&rejected).unwrap();
    assert_eq!(json["status"], "REJECTED");
    assert_eq!(json["reason"], "queue_full");
    assert_eq!(json["queryId"], "q3");

    let health = health(&manager);
    assert!(health.ok);
    assert_eq!((health.running, health.queued), (1, 1));

    let completion = complete_query(&manager, "q1".into()).unwrap();
    assert_eq!(completion.started[0].query_id.as_str(), "q2");
    assert!(complete_query(&manager, "q1".into()).is_err());
}

#[test]
fn test_submission_defaults_priority() {
    let ctx: prometheus_resource_groups::core::QueryContext = submission("q1").into();
    assert_eq!(ctx.priority, prometheus_resource_groups::core::DEFAULT_QUERY_PRIORITY);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn(async move {
        tx.send(123).unwrap();
    });

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
}
