use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use common::domain::entities::source_table::SourceTable;

use crate::helpers::spawn_app;

#[tokio::test]
async fn handshake_is_echoed_without_side_effects() {
    let app = spawn_app().await;

    let response = app.post_webhook(&json!({ "challenge": "verification-token" })).await;

    assert!(response.status().is_success());
    let body: JsonValue = response.json().await.unwrap();
    assert_eq!(body, json!({ "challenge": "verification-token" }));

    assert!(app.event_queue.published_source_ids().is_empty());
    assert!(app
        .mapping_repository()
        .list()
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn source_created_saves_a_mapping_and_does_not_enqueue() {
    let app = spawn_app().await;
    let source_id = Uuid::new_v4();
    app.source_provider.add_source(SourceTable {
        id: source_id,
        title: "Budget Mensuel".to_string(),
    });

    let response = app
        .post_webhook(&json!({
            "event_type": "source.created",
            "entity": { "id": source_id }
        }))
        .await;

    assert!(response.status().is_success());
    let body: JsonValue = response.json().await.unwrap();
    assert_eq!(body["status"], "created");

    assert_eq!(
        app.mapping_repository().lookup(source_id).await.unwrap(),
        Some("budget_mensuel".to_string())
    );
    assert!(app.event_queue.published_source_ids().is_empty());
}

#[tokio::test]
async fn source_created_delivered_twice_keeps_a_single_mapping() {
    let app = spawn_app().await;
    let source_id = Uuid::new_v4();
    app.source_provider.add_source(SourceTable {
        id: source_id,
        title: "Projects".to_string(),
    });

    let event = json!({
        "event_type": "source.created",
        "entity": { "id": source_id }
    });
    app.post_webhook(&event).await;
    let response = app.post_webhook(&event).await;

    assert!(response.status().is_success());
    assert_eq!(app.mapping_repository().list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn source_deleted_drops_the_collection_and_the_mapping() {
    let app = spawn_app().await;
    let source_id = Uuid::new_v4();
    app.mapping_repository()
        .save(source_id, "budget")
        .await
        .unwrap();
    app.vector_index.insert_collection("budget");

    let response = app
        .post_webhook(&json!({
            "event_type": "source.deleted",
            "entity": { "id": source_id }
        }))
        .await;

    assert!(response.status().is_success());
    let body: JsonValue = response.json().await.unwrap();
    assert_eq!(body["status"], "deleted");

    assert!(!app.vector_index.has_collection("budget"));
    assert_eq!(app.mapping_repository().lookup(source_id).await.unwrap(), None);
}

#[tokio::test]
async fn source_deleted_delivered_twice_never_errors() {
    let app = spawn_app().await;
    let source_id = Uuid::new_v4();
    app.mapping_repository()
        .save(source_id, "budget")
        .await
        .unwrap();
    app.vector_index.insert_collection("budget");

    let event = json!({
        "event_type": "source.deleted",
        "entity": { "id": source_id }
    });
    app.post_webhook(&event).await;
    // Collection and mapping entry are already gone on the second delivery
    let response = app.post_webhook(&event).await;

    assert!(response.status().is_success());
    let body: JsonValue = response.json().await.unwrap();
    assert_eq!(body["status"], "deleted");
}

#[tokio::test]
async fn row_event_is_enqueued_for_the_parent_source() {
    let app = spawn_app().await;
    let source_id = Uuid::new_v4();

    let response = app
        .post_webhook(&json!({
            "event_type": "row.updated",
            "entity": { "id": Uuid::new_v4() },
            "data": { "parent": { "id": source_id } }
        }))
        .await;

    assert!(response.status().is_success());
    let body: JsonValue = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    assert_eq!(app.event_queue.published_source_ids(), vec![Some(source_id)]);
}

#[tokio::test]
async fn event_without_a_resolvable_source_is_ignored() {
    let app = spawn_app().await;

    let response = app
        .post_webhook(&json!({ "event_type": "row.created", "data": {} }))
        .await;

    assert!(response.status().is_success());
    let body: JsonValue = response.json().await.unwrap();
    assert_eq!(body["status"], "ignored");

    assert!(app.event_queue.published_source_ids().is_empty());
}

#[tokio::test]
async fn provider_failure_is_acknowledged_with_an_error_status() {
    let app = spawn_app().await;
    let source_id = Uuid::new_v4();
    app.source_provider.set_failing();

    let response = app
        .post_webhook(&json!({
            "event_type": "source.created",
            "entity": { "id": source_id }
        }))
        .await;

    // Still a 200: the provider must never be pushed into a retry storm
    assert!(response.status().is_success());
    let body: JsonValue = response.json().await.unwrap();
    assert_eq!(body["status"], "error");
    assert!(body["details"].as_str().unwrap().contains("provider"));

    assert!(app.mapping_repository().list().await.unwrap().is_empty());
}
