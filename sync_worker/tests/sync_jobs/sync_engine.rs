use uuid::Uuid;

use crate::helpers::{budget_row, spawn_engine};

#[tokio::test]
async fn first_sync_converges_the_collection_to_the_source_rows() {
    let harness = spawn_engine().await;
    let source_id = harness.source_provider.add_source("Budget");
    let rent_id = Uuid::new_v4();
    let food_id = Uuid::new_v4();
    harness.source_provider.set_rows(
        source_id,
        vec![
            budget_row(rent_id, "Rent", 100.0),
            budget_row(food_id, "Food", 50.0),
        ],
    );

    let report = harness.sync_engine.sync(source_id).await.unwrap();

    assert_eq!(report.collection_name, "budget");
    assert_eq!(report.upserted, 2);
    assert_eq!(report.deleted, 0);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.embed_failures, 0);

    let points = harness.vector_index.points("budget");
    assert_eq!(points.len(), 2);
    assert_eq!(points[&rent_id].1, budget_row(rent_id, "Rent", 100.0).payload());
    assert_eq!(points[&food_id].1, budget_row(food_id, "Food", 50.0).payload());
}

#[tokio::test]
async fn resyncing_an_unchanged_source_embeds_nothing() {
    let harness = spawn_engine().await;
    let source_id = harness.source_provider.add_source("Budget");
    harness.source_provider.set_rows(
        source_id,
        vec![
            budget_row(Uuid::new_v4(), "Rent", 100.0),
            budget_row(Uuid::new_v4(), "Food", 50.0),
        ],
    );

    harness.sync_engine.sync(source_id).await.unwrap();
    let report = harness.sync_engine.sync(source_id).await.unwrap();

    assert_eq!(report.upserted, 0);
    assert_eq!(report.deleted, 0);
    assert_eq!(report.skipped, 2);
    // The first sync embedded both rows, the second embedded none
    assert_eq!(harness.embeddings_service.nb_embed_calls(), 2);
}

#[tokio::test]
async fn a_changed_row_is_the_only_one_reembedded() {
    let harness = spawn_engine().await;
    let source_id = harness.source_provider.add_source("Budget");
    let rent_id = Uuid::new_v4();
    let food_id = Uuid::new_v4();
    harness.source_provider.set_rows(
        source_id,
        vec![
            budget_row(rent_id, "Rent", 100.0),
            budget_row(food_id, "Food", 50.0),
        ],
    );
    harness.sync_engine.sync(source_id).await.unwrap();
    let rent_vector_before = harness.vector_index.points("budget")[&rent_id].0.clone();

    harness.source_provider.set_rows(
        source_id,
        vec![
            budget_row(rent_id, "Rent", 100.0),
            budget_row(food_id, "Food", 75.0),
        ],
    );
    let report = harness.sync_engine.sync(source_id).await.unwrap();

    assert_eq!(report.upserted, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(
        harness.embeddings_service.embedded_texts(),
        vec!["100, Rent", "50, Food", "75, Food"]
    );

    let points = harness.vector_index.points("budget");
    assert_eq!(points[&food_id].1, budget_row(food_id, "Food", 75.0).payload());
    // The untouched row kept its original vector
    assert_eq!(points[&rent_id].0, rent_vector_before);
}

#[tokio::test]
async fn a_removed_row_loses_only_its_point() {
    let harness = spawn_engine().await;
    let source_id = harness.source_provider.add_source("Budget");
    let rent_id = Uuid::new_v4();
    let food_id = Uuid::new_v4();
    harness.source_provider.set_rows(
        source_id,
        vec![
            budget_row(rent_id, "Rent", 100.0),
            budget_row(food_id, "Food", 50.0),
        ],
    );
    harness.sync_engine.sync(source_id).await.unwrap();

    harness
        .source_provider
        .set_rows(source_id, vec![budget_row(rent_id, "Rent", 100.0)]);
    let report = harness.sync_engine.sync(source_id).await.unwrap();

    assert_eq!(report.deleted, 1);
    assert_eq!(report.upserted, 0);
    assert_eq!(report.skipped, 1);

    let points = harness.vector_index.points("budget");
    assert_eq!(points.len(), 1);
    assert!(points.contains_key(&rent_id));
}

#[tokio::test]
async fn an_emptied_source_empties_its_collection_but_keeps_it() {
    let harness = spawn_engine().await;
    let source_id = harness.source_provider.add_source("Budget");
    harness.source_provider.set_rows(
        source_id,
        vec![
            budget_row(Uuid::new_v4(), "Rent", 100.0),
            budget_row(Uuid::new_v4(), "Food", 50.0),
        ],
    );
    harness.sync_engine.sync(source_id).await.unwrap();

    harness.source_provider.set_rows(source_id, vec![]);
    let report = harness.sync_engine.sync(source_id).await.unwrap();

    assert_eq!(report.deleted, 2);
    assert_eq!(report.upserted, 0);
    assert!(harness.vector_index.points("budget").is_empty());
    // Emptying a source is not deleting it: its collection stays
    assert!(harness.vector_index.has_collection("budget"));
}

#[tokio::test]
async fn an_embedding_failure_skips_the_row_without_aborting_the_job() {
    let harness = spawn_engine().await;
    let source_id = harness.source_provider.add_source("Budget");
    let rent_id = Uuid::new_v4();
    let food_id = Uuid::new_v4();
    harness.source_provider.set_rows(
        source_id,
        vec![
            budget_row(rent_id, "Rent", 100.0),
            budget_row(food_id, "Food", 50.0),
        ],
    );
    harness
        .embeddings_service
        .reject_text(&budget_row(food_id, "Food", 50.0).embeddable_text());

    let report = harness.sync_engine.sync(source_id).await.unwrap();

    assert_eq!(report.upserted, 1);
    assert_eq!(report.embed_failures, 1);
    let points = harness.vector_index.points("budget");
    assert_eq!(points.len(), 1);
    assert!(points.contains_key(&rent_id));

    // The failed row is still missing from the index, so the next sync
    // picks it up again
    harness.embeddings_service.accept_all();
    let report = harness.sync_engine.sync(source_id).await.unwrap();

    assert_eq!(report.upserted, 1);
    assert_eq!(report.embed_failures, 0);
    assert_eq!(harness.vector_index.points("budget").len(), 2);
}

#[tokio::test]
async fn a_successful_sync_saves_the_mapping_entry() {
    let harness = spawn_engine().await;
    let source_id = harness.source_provider.add_source("Budget Mensuel");

    assert_eq!(
        harness.mapping_repository().lookup(source_id).await.unwrap(),
        None
    );

    harness.sync_engine.sync(source_id).await.unwrap();

    assert_eq!(
        harness.mapping_repository().lookup(source_id).await.unwrap(),
        Some("budget_mensuel".to_string())
    );
}

#[tokio::test]
async fn a_renamed_source_is_synced_into_its_new_collection() {
    let harness = spawn_engine().await;
    let source_id = harness.source_provider.add_source("Budget");
    harness
        .source_provider
        .set_rows(source_id, vec![budget_row(Uuid::new_v4(), "Rent", 100.0)]);
    harness.sync_engine.sync(source_id).await.unwrap();

    harness.source_provider.rename_source(source_id, "Budget 2024");
    let report = harness.sync_engine.sync(source_id).await.unwrap();

    assert_eq!(report.collection_name, "budget_2024");
    assert_eq!(harness.vector_index.points("budget_2024").len(), 1);
    assert_eq!(
        harness.mapping_repository().lookup(source_id).await.unwrap(),
        Some("budget_2024".to_string())
    );
}

#[tokio::test]
async fn sync_all_continues_past_failing_sources() {
    let harness = spawn_engine().await;
    let healthy_id = harness.source_provider.add_source("Projects");
    let failing_id = harness.source_provider.add_source("Broken");
    harness
        .source_provider
        .set_rows(healthy_id, vec![budget_row(Uuid::new_v4(), "Rewrite", 1.0)]);
    harness.source_provider.fail_source(failing_id);

    let reports = harness.sync_engine.sync_all().await.unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].collection_name, "projects");
    assert_eq!(harness.vector_index.points("projects").len(), 1);
}
