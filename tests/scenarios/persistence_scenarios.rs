//! Write strategies, failure recovery and prioritized reads.

use approval_core::{
    BuilderConfig, CoreError, MutationOutcome, RequestTypeId, StepDraft, StepType, WorkflowRef,
    WriteStrategy,
};
use approval_tests::{add_step, add_steps, assert_contiguous, names, Harness, PURCHASE};

async fn delete_then_insert_harness() -> Harness {
    Harness::with_config(BuilderConfig {
        write_strategy: WriteStrategy::DeleteThenInsert,
        ..Default::default()
    })
    .await
}

async fn resolved_workflow(harness: &Harness) -> WorkflowRef {
    harness
        .services()
        .resolver
        .ensure_workflow_exists(
            Some(&RequestTypeId(PURCHASE.to_string())),
            WorkflowRef::Unsaved,
            None,
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_insert_failure_leaves_store_empty_until_saved_again() {
    let harness = delete_then_insert_harness().await;
    let session = harness.purchase_session();
    add_steps(&session, &["A", "B", "C"]).await.unwrap();

    harness.steps.fail_next_insert();
    let result = add_step(&session, "D", StepType::Decision, "U1").await;
    assert!(matches!(result, Err(CoreError::PartialWrite { .. })));

    let snapshot = session.snapshot().await;
    assert_eq!(names(&snapshot.steps), vec!["A", "B", "C"]);
    assert!(snapshot.needs_reconcile);
    assert!(snapshot.last_error.is_some());

    // The delete committed, so a fresh reader sees nothing
    let reader = harness.purchase_session();
    assert!(reader.load().await.unwrap().is_empty());
    assert_eq!(reader.snapshot().await.workflow, snapshot.workflow);

    assert_eq!(session.save_all().await.unwrap(), MutationOutcome::Persisted);
    let repaired = session.snapshot().await;
    assert!(!repaired.needs_reconcile);
    assert!(repaired.last_error.is_none());

    let reloaded = harness.purchase_session().load().await.unwrap();
    assert_eq!(names(&reloaded), vec!["A", "B", "C"]);
    assert_contiguous(&reloaded, snapshot.workflow);
}

#[tokio::test]
async fn test_delete_failure_aborts_without_changes() {
    let harness = delete_then_insert_harness().await;
    let session = harness.purchase_session();
    add_steps(&session, &["A"]).await.unwrap();
    let workflow_id = session.snapshot().await.workflow.persisted().unwrap();

    harness.steps.fail_next_delete();
    assert!(add_step(&session, "B", StepType::Decision, "U1").await.is_err());

    let snapshot = session.snapshot().await;
    assert_eq!(names(&snapshot.steps), vec!["A"]);
    assert!(!snapshot.needs_reconcile);
    assert_eq!(harness.steps.rows_for(&workflow_id).await.len(), 1);
}

#[tokio::test]
async fn test_transactional_failure_keeps_stored_rows() {
    let harness = Harness::new().await;
    let session = harness.purchase_session();
    add_steps(&session, &["A", "B"]).await.unwrap();

    harness.steps.fail_next_replace();
    assert!(add_step(&session, "C", StepType::Decision, "U1").await.is_err());

    let snapshot = session.snapshot().await;
    assert_eq!(names(&snapshot.steps), vec!["A", "B"]);
    assert!(!snapshot.needs_reconcile);

    let reloaded = harness.purchase_session().load().await.unwrap();
    assert_eq!(names(&reloaded), vec!["A", "B"]);
}

#[tokio::test]
async fn test_round_trip_preserves_step_content() {
    let harness = Harness::new().await;
    let workflow = resolved_workflow(&harness).await;
    let persistence = harness.services().persistence;

    let steps: Vec<_> = [
        StepDraft::new("Manager Review", StepType::Decision, "U1"),
        StepDraft::new("Legal Opinion", StepType::Opinion, "legal-team")
            .with_instructions("Check the contract terms")
            .with_required(false),
        StepDraft::new("Notify Finance", StepType::Notification, "U7"),
    ]
    .iter()
    .map(|draft| draft.to_step(workflow))
    .collect();

    let written = persistence.replace_all(workflow, &steps).await.unwrap();
    let loaded = persistence.load_all(workflow).await.unwrap();

    assert_eq!(loaded, written);
    assert_contiguous(&loaded, workflow);
    assert!(loaded.iter().all(|s| s.id.is_some()));
    for (stored, original) in loaded.iter().zip(&steps) {
        assert_eq!(stored.name, original.name);
        assert_eq!(stored.step_type, original.step_type);
        assert_eq!(stored.approver_id, original.approver_id);
        assert_eq!(stored.required, original.required);
        assert_eq!(stored.instructions, original.instructions);
    }
}

#[tokio::test]
async fn test_second_session_sees_saved_steps() {
    let harness = Harness::new().await;
    let writer = harness.purchase_session();
    add_steps(&writer, &["A", "B"]).await.unwrap();
    let workflow = writer.snapshot().await.workflow;

    let reader = harness.purchase_session();
    let loaded = reader.load().await.unwrap();

    assert_eq!(names(&loaded), vec!["A", "B"]);
    assert_eq!(reader.snapshot().await.workflow, workflow);
    assert_eq!(harness.workflows.create_calls(), 1);
}

#[tokio::test]
async fn test_legacy_rows_load_when_primary_is_empty() {
    let harness = Harness::new().await;
    let workflow = resolved_workflow(&harness).await;
    let workflow_id = workflow.persisted().unwrap();
    harness.seed_legacy(workflow_id, "Second", 2).await;
    harness.seed_legacy(workflow_id, "First", 1).await;

    let session = harness.purchase_session();
    let loaded = session.load().await.unwrap();
    assert_eq!(names(&loaded), vec!["First", "Second"]);
    assert_contiguous(&loaded, workflow);

    // Saving moves the list into the primary table, which then shadows legacy rows
    session.save_all().await.unwrap();
    assert_eq!(harness.steps.rows_for(&workflow_id).await.len(), 2);
    session.remove_step(1).await.unwrap();
    let reloaded = harness.purchase_session().load().await.unwrap();
    assert_eq!(names(&reloaded), vec!["First"]);
}

#[tokio::test]
async fn test_removing_last_legacy_step_stays_removed() {
    let harness = Harness::new().await;
    let workflow = resolved_workflow(&harness).await;
    let workflow_id = workflow.persisted().unwrap();
    harness.seed_legacy(workflow_id, "Old Step", 1).await;

    let session = harness.purchase_session();
    assert_eq!(names(&session.load().await.unwrap()), vec!["Old Step"]);
    assert!(session.requires_confirmation(0).await);
    assert_eq!(
        session.remove_step(0).await.unwrap(),
        MutationOutcome::Persisted
    );
    assert!(session.snapshot().await.steps.is_empty());

    // The emptied primary table now owns the workflow
    let reloaded = harness.purchase_session().load().await.unwrap();
    assert!(reloaded.is_empty());
}

#[tokio::test]
async fn test_partial_write_on_legacy_workflow_does_not_resurrect_legacy_rows() {
    let harness = delete_then_insert_harness().await;
    let workflow = resolved_workflow(&harness).await;
    let workflow_id = workflow.persisted().unwrap();
    harness.seed_legacy(workflow_id, "Old Step", 1).await;

    let session = harness.purchase_session();
    session.load().await.unwrap();
    harness.steps.fail_next_insert();
    let result = add_step(&session, "New Step", StepType::Decision, "U1").await;
    assert!(matches!(result, Err(CoreError::PartialWrite { .. })));
    assert!(session.snapshot().await.needs_reconcile);

    assert!(harness.purchase_session().load().await.unwrap().is_empty());

    session.save_all().await.unwrap();
    let reloaded = harness.purchase_session().load().await.unwrap();
    assert_eq!(names(&reloaded), vec!["Old Step"]);
}

#[tokio::test]
async fn test_legacy_fallback_can_be_disabled() {
    let harness = Harness::with_config(BuilderConfig {
        legacy_fallback: false,
        ..Default::default()
    })
    .await;
    let workflow = resolved_workflow(&harness).await;
    harness
        .seed_legacy(workflow.persisted().unwrap(), "Old Step", 1)
        .await;

    assert!(harness.purchase_session().load().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unsaved_workflow_never_touches_the_store() {
    let harness = Harness::new().await;
    let session = harness.session(None, WorkflowRef::Unsaved);

    assert_eq!(
        add_step(&session, "A", StepType::Decision, "U1").await.unwrap(),
        MutationOutcome::LocalOnly
    );
    assert_eq!(session.save_all().await.unwrap(), MutationOutcome::LocalOnly);

    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.workflow, WorkflowRef::Unsaved);
    assert_contiguous(&snapshot.steps, WorkflowRef::Unsaved);
    assert_eq!(harness.steps.write_calls(), 0);
    assert_eq!(harness.workflows.create_calls(), 0);
}
