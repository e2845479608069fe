//! Editing a step list through a session: add, edit, move, remove.

use approval_core::{
    CoreError, Direction, MutationOutcome, RequestTypeId, SessionStatus, StepType, UserId,
    WorkflowRef,
};
use approval_tests::{
    add_step, add_steps, assert_contiguous, names, snapshot_names, Harness, PURCHASE,
};

#[tokio::test]
async fn test_manager_review_on_empty_workflow() {
    let harness = Harness::new().await;
    let session = harness.purchase_session();

    assert!(session.load().await.unwrap().is_empty());
    assert_eq!(harness.workflows.create_calls(), 0);

    let outcome = add_step(&session, "Manager Review", StepType::Decision, "U1")
        .await
        .unwrap();
    assert_eq!(outcome, MutationOutcome::Persisted);

    let snapshot = session.snapshot().await;
    let workflow_id = snapshot.workflow.persisted().expect("workflow resolved");
    assert_eq!(snapshot.steps.len(), 1);
    assert_eq!(snapshot.steps[0].order, 1);
    assert_eq!(snapshot.steps[0].name, "Manager Review");
    assert_eq!(snapshot.steps[0].workflow, WorkflowRef::Persisted(workflow_id));
    assert_eq!(snapshot.status, SessionStatus::Idle);
    assert!(snapshot.draft.name.is_empty());

    let rows = harness.steps.rows_for(&workflow_id).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].step_name, "Manager Review");
    assert_eq!(rows[0].step_type, StepType::Decision);
    assert_eq!(rows[0].approver_id, "U1");
    assert_eq!(rows[0].step_order, 1);
    assert_eq!(
        harness
            .request_types
            .default_workflow(&RequestTypeId(PURCHASE.to_string()))
            .await,
        Some(workflow_id)
    );
}

#[tokio::test]
async fn test_move_last_step_up_tracks_editing_index() {
    let harness = Harness::new().await;
    let session = harness.purchase_session();
    add_steps(&session, &["A", "B", "C"]).await.unwrap();

    session.begin_edit(2).await.unwrap();
    assert_eq!(
        session.move_step(2, Direction::Up).await.unwrap(),
        MutationOutcome::Persisted
    );

    let snapshot = session.snapshot().await;
    assert_eq!(snapshot_names(&snapshot), vec!["A", "C", "B"]);
    assert_contiguous(&snapshot.steps, snapshot.workflow);
    assert_eq!(snapshot.editing_index, Some(1));
    assert_eq!(snapshot.status, SessionStatus::Editing(1));
    assert_eq!(snapshot.draft.name, "C");

    let stored = harness
        .services()
        .persistence
        .load_all(snapshot.workflow)
        .await
        .unwrap();
    assert_eq!(names(&stored), vec!["A", "C", "B"]);
}

#[tokio::test]
async fn test_remove_first_step_repoints_editing_index() {
    for (editing, expected) in [(1, 0), (2, 1)] {
        let harness = Harness::new().await;
        let session = harness.purchase_session();
        add_steps(&session, &["A", "B", "C"]).await.unwrap();

        session.begin_edit(editing).await.unwrap();
        session.remove_step(0).await.unwrap();

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot_names(&snapshot), vec!["B", "C"]);
        assert_contiguous(&snapshot.steps, snapshot.workflow);
        assert_eq!(snapshot.editing_index, Some(expected));
        assert_eq!(snapshot.steps[expected].name, snapshot.draft.name);
    }
}

#[tokio::test]
async fn test_removing_edited_step_cancels_edit() {
    let harness = Harness::new().await;
    let session = harness.purchase_session();
    add_steps(&session, &["A", "B"]).await.unwrap();

    session.begin_edit(0).await.unwrap();
    session.remove_step(0).await.unwrap();

    let snapshot = session.snapshot().await;
    assert_eq!(snapshot_names(&snapshot), vec!["B"]);
    assert_eq!(snapshot.editing_index, None);
    assert!(snapshot.draft.name.is_empty());
    assert!(session.requires_confirmation(0).await);
}

#[tokio::test]
async fn test_edit_replaces_step_in_place() {
    let harness = Harness::new().await;
    let session = harness.purchase_session();
    add_steps(&session, &["A", "B", "C"]).await.unwrap();
    let before = session.snapshot().await;

    session.begin_edit(1).await.unwrap();
    session
        .update_draft(|d| {
            d.name = "Finance Review".to_string();
            d.step_type = StepType::Opinion;
        })
        .await
        .unwrap();
    session.add_or_update_draft().await.unwrap();

    let after = session.snapshot().await;
    assert_eq!(snapshot_names(&after), vec!["A", "Finance Review", "C"]);
    assert_eq!(after.steps[1].id, before.steps[1].id);
    assert_eq!(after.steps[1].step_type, StepType::Opinion);
    assert_eq!(after.editing_index, None);
    assert_contiguous(&after.steps, after.workflow);
}

#[tokio::test]
async fn test_invalid_drafts_never_reach_the_store() {
    let harness = Harness::new().await;
    let session = harness.purchase_session();

    let missing_name = add_step(&session, "  ", StepType::Decision, "U1").await;
    assert!(matches!(missing_name, Err(CoreError::ValidationError(_))));
    assert_eq!(harness.workflows.create_calls(), 0);
    assert_eq!(harness.steps.write_calls(), 0);

    add_steps(&session, &["A"]).await.unwrap();
    let writes = harness.steps.write_calls();
    let before = session.snapshot().await;

    let missing_approver = add_step(&session, "B", StepType::Decision, "").await;
    assert!(matches!(missing_approver, Err(CoreError::ValidationError(_))));
    assert_eq!(harness.steps.write_calls(), writes);

    let after = session.snapshot().await;
    assert_eq!(after.steps, before.steps);
    assert_eq!(after.draft.name, "B");
    assert!(after.last_error.is_some());
    assert_eq!(harness.workflows.create_calls(), 1);
}

#[tokio::test]
async fn test_boundary_moves_are_unchanged_and_out_of_range_is_rejected() {
    let harness = Harness::new().await;
    let session = harness.purchase_session();
    add_steps(&session, &["A", "B", "C"]).await.unwrap();
    let writes = harness.steps.write_calls();

    assert_eq!(
        session.move_step(0, Direction::Up).await.unwrap(),
        MutationOutcome::Unchanged
    );
    assert_eq!(
        session.move_step(2, Direction::Down).await.unwrap(),
        MutationOutcome::Unchanged
    );

    assert_eq!(
        session.move_step(3, Direction::Up).await.unwrap_err(),
        CoreError::IndexOutOfRange { index: 3, len: 3 }
    );

    assert_eq!(harness.steps.write_calls(), writes);
    assert_eq!(snapshot_names(&session.snapshot().await), vec!["A", "B", "C"]);
}

#[tokio::test]
async fn test_permission_checks_are_advisory() {
    let harness = Harness::new().await;
    harness.identity.sign_out().await;
    let session = harness.purchase_session();

    assert_eq!(
        add_step(&session, "A", StepType::Notification, "U2")
            .await
            .unwrap(),
        MutationOutcome::Persisted
    );

    let workflows = harness.workflows.all().await;
    assert_eq!(workflows.len(), 1);
    assert_eq!(workflows[0].created_by, None);

    harness
        .identity
        .sign_in(UserId("viewer-1".to_string()), &["viewer"])
        .await;
    assert!(!harness.services().gate.check("remove_step").await.elevated);
    assert_eq!(
        session.remove_step(0).await.unwrap(),
        MutationOutcome::Persisted
    );
    assert!(session.snapshot().await.steps.is_empty());
}
