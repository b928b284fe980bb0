mod common;

use common::{RecordingBackend, harness, harness_with};
use specforge_gate::{GateName, GateStatus};
use specforge_orchestrator::AdvanceRequest;
use specforge_store::ProjectStore;
use specforge_utils::types::{ErrorKind, HistoryStatus, PhaseId, PhaseStep};

#[tokio::test]
async fn rollback_to_analysis_discards_everything_after() {
    let h = harness();
    h.create("acme").await;
    h.advance_n("acme", 4).await;
    let project = h.project("acme").await;
    assert_eq!(
        project.phases_completed,
        vec![
            PhaseId::Analysis,
            PhaseId::StackSelection,
            PhaseId::Spec,
            PhaseId::Dependencies
        ]
    );
    assert_eq!(project.current_phase, PhaseId::Solutioning);

    let result = h
        .handle
        .rollback_to_phase("acme", "ANALYSIS")
        .await
        .into_result()
        .unwrap();
    assert!(result.success);
    assert_eq!(result.snapshot_id.as_deref(), Some("acme-v1"));
    assert_eq!(result.restored_artifacts, vec!["analysis.md".to_string()]);
    assert_eq!(result.git_commit_hash.as_deref(), Some("commit-1"));

    let project = h.project("acme").await;
    assert!(project.phases_completed.is_empty());
    assert_eq!(project.current_phase, PhaseId::Analysis);
    assert!(project.stack_choice.is_none());
    assert!(!project.clarification_complete);
    assert_eq!(project.rollback_count, 1);
    assert!(project.check_invariants().is_ok());

    let snapshots = h.store.list_snapshots("acme").await.unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].phase, PhaseId::Analysis);

    assert!(h.store.list_gates("acme").await.unwrap().is_empty());
    for phase in [
        PhaseId::StackSelection,
        PhaseId::Spec,
        PhaseId::Dependencies,
        PhaseId::Solutioning,
    ] {
        assert!(h.store.list_artifacts("acme", phase).await.unwrap().is_empty());
    }
    assert_eq!(
        h.store
            .get_artifact("acme", PhaseId::Analysis, "analysis.md")
            .await
            .unwrap()
            .as_deref(),
        Some("content")
    );

    let history = h.store.history("acme").await.unwrap();
    let entries: Vec<_> = history.iter().map(|e| (e.phase, e.status)).collect();
    assert_eq!(
        entries,
        vec![
            (PhaseStep::Analysis, HistoryStatus::Completed),
            (PhaseStep::Analysis, HistoryStatus::RolledBack),
        ]
    );

    assert!(h.backend.called("reset spec/acme commit-1"));
}

#[tokio::test]
async fn rollback_to_uncompleted_phase_fails_without_mutation() {
    let h = harness();
    h.create("acme").await;
    h.advance_n("acme", 2).await;
    let before = h.project("acme").await;
    let snapshots = h.store.list_snapshots("acme").await.unwrap();

    let result = h.handle.rollback_to_phase("acme", "VALIDATE").await;
    assert!(!result.success);
    assert_eq!(result.status, 400);
    assert_eq!(
        result.error.as_deref(),
        Some("Phase VALIDATE not found in completed phases")
    );
    let data = result.data.unwrap();
    assert!(!data.success);
    assert!(data.snapshot_id.is_none());

    assert_eq!(h.project("acme").await, before);
    assert_eq!(h.store.list_snapshots("acme").await.unwrap(), snapshots);

    let unknown = h.handle.rollback_to_phase("acme", "LAUNCH").await;
    assert_eq!(unknown.error_kind, Some(ErrorKind::Validation));
}

#[tokio::test]
async fn preview_never_mutates() {
    let h = harness();
    h.create("acme").await;
    h.advance_n("acme", 4).await;
    let before = h.project("acme").await;
    let gates = h.store.list_gates("acme").await.unwrap();
    let history = h.store.history("acme").await.unwrap();

    let preview = h
        .handle
        .get_rollback_preview("acme", "stack_selection")
        .await
        .into_result()
        .unwrap();
    assert_eq!(preview.phase, PhaseId::StackSelection);
    assert_eq!(preview.version, 2);
    assert_eq!(preview.artifacts, vec!["stack_selection.md".to_string()]);
    assert_eq!(preview.metadata["stack_choice"], "rust-axum");
    assert_eq!(
        preview.phases_to_discard,
        vec![PhaseId::StackSelection, PhaseId::Spec, PhaseId::Dependencies]
    );

    let refused = h.handle.get_rollback_preview("acme", "VALIDATE").await;
    assert!(!refused.success);

    assert_eq!(h.project("acme").await, before);
    assert_eq!(h.store.list_gates("acme").await.unwrap(), gates);
    assert_eq!(h.store.history("acme").await.unwrap(), history);
    assert_eq!(h.store.list_snapshots("acme").await.unwrap().len(), 4);
}

#[tokio::test]
async fn depth_limit_is_fatal() {
    let h = harness_with(2, RecordingBackend::default());
    h.create("acme").await;

    for _ in 0..2 {
        h.advance("acme").await;
        h.handle
            .rollback_to_phase("acme", "ANALYSIS")
            .await
            .into_result()
            .unwrap();
    }
    h.advance("acme").await;
    let before = h.project("acme").await;

    let result = h.handle.rollback_to_phase("acme", "ANALYSIS").await;
    assert!(!result.success);
    assert_eq!(result.status, 409);
    assert_eq!(
        result.error.as_deref(),
        Some("Maximum rollback depth of 2 exceeded")
    );
    assert_eq!(h.project("acme").await, before);
}

#[tokio::test]
async fn rollback_to_stack_selection_clears_choice_and_approval() {
    let h = harness();
    h.create("acme").await;
    h.advance_n("acme", 3).await;
    assert_eq!(h.project("acme").await.stack_choice.as_deref(), Some("rust-axum"));

    h.handle
        .rollback_to_phase("acme", "STACK_SELECTION")
        .await
        .into_result()
        .unwrap();

    let project = h.project("acme").await;
    assert_eq!(project.current_phase, PhaseId::StackSelection);
    assert_eq!(project.phases_completed, vec![PhaseId::Analysis]);
    assert!(project.stack_choice.is_none());
    assert!(!project.metadata.contains_key("stack_choice"));

    let gates = h.handle.get_project_gates("acme").await.into_result().unwrap();
    let stack = gates
        .iter()
        .find(|g| g.definition.name == GateName::StackApproved)
        .unwrap();
    assert_eq!(stack.status, GateStatus::Pending);

    let blocked = h.handle.advance_phase(&AdvanceRequest::new("acme")).await;
    assert_eq!(blocked.status, 409);
}

#[tokio::test]
async fn snapshot_versions_stay_monotonic() {
    let h = harness();
    h.create("acme").await;
    h.advance_n("acme", 3).await;

    h.handle
        .rollback_to_phase("acme", "SPEC")
        .await
        .into_result()
        .unwrap();
    let outcome = h.advance("acme").await;
    assert_eq!(outcome.version, 4);

    let latest = h
        .store
        .latest_snapshot("acme", PhaseId::Spec)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.version, 4);
    assert_eq!(h.store.list_snapshots("acme").await.unwrap().len(), 4);
}

#[tokio::test]
async fn restore_replaces_target_artifacts() {
    let h = harness();
    h.create("acme").await;
    h.advance_n("acme", 2).await;

    h.store
        .put_artifact("acme", PhaseId::Analysis, "analysis.md", "edited")
        .await
        .unwrap();
    h.store
        .put_artifact("acme", PhaseId::Analysis, "scratch.md", "tmp")
        .await
        .unwrap();

    h.handle
        .rollback_to_phase("acme", "ANALYSIS")
        .await
        .into_result()
        .unwrap();

    let artifacts = h.store.list_artifacts("acme", PhaseId::Analysis).await.unwrap();
    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts["analysis.md"], "content");
}

#[tokio::test]
async fn rollback_from_done_clears_handoff() {
    let h = harness();
    h.create("acme").await;
    h.advance_n("acme", 6).await;
    assert!(h.project("acme").await.handoff_generated);

    h.handle
        .rollback_to_phase("acme", "VALIDATE")
        .await
        .into_result()
        .unwrap();

    let project = h.project("acme").await;
    assert!(!project.handoff_generated);
    assert_eq!(project.current_phase, PhaseId::Validate);
    assert_eq!(project.phases_completed.len(), 5);
    assert_eq!(project.stack_choice.as_deref(), Some("rust-axum"));

    // Earlier approvals survive a late rollback.
    let stack = h.store.get_gate("acme", "stack_approved").await.unwrap().unwrap();
    assert_eq!(stack.status, GateStatus::Approved);
}

#[tokio::test]
async fn missing_snapshot_is_not_found() {
    let h = harness();
    let mut project = h.create("acme").await;
    project.phases_completed = vec![PhaseId::Analysis];
    project.current_phase = PhaseId::StackSelection;
    h.store.update_project(&project).await.unwrap();

    let result = h.handle.rollback_to_phase("acme", "ANALYSIS").await;
    assert_eq!(result.status, 404);
    assert_eq!(
        result.error.as_deref(),
        Some("No snapshot found for phase ANALYSIS")
    );
    assert_eq!(h.project("acme").await.rollback_count, 0);
}
