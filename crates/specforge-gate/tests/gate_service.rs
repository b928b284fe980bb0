use std::sync::Arc;

use specforge_gate::{ApprovalGateService, ApproveRequest, GateName, GateStatus, RejectRequest};
use specforge_store::{MemoryStore, Project, ProjectStore};
use specforge_utils::error::{GateError, SpecforgeError, StoreError};
use specforge_utils::types::PhaseId;

async fn service_with_project(id: &str) -> (Arc<MemoryStore>, ApprovalGateService) {
    let store = Arc::new(MemoryStore::new());
    store.create_project(Project::new(id, id)).await.unwrap();
    let service = ApprovalGateService::new(store.clone());
    (store, service)
}

fn approve(project_id: &str, gate: &str) -> ApproveRequest {
    ApproveRequest {
        project_id: project_id.to_string(),
        gate_name: gate.to_string(),
        approved_by: "cto@example.com".to_string(),
        notes: Some("looks good".to_string()),
        constitutional_score: Some(0.93),
    }
}

fn reject(project_id: &str, gate: &str, reason: Option<&str>) -> RejectRequest {
    RejectRequest {
        project_id: project_id.to_string(),
        gate_name: gate.to_string(),
        rejected_by: "cto@example.com".to_string(),
        reason: reason.map(ToString::to_string),
    }
}

#[tokio::test]
async fn initialize_is_idempotent() {
    let (store, service) = service_with_project("acme").await;
    let first = service.initialize_gates_for_project("acme").await.unwrap();
    let second = service.initialize_gates_for_project("acme").await.unwrap();

    assert_eq!(first.len(), 4);
    assert_eq!(second.len(), 4);
    assert_eq!(store.list_gates("acme").await.unwrap().len(), 4);
    assert!(second.iter().all(|g| g.status == GateStatus::Pending));
}

#[tokio::test]
async fn initialize_keeps_existing_state() {
    let (_store, service) = service_with_project("acme").await;
    service.approve_gate(&approve("acme", "stack_approved")).await.unwrap();
    let gates = service.initialize_gates_for_project("acme").await.unwrap();

    assert_eq!(gates.len(), 4);
    assert_eq!(gates[0].definition.name, GateName::StackApproved);
    assert_eq!(gates[0].status, GateStatus::Approved);
}

#[tokio::test]
async fn initialize_unknown_project_fails() {
    let service = ApprovalGateService::new(Arc::new(MemoryStore::new()));
    let err = service.initialize_gates_for_project("ghost").await.unwrap_err();
    assert!(matches!(err, SpecforgeError::Store(StoreError::ProjectNotFound { .. })));
}

#[tokio::test]
async fn approve_records_actor_and_notes() {
    let (_store, service) = service_with_project("acme").await;
    service.initialize_gates_for_project("acme").await.unwrap();

    let gate = service.approve_gate(&approve("acme", "prd_approved")).await.unwrap();
    assert_eq!(gate.status, GateStatus::Approved);
    assert_eq!(gate.approved_by.as_deref(), Some("cto@example.com"));
    assert_eq!(gate.notes.as_deref(), Some("looks good"));
    assert_eq!(gate.constitutional_score, Some(0.93));
    assert!(gate.timestamp.is_some());
}

#[tokio::test]
async fn invalid_gate_name_fails_before_persistence() {
    // No project exists: a store lookup would yield ProjectNotFound instead.
    let service = ApprovalGateService::new(Arc::new(MemoryStore::new()));
    let err = service.approve_gate(&approve("ghost", "ship_it")).await.unwrap_err();
    assert!(matches!(err, SpecforgeError::Gate(GateError::InvalidGateName { .. })));
    assert!(err.is_validation());
}

#[tokio::test]
async fn reject_requires_reason_without_mutation() {
    let (store, service) = service_with_project("acme").await;
    service.initialize_gates_for_project("acme").await.unwrap();
    let before = store.list_gates("acme").await.unwrap();

    for reason in [None, Some(""), Some("   ")] {
        let err = service
            .reject_gate(&reject("acme", "stack_approved", reason))
            .await
            .unwrap_err();
        assert!(matches!(err, SpecforgeError::Gate(GateError::MissingReason { .. })));
    }
    assert_eq!(store.list_gates("acme").await.unwrap(), before);
}

#[tokio::test]
async fn rejected_gate_can_be_reapproved() {
    let (_store, service) = service_with_project("acme").await;
    service.initialize_gates_for_project("acme").await.unwrap();

    let rejected = service
        .reject_gate(&reject("acme", "stack_approved", Some("Too many moving parts")))
        .await
        .unwrap();
    assert_eq!(rejected.status, GateStatus::Rejected);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("Too many moving parts"));

    let approved = service.approve_gate(&approve("acme", "stack_approved")).await.unwrap();
    assert_eq!(approved.status, GateStatus::Approved);
    assert!(approved.rejection_reason.is_none());
}

#[tokio::test]
async fn approved_gate_cannot_be_rejected() {
    let (_store, service) = service_with_project("acme").await;
    service.approve_gate(&approve("acme", "stack_approved")).await.unwrap();
    let err = service
        .reject_gate(&reject("acme", "stack_approved", Some("changed my mind")))
        .await
        .unwrap_err();
    assert!(matches!(err, SpecforgeError::Gate(GateError::AlreadyApproved { .. })));
}

#[tokio::test]
async fn approved_gate_cannot_be_approved_again() {
    let (store, service) = service_with_project("acme").await;
    service.approve_gate(&approve("acme", "stack_approved")).await.unwrap();
    let before = store.get_gate("acme", "stack_approved").await.unwrap();

    let mut second = approve("acme", "stack_approved");
    second.approved_by = "cfo@example.com".to_string();
    second.notes = Some("overriding".to_string());
    let err = service.approve_gate(&second).await.unwrap_err();
    assert!(matches!(err, SpecforgeError::Gate(GateError::AlreadyApproved { .. })));
    assert_eq!(err.kind(), specforge_utils::types::ErrorKind::Conflict);

    assert_eq!(store.get_gate("acme", "stack_approved").await.unwrap(), before);
    let gates = service.get_project_gates("acme").await.unwrap();
    assert_eq!(gates[0].approved_by.as_deref(), Some("cto@example.com"));
}

#[tokio::test]
async fn blank_actor_is_rejected() {
    let (_store, service) = service_with_project("acme").await;
    let mut request = approve("acme", "stack_approved");
    request.approved_by = " ".to_string();
    let err = service.approve_gate(&request).await.unwrap_err();
    assert!(matches!(err, SpecforgeError::Gate(GateError::MissingActor { .. })));
}

#[tokio::test]
async fn blocking_gate_lookup() {
    let (_store, service) = service_with_project("acme").await;

    // Missing rows count as pending.
    let blocked = service.blocking_gate("acme", PhaseId::StackSelection).await.unwrap();
    assert_eq!(blocked.map(|g| g.definition.name), Some(GateName::StackApproved));

    // Advisory gates never block.
    assert!(service.blocking_gate("acme", PhaseId::Spec).await.unwrap().is_none());

    service.approve_gate(&approve("acme", "stack_approved")).await.unwrap();
    assert!(service
        .blocking_gate("acme", PhaseId::StackSelection)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn reset_gates_removes_rows() {
    let (store, service) = service_with_project("acme").await;
    service.initialize_gates_for_project("acme").await.unwrap();
    let removed = service
        .reset_gates("acme", &[GateName::PrdApproved, GateName::HandoffAcknowledged])
        .await
        .unwrap();
    assert_eq!(removed, 2);
    assert_eq!(store.list_gates("acme").await.unwrap().len(), 2);
}
