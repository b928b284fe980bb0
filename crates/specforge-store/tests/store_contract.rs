//! The same contract checks run against both store implementations.

use chrono::Utc;
use std::collections::BTreeMap;

use specforge_store::{
    FileStore, GateRecord, GateStatus, MemoryStore, PhaseSnapshot, Project, ProjectStore,
    StoreError,
};
use specforge_utils::canonicalization::hash_artifacts;
use specforge_utils::test_support::{artifacts, temp_state_dir};
use specforge_utils::types::{HistoryStatus, PhaseHistoryEntry, PhaseId, PhaseStep};

fn snapshot(project_id: &str, phase: PhaseId, version: u64, files: BTreeMap<String, String>) -> PhaseSnapshot {
    PhaseSnapshot {
        id: PhaseSnapshot::snapshot_id(project_id, version),
        project_id: project_id.to_string(),
        phase,
        version,
        content_hash: hash_artifacts(&files),
        artifacts: files,
        metadata: serde_json::Map::new(),
        git_commit_hash: None,
        created_at: Utc::now(),
    }
}

async fn project_lifecycle(store: &dyn ProjectStore) {
    let project = Project::new("acme-portal", "Acme Portal");
    store.create_project(project.clone()).await.unwrap();

    let err = store
        .create_project(Project::new("acme-portal", "Again"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateProject { .. }));

    let mut loaded = store.get_project("acme-portal").await.unwrap();
    assert_eq!(loaded.name, "Acme Portal");

    loaded.stack_choice = Some("rust-axum".to_string());
    store.update_project(&loaded).await.unwrap();
    assert_eq!(
        store.get_project("acme-portal").await.unwrap().stack_choice.as_deref(),
        Some("rust-axum")
    );

    assert_eq!(store.list_projects().await.unwrap().len(), 1);

    let missing = store.get_project("nope").await.unwrap_err();
    assert!(matches!(missing, StoreError::ProjectNotFound { .. }));
    assert!(store.history("nope").await.is_err());
}

async fn artifacts_and_pruning(store: &dyn ProjectStore) {
    store.create_project(Project::new("p", "P")).await.unwrap();
    for (phase, name) in [
        (PhaseId::Analysis, "analysis.md"),
        (PhaseId::StackSelection, "stack.json"),
        (PhaseId::Spec, "PRD.md"),
        (PhaseId::Spec, "api-spec.json"),
    ] {
        store.put_artifact("p", phase, name, "content").await.unwrap();
    }

    assert_eq!(
        store.get_artifact("p", PhaseId::Spec, "PRD.md").await.unwrap().as_deref(),
        Some("content")
    );
    assert_eq!(store.list_artifacts("p", PhaseId::Spec).await.unwrap().len(), 2);
    assert!(store.list_artifacts("p", PhaseId::Done).await.unwrap().is_empty());

    let removed = store.delete_artifacts_after("p", PhaseId::StackSelection).await.unwrap();
    assert_eq!(removed, 2);
    assert!(store.list_artifacts("p", PhaseId::Spec).await.unwrap().is_empty());
    assert_eq!(store.list_artifacts("p", PhaseId::StackSelection).await.unwrap().len(), 1);

    store
        .replace_artifacts("p", PhaseId::Analysis, artifacts(&[("analysis.md", "restored")]))
        .await
        .unwrap();
    assert_eq!(
        store.get_artifact("p", PhaseId::Analysis, "analysis.md").await.unwrap().as_deref(),
        Some("restored")
    );
}

async fn history_gates_and_snapshots(store: &dyn ProjectStore) {
    store.create_project(Project::new("h", "H")).await.unwrap();
    for step in [PhaseStep::Analysis, PhaseStep::StackSelection, PhaseStep::SpecPm] {
        store
            .append_history("h", PhaseHistoryEntry::completed(step, Vec::new()))
            .await
            .unwrap();
    }
    assert_eq!(store.prune_history_after("h", PhaseId::StackSelection).await.unwrap(), 1);
    let history = store.history("h").await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|e| e.status == HistoryStatus::Completed));

    store.put_gate("h", GateRecord::pending("stack_approved")).await.unwrap();
    store.put_gate("h", GateRecord::pending("prd_approved")).await.unwrap();
    let mut approved = GateRecord::pending("stack_approved");
    approved.status = GateStatus::Approved;
    store.put_gate("h", approved).await.unwrap();
    assert_eq!(store.list_gates("h").await.unwrap().len(), 2);
    assert_eq!(
        store.get_gate("h", "stack_approved").await.unwrap().map(|g| g.status),
        Some(GateStatus::Approved)
    );
    assert_eq!(store.delete_gates("h", &["prd_approved", "missing"]).await.unwrap(), 1);

    let v1 = store.next_snapshot_version("h").await.unwrap();
    store
        .insert_snapshot(snapshot("h", PhaseId::Analysis, v1, artifacts(&[("a.md", "1")])))
        .await
        .unwrap();
    let v2 = store.next_snapshot_version("h").await.unwrap();
    store
        .insert_snapshot(snapshot("h", PhaseId::Analysis, v2, artifacts(&[("a.md", "2")])))
        .await
        .unwrap();
    let v3 = store.next_snapshot_version("h").await.unwrap();
    store
        .insert_snapshot(snapshot("h", PhaseId::Spec, v3, artifacts(&[("PRD.md", "x")])))
        .await
        .unwrap();
    assert!(v1 < v2 && v2 < v3);

    let latest = store.latest_snapshot("h", PhaseId::Analysis).await.unwrap().unwrap();
    assert_eq!(latest.version, v2);
    assert_eq!(store.delete_snapshots_after("h", PhaseId::Analysis).await.unwrap(), 1);
    assert!(store.latest_snapshot("h", PhaseId::Spec).await.unwrap().is_none());

    // Versions are never reused after deletion.
    assert!(store.next_snapshot_version("h").await.unwrap() > v3);

    store.delete_project("h").await.unwrap();
    assert!(store.list_snapshots("h").await.is_err());
    assert!(matches!(
        store.delete_project("h").await,
        Err(StoreError::ProjectNotFound { .. })
    ));
}

#[tokio::test]
async fn memory_store_contract() {
    project_lifecycle(&MemoryStore::new()).await;
    artifacts_and_pruning(&MemoryStore::new()).await;
    history_gates_and_snapshots(&MemoryStore::new()).await;
}

#[tokio::test]
async fn file_store_contract() {
    let (_dir, root) = temp_state_dir();
    project_lifecycle(&FileStore::new(root.join("a"))).await;
    artifacts_and_pruning(&FileStore::new(root.join("b"))).await;
    history_gates_and_snapshots(&FileStore::new(root.join("c"))).await;
}

#[tokio::test]
async fn file_store_persists_across_instances() {
    let (_dir, root) = temp_state_dir();
    {
        let store = FileStore::new(root.clone());
        store.create_project(Project::new("durable", "Durable")).await.unwrap();
        store
            .put_artifact("durable", PhaseId::Analysis, "analysis.md", "# Analysis")
            .await
            .unwrap();
    }

    let reopened = FileStore::new(root.clone());
    assert_eq!(
        reopened
            .get_artifact("durable", PhaseId::Analysis, "analysis.md")
            .await
            .unwrap()
            .as_deref(),
        Some("# Analysis")
    );
    assert!(root.join("projects").join("durable.json").exists());
}

#[tokio::test]
async fn file_store_reports_corruption() {
    let (_dir, root) = temp_state_dir();
    let store = FileStore::new(root.clone());
    std::fs::create_dir_all(store.projects_dir()).unwrap();
    std::fs::write(store.projects_dir().join("broken.json"), "{not json").unwrap();

    assert!(matches!(
        store.get_project("broken").await,
        Err(StoreError::Corrupted { .. })
    ));
}

#[tokio::test]
async fn file_store_rejects_path_like_ids() {
    let (_dir, root) = temp_state_dir();
    let store = FileStore::new(root);
    assert!(matches!(
        store.get_project("../escape").await,
        Err(StoreError::ProjectNotFound { .. })
    ));
}
