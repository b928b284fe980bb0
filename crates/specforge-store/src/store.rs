//! Persistence contract

use async_trait::async_trait;
use std::collections::BTreeMap;

use specforge_utils::error::StoreError;
use specforge_utils::types::{PhaseHistoryEntry, PhaseId};

use crate::model::{GateRecord, PhaseSnapshot, Project, ProjectDocument};

/// Project, history, artifact, gate and snapshot persistence.
///
/// Every per-project call fails with [`StoreError::ProjectNotFound`] for an
/// unknown project. "After" always means strictly later in [`PhaseId::ORDER`].
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Fails with [`StoreError::DuplicateProject`] if the id or slug is taken.
    async fn create_project(&self, project: Project) -> Result<(), StoreError>;
    async fn get_project(&self, project_id: &str) -> Result<Project, StoreError>;
    async fn update_project(&self, project: &Project) -> Result<(), StoreError>;
    async fn list_projects(&self) -> Result<Vec<Project>, StoreError>;
    /// Removes the project with all of its history, artifacts, gates and snapshots.
    async fn delete_project(&self, project_id: &str) -> Result<(), StoreError>;

    async fn append_history(
        &self,
        project_id: &str,
        entry: PhaseHistoryEntry,
    ) -> Result<(), StoreError>;
    async fn history(&self, project_id: &str) -> Result<Vec<PhaseHistoryEntry>, StoreError>;
    async fn prune_history_after(&self, project_id: &str, phase: PhaseId)
    -> Result<usize, StoreError>;

    async fn put_artifact(
        &self,
        project_id: &str,
        phase: PhaseId,
        name: &str,
        content: &str,
    ) -> Result<(), StoreError>;
    async fn get_artifact(
        &self,
        project_id: &str,
        phase: PhaseId,
        name: &str,
    ) -> Result<Option<String>, StoreError>;
    async fn list_artifacts(
        &self,
        project_id: &str,
        phase: PhaseId,
    ) -> Result<BTreeMap<String, String>, StoreError>;
    /// Replace every artifact of `phase` with `artifacts`.
    async fn replace_artifacts(
        &self,
        project_id: &str,
        phase: PhaseId,
        artifacts: BTreeMap<String, String>,
    ) -> Result<(), StoreError>;
    async fn delete_artifacts_after(
        &self,
        project_id: &str,
        phase: PhaseId,
    ) -> Result<usize, StoreError>;

    async fn put_gate(&self, project_id: &str, record: GateRecord) -> Result<(), StoreError>;
    async fn get_gate(&self, project_id: &str, name: &str)
    -> Result<Option<GateRecord>, StoreError>;
    async fn list_gates(&self, project_id: &str) -> Result<Vec<GateRecord>, StoreError>;
    async fn delete_gates(&self, project_id: &str, names: &[&str]) -> Result<usize, StoreError>;

    async fn insert_snapshot(&self, snapshot: PhaseSnapshot) -> Result<(), StoreError>;
    /// Highest-version snapshot of `phase`.
    async fn latest_snapshot(
        &self,
        project_id: &str,
        phase: PhaseId,
    ) -> Result<Option<PhaseSnapshot>, StoreError>;
    /// All snapshots, oldest first.
    async fn list_snapshots(&self, project_id: &str) -> Result<Vec<PhaseSnapshot>, StoreError>;
    async fn delete_snapshots_after(
        &self,
        project_id: &str,
        phase: PhaseId,
    ) -> Result<usize, StoreError>;
    /// Reserve the next snapshot version. Versions are never reused, even
    /// after rollback deletes snapshots.
    async fn next_snapshot_version(&self, project_id: &str) -> Result<u64, StoreError>;
}

/// Storage of whole [`ProjectDocument`]s.
///
/// Implementing this is enough to get a [`ProjectStore`].
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    async fn load(&self, project_id: &str) -> Result<Option<ProjectDocument>, StoreError>;
    async fn load_all(&self) -> Result<Vec<ProjectDocument>, StoreError>;
    /// Store a new document. Fails if its id or slug already exists.
    async fn insert(&self, document: ProjectDocument) -> Result<(), StoreError>;
    /// Apply `f` to an existing document and persist the result atomically.
    async fn update<F, R>(&self, project_id: &str, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut ProjectDocument) -> R + Send,
        R: Send;
    async fn remove(&self, project_id: &str) -> Result<bool, StoreError>;
}

fn not_found(project_id: &str) -> StoreError {
    StoreError::ProjectNotFound {
        project_id: project_id.to_string(),
    }
}

fn later(step_phase: PhaseId, phase: PhaseId) -> bool {
    step_phase > phase
}

#[async_trait]
impl<B: DocumentBackend> ProjectStore for B {
    async fn create_project(&self, project: Project) -> Result<(), StoreError> {
        self.insert(ProjectDocument::new(project)).await
    }

    async fn get_project(&self, project_id: &str) -> Result<Project, StoreError> {
        self.load(project_id)
            .await?
            .map(|doc| doc.project)
            .ok_or_else(|| not_found(project_id))
    }

    async fn update_project(&self, project: &Project) -> Result<(), StoreError> {
        let project = project.clone();
        let id = project.id.clone();
        self.update(&id, move |doc| doc.project = project).await
    }

    async fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        let mut projects: Vec<Project> = self
            .load_all()
            .await?
            .into_iter()
            .map(|doc| doc.project)
            .collect();
        projects.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(projects)
    }

    async fn delete_project(&self, project_id: &str) -> Result<(), StoreError> {
        if self.remove(project_id).await? {
            Ok(())
        } else {
            Err(not_found(project_id))
        }
    }

    async fn append_history(
        &self,
        project_id: &str,
        entry: PhaseHistoryEntry,
    ) -> Result<(), StoreError> {
        self.update(project_id, move |doc| doc.history.push(entry))
            .await
    }

    async fn history(&self, project_id: &str) -> Result<Vec<PhaseHistoryEntry>, StoreError> {
        self.load(project_id)
            .await?
            .map(|doc| doc.history)
            .ok_or_else(|| not_found(project_id))
    }

    async fn prune_history_after(
        &self,
        project_id: &str,
        phase: PhaseId,
    ) -> Result<usize, StoreError> {
        self.update(project_id, move |doc| {
            let before = doc.history.len();
            doc.history.retain(|e| !later(e.phase.phase(), phase));
            before - doc.history.len()
        })
        .await
    }

    async fn put_artifact(
        &self,
        project_id: &str,
        phase: PhaseId,
        name: &str,
        content: &str,
    ) -> Result<(), StoreError> {
        let (name, content) = (name.to_string(), content.to_string());
        self.update(project_id, move |doc| {
            doc.artifacts.entry(phase).or_default().insert(name, content);
        })
        .await
    }

    async fn get_artifact(
        &self,
        project_id: &str,
        phase: PhaseId,
        name: &str,
    ) -> Result<Option<String>, StoreError> {
        let doc = self
            .load(project_id)
            .await?
            .ok_or_else(|| not_found(project_id))?;
        Ok(doc
            .artifacts
            .get(&phase)
            .and_then(|files| files.get(name))
            .cloned())
    }

    async fn list_artifacts(
        &self,
        project_id: &str,
        phase: PhaseId,
    ) -> Result<BTreeMap<String, String>, StoreError> {
        let mut doc = self
            .load(project_id)
            .await?
            .ok_or_else(|| not_found(project_id))?;
        Ok(doc.artifacts.remove(&phase).unwrap_or_default())
    }

    async fn replace_artifacts(
        &self,
        project_id: &str,
        phase: PhaseId,
        artifacts: BTreeMap<String, String>,
    ) -> Result<(), StoreError> {
        self.update(project_id, move |doc| {
            if artifacts.is_empty() {
                doc.artifacts.remove(&phase);
            } else {
                doc.artifacts.insert(phase, artifacts);
            }
        })
        .await
    }

    async fn delete_artifacts_after(
        &self,
        project_id: &str,
        phase: PhaseId,
    ) -> Result<usize, StoreError> {
        self.update(project_id, move |doc| {
            let doomed: Vec<PhaseId> = doc
                .artifacts
                .keys()
                .copied()
                .filter(|p| later(*p, phase))
                .collect();
            doomed
                .iter()
                .filter_map(|p| doc.artifacts.remove(p))
                .map(|files| files.len())
                .sum()
        })
        .await
    }

    async fn put_gate(&self, project_id: &str, record: GateRecord) -> Result<(), StoreError> {
        self.update(project_id, move |doc| {
            doc.gates.insert(record.name.clone(), record);
        })
        .await
    }

    async fn get_gate(
        &self,
        project_id: &str,
        name: &str,
    ) -> Result<Option<GateRecord>, StoreError> {
        let mut doc = self
            .load(project_id)
            .await?
            .ok_or_else(|| not_found(project_id))?;
        Ok(doc.gates.remove(name))
    }

    async fn list_gates(&self, project_id: &str) -> Result<Vec<GateRecord>, StoreError> {
        let doc = self
            .load(project_id)
            .await?
            .ok_or_else(|| not_found(project_id))?;
        Ok(doc.gates.into_values().collect())
    }

    async fn delete_gates(&self, project_id: &str, names: &[&str]) -> Result<usize, StoreError> {
        let names: Vec<String> = names.iter().map(ToString::to_string).collect();
        self.update(project_id, move |doc| {
            names
                .iter()
                .filter(|name| doc.gates.remove(name.as_str()).is_some())
                .count()
        })
        .await
    }

    async fn insert_snapshot(&self, snapshot: PhaseSnapshot) -> Result<(), StoreError> {
        let project_id = snapshot.project_id.clone();
        self.update(&project_id, move |doc| {
            doc.last_snapshot_version = doc.last_snapshot_version.max(snapshot.version);
            doc.snapshots.push(snapshot);
            doc.snapshots.sort_by_key(|s| s.version);
        })
        .await
    }

    async fn latest_snapshot(
        &self,
        project_id: &str,
        phase: PhaseId,
    ) -> Result<Option<PhaseSnapshot>, StoreError> {
        let doc = self
            .load(project_id)
            .await?
            .ok_or_else(|| not_found(project_id))?;
        Ok(doc
            .snapshots
            .into_iter()
            .filter(|s| s.phase == phase)
            .max_by_key(|s| s.version))
    }

    async fn list_snapshots(&self, project_id: &str) -> Result<Vec<PhaseSnapshot>, StoreError> {
        self.load(project_id)
            .await?
            .map(|doc| doc.snapshots)
            .ok_or_else(|| not_found(project_id))
    }

    async fn delete_snapshots_after(
        &self,
        project_id: &str,
        phase: PhaseId,
    ) -> Result<usize, StoreError> {
        self.update(project_id, move |doc| {
            let before = doc.snapshots.len();
            doc.snapshots.retain(|s| !later(s.phase, phase));
            before - doc.snapshots.len()
        })
        .await
    }

    async fn next_snapshot_version(&self, project_id: &str) -> Result<u64, StoreError> {
        self.update(project_id, |doc| {
            doc.last_snapshot_version += 1;
            doc.last_snapshot_version
        })
        .await
    }
}
