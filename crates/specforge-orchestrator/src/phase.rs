//! Forward phase transitions and snapshot capture

use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use specforge_gate::{ApprovalGateService, ProjectGate};
use specforge_git::{CommitRequest, GitIntegration};
use specforge_lock::{LockGuard, ProjectLocker};
use specforge_store::{PhaseSnapshot, Project, ProjectStore};
use specforge_utils::canonicalization::hash_artifacts;
use specforge_utils::error::{PhaseError, SpecforgeError};
use specforge_utils::logging::log_phase_transition;
use specforge_utils::types::{PhaseHistoryEntry, PhaseId, PhaseStep};

use crate::types::{AdvanceOutcome, AdvanceRequest};

/// Metadata key carrying the chosen stack on STACK_SELECTION.
pub const STACK_CHOICE_KEY: &str = "stack_choice";

/// Metadata key carrying the clarification flag on ANALYSIS.
pub const CLARIFICATION_KEY: &str = "clarification_complete";

/// Agent credited in commits when the request names none.
#[must_use]
pub const fn default_agent(phase: PhaseId) -> &'static str {
    match phase {
        PhaseId::Analysis => "analyst",
        PhaseId::StackSelection | PhaseId::Solutioning => "architect",
        PhaseId::Spec => "pm",
        PhaseId::Dependencies => "devops",
        PhaseId::Validate | PhaseId::Done => "validator",
    }
}

/// Owns the forward half of the phase state machine.
///
/// Every mutation runs under the project lock and is refused before any
/// state changes when the project is already at DONE or a blocking gate of
/// the current phase is not approved.
#[derive(Clone)]
pub struct PhaseOrchestrator {
    store: Arc<dyn ProjectStore>,
    gates: ApprovalGateService,
    git: Arc<GitIntegration>,
    locker: Arc<dyn ProjectLocker>,
}

impl std::fmt::Debug for PhaseOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseOrchestrator").finish_non_exhaustive()
    }
}

impl PhaseOrchestrator {
    pub fn new(
        store: Arc<dyn ProjectStore>,
        git: Arc<GitIntegration>,
        locker: Arc<dyn ProjectLocker>,
    ) -> Self {
        Self {
            gates: ApprovalGateService::new(store.clone()),
            store,
            git,
            locker,
        }
    }

    /// Create a project at ANALYSIS with its four gates pending.
    ///
    /// The spec branch is created best-effort.
    pub async fn create_project(&self, slug: &str, name: &str) -> Result<Project, SpecforgeError> {
        let project = Project::new(slug, name);
        let _guard = self.locker.lock_project(&project.id).await?;

        self.store.create_project(project.clone()).await?;
        self.gates.initialize_gates_for_project(&project.id).await?;

        let branch = self.git.create_spec_branch(&project.slug).await;
        if !branch.success {
            debug!(project_id = %project.id, mode = %branch.mode, message = %branch.message, "Spec branch not created");
        }

        info!(project_id = %project.id, name = %project.name, "Created project");
        Ok(project)
    }

    /// Complete the current phase and move to the next one.
    ///
    /// Git work runs first and may be slow. Before the first store write the
    /// project is re-read and the lock re-checked, so a transition whose lock
    /// expired and was taken over cannot overwrite the newer state.
    ///
    /// # Errors
    ///
    /// - [`PhaseError::AlreadyComplete`] at DONE
    /// - [`PhaseError::GateBlocked`] when a blocking gate is pending or rejected
    /// - [`PhaseError::ConcurrentModification`] when the lock was lost or the
    ///   project moved while git ran
    /// - Lock and storage failures
    ///
    /// Git failures never fail the transition.
    pub async fn advance_phase(
        &self,
        request: &AdvanceRequest,
    ) -> Result<AdvanceOutcome, SpecforgeError> {
        let project_id = request.project_id.as_str();
        let guard = self.locker.lock_project(project_id).await?;

        let project = self.store.get_project(project_id).await?;
        let from = project.current_phase;
        self.check_can_leave(&project).await?;
        let Some(to) = from.next() else {
            return Err(PhaseError::AlreadyComplete {
                project_id: project.id.clone(),
            }
            .into());
        };

        let git_commit_hash = self.commit_artifacts(&project, request).await;

        let mut project = self.fence(&guard, project_id, from).await?;

        for (name, content) in &request.artifacts {
            self.store
                .put_artifact(project_id, from, name, content)
                .await?;
        }

        // Metadata is merged before the snapshot so a restore brings it back.
        merge_metadata(&mut project, from, &request.metadata);
        let snapshot = self
            .capture(&project, from, git_commit_hash.clone())
            .await?;

        project.phases_completed.push(from);
        project.current_phase = to;
        if to.is_terminal() {
            project.handoff_generated = true;
        }
        project.touch();
        self.store.update_project(&project).await?;

        log_phase_transition(project_id, from.as_str(), to.as_str(), snapshot.version);

        if to.is_terminal() {
            let tag = self.git.create_handoff_tag(&project.slug, snapshot.version).await;
            if tag.success {
                info!(project_id, tag = ?tag.tag, "Tagged handoff");
            } else if tag.mode.can_commit() {
                warn!(project_id, message = %tag.message, "Handoff tag failed");
            }
        }

        Ok(AdvanceOutcome {
            from,
            to,
            snapshot_id: snapshot.id,
            version: snapshot.version,
            git_commit_hash,
        })
    }

    /// Capture a snapshot of `phase` from its stored artifacts and append a
    /// completed history entry.
    ///
    /// `phase` must be the current phase or one already completed. Does not
    /// move the project; [`advance_phase`](Self::advance_phase) does that.
    pub async fn record_phase_completion(
        &self,
        project_id: &str,
        phase: PhaseId,
        git_commit_hash: Option<String>,
    ) -> Result<PhaseSnapshot, SpecforgeError> {
        let _guard = self.locker.lock_project(project_id).await?;
        let project = self.store.get_project(project_id).await?;
        if phase != project.current_phase && !project.has_completed(phase) {
            return Err(PhaseError::NotReached {
                project_id: project.id.clone(),
                phase: phase.to_string(),
                current: project.current_phase.to_string(),
            }
            .into());
        }
        self.capture(&project, phase, git_commit_hash).await
    }

    /// Re-read the project after slow work and confirm nothing moved it.
    async fn fence(
        &self,
        guard: &LockGuard,
        project_id: &str,
        from: PhaseId,
    ) -> Result<Project, SpecforgeError> {
        let current = self.store.get_project(project_id).await?;
        if guard.is_held() && current.current_phase == from {
            return Ok(current);
        }
        warn!(
            project_id,
            expected = %from,
            found = %current.current_phase,
            lock_held = guard.is_held(),
            "Transition lost its lock or the project moved; refusing to write"
        );
        Err(PhaseError::ConcurrentModification {
            project_id: project_id.to_string(),
            expected: from.to_string(),
            found: current.current_phase.to_string(),
        }
        .into())
    }

    async fn check_can_leave(&self, project: &Project) -> Result<(), SpecforgeError> {
        if project.is_complete() {
            debug!(project_id = %project.id, "Refusing to advance past DONE");
            return Err(PhaseError::AlreadyComplete {
                project_id: project.id.clone(),
            }
            .into());
        }
        if let Some(gate) = self
            .gates
            .blocking_gate(&project.id, project.current_phase)
            .await?
        {
            debug!(project_id = %project.id, gate = %gate.definition.name, "Blocked by gate");
            return Err(blocked(project.current_phase, &gate).into());
        }
        Ok(())
    }

    async fn commit_artifacts(&self, project: &Project, request: &AdvanceRequest) -> Option<String> {
        let phase = project.current_phase;
        let paths = self.git.write_artifacts(&project.slug, &request.artifacts).await;
        if paths.is_empty() {
            return None;
        }

        let commit = CommitRequest {
            slug: project.slug.clone(),
            project_name: project.name.clone(),
            phase: PhaseStep::from(phase),
            artifacts: paths,
            agent: request
                .agent
                .clone()
                .unwrap_or_else(|| default_agent(phase).to_string()),
            duration_ms: request.duration_ms,
        };
        let outcome = self.git.commit_phase_artifacts(&commit).await;
        if !outcome.success {
            warn!(project_id = %project.id, phase = %phase, message = %outcome.message, "Commit failed; continuing");
        }
        outcome.commit_hash
    }

    async fn capture(
        &self,
        project: &Project,
        phase: PhaseId,
        git_commit_hash: Option<String>,
    ) -> Result<PhaseSnapshot, SpecforgeError> {
        let artifacts = self.store.list_artifacts(&project.id, phase).await?;
        let version = self.store.next_snapshot_version(&project.id).await?;
        let snapshot = PhaseSnapshot {
            id: PhaseSnapshot::snapshot_id(&project.id, version),
            project_id: project.id.clone(),
            phase,
            version,
            content_hash: hash_artifacts(&artifacts),
            metadata: project.metadata.clone(),
            git_commit_hash,
            created_at: Utc::now(),
            artifacts,
        };
        self.store.insert_snapshot(snapshot.clone()).await?;

        let names = snapshot.artifacts.keys().cloned().collect();
        self.store
            .append_history(
                &project.id,
                PhaseHistoryEntry::completed(PhaseStep::from(phase), names),
            )
            .await?;

        debug!(project_id = %project.id, phase = %phase, version, "Captured snapshot");
        Ok(snapshot)
    }
}

fn blocked(phase: PhaseId, gate: &ProjectGate) -> PhaseError {
    PhaseError::GateBlocked {
        phase: phase.to_string(),
        gate: gate.definition.name.to_string(),
        status: gate.status.to_string(),
    }
}

fn merge_metadata(project: &mut Project, phase: PhaseId, metadata: &Map<String, Value>) {
    for (key, value) in metadata {
        project.metadata.insert(key.clone(), value.clone());
    }
    match phase {
        PhaseId::StackSelection => {
            if let Some(choice) = metadata.get(STACK_CHOICE_KEY).and_then(Value::as_str) {
                project.stack_choice = Some(choice.to_string());
            }
        }
        PhaseId::Analysis => {
            if let Some(done) = metadata.get(CLARIFICATION_KEY).and_then(Value::as_bool) {
                project.clarification_complete = done;
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stack_choice_only_taken_from_stack_selection() {
        let mut project = Project::new("acme", "Acme");
        let mut metadata = Map::new();
        metadata.insert(STACK_CHOICE_KEY.to_string(), json!("rust-axum"));

        merge_metadata(&mut project, PhaseId::Spec, &metadata);
        assert!(project.stack_choice.is_none());
        assert_eq!(project.metadata[STACK_CHOICE_KEY], "rust-axum");

        merge_metadata(&mut project, PhaseId::StackSelection, &metadata);
        assert_eq!(project.stack_choice.as_deref(), Some("rust-axum"));
    }

    #[test]
    fn test_clarification_flag_from_analysis() {
        let mut project = Project::new("acme", "Acme");
        let mut metadata = Map::new();
        metadata.insert(CLARIFICATION_KEY.to_string(), json!(true));
        merge_metadata(&mut project, PhaseId::Analysis, &metadata);
        assert!(project.clarification_complete);
    }

    #[test]
    fn test_every_phase_has_an_agent() {
        for phase in PhaseId::ORDER {
            assert!(!default_agent(phase).is_empty());
        }
    }
}
