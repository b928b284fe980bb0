//! Destructive rollback to an earlier phase snapshot

use std::sync::Arc;
use tracing::{debug, warn};

use specforge_gate::{ApprovalGateService, GateName};
use specforge_git::GitIntegration;
use specforge_lock::ProjectLocker;
use specforge_store::{PhaseSnapshot, Project, ProjectStore};
use specforge_utils::error::{RollbackError, SpecforgeError};
use specforge_utils::logging::log_rollback;
use specforge_utils::types::{PhaseHistoryEntry, PhaseId, PhaseStep};

use crate::phase::{CLARIFICATION_KEY, STACK_CHOICE_KEY};
use crate::types::{RollbackPreview, RollbackResult};

/// Restores a completed phase's snapshot and discards everything after it.
///
/// There is no redo: artifacts, snapshots, gate rows and history of later
/// phases are deleted. The number of rollbacks per project is capped.
#[derive(Clone)]
pub struct RollbackService {
    store: Arc<dyn ProjectStore>,
    gates: ApprovalGateService,
    git: Arc<GitIntegration>,
    locker: Arc<dyn ProjectLocker>,
    max_depth: u32,
}

impl std::fmt::Debug for RollbackService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollbackService")
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}

impl RollbackService {
    pub fn new(
        store: Arc<dyn ProjectStore>,
        git: Arc<GitIntegration>,
        locker: Arc<dyn ProjectLocker>,
        max_depth: u32,
    ) -> Self {
        Self {
            gates: ApprovalGateService::new(store.clone()),
            store,
            git,
            locker,
            max_depth,
        }
    }

    #[must_use]
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Roll `project_id` back to `target`.
    ///
    /// Every precondition is checked before the first write: the target must
    /// be completed, the depth limit not reached and a snapshot on record.
    /// A failed git reset is logged and does not fail the rollback.
    pub async fn rollback_to_phase(
        &self,
        project_id: &str,
        target: PhaseId,
    ) -> Result<RollbackResult, SpecforgeError> {
        let _guard = self.locker.lock_project(project_id).await?;

        let mut project = self.store.get_project(project_id).await?;
        let snapshot = self.restorable_snapshot(&project, target).await?;
        let discarded = project.phases_completed.iter().filter(|p| **p >= target).count();
        if project.rollback_count >= self.max_depth {
            debug!(project_id, count = project.rollback_count, "Rollback depth exhausted");
            return Err(RollbackError::DepthExceeded {
                limit: self.max_depth,
            }
            .into());
        }

        let artifacts = self.store.delete_artifacts_after(project_id, target).await?;
        let snapshots = self.store.delete_snapshots_after(project_id, target).await?;
        let history = self.store.prune_history_after(project_id, target).await?;
        let gates = self.gates.reset_gates(project_id, &gates_to_reset(target)).await?;
        self.store
            .replace_artifacts(project_id, target, snapshot.artifacts.clone())
            .await?;

        reset_project(&mut project, target, &snapshot);
        self.store.update_project(&project).await?;
        self.store
            .append_history(project_id, PhaseHistoryEntry::rolled_back(PhaseStep::from(target)))
            .await?;

        debug!(
            project_id,
            snapshot = %snapshot.id,
            artifacts,
            snapshots,
            history,
            gates,
            rollback_count = project.rollback_count,
            "Discarded later phase state"
        );
        log_rollback(project_id, target.as_str(), discarded);

        if let Some(commit) = snapshot.git_commit_hash.as_deref() {
            let outcome = self.git.reset_spec_branch(&project.slug, commit).await;
            if !outcome.success && outcome.mode.can_commit() {
                warn!(project_id, commit, message = %outcome.message, "Spec branch reset failed");
            }
        }

        Ok(RollbackResult::restored(&snapshot))
    }

    /// What [`rollback_to_phase`](Self::rollback_to_phase) would restore.
    /// Never mutates state, whatever the outcome.
    pub async fn get_rollback_preview(
        &self,
        project_id: &str,
        target: PhaseId,
    ) -> Result<RollbackPreview, SpecforgeError> {
        let project = self.store.get_project(project_id).await?;
        let snapshot = self.restorable_snapshot(&project, target).await?;
        let phases_to_discard = project
            .phases_completed
            .iter()
            .copied()
            .filter(|p| *p >= target)
            .collect();

        Ok(RollbackPreview {
            phase: target,
            snapshot_id: snapshot.id,
            version: snapshot.version,
            artifacts: snapshot.artifacts.into_keys().collect(),
            metadata: snapshot.metadata,
            phases_to_discard,
            git_commit_hash: snapshot.git_commit_hash,
        })
    }

    async fn restorable_snapshot(
        &self,
        project: &Project,
        target: PhaseId,
    ) -> Result<PhaseSnapshot, SpecforgeError> {
        if !project.has_completed(target) {
            debug!(project_id = %project.id, phase = %target, "Rollback target not completed");
            return Err(RollbackError::PhaseNotCompleted {
                phase: target.to_string(),
            }
            .into());
        }
        self.store
            .latest_snapshot(&project.id, target)
            .await?
            .ok_or_else(|| {
                RollbackError::NoSnapshot {
                    phase: target.to_string(),
                }
                .into()
            })
    }
}

/// Gates of later phases, plus the target's own when it is at or before
/// STACK_SELECTION.
fn gates_to_reset(target: PhaseId) -> Vec<GateName> {
    let mut gates: Vec<GateName> = GateName::for_phases_after(target).collect();
    if target <= PhaseId::StackSelection {
        gates.extend(GateName::for_phase(target));
    }
    gates
}

fn reset_project(project: &mut Project, target: PhaseId, snapshot: &PhaseSnapshot) {
    project.phases_completed.retain(|p| *p < target);
    project.current_phase = target;
    project.metadata = snapshot.metadata.clone();

    if target <= PhaseId::StackSelection {
        project.stack_choice = None;
        project.metadata.remove(STACK_CHOICE_KEY);
    }
    if target == PhaseId::Analysis {
        project.clarification_complete = false;
        project.metadata.remove(CLARIFICATION_KEY);
    }
    project.handoff_generated = false;
    project.rollback_count += 1;
    project.touch();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn snapshot(metadata: serde_json::Map<String, serde_json::Value>) -> PhaseSnapshot {
        PhaseSnapshot {
            id: "acme-v2".to_string(),
            project_id: "acme".to_string(),
            phase: PhaseId::StackSelection,
            version: 2,
            artifacts: BTreeMap::new(),
            metadata,
            git_commit_hash: None,
            content_hash: String::new(),
            created_at: Utc::now(),
        }
    }

    fn project_at_validate() -> Project {
        let mut project = Project::new("acme", "Acme");
        project.phases_completed = PhaseId::ORDER[..5].to_vec();
        project.current_phase = PhaseId::Validate;
        project.stack_choice = Some("rust-axum".to_string());
        project.clarification_complete = true;
        project
    }

    #[test]
    fn test_gates_to_reset() {
        assert_eq!(gates_to_reset(PhaseId::Analysis), GateName::ALL.to_vec());
        let mut stack = gates_to_reset(PhaseId::StackSelection);
        stack.sort();
        assert_eq!(stack, GateName::ALL.to_vec());
        assert_eq!(
            gates_to_reset(PhaseId::Spec),
            vec![GateName::HandoffAcknowledged]
        );
        assert!(gates_to_reset(PhaseId::Validate)
            .iter()
            .all(|g| *g == GateName::HandoffAcknowledged));
    }

    #[test]
    fn test_reset_to_stack_selection_clears_choice() {
        let mut project = project_at_validate();
        let mut metadata = serde_json::Map::new();
        metadata.insert(STACK_CHOICE_KEY.to_string(), json!("rust-axum"));
        metadata.insert("classification".to_string(), json!("saas"));

        reset_project(&mut project, PhaseId::StackSelection, &snapshot(metadata));

        assert_eq!(project.phases_completed, vec![PhaseId::Analysis]);
        assert_eq!(project.current_phase, PhaseId::StackSelection);
        assert!(project.stack_choice.is_none());
        assert!(!project.metadata.contains_key(STACK_CHOICE_KEY));
        assert_eq!(project.metadata["classification"], "saas");
        assert!(project.clarification_complete);
        assert_eq!(project.rollback_count, 1);
        assert!(project.check_invariants().is_ok());
    }

    #[test]
    fn test_reset_to_later_phase_keeps_stack_choice() {
        let mut project = project_at_validate();
        project.handoff_generated = true;
        reset_project(&mut project, PhaseId::Dependencies, &snapshot(serde_json::Map::new()));

        assert_eq!(project.stack_choice.as_deref(), Some("rust-axum"));
        assert!(!project.handoff_generated);
        assert!(project.check_invariants().is_ok());
    }
}
