//! Request and result types crossing the orchestrator boundary

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use specforge_classifier::{FailureClassification, RemediationStrategy};
use specforge_gate::ProjectGate;
use specforge_rootcause::RootCauseAnalysis;
use specforge_store::{PhaseSnapshot, Project};
use specforge_utils::types::{PhaseHistoryEntry, PhaseId};

/// Completion of the project's current phase.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceRequest {
    pub project_id: String,
    /// Artifact name to content, stored under the current phase
    #[serde(default)]
    pub artifacts: BTreeMap<String, String>,
    /// Merged into the project metadata
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Agent key that produced the artifacts; defaults per phase
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,
}

impl AdvanceRequest {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_artifact(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.artifacts.insert(name.into(), content.into());
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceOutcome {
    pub from: PhaseId,
    pub to: PhaseId,
    pub snapshot_id: String,
    pub version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_commit_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,
    #[serde(default)]
    pub restored_artifacts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_commit_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RollbackResult {
    pub(crate) fn restored(snapshot: &PhaseSnapshot) -> Self {
        Self {
            success: true,
            snapshot_id: Some(snapshot.id.clone()),
            restored_artifacts: snapshot.artifacts.keys().cloned().collect(),
            git_commit_hash: snapshot.git_commit_hash.clone(),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            snapshot_id: None,
            restored_artifacts: Vec::new(),
            git_commit_hash: None,
            error: Some(error.into()),
        }
    }
}

/// What a rollback would restore and discard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackPreview {
    pub phase: PhaseId,
    pub snapshot_id: String,
    pub version: u64,
    pub artifacts: Vec<String>,
    pub metadata: Map<String, Value>,
    /// Completed phases that would no longer be completed
    pub phases_to_discard: Vec<PhaseId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_commit_hash: Option<String>,
}

/// Classification, strategy and root cause for one failed validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemediationPlan {
    pub classification: FailureClassification,
    pub strategy: RemediationStrategy,
    pub analysis: RootCauseAnalysis,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStatus {
    pub project: Project,
    pub gates: Vec<ProjectGate>,
    pub history: Vec<PhaseHistoryEntry>,
    pub snapshots: Vec<SnapshotSummary>,
}

/// Snapshot listing without artifact content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSummary {
    pub id: String,
    pub phase: PhaseId,
    pub version: u64,
    pub artifacts: Vec<String>,
    pub content_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_commit_hash: Option<String>,
}

impl From<&PhaseSnapshot> for SnapshotSummary {
    fn from(snapshot: &PhaseSnapshot) -> Self {
        Self {
            id: snapshot.id.clone(),
            phase: snapshot.phase,
            version: snapshot.version,
            artifacts: snapshot.artifacts.keys().cloned().collect(),
            content_hash: snapshot.content_hash.clone(),
            git_commit_hash: snapshot.git_commit_hash.clone(),
        }
    }
}
