//! Persisted records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use specforge_utils::types::{PhaseHistoryEntry, PhaseId};

/// Turn an arbitrary name into a lowercase, dash-separated slug.
///
/// Slugs double as project ids and file names, so only `[a-z0-9-]` survive.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

/// A project moving through the pipeline.
///
/// `phases_completed` is always a prefix of [`PhaseId::ORDER`] and
/// `current_phase` is the phase right after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub current_phase: PhaseId,
    #[serde(default)]
    pub phases_completed: Vec<PhaseId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_choice: Option<String>,
    #[serde(default)]
    pub clarification_complete: bool,
    #[serde(default)]
    pub handoff_generated: bool,
    /// Metadata merged from completed phases
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub rollback_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// New project at `ANALYSIS`. The id is the slug of `slug`.
    #[must_use]
    pub fn new(slug: &str, name: impl Into<String>) -> Self {
        let slug = slugify(slug);
        let now = Utc::now();
        Self {
            id: slug.clone(),
            slug,
            name: name.into(),
            current_phase: PhaseId::Analysis,
            phases_completed: Vec::new(),
            stack_choice: None,
            clarification_complete: false,
            handoff_generated: false,
            metadata: Map::new(),
            rollback_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn has_completed(&self, phase: PhaseId) -> bool {
        self.phases_completed.contains(&phase)
    }

    #[must_use]
    pub fn last_completed(&self) -> Option<PhaseId> {
        self.phases_completed.last().copied()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.current_phase.is_terminal()
    }

    /// Check the phase-order invariants.
    ///
    /// # Errors
    ///
    /// Describes the first violated invariant.
    pub fn check_invariants(&self) -> Result<(), String> {
        let completed = self.phases_completed.len();
        if completed > PhaseId::ORDER.len() - 1 {
            return Err(format!("{completed} completed phases exceeds the pipeline"));
        }
        if self.phases_completed[..] != PhaseId::ORDER[..completed] {
            return Err(format!(
                "completed phases {:?} are not a prefix of the canonical order",
                self.phases_completed
            ));
        }
        if self.current_phase.index() != completed {
            return Err(format!(
                "current phase {} does not follow the last completed phase",
                self.current_phase
            ));
        }
        Ok(())
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Immutable capture of a phase's artifacts at completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSnapshot {
    pub id: String,
    pub project_id: String,
    pub phase: PhaseId,
    /// Monotonic per project, across all phases
    pub version: u64,
    pub artifacts: BTreeMap<String, String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_commit_hash: Option<String>,
    /// BLAKE3 over the artifact map
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

impl PhaseSnapshot {
    #[must_use]
    pub fn snapshot_id(project_id: &str, version: u64) -> String {
        format!("{project_id}-v{version}")
    }
}

/// Runtime state of an approval gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateStatus {
    Pending,
    Approved,
    Rejected,
}

impl GateStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for GateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gate row keyed by `(project, name)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateRecord {
    pub name: String,
    pub status: GateStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constitutional_score: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

impl GateRecord {
    #[must_use]
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: GateStatus::Pending,
            notes: None,
            rejection_reason: None,
            approved_by: None,
            rejected_by: None,
            constitutional_score: None,
            updated_at: Utc::now(),
        }
    }
}

/// Everything stored for one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDocument {
    pub project: Project,
    #[serde(default)]
    pub history: Vec<PhaseHistoryEntry>,
    #[serde(default)]
    pub artifacts: BTreeMap<PhaseId, BTreeMap<String, String>>,
    #[serde(default)]
    pub gates: BTreeMap<String, GateRecord>,
    #[serde(default)]
    pub snapshots: Vec<PhaseSnapshot>,
    /// Highest snapshot version handed out; never decreases
    #[serde(default)]
    pub last_snapshot_version: u64,
}

impl ProjectDocument {
    #[must_use]
    pub fn new(project: Project) -> Self {
        Self {
            project,
            history: Vec::new(),
            artifacts: BTreeMap::new(),
            gates: BTreeMap::new(),
            snapshots: Vec::new(),
            last_snapshot_version: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Acme Portal"), "acme-portal");
        assert_eq!(slugify("  ../etc/passwd "), "etc-passwd");
        assert_eq!(slugify("a--b__c"), "a-b-c");
    }

    #[test]
    fn test_new_project_satisfies_invariants() {
        let project = Project::new("Acme", "Acme Portal");
        assert_eq!(project.id, "acme");
        assert_eq!(project.current_phase, PhaseId::Analysis);
        assert!(project.check_invariants().is_ok());
    }

    #[test]
    fn test_invariant_violations() {
        let mut project = Project::new("acme", "Acme");
        project.phases_completed = vec![PhaseId::StackSelection];
        project.current_phase = PhaseId::Spec;
        assert!(project.check_invariants().is_err());

        project.phases_completed = vec![PhaseId::Analysis];
        project.current_phase = PhaseId::Spec;
        assert!(project.check_invariants().is_err());

        project.current_phase = PhaseId::StackSelection;
        assert!(project.check_invariants().is_ok());
    }

    #[test]
    fn test_document_json_uses_phase_keys() {
        let mut doc = ProjectDocument::new(Project::new("acme", "Acme"));
        doc.artifacts
            .entry(PhaseId::StackSelection)
            .or_default()
            .insert("stack.json".to_string(), "{}".to_string());
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["artifacts"]["STACK_SELECTION"]["stack.json"], "{}");
        let back: ProjectDocument = serde_json::from_value(json).unwrap();
        assert_eq!(back, doc);
    }
}
