use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::PhaseError;

/// Phase identifiers for the planning pipeline.
///
/// `PhaseId` represents the ordered stages a project moves through:
///
/// ```text
/// ANALYSIS → STACK_SELECTION → SPEC → DEPENDENCIES → SOLUTIONING → VALIDATE → DONE
/// ```
///
/// [`PhaseId::ORDER`] is the only ordering table in the workspace. Ordering,
/// `next()`, `previous()`, `phases_after()` and `phases_before()` are all
/// derived from it, so orchestrator, rollback, gates and storage pruning can
/// never disagree about which phase comes first.
///
/// # Example
///
/// ```rust
/// use specforge_utils::types::PhaseId;
///
/// assert_eq!(PhaseId::Analysis.next(), Some(PhaseId::StackSelection));
/// assert!(PhaseId::Dependencies < PhaseId::Solutioning);
/// assert_eq!(PhaseId::Validate.phases_after(), &[PhaseId::Done]);
/// ```
///
/// # Serialization
///
/// Serializes to SCREAMING_SNAKE_CASE (`"STACK_SELECTION"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseId {
    /// Project classification and clarification.
    Analysis,
    /// Technology stack proposal; gated by `stack_approved`.
    StackSelection,
    /// PRD, architecture and design specifications.
    Spec,
    /// Dependency manifest generation.
    Dependencies,
    /// Epics, stories and implementation plan.
    Solutioning,
    /// Cross-artifact validation.
    Validate,
    /// Handoff generated; terminal.
    Done,
}

impl PhaseId {
    /// Canonical pipeline order.
    pub const ORDER: [PhaseId; 7] = [
        PhaseId::Analysis,
        PhaseId::StackSelection,
        PhaseId::Spec,
        PhaseId::Dependencies,
        PhaseId::Solutioning,
        PhaseId::Validate,
        PhaseId::Done,
    ];

    /// First phase of every project.
    pub const FIRST: PhaseId = PhaseId::Analysis;

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Analysis => "ANALYSIS",
            Self::StackSelection => "STACK_SELECTION",
            Self::Spec => "SPEC",
            Self::Dependencies => "DEPENDENCIES",
            Self::Solutioning => "SOLUTIONING",
            Self::Validate => "VALIDATE",
            Self::Done => "DONE",
        }
    }

    /// Position of this phase in [`PhaseId::ORDER`].
    #[must_use]
    pub fn index(self) -> usize {
        Self::ORDER
            .iter()
            .position(|p| *p == self)
            .unwrap_or(Self::ORDER.len() - 1)
    }

    /// The phase that follows this one, or `None` for `DONE`.
    #[must_use]
    pub fn next(self) -> Option<PhaseId> {
        Self::ORDER.get(self.index() + 1).copied()
    }

    /// The phase that precedes this one, or `None` for `ANALYSIS`.
    #[must_use]
    pub fn previous(self) -> Option<PhaseId> {
        self.index().checked_sub(1).map(|i| Self::ORDER[i])
    }

    /// All phases strictly after this one, in order.
    #[must_use]
    pub fn phases_after(self) -> &'static [PhaseId] {
        &Self::ORDER[self.index() + 1..]
    }

    /// All phases strictly before this one, in order.
    #[must_use]
    pub fn phases_before(self) -> &'static [PhaseId] {
        &Self::ORDER[..self.index()]
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }
}

impl PartialOrd for PhaseId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PhaseId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.index().cmp(&other.index())
    }
}

impl fmt::Display for PhaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhaseId {
    type Err = PhaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_phase_name(s);
        Self::ORDER
            .iter()
            .copied()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| PhaseError::UnknownPhase {
                name: s.to_string(),
            })
    }
}

/// A step an agent runs on behalf of a phase.
///
/// Most phases are a single step; `SPEC` is split into the product, architecture
/// and design steps. Gates, remediation targets, phase-history entries and
/// root-cause origins are expressed as steps, and [`PhaseStep::phase`] maps a
/// step back onto the canonical [`PhaseId`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseStep {
    Analysis,
    StackSelection,
    Spec,
    SpecPm,
    SpecArchitect,
    SpecDesign,
    Dependencies,
    Solutioning,
    Validate,
    Done,
}

impl PhaseStep {
    pub const ALL: [PhaseStep; 10] = [
        PhaseStep::Analysis,
        PhaseStep::StackSelection,
        PhaseStep::Spec,
        PhaseStep::SpecPm,
        PhaseStep::SpecArchitect,
        PhaseStep::SpecDesign,
        PhaseStep::Dependencies,
        PhaseStep::Solutioning,
        PhaseStep::Validate,
        PhaseStep::Done,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Analysis => "ANALYSIS",
            Self::StackSelection => "STACK_SELECTION",
            Self::Spec => "SPEC",
            Self::SpecPm => "SPEC_PM",
            Self::SpecArchitect => "SPEC_ARCHITECT",
            Self::SpecDesign => "SPEC_DESIGN",
            Self::Dependencies => "DEPENDENCIES",
            Self::Solutioning => "SOLUTIONING",
            Self::Validate => "VALIDATE",
            Self::Done => "DONE",
        }
    }

    /// Canonical phase this step belongs to.
    #[must_use]
    pub const fn phase(&self) -> PhaseId {
        match self {
            Self::Analysis => PhaseId::Analysis,
            Self::StackSelection => PhaseId::StackSelection,
            Self::Spec | Self::SpecPm | Self::SpecArchitect | Self::SpecDesign => PhaseId::Spec,
            Self::Dependencies => PhaseId::Dependencies,
            Self::Solutioning => PhaseId::Solutioning,
            Self::Validate => PhaseId::Validate,
            Self::Done => PhaseId::Done,
        }
    }

    /// Human-readable step name used in commit messages and explanations.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Analysis => "Analysis",
            Self::StackSelection => "Stack Selection",
            Self::Spec => "Specification",
            Self::SpecPm => "Product Requirements",
            Self::SpecArchitect => "Architecture",
            Self::SpecDesign => "Design",
            Self::Dependencies => "Dependencies",
            Self::Solutioning => "Solutioning",
            Self::Validate => "Validation",
            Self::Done => "Handoff",
        }
    }
}

impl From<PhaseId> for PhaseStep {
    fn from(phase: PhaseId) -> Self {
        match phase {
            PhaseId::Analysis => Self::Analysis,
            PhaseId::StackSelection => Self::StackSelection,
            PhaseId::Spec => Self::Spec,
            PhaseId::Dependencies => Self::Dependencies,
            PhaseId::Solutioning => Self::Solutioning,
            PhaseId::Validate => Self::Validate,
            PhaseId::Done => Self::Done,
        }
    }
}

impl fmt::Display for PhaseStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhaseStep {
    type Err = PhaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_phase_name(s);
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| PhaseError::UnknownPhase {
                name: s.to_string(),
            })
    }
}

/// Status of a phase-history row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryStatus {
    Completed,
    RolledBack,
}

/// One row of a project's phase history, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseHistoryEntry {
    pub phase: PhaseStep,
    pub status: HistoryStatus,
    /// Artifact file names produced by the step, when known
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,
}

impl PhaseHistoryEntry {
    #[must_use]
    pub fn completed(phase: PhaseStep, artifacts: Vec<String>) -> Self {
        Self {
            phase,
            status: HistoryStatus::Completed,
            artifacts,
            timestamp: Some(chrono::Utc::now()),
        }
    }

    #[must_use]
    pub fn rolled_back(phase: PhaseStep) -> Self {
        Self {
            phase,
            status: HistoryStatus::RolledBack,
            artifacts: Vec::new(),
            timestamp: Some(chrono::Utc::now()),
        }
    }
}

fn normalize_phase_name(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            other => other.to_ascii_uppercase(),
        })
        .collect()
}

/// Error kinds used for boundary status mapping.
///
/// Each kind maps to an HTTP-class status for calling layers and to a CLI
/// exit code (see [`crate::exit_codes`]).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Caller supplied an invalid phase, gate name or missing field.
    Validation,
    /// Project, snapshot or artifact does not exist.
    NotFound,
    /// Request conflicts with current state (blocked gate, terminal phase).
    Conflict,
    /// Project lock could not be acquired.
    Locked,
    /// External dependency (git, LLM, storage) failed.
    Dependency,
    Internal,
}

impl ErrorKind {
    /// HTTP-class status code for this kind.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::Locked => 423,
            Self::Dependency => 502,
            Self::Internal => 500,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Locked => "locked",
            Self::Dependency => "dependency",
            Self::Internal => "internal",
        }
    }
}

/// Source of a configuration value.
///
/// CLI arguments > config file > programmatic overrides > built-in defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Cli,
    Config,
    Programmatic,
    Default,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cli => write!(f, "cli"),
            Self::Config => write!(f, "config"),
            Self::Programmatic => write!(f, "programmatic"),
            Self::Default => write!(f, "default"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_order_covers_every_phase_once() {
        for (i, phase) in PhaseId::ORDER.iter().enumerate() {
            assert_eq!(phase.index(), i);
        }
        assert_eq!(PhaseId::ORDER.len(), 7);
    }

    #[test]
    fn test_dependencies_precede_solutioning() {
        assert!(PhaseId::Dependencies < PhaseId::Solutioning);
        assert_eq!(PhaseId::Dependencies.next(), Some(PhaseId::Solutioning));
    }

    #[test]
    fn test_next_and_previous_at_edges() {
        assert_eq!(PhaseId::Analysis.previous(), None);
        assert_eq!(PhaseId::Done.next(), None);
        assert!(PhaseId::Done.is_terminal());
        assert!(!PhaseId::Validate.is_terminal());
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("stack-selection".parse::<PhaseId>().unwrap(), PhaseId::StackSelection);
        assert_eq!("Validate".parse::<PhaseId>().unwrap(), PhaseId::Validate);
        assert_eq!("spec_pm".parse::<PhaseStep>().unwrap(), PhaseStep::SpecPm);
        assert!("SPEC_PM".parse::<PhaseId>().is_err());
        assert!("nonsense".parse::<PhaseStep>().is_err());
    }

    #[test]
    fn test_spec_steps_map_to_spec_phase() {
        assert_eq!(PhaseStep::SpecPm.phase(), PhaseId::Spec);
        assert_eq!(PhaseStep::SpecArchitect.phase(), PhaseId::Spec);
        assert_eq!(PhaseStep::SpecDesign.phase(), PhaseId::Spec);
        for phase in PhaseId::ORDER {
            assert_eq!(PhaseStep::from(phase).phase(), phase);
        }
    }

    #[test]
    fn test_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&PhaseStep::SpecArchitect).unwrap();
        assert_eq!(json, r#""SPEC_ARCHITECT""#);
        let back: PhaseId = serde_json::from_str(r#""STACK_SELECTION""#).unwrap();
        assert_eq!(back, PhaseId::StackSelection);
    }

    #[test]
    fn test_error_kind_status_codes() {
        assert_eq!(ErrorKind::Validation.http_status(), 400);
        assert_eq!(ErrorKind::NotFound.http_status(), 404);
        assert_eq!(ErrorKind::Locked.http_status(), 423);
    }

    proptest! {
        #[test]
        fn prop_before_and_after_partition_order(i in 0usize..7) {
            let phase = PhaseId::ORDER[i];
            let before = phase.phases_before();
            let after = phase.phases_after();
            prop_assert_eq!(before.len() + after.len() + 1, PhaseId::ORDER.len());
            prop_assert!(before.iter().all(|p| *p < phase));
            prop_assert!(after.iter().all(|p| *p > phase));
        }
    }
}
