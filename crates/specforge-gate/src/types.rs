//! Gate table and gate result types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use specforge_store::{GateRecord, GateStatus};
use specforge_utils::error::GateError;
use specforge_utils::types::{PhaseId, PhaseStep};

/// The four approval checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateName {
    StackApproved,
    PrdApproved,
    ArchitectureApproved,
    HandoffAcknowledged,
}

impl GateName {
    pub const ALL: [GateName; 4] = [
        GateName::StackApproved,
        GateName::PrdApproved,
        GateName::ArchitectureApproved,
        GateName::HandoffAcknowledged,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StackApproved => "stack_approved",
            Self::PrdApproved => "prd_approved",
            Self::ArchitectureApproved => "architecture_approved",
            Self::HandoffAcknowledged => "handoff_acknowledged",
        }
    }

    #[must_use]
    pub fn definition(self) -> &'static GateDefinition {
        &GATE_DEFINITIONS[self as usize]
    }

    /// Gates attached to steps of `phase`.
    pub fn for_phase(phase: PhaseId) -> impl Iterator<Item = GateName> {
        GATE_DEFINITIONS
            .iter()
            .filter(move |d| d.phase.phase() == phase)
            .map(|d| d.name)
    }

    /// Gates attached to phases strictly after `phase`.
    pub fn for_phases_after(phase: PhaseId) -> impl Iterator<Item = GateName> {
        GATE_DEFINITIONS
            .iter()
            .filter(move |d| d.phase.phase() > phase)
            .map(|d| d.name)
    }
}

impl fmt::Display for GateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GateName {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|g| g.as_str() == s.trim())
            .ok_or_else(|| GateError::InvalidGateName {
                name: s.to_string(),
            })
    }
}

/// Static definition of a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateDefinition {
    pub name: GateName,
    pub phase: PhaseStep,
    /// A blocking gate must be approved before its phase can be left.
    pub blocking: bool,
    pub stakeholder_role: &'static str,
}

/// Indexed by `GateName as usize`.
pub static GATE_DEFINITIONS: [GateDefinition; 4] = [
    GateDefinition {
        name: GateName::StackApproved,
        phase: PhaseStep::StackSelection,
        blocking: true,
        stakeholder_role: "Technical Lead / CTO",
    },
    GateDefinition {
        name: GateName::PrdApproved,
        phase: PhaseStep::SpecPm,
        blocking: false,
        stakeholder_role: "Product Owner / PM",
    },
    GateDefinition {
        name: GateName::ArchitectureApproved,
        phase: PhaseStep::SpecArchitect,
        blocking: false,
        stakeholder_role: "Technical Lead / Architect",
    },
    GateDefinition {
        name: GateName::HandoffAcknowledged,
        phase: PhaseStep::Done,
        blocking: false,
        stakeholder_role: "Development Team",
    },
];

/// A gate's definition joined with its runtime state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectGate {
    #[serde(flatten)]
    pub definition: GateDefinition,
    pub status: GateStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constitutional_score: Option<f64>,
    /// `None` when the gate has not been initialized for the project
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ProjectGate {
    pub(crate) fn from_record(definition: GateDefinition, record: Option<GateRecord>) -> Self {
        match record {
            Some(record) => Self {
                definition,
                status: record.status,
                notes: record.notes,
                rejection_reason: record.rejection_reason,
                approved_by: record.approved_by,
                rejected_by: record.rejected_by,
                constitutional_score: record.constitutional_score,
                timestamp: Some(record.updated_at),
            },
            None => Self {
                definition,
                status: GateStatus::Pending,
                notes: None,
                rejection_reason: None,
                approved_by: None,
                rejected_by: None,
                constitutional_score: None,
                timestamp: None,
            },
        }
    }

    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.status == GateStatus::Approved
    }
}

/// Input to [`ApprovalGateService::approve_gate`](crate::ApprovalGateService::approve_gate).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveRequest {
    pub project_id: String,
    pub gate_name: String,
    pub approved_by: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub constitutional_score: Option<f64>,
}

/// Input to [`ApprovalGateService::reject_gate`](crate::ApprovalGateService::reject_gate).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectRequest {
    pub project_id: String,
    pub gate_name: String,
    pub rejected_by: String,
    #[serde(default)]
    pub reason: Option<String>,
}
