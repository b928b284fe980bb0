use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

use specforge_store::{GateRecord, GateStatus, ProjectStore};
use specforge_utils::error::{GateError, SpecforgeError};
use specforge_utils::types::PhaseId;

use crate::types::{ApproveRequest, GATE_DEFINITIONS, GateName, ProjectGate, RejectRequest};

fn required(gate: GateName, field: &str, value: &str) -> Result<String, GateError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(GateError::MissingActor {
            gate: gate.to_string(),
            field: field.to_string(),
        });
    }
    Ok(trimmed.to_string())
}

/// Defines and enforces the four approval checkpoints.
///
/// Requests are validated before persistence is touched, so an invalid gate
/// name or a missing reason never reaches the store.
#[derive(Clone)]
pub struct ApprovalGateService {
    store: Arc<dyn ProjectStore>,
}

impl std::fmt::Debug for ApprovalGateService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalGateService").finish_non_exhaustive()
    }
}

impl ApprovalGateService {
    pub fn new(store: Arc<dyn ProjectStore>) -> Self {
        Self { store }
    }

    /// Create any missing gates as `pending`. Existing gates are untouched,
    /// so running this again is a no-op.
    pub async fn initialize_gates_for_project(
        &self,
        project_id: &str,
    ) -> Result<Vec<ProjectGate>, SpecforgeError> {
        self.store.get_project(project_id).await?;

        let existing: BTreeSet<String> = self
            .store
            .list_gates(project_id)
            .await?
            .into_iter()
            .map(|g| g.name)
            .collect();

        let mut created = 0usize;
        for definition in &GATE_DEFINITIONS {
            let name = definition.name.as_str();
            if !existing.contains(name) {
                self.store
                    .put_gate(project_id, GateRecord::pending(name))
                    .await?;
                created += 1;
            }
        }

        if created > 0 {
            info!(project_id, created, "Initialized approval gates");
        } else {
            debug!(project_id, "Approval gates already initialized");
        }
        self.get_project_gates(project_id).await
    }

    /// Approve a pending or rejected gate.
    ///
    /// A rejected gate may be approved after remediation. An approved gate
    /// stays as recorded; approving it again is
    /// [`GateError::AlreadyApproved`] and changes nothing.
    pub async fn approve_gate(
        &self,
        request: &ApproveRequest,
    ) -> Result<ProjectGate, SpecforgeError> {
        let gate: GateName = request.gate_name.parse()?;
        let approved_by = required(gate, "approvedBy", &request.approved_by)?;

        let project_id = request.project_id.as_str();
        self.store.get_project(project_id).await?;

        let mut record = self
            .store
            .get_gate(project_id, gate.as_str())
            .await?
            .unwrap_or_else(|| GateRecord::pending(gate.as_str()));
        if record.status == GateStatus::Approved {
            debug!(project_id, gate = %gate, "Gate already approved");
            return Err(GateError::AlreadyApproved {
                gate: gate.to_string(),
            }
            .into());
        }
        record.status = GateStatus::Approved;
        record.approved_by = Some(approved_by);
        record.notes = request.notes.clone();
        record.constitutional_score = request.constitutional_score;
        record.rejection_reason = None;
        record.rejected_by = None;
        record.updated_at = Utc::now();

        self.store.put_gate(project_id, record.clone()).await?;
        info!(project_id, gate = %gate, approved_by = ?record.approved_by, "Gate approved");
        Ok(ProjectGate::from_record(*gate.definition(), Some(record)))
    }

    /// Reject a gate. A non-blank reason is required and an approved gate
    /// cannot be rejected.
    pub async fn reject_gate(&self, request: &RejectRequest) -> Result<ProjectGate, SpecforgeError> {
        let gate: GateName = request.gate_name.parse()?;
        let reason = request
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| GateError::MissingReason {
                gate: gate.to_string(),
            })?
            .to_string();
        let rejected_by = required(gate, "rejectedBy", &request.rejected_by)?;

        let project_id = request.project_id.as_str();
        self.store.get_project(project_id).await?;

        let mut record = self
            .store
            .get_gate(project_id, gate.as_str())
            .await?
            .unwrap_or_else(|| GateRecord::pending(gate.as_str()));
        if record.status == GateStatus::Approved {
            return Err(GateError::AlreadyApproved {
                gate: gate.to_string(),
            }
            .into());
        }
        record.status = GateStatus::Rejected;
        record.rejection_reason = Some(reason);
        record.rejected_by = Some(rejected_by);
        record.updated_at = Utc::now();

        self.store.put_gate(project_id, record.clone()).await?;
        info!(project_id, gate = %gate, "Gate rejected");
        Ok(ProjectGate::from_record(*gate.definition(), Some(record)))
    }

    /// All four gates in table order. Gates never initialized show as pending.
    pub async fn get_project_gates(
        &self,
        project_id: &str,
    ) -> Result<Vec<ProjectGate>, SpecforgeError> {
        let mut records = self.store.list_gates(project_id).await?;
        Ok(GATE_DEFINITIONS
            .iter()
            .map(|definition| {
                let record = records
                    .iter()
                    .position(|r| r.name == definition.name.as_str())
                    .map(|i| records.swap_remove(i));
                ProjectGate::from_record(*definition, record)
            })
            .collect())
    }

    /// First blocking gate of `phase` that is not approved, if any.
    pub async fn blocking_gate(
        &self,
        project_id: &str,
        phase: PhaseId,
    ) -> Result<Option<ProjectGate>, SpecforgeError> {
        Ok(self
            .get_project_gates(project_id)
            .await?
            .into_iter()
            .find(|g| {
                g.definition.blocking && g.definition.phase.phase() == phase && !g.is_approved()
            }))
    }

    /// Delete the runtime state of `gates`. Returns how many rows existed.
    pub async fn reset_gates(
        &self,
        project_id: &str,
        gates: &[GateName],
    ) -> Result<usize, SpecforgeError> {
        let names: Vec<&str> = gates.iter().map(|g| g.as_str()).collect();
        let removed = self.store.delete_gates(project_id, &names).await?;
        if removed > 0 {
            debug!(project_id, removed, "Reset approval gates");
        }
        Ok(removed)
    }
}
