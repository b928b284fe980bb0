//! Gate commands: `gates`, `approve`, `reject`

use anyhow::Result;

use specforge_gate::{ApproveRequest, ProjectGate, RejectRequest};
use specforge_orchestrator::OrchestratorHandle;

use super::emit;

fn print_gate(gate: &ProjectGate) {
    let blocking = if gate.definition.blocking { "blocking" } else { "advisory" };
    println!(
        "  {:<22} {:<9} {:<9} {}",
        gate.definition.name.as_str(),
        gate.status.as_str(),
        blocking,
        gate.definition.stakeholder_role
    );
    if let Some(by) = gate.approved_by.as_deref().or(gate.rejected_by.as_deref()) {
        println!("      by {by}");
    }
    if let Some(reason) = &gate.rejection_reason {
        println!("      reason: {reason}");
    }
    if let Some(notes) = &gate.notes {
        println!("      notes: {notes}");
    }
}

pub(crate) async fn execute_gates_command(
    handle: &OrchestratorHandle,
    project_id: &str,
    json: bool,
) -> Result<()> {
    let result = handle.get_project_gates(project_id).await;
    emit(result, json, |gates| {
        println!("Gates for {project_id}:");
        for gate in gates {
            print_gate(gate);
        }
    })
}

pub(crate) async fn execute_approve_command(
    handle: &OrchestratorHandle,
    request: ApproveRequest,
    json: bool,
) -> Result<()> {
    let result = handle.approve_gate(&request).await;
    emit(result, json, |gate| {
        println!("✓ Approved {}", gate.definition.name);
        print_gate(gate);
    })
}

pub(crate) async fn execute_reject_command(
    handle: &OrchestratorHandle,
    request: RejectRequest,
    json: bool,
) -> Result<()> {
    let result = handle.reject_gate(&request).await;
    emit(result, json, |gate| {
        println!("✗ Rejected {}", gate.definition.name);
        print_gate(gate);
    })
}
