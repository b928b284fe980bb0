//! Phase commands: `advance`, `record`, `rollback`, `preview`

use anyhow::Result;
use serde_json::Value;
use std::path::Path;

use specforge_orchestrator::{AdvanceRequest, OrchestratorHandle};
use specforge_utils::error::SpecforgeError;

use super::{emit, emit_input_error, invalid_argument, split_pair};

/// Build an advance request from `NAME=PATH` artifacts and `KEY=VALUE` metadata.
///
/// Metadata values are parsed as JSON when they parse, so `--metadata
/// clarification_complete=true` stores a boolean.
pub(crate) fn build_advance_request(
    project_id: &str,
    artifacts: &[String],
    metadata: &[String],
    agent: Option<&str>,
    duration_ms: u64,
) -> Result<AdvanceRequest, SpecforgeError> {
    let mut request = AdvanceRequest::new(project_id);
    request.agent = agent.map(str::to_string);
    request.duration_ms = duration_ms;

    for raw in artifacts {
        let (name, path) = split_pair("artifact", raw)?;
        let content = std::fs::read_to_string(Path::new(path))
            .map_err(|e| invalid_argument("artifact", format!("cannot read {path}: {e}")))?;
        request.artifacts.insert(name.to_string(), content);
    }

    for raw in metadata {
        let (key, value) = split_pair("metadata", raw)?;
        let value = serde_json::from_str::<Value>(value)
            .unwrap_or_else(|_| Value::String(value.to_string()));
        request.metadata.insert(key.to_string(), value);
    }

    Ok(request)
}

pub(crate) async fn execute_advance_command(
    handle: &OrchestratorHandle,
    request: Result<AdvanceRequest, SpecforgeError>,
    json: bool,
) -> Result<()> {
    let request = match request {
        Ok(request) => request,
        Err(err) => return emit_input_error(err, json),
    };

    let result = handle.advance_phase(&request).await;
    emit(result, json, |outcome| {
        println!(
            "✓ {} → {} (snapshot {})",
            outcome.from, outcome.to, outcome.snapshot_id
        );
        if let Some(hash) = &outcome.git_commit_hash {
            println!("  Committed {hash}");
        }
    })
}

pub(crate) async fn execute_record_command(
    handle: &OrchestratorHandle,
    project_id: &str,
    phase: &str,
    json: bool,
) -> Result<()> {
    let result = handle.record_phase_completion(project_id, phase).await;
    emit(result, json, |snapshot| {
        println!(
            "✓ Recorded {} snapshot {} with {} artifact(s)",
            snapshot.phase,
            snapshot.id,
            snapshot.artifacts.len()
        );
    })
}

pub(crate) async fn execute_rollback_command(
    handle: &OrchestratorHandle,
    project_id: &str,
    phase: &str,
    json: bool,
) -> Result<()> {
    let result = handle.rollback_to_phase(project_id, phase).await;
    emit(result, json, |rollback| {
        let snapshot = rollback.snapshot_id.as_deref().unwrap_or("-");
        println!("✓ Rolled {project_id} back to {phase} from snapshot {snapshot}");
        for name in &rollback.restored_artifacts {
            println!("  restored {name}");
        }
        if let Some(hash) = &rollback.git_commit_hash {
            println!("  Spec branch reset to {hash}");
        }
    })
}

pub(crate) async fn execute_preview_command(
    handle: &OrchestratorHandle,
    project_id: &str,
    phase: &str,
    json: bool,
) -> Result<()> {
    let result = handle.get_rollback_preview(project_id, phase).await;
    emit(result, json, |preview| {
        println!(
            "Rollback of {project_id} to {} would restore snapshot {} (v{})",
            preview.phase, preview.snapshot_id, preview.version
        );
        println!("  Artifacts: {}", preview.artifacts.join(", "));
        let discarded: Vec<&str> = preview.phases_to_discard.iter().map(|p| p.as_str()).collect();
        println!("  Phases to redo: {}", discarded.join(", "));
        if let Some(hash) = &preview.git_commit_hash {
            println!("  Spec branch would reset to {hash}");
        }
    })
}
