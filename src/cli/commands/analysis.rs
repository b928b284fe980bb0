//! Failure analysis commands: `classify`, `analyze`, `remediate`

use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use specforge_classifier::{
    FailureClassification, RemediationStrategy, classify_failure, get_remediation_strategy,
};
use specforge_orchestrator::{OperationResult, OrchestratorHandle};
use specforge_rootcause::RootCauseAnalysis;
use specforge_utils::error::SpecforgeError;
use specforge_utils::types::PhaseHistoryEntry;

use super::{emit, emit_input_error, invalid_argument};

/// `classify` output: the classification and the strategy it implies.
#[derive(Debug, Serialize)]
struct ClassifyOutput {
    classification: FailureClassification,
    strategy: RemediationStrategy,
}

fn print_strategy(strategy: &RemediationStrategy) {
    match (&strategy.agent_to_rerun, strategy.phase) {
        (Some(agent), Some(phase)) => println!("  Re-run: {agent} on {phase}"),
        (Some(agent), None) => println!("  Re-run: {agent}"),
        _ => println!("  Re-run: none"),
    }
    if strategy.requires_manual_review {
        println!("  Manual review required");
    }
    if let Some(instructions) = &strategy.additional_instructions {
        println!("  Instructions: {instructions}");
    }
    println!("  Reason: {}", strategy.reason);
}

fn print_analysis(analysis: &RootCauseAnalysis) {
    println!(
        "Root cause: {} in {} (confidence {:.2})",
        analysis.error_type, analysis.originating_phase, analysis.confidence
    );
    println!("  {}", analysis.explanation);
    println!("  Hint: {}", analysis.remediation_hint);
}

pub(crate) fn execute_classify_command(phase: &str, message: &str, json: bool) -> Result<()> {
    let classification = classify_failure(phase, message);
    let strategy = get_remediation_strategy(classification.failure_type, phase);
    let result = OperationResult::ok(ClassifyOutput {
        classification,
        strategy,
    });

    emit(result, json, |out| {
        println!(
            "Classification: {} (confidence {:.2})",
            out.classification.failure_type, out.classification.confidence
        );
        println!("  {}", out.classification.reason);
        print_strategy(&out.strategy);
    })
}

/// Read a JSON array of phase history entries.
pub(crate) fn load_history(path: &Path) -> Result<Vec<PhaseHistoryEntry>, SpecforgeError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| invalid_argument("history", format!("cannot read {}: {e}", path.display())))?;
    serde_json::from_str(&raw)
        .map_err(|e| invalid_argument("history", format!("{} is not a history array: {e}", path.display())))
}

pub(crate) async fn execute_analyze_command(
    handle: &OrchestratorHandle,
    errors: &[String],
    history: Option<&Path>,
    json: bool,
) -> Result<()> {
    let history = match history.map(load_history).transpose() {
        Ok(history) => history.unwrap_or_default(),
        Err(err) => return emit_input_error(err, json),
    };

    let result = handle.analyze_failure(errors, &history).await;
    emit(result, json, print_analysis)
}

pub(crate) async fn execute_remediate_command(
    handle: &OrchestratorHandle,
    project_id: &str,
    failed_phase: &str,
    errors: &[String],
    json: bool,
) -> Result<()> {
    let result = handle.plan_remediation(project_id, failed_phase, errors).await;
    emit(result, json, |plan| {
        println!(
            "Classification: {} (confidence {:.2})",
            plan.classification.failure_type, plan.classification.confidence
        );
        print_strategy(&plan.strategy);
        print_analysis(&plan.analysis);
    })
}
