//! Failure routing: which agent and step to re-run after validation fails

use tracing::info;

use specforge_classifier::{classify_failure, get_remediation_strategy};
use specforge_rootcause::RootCauseAnalyzer;
use specforge_utils::types::PhaseHistoryEntry;

use crate::types::RemediationPlan;

/// Classify `errors` raised by `failed_phase` and pick a remediation.
///
/// The classifier sees every error at once so the strongest category wins;
/// the analyzer additionally infers the originating step from `history`.
pub async fn plan_remediation(
    analyzer: &RootCauseAnalyzer,
    failed_phase: &str,
    errors: &[String],
    history: &[PhaseHistoryEntry],
) -> RemediationPlan {
    let classification = classify_failure(failed_phase, &errors.join("\n"));
    let strategy = get_remediation_strategy(classification.failure_type, failed_phase);
    let analysis = analyzer.analyze(errors, history).await;

    info!(
        phase = failed_phase,
        failure_type = %classification.failure_type,
        agent = ?strategy.agent_to_rerun,
        manual_review = strategy.requires_manual_review,
        origin = %analysis.originating_phase,
        "Planned remediation"
    );

    RemediationPlan {
        classification,
        strategy,
        analysis,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use specforge_classifier::FailureType;
    use specforge_rootcause::ErrorType;
    use specforge_utils::types::PhaseStep;

    #[tokio::test]
    async fn test_constitutional_failure_needs_review() {
        let analyzer = RootCauseAnalyzer::default();
        let errors = vec!["Constitutional violation: article 3 breached".to_string()];
        let plan = plan_remediation(&analyzer, "VALIDATE", &errors, &[]).await;

        assert_eq!(plan.classification.failure_type, FailureType::ConstitutionalViolation);
        assert!(plan.strategy.requires_manual_review);
        assert_eq!(plan.analysis.error_type, ErrorType::Constitutional);
    }

    #[tokio::test]
    async fn test_unmatched_failure_is_unknown() {
        let analyzer = RootCauseAnalyzer::default();
        let errors = vec!["something odd happened".to_string()];
        let plan = plan_remediation(&analyzer, "SPEC_PM", &errors, &[]).await;

        assert_eq!(plan.classification.failure_type, FailureType::Unknown);
        assert!(plan.strategy.requires_manual_review);
        assert_eq!(plan.analysis.originating_phase, PhaseStep::Validate);
    }
}
