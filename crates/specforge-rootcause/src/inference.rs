//! Originating-phase inference and remediation hints

use specforge_utils::types::{HistoryStatus, PhaseHistoryEntry, PhaseStep};

use crate::patterns::ErrorType;

/// Step reported when history gives no better answer.
pub const DEFAULT_ORIGIN: PhaseStep = PhaseStep::Validate;

/// Artifact names each step typically produces, matched case-insensitively
/// as substrings of error messages.
const TYPICAL_ARTIFACTS: &[(PhaseStep, &[&str])] = &[
    (
        PhaseStep::Analysis,
        &["project-classification.json", "analysis.md", "clarifications"],
    ),
    (
        PhaseStep::StackSelection,
        &["stack.json", "stack-decision", "stack-rationale.md"],
    ),
    (PhaseStep::SpecPm, &["prd.md", "personas.json", "user-stories"]),
    (
        PhaseStep::SpecArchitect,
        &["api-spec.json", "data-model", "architecture.md"],
    ),
    (
        PhaseStep::SpecDesign,
        &["design-tokens", "design-system", "component-mapping"],
    ),
    (
        PhaseStep::Dependencies,
        &["dependencies.json", "dependency-proposal"],
    ),
    (
        PhaseStep::Solutioning,
        &["epics.md", "stories.md", "tasks.md", "sprint-plan"],
    ),
    (PhaseStep::Validate, &["validation-report"]),
    (PhaseStep::Done, &["handoff.md"]),
];

/// Typical artifact names for `step`. `SPEC` covers its three sub-steps.
fn typical_artifacts(step: PhaseStep) -> impl Iterator<Item = &'static str> {
    TYPICAL_ARTIFACTS
        .iter()
        .filter(move |(s, _)| {
            *s == step || (step == PhaseStep::Spec && s.phase() == step.phase())
        })
        .flat_map(|(_, names)| names.iter().copied())
}

fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Infer which step produced the failing output.
///
/// Walks completed history newest first and returns the first step whose
/// recorded or typical artifact names appear in `haystack` (lowercased error
/// text). A match on a whole `SPEC` entry is narrowed to the sub-step whose
/// artifact is mentioned first. Falls back to [`DEFAULT_ORIGIN`].
#[must_use]
pub fn infer_origin(haystack: &str, history: &[PhaseHistoryEntry]) -> PhaseStep {
    history
        .iter()
        .rev()
        .filter(|entry| entry.status == HistoryStatus::Completed)
        .find(|entry| {
            let recorded = entry
                .artifacts
                .iter()
                .map(|a| file_name(a).to_ascii_lowercase());
            let typical = typical_artifacts(entry.phase).map(str::to_string);
            recorded
                .chain(typical)
                .any(|name| !name.is_empty() && haystack.contains(&name))
        })
        .map_or(DEFAULT_ORIGIN, |entry| narrow_step(entry, haystack))
}

/// The `SPEC` sub-step whose artifact appears earliest in `haystack`, or the
/// entry's own step when it is not `SPEC` or nothing narrower matches.
fn narrow_step(entry: &PhaseHistoryEntry, haystack: &str) -> PhaseStep {
    if entry.phase != PhaseStep::Spec {
        return entry.phase;
    }
    let recorded: Vec<String> = entry
        .artifacts
        .iter()
        .map(|a| file_name(a).to_ascii_lowercase())
        .collect();

    TYPICAL_ARTIFACTS
        .iter()
        .filter(|(step, _)| *step != PhaseStep::Spec && step.phase() == entry.phase.phase())
        .filter_map(|(step, names)| {
            names
                .iter()
                .filter_map(|name| {
                    let in_errors = haystack.find(name);
                    // A recorded artifact carrying a sub-step's typical name counts at its own position.
                    let via_recorded = recorded
                        .iter()
                        .filter(|r| r.contains(name))
                        .filter_map(|r| haystack.find(r.as_str()))
                        .min();
                    in_errors.into_iter().chain(via_recorded).min()
                })
                .min()
                .map(|position| (position, *step))
        })
        .min_by_key(|(position, _)| *position)
        .map_or(entry.phase, |(_, step)| step)
}

/// Build the remediation hint for an error kind traced to `origin`.
///
/// `haystack` is the lowercased error text plus any artifact names recorded
/// for the origin step.
#[must_use]
pub fn remediation_hint(error_type: ErrorType, origin: PhaseStep, haystack: &str) -> String {
    let step = origin.as_str();
    let mut hint = match error_type {
        ErrorType::Parsing => format!(
            "Check the syntax and format of the {step} output and regenerate it as valid, parseable content."
        ),
        ErrorType::MissingFile => {
            format!("Regenerate the missing artifact by re-running the {step} step.")
        }
        ErrorType::ContentQuality => format!(
            "Add detail and completeness to the {step} artifacts; replace placeholders with concrete content."
        ),
        ErrorType::Constitutional => format!(
            "Review the {step} artifacts for constitutional compliance before re-running."
        ),
        ErrorType::Unknown => {
            "Review the validation output manually; no known failure pattern matched.".to_string()
        }
    };

    if origin == PhaseStep::SpecArchitect
        && haystack.contains("api-spec.json")
        && haystack.contains("data-model")
    {
        hint.push_str(
            " Reconcile api-spec.json with data-model so every entity an endpoint uses is defined.",
        );
    } else {
        let referenced: Vec<&str> = typical_artifacts(origin)
            .filter(|name| haystack.contains(name))
            .collect();
        if !referenced.is_empty() {
            hint.push_str(&format!(" Focus on: {}.", referenced.join(", ")));
        }
    }

    hint
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(phase: PhaseStep, artifacts: &[&str]) -> PhaseHistoryEntry {
        PhaseHistoryEntry {
            phase,
            status: HistoryStatus::Completed,
            artifacts: artifacts.iter().map(ToString::to_string).collect(),
            timestamp: None,
        }
    }

    #[test]
    fn test_empty_history_defaults_to_validate() {
        assert_eq!(infer_origin("prd.md is missing", &[]), PhaseStep::Validate);
    }

    #[test]
    fn test_recorded_artifact_locates_phase() {
        let history = vec![
            entry(PhaseStep::StackSelection, &["stack.json"]),
            entry(PhaseStep::SpecPm, &[]),
        ];
        assert_eq!(
            infer_origin("stack.json references unknown dependency", &history),
            PhaseStep::StackSelection
        );
    }

    #[test]
    fn test_typical_names_used_without_recorded_artifacts() {
        let history = vec![entry(PhaseStep::Analysis, &[]), entry(PhaseStep::SpecArchitect, &[])];
        assert_eq!(
            infer_origin("api-spec.json: unexpected token", &history),
            PhaseStep::SpecArchitect
        );
    }

    #[test]
    fn test_newest_matching_entry_wins() {
        let history = vec![
            entry(PhaseStep::SpecPm, &["specs/acme/shared.md"]),
            entry(PhaseStep::Solutioning, &["specs/acme/shared.md"]),
        ];
        assert_eq!(infer_origin("shared.md is too short", &history), PhaseStep::Solutioning);
    }

    #[test]
    fn test_rolled_back_entries_are_skipped() {
        let mut rolled = entry(PhaseStep::StackSelection, &["stack.json"]);
        rolled.status = HistoryStatus::RolledBack;
        assert_eq!(infer_origin("stack.json is invalid", &[rolled]), PhaseStep::Validate);
    }

    #[test]
    fn test_spec_entry_narrows_to_sub_step() {
        let history = vec![entry(PhaseStep::Analysis, &[]), entry(PhaseStep::Spec, &[])];
        assert_eq!(infer_origin("design-tokens missing", &history), PhaseStep::SpecDesign);
        assert_eq!(
            infer_origin(
                "api-spec.json references entity order missing from data-model",
                &history
            ),
            PhaseStep::SpecArchitect
        );
        assert_eq!(infer_origin("prd.md has no personas section", &history), PhaseStep::SpecPm);
    }

    #[test]
    fn test_spec_sub_step_mentioned_first_wins() {
        let history = vec![entry(PhaseStep::Spec, &[])];
        assert_eq!(
            infer_origin("personas.json disagrees with api-spec.json", &history),
            PhaseStep::SpecPm
        );
    }

    #[test]
    fn test_spec_entry_with_recorded_sub_step_artifact() {
        let history = vec![entry(PhaseStep::Spec, &["specs/acme/acme-api-spec.json"])];
        assert_eq!(
            infer_origin("acme-api-spec.json: unexpected token", &history),
            PhaseStep::SpecArchitect
        );
    }

    #[test]
    fn test_spec_entry_without_sub_step_match_stays_spec() {
        let history = vec![entry(PhaseStep::Spec, &["spec.md"])];
        assert_eq!(infer_origin("spec.md is too short", &history), PhaseStep::Spec);
    }

    #[test]
    fn test_no_match_defaults_to_validate() {
        let history = vec![entry(PhaseStep::SpecPm, &["PRD.md"])];
        assert_eq!(infer_origin("something odd happened", &history), PhaseStep::Validate);
    }

    #[test]
    fn test_architect_hint_names_both_files() {
        let hint = remediation_hint(
            ErrorType::Parsing,
            PhaseStep::SpecArchitect,
            "api-spec.json references entity absent from data-model.json",
        );
        assert!(hint.contains("api-spec.json"));
        assert!(hint.contains("data-model"));
    }

    #[test]
    fn test_hint_per_error_type() {
        let hint = remediation_hint(ErrorType::MissingFile, PhaseStep::SpecPm, "prd.md missing");
        assert!(hint.starts_with("Regenerate the missing artifact"));
        assert!(hint.contains("Focus on: prd.md."));

        let hint = remediation_hint(ErrorType::Constitutional, PhaseStep::Validate, "");
        assert!(hint.contains("constitutional compliance"));
    }
}
