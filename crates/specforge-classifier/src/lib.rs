//! Failure classification for validation errors
//!
//! [`classify_failure`] maps a validation error message onto one of the
//! [`FailureType`] categories using an ordered table of case-insensitive
//! patterns; [`get_remediation_strategy`] turns a category into the agent and
//! step to re-run. Both are pure functions.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use specforge_utils::types::PhaseStep;

/// Confidence reported for input that matches no category
pub const UNKNOWN_CONFIDENCE: f64 = 0.3;

/// Validation failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureType {
    MissingRequirementMapping,
    PersonaMismatch,
    ApiDataModelGap,
    StructuralInconsistency,
    FormatValidationError,
    ConstitutionalViolation,
    Unknown,
}

impl FailureType {
    pub const ALL: [FailureType; 7] = [
        FailureType::MissingRequirementMapping,
        FailureType::PersonaMismatch,
        FailureType::ApiDataModelGap,
        FailureType::StructuralInconsistency,
        FailureType::FormatValidationError,
        FailureType::ConstitutionalViolation,
        FailureType::Unknown,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingRequirementMapping => "missing_requirement_mapping",
            Self::PersonaMismatch => "persona_mismatch",
            Self::ApiDataModelGap => "api_data_model_gap",
            Self::StructuralInconsistency => "structural_inconsistency",
            Self::FormatValidationError => "format_validation_error",
            Self::ConstitutionalViolation => "constitutional_violation",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| format!("unknown failure type '{s}'"))
    }
}

/// Result of [`classify_failure`]. Derived per validation run, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureClassification {
    #[serde(rename = "type")]
    pub failure_type: FailureType,
    pub confidence: f64,
    pub reason: String,
}

/// Which agent to re-run, on which step, with what guidance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemediationStrategy {
    /// `None` when a human must review
    pub agent_to_rerun: Option<String>,
    pub phase: Option<PhaseStep>,
    pub additional_instructions: Option<String>,
    pub requires_manual_review: bool,
    pub reason: String,
}

struct CategoryPatterns {
    failure_type: FailureType,
    confidence: f64,
    patterns: Vec<Regex>,
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| Regex::new(&format!("(?i){p}")).ok())
        .collect()
}

/// Evaluated top to bottom; the first category with a matching pattern wins.
static CATEGORY_TABLE: LazyLock<Vec<CategoryPatterns>> = LazyLock::new(|| {
    vec![
        CategoryPatterns {
            failure_type: FailureType::ConstitutionalViolation,
            confidence: 0.98,
            patterns: compile(&[
                r"constitution(al)?\s+(article|violation|principle|requirement)",
                r"violat(es|ed|ion of)\s+article\s+[ivx\d]+",
                r"article\s+[ivx]+\b.*\bviolat",
                r"\banti-?pattern\b",
            ]),
        },
        CategoryPatterns {
            failure_type: FailureType::MissingRequirementMapping,
            confidence: 0.90,
            patterns: compile(&[
                r"missing\s+requirement\s+mapping",
                r"unmapped\s+requirements?",
                r"requirements?\s+\S+\s+(is\s+)?not\s+(mapped|covered|traced)",
                r"no\s+(story|stories|epic|task)\s+(maps|mapped|covers)\s+(to\s+)?requirement",
                r"requirements?\s+without\s+(stories|coverage|mapping)",
                r"\bREQ-\d+\b.*\bnot\s+(covered|mapped)",
            ]),
        },
        CategoryPatterns {
            failure_type: FailureType::PersonaMismatch,
            confidence: 0.85,
            patterns: compile(&[
                r"persona\s+mismatch",
                r"unknown\s+persona",
                r"persona\b.*\b(not\s+found|not\s+defined|undefined|inconsistent|mismatch)",
                r"user\s+role\b.*\bnot\s+defined",
            ]),
        },
        CategoryPatterns {
            failure_type: FailureType::ApiDataModelGap,
            confidence: 0.88,
            patterns: compile(&[
                r"endpoint\b.*\b(references?|uses|returns)\b.*\b(undefined|missing|unknown)\s+(entity|model|schema)",
                r"(entity|model|schema)\s+\S+\s+not\s+(found|defined)\s+in\s+(the\s+)?data[\s_-]?model",
                r"missing\s+(entity|schema|model)\s+for\s+endpoint",
                r"api[\s_-]?spec\b.*\bdata[\s_-]?model",
                r"data[\s_-]?model\b.*\bapi[\s_-]?spec",
            ]),
        },
        CategoryPatterns {
            failure_type: FailureType::FormatValidationError,
            confidence: 0.92,
            patterns: compile(&[
                r"invalid\s+(json|yaml|markdown|format)",
                r"json\s+parse",
                r"unexpected\s+token",
                r"schema\s+validation\s+failed",
                r"(missing|required)\s+(field|property)",
                r"\bmalformed\b",
            ]),
        },
        CategoryPatterns {
            failure_type: FailureType::StructuralInconsistency,
            confidence: 0.75,
            patterns: compile(&[
                r"inconsisten(t|cy)",
                r"does\s+not\s+match",
                r"\bmismatch(ed)?\b",
                r"conflict(s|ing)?\s+with",
                r"circular\s+dependenc(y|ies)",
                r"duplicate\s+(id|identifier|key)",
            ]),
        },
    ]
});

/// Classify a validation error raised while checking `phase`.
///
/// Never fails: input matching no category is [`FailureType::Unknown`] with
/// [`UNKNOWN_CONFIDENCE`].
#[must_use]
pub fn classify_failure(phase: &str, error_message: &str) -> FailureClassification {
    for category in CATEGORY_TABLE.iter() {
        if let Some(pattern) = category
            .patterns
            .iter()
            .find(|p| p.is_match(error_message))
        {
            return FailureClassification {
                failure_type: category.failure_type,
                confidence: category.confidence,
                reason: format!(
                    "{phase}: matched {} pattern /{}/",
                    category.failure_type,
                    pattern.as_str().trim_start_matches("(?i)")
                ),
            };
        }
    }

    FailureClassification {
        failure_type: FailureType::Unknown,
        confidence: UNKNOWN_CONFIDENCE,
        reason: format!("{phase}: no known failure pattern matched"),
    }
}

fn rerun(agent: &str, phase: PhaseStep, instructions: &str, reason: &str) -> RemediationStrategy {
    RemediationStrategy {
        agent_to_rerun: Some(agent.to_string()),
        phase: Some(phase),
        additional_instructions: Some(instructions.to_string()),
        requires_manual_review: false,
        reason: reason.to_string(),
    }
}

fn manual_review(reason: &str) -> RemediationStrategy {
    RemediationStrategy {
        agent_to_rerun: None,
        phase: None,
        additional_instructions: None,
        requires_manual_review: true,
        reason: reason.to_string(),
    }
}

/// Map a failure category to the remediation to run.
///
/// `failed_phase` is matched by substring (case-insensitive) where the agent
/// depends on which step failed.
#[must_use]
pub fn get_remediation_strategy(failure_type: FailureType, failed_phase: &str) -> RemediationStrategy {
    let failed = failed_phase.to_ascii_uppercase();

    match failure_type {
        FailureType::MissingRequirementMapping => rerun(
            "pm",
            PhaseStep::SpecPm,
            "Perform a gap analysis: map every requirement to at least one story or \
             acceptance criterion and add the missing mappings.",
            "Requirements are not fully traced into the product spec",
        ),
        FailureType::PersonaMismatch => rerun(
            "pm",
            PhaseStep::SpecPm,
            "Use only the personas defined in the analysis and keep persona names \
             consistent across every artifact.",
            "Personas are inconsistent with the analysis",
        ),
        FailureType::ApiDataModelGap => rerun(
            "architect",
            PhaseStep::SpecArchitect,
            "Reconcile api-spec.json with the data model: every entity referenced by an \
             endpoint must be defined, and every entity should be reachable.",
            "API specification and data model disagree",
        ),
        FailureType::StructuralInconsistency => {
            let instructions = "Resolve the structural inconsistency so the artifact agrees \
                                with its upstream specifications.";
            if failed.contains("DESIGN") {
                rerun(
                    "designer",
                    PhaseStep::SpecDesign,
                    instructions,
                    "Design artifacts are structurally inconsistent",
                )
            } else if failed.contains("ARCHITECT") {
                rerun(
                    "architect",
                    PhaseStep::SpecArchitect,
                    instructions,
                    "Architecture artifacts are structurally inconsistent",
                )
            } else {
                rerun(
                    "pm",
                    PhaseStep::SpecPm,
                    instructions,
                    "Product artifacts are structurally inconsistent",
                )
            }
        }
        FailureType::FormatValidationError => {
            let instructions = "Regenerate the artifact in the required format and make sure \
                                it parses and passes schema validation.";
            let reason = "Artifact failed format validation";
            if failed.contains("PM") {
                rerun("pm", PhaseStep::SpecPm, instructions, reason)
            } else if failed.contains("ARCHITECT") {
                rerun("architect", PhaseStep::SpecArchitect, instructions, reason)
            } else if failed.contains("DESIGN") {
                rerun("designer", PhaseStep::SpecDesign, instructions, reason)
            } else {
                rerun("analyst", PhaseStep::Analysis, instructions, reason)
            }
        }
        FailureType::ConstitutionalViolation => {
            manual_review("Constitutional violations require human review")
        }
        FailureType::Unknown => manual_review("Unclassified failure requires human review"),
    }
}
