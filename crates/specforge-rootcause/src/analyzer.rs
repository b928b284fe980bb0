use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use specforge_config::{Config, DEFAULT_HIGH_CONFIDENCE_THRESHOLD, DEFAULT_LLM_TIMEOUT_SECS};
use specforge_llm::{CompletionRequest, LlmError, Message, TextGenerator, complete_with_timeout};
use specforge_utils::types::{PhaseHistoryEntry, PhaseId, PhaseStep};

use crate::inference::{infer_origin, remediation_hint};
use crate::patterns::{ErrorType, classify_errors};

const EXPLANATION_SNIPPET_CHARS: usize = 200;

/// Where an analysis came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSource {
    Pattern,
    Llm,
}

/// Diagnosis of a validation error set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootCauseAnalysis {
    pub error_type: ErrorType,
    pub originating_phase: PhaseStep,
    pub confidence: f64,
    pub explanation: String,
    pub remediation_hint: String,
    pub source: AnalysisSource,
}

/// One input to [`RootCauseAnalyzer::batch_analyze`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisInput {
    pub errors: Vec<String>,
    #[serde(default)]
    pub history: Vec<PhaseHistoryEntry>,
}

/// Shape the model is asked to answer with.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LlmAnswer {
    #[serde(alias = "error_type")]
    error_type: String,
    #[serde(alias = "originating_phase")]
    originating_phase: String,
    confidence: f64,
    explanation: String,
    #[serde(alias = "remediation_hint")]
    remediation_hint: String,
}

/// Pattern-based root-cause analysis with optional LLM escalation.
///
/// Without a generator the analyzer is fully functional and deterministic.
/// With one, results below the high-confidence threshold are sent to the
/// model once; a usable answer replaces the pattern result, anything else
/// (error, timeout, unparseable reply) is logged and ignored.
pub struct RootCauseAnalyzer {
    generator: Option<Arc<dyn TextGenerator>>,
    high_confidence_threshold: f64,
    llm_timeout: Duration,
}

impl std::fmt::Debug for RootCauseAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootCauseAnalyzer")
            .field("generator", &self.generator.as_ref().map(|g| g.name()))
            .field("high_confidence_threshold", &self.high_confidence_threshold)
            .field("llm_timeout", &self.llm_timeout)
            .finish()
    }
}

impl Default for RootCauseAnalyzer {
    fn default() -> Self {
        Self::new(None)
    }
}

impl RootCauseAnalyzer {
    #[must_use]
    pub fn new(generator: Option<Arc<dyn TextGenerator>>) -> Self {
        Self {
            generator,
            high_confidence_threshold: DEFAULT_HIGH_CONFIDENCE_THRESHOLD,
            llm_timeout: Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS),
        }
    }

    /// Build from configuration, constructing the configured provider if any.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` for an unknown provider or a
    /// missing API key.
    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        let generator = specforge_llm::from_config(&config.llm)?;
        Ok(Self::new(generator)
            .with_threshold(config.analysis.high_confidence_threshold)
            .with_llm_timeout(config.llm.timeout()))
    }

    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.high_confidence_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = timeout;
        self
    }

    #[must_use]
    pub fn is_llm_available(&self) -> bool {
        self.generator.is_some()
    }

    /// Pattern-only analysis. Deterministic for a given input.
    #[must_use]
    pub fn analyze_patterns(
        &self,
        errors: &[String],
        history: &[PhaseHistoryEntry],
    ) -> RootCauseAnalysis {
        let matched = classify_errors(errors);
        let haystack = errors.join("\n").to_ascii_lowercase();
        let origin = if errors.is_empty() {
            crate::inference::DEFAULT_ORIGIN
        } else {
            infer_origin(&haystack, history)
        };

        let mut hint_haystack = haystack;
        // A narrowed SPEC sub-step still owns the artifacts recorded under SPEC.
        let owned = |e: &&PhaseHistoryEntry| {
            e.phase == origin || (e.phase == PhaseStep::Spec && origin.phase() == PhaseId::Spec)
        };
        for entry in history.iter().filter(owned) {
            for artifact in &entry.artifacts {
                hint_haystack.push('\n');
                hint_haystack.push_str(&artifact.to_ascii_lowercase());
            }
        }

        RootCauseAnalysis {
            error_type: matched.error_type,
            originating_phase: origin,
            confidence: matched.confidence,
            explanation: explain(matched.error_type, origin, errors),
            remediation_hint: remediation_hint(matched.error_type, origin, &hint_haystack),
            source: AnalysisSource::Pattern,
        }
    }

    /// Analyze an error set, escalating to the LLM when pattern confidence is
    /// below the threshold and a generator is configured.
    pub async fn analyze(
        &self,
        errors: &[String],
        history: &[PhaseHistoryEntry],
    ) -> RootCauseAnalysis {
        let pattern = self.analyze_patterns(errors, history);
        debug!(
            error_type = %pattern.error_type,
            phase = %pattern.originating_phase,
            confidence = pattern.confidence,
            "Pattern analysis complete"
        );

        if errors.is_empty() || pattern.confidence >= self.high_confidence_threshold {
            return pattern;
        }
        let Some(generator) = self.generator.as_deref() else {
            return pattern;
        };

        match self.escalate(generator, errors, history).await {
            Ok(analysis) => {
                info!(
                    provider = generator.name(),
                    error_type = %analysis.error_type,
                    phase = %analysis.originating_phase,
                    "Using LLM root-cause analysis"
                );
                analysis
            }
            Err(reason) => {
                warn!(provider = generator.name(), %reason, "LLM escalation failed; using pattern analysis");
                pattern
            }
        }
    }

    /// Analyze each input in order. Empty input yields an empty list.
    pub async fn batch_analyze(&self, inputs: &[AnalysisInput]) -> Vec<RootCauseAnalysis> {
        let mut results = Vec::with_capacity(inputs.len());
        for input in inputs {
            results.push(self.analyze(&input.errors, &input.history).await);
        }
        results
    }

    async fn escalate(
        &self,
        generator: &dyn TextGenerator,
        errors: &[String],
        history: &[PhaseHistoryEntry],
    ) -> Result<RootCauseAnalysis, String> {
        let request = build_request(errors, history);
        let completion = complete_with_timeout(generator, request, self.llm_timeout)
            .await
            .map_err(|e| e.to_string())?;
        parse_answer(&completion.content)
    }
}

fn explain(error_type: ErrorType, origin: PhaseStep, errors: &[String]) -> String {
    if errors.is_empty() {
        return "No errors were supplied; nothing to analyze.".to_string();
    }

    let mut explanation = format!(
        "{} originating in {} ({})",
        error_type.label(),
        origin.as_str(),
        origin.display_name()
    );
    if errors.len() > 1 {
        explanation.push_str(&format!(" across {} errors", errors.len()));
    }
    let first: String = errors[0].chars().take(EXPLANATION_SNIPPET_CHARS).collect();
    explanation.push_str(&format!(": {first}"));
    explanation
}

fn build_request(errors: &[String], history: &[PhaseHistoryEntry]) -> CompletionRequest {
    let system = "You diagnose validation failures in a multi-phase software planning \
                  pipeline. Reply with a single JSON object and nothing else, with keys: \
                  errorType (one of parsing, missing_file, content_quality, constitutional, \
                  unknown), originatingPhase (one of ANALYSIS, STACK_SELECTION, SPEC, SPEC_PM, \
                  SPEC_ARCHITECT, SPEC_DESIGN, DEPENDENCIES, SOLUTIONING, VALIDATE, DONE), \
                  confidence (number between 0 and 1), explanation, remediationHint.";

    let mut user = String::from("Validation errors:\n");
    for error in errors {
        user.push_str("- ");
        user.push_str(error);
        user.push('\n');
    }
    user.push_str("\nPhase history (oldest first):\n");
    if history.is_empty() {
        user.push_str("(none)\n");
    }
    for entry in history {
        user.push_str(&format!(
            "- {} [{}]",
            entry.phase,
            serde_json::to_value(entry.status)
                .ok()
                .and_then(|v| v.as_str().map(String::from))
                .unwrap_or_default()
        ));
        if !entry.artifacts.is_empty() {
            user.push_str(&format!(" artifacts: {}", entry.artifacts.join(", ")));
        }
        user.push('\n');
    }

    CompletionRequest::new(vec![Message::system(system), Message::user(user)]).with_temperature(0.0)
}

/// Pull a JSON object out of a model reply, tolerating code fences and prose.
fn extract_json(content: &str) -> Option<&str> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.rsplit_once("```").map(|(body, _)| body.trim()))
        .unwrap_or(trimmed);

    let start = unfenced.find('{')?;
    let end = unfenced.rfind('}')?;
    (start < end).then(|| &unfenced[start..=end])
}

fn parse_answer(content: &str) -> Result<RootCauseAnalysis, String> {
    let json = extract_json(content).ok_or_else(|| "reply contained no JSON object".to_string())?;
    let answer: LlmAnswer =
        serde_json::from_str(json).map_err(|e| format!("reply was not valid analysis JSON: {e}"))?;

    let error_type = answer.error_type.parse::<ErrorType>()?;
    let originating_phase = answer
        .originating_phase
        .parse::<PhaseStep>()
        .map_err(|e| e.to_string())?;
    if !answer.confidence.is_finite() {
        return Err("confidence was not a number".to_string());
    }

    Ok(RootCauseAnalysis {
        error_type,
        originating_phase,
        confidence: answer.confidence.clamp(0.0, 1.0),
        explanation: answer.explanation,
        remediation_hint: answer.remediation_hint,
        source: AnalysisSource::Llm,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_variants() {
        assert_eq!(extract_json(r#"{"a":1}"#), Some(r#"{"a":1}"#));
        assert_eq!(extract_json("```json\n{\"a\":1}\n```"), Some("{\"a\":1}"));
        assert_eq!(extract_json("Here you go: {\"a\":1} hope it helps"), Some("{\"a\":1}"));
        assert_eq!(extract_json("no json here"), None);
    }

    #[test]
    fn test_parse_answer_accepts_snake_case_keys() {
        let reply = r#"{"error_type":"content_quality","originating_phase":"spec-pm",
            "confidence":1.7,"explanation":"thin PRD","remediation_hint":"expand it"}"#;
        let analysis = parse_answer(reply).unwrap();
        assert_eq!(analysis.error_type, ErrorType::ContentQuality);
        assert_eq!(analysis.originating_phase, PhaseStep::SpecPm);
        assert!((analysis.confidence - 1.0).abs() < f64::EPSILON);
        assert_eq!(analysis.source, AnalysisSource::Llm);
    }

    #[test]
    fn test_parse_answer_rejects_unknown_phase() {
        let reply = r#"{"errorType":"parsing","originatingPhase":"LUNCH",
            "confidence":0.5,"explanation":"x","remediationHint":"y"}"#;
        assert!(parse_answer(reply).is_err());
    }

    #[test]
    fn test_explanation_mentions_count() {
        let errors = vec!["Syntax error".to_string(), "Invalid JSON".to_string()];
        let text = explain(ErrorType::Parsing, PhaseStep::SpecArchitect, &errors);
        assert!(text.starts_with("Parsing error originating in SPEC_ARCHITECT"));
        assert!(text.contains("across 2 errors"));

        let single = explain(ErrorType::Parsing, PhaseStep::Validate, &errors[..1]);
        assert!(!single.contains("across"));
    }

    #[test]
    fn test_request_lists_errors_and_history() {
        let history = vec![PhaseHistoryEntry {
            phase: PhaseStep::StackSelection,
            status: specforge_utils::types::HistoryStatus::Completed,
            artifacts: vec!["stack.json".to_string()],
            timestamp: None,
        }];
        let request = build_request(&["boom".to_string()], &history);
        let user = &request.messages[1].content;
        assert!(user.contains("- boom"));
        assert!(user.contains("STACK_SELECTION [completed] artifacts: stack.json"));
    }
}
