use async_trait::async_trait;
use proptest::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use specforge_llm::{Completion, CompletionRequest, LlmError, TextGenerator};
use specforge_rootcause::{AnalysisInput, AnalysisSource, ErrorType, RootCauseAnalyzer};
use specforge_utils::types::{HistoryStatus, PhaseHistoryEntry, PhaseStep};

struct ScriptedGenerator {
    reply: Result<String, LlmError>,
    delay: Duration,
    calls: AtomicU32,
}

impl ScriptedGenerator {
    fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
        })
    }

    fn failing(error: LlmError) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(error),
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate_completion(&self, _request: CompletionRequest) -> Result<Completion, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.reply
            .clone()
            .map(|content| Completion::new(content, "scripted-model"))
    }
}

fn errors(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

fn completed(phase: PhaseStep, artifacts: &[&str]) -> PhaseHistoryEntry {
    PhaseHistoryEntry {
        phase,
        status: HistoryStatus::Completed,
        artifacts: artifacts.iter().map(ToString::to_string).collect(),
        timestamp: None,
    }
}

const LLM_REPLY: &str = r#"```json
{"errorType":"content_quality","originatingPhase":"SPEC_PM","confidence":0.8,
 "explanation":"PRD personas are thin","remediationHint":"Expand persona goals"}
```"#;

#[tokio::test]
async fn parse_failure_is_high_confidence_parsing() {
    let analyzer = RootCauseAnalyzer::default();
    let result = analyzer
        .analyze(&errors(&["Parse failed: unexpected token } in JSON at position 42"]), &[])
        .await;
    assert_eq!(result.error_type, ErrorType::Parsing);
    assert!(result.confidence > 0.9);
    assert_eq!(result.originating_phase, PhaseStep::Validate);
    assert_eq!(result.source, AnalysisSource::Pattern);
}

#[tokio::test]
async fn missing_required_file() {
    let analyzer = RootCauseAnalyzer::default();
    let result = analyzer
        .analyze(&errors(&["Required file PRD.md is missing from output"]), &[])
        .await;
    assert_eq!(result.error_type, ErrorType::MissingFile);
}

#[tokio::test]
async fn empty_errors_are_unknown() {
    let generator = ScriptedGenerator::replying(LLM_REPLY);
    let analyzer = RootCauseAnalyzer::new(Some(generator.clone()));
    let result = analyzer.analyze(&[], &[]).await;
    assert_eq!(result.error_type, ErrorType::Unknown);
    assert!(result.confidence < 0.5);
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn corroborating_errors_raise_confidence() {
    let analyzer = RootCauseAnalyzer::default();
    let one = analyzer.analyze(&errors(&["Syntax error in api-spec.json"]), &[]).await;
    let two = analyzer
        .analyze(
            &errors(&["Syntax error in api-spec.json", "Unexpected token < in JSON at position 0"]),
            &[],
        )
        .await;
    assert!(two.confidence > one.confidence);
    assert!(two.explanation.contains("across 2 errors"));
}

#[tokio::test]
async fn analysis_is_deterministic() {
    let analyzer = RootCauseAnalyzer::default();
    let history = vec![completed(PhaseStep::SpecPm, &["PRD.md"])];
    let input = errors(&["PRD.md section 'Goals' is too short", "Placeholder text in PRD.md"]);
    let first = serde_json::to_string(&analyzer.analyze(&input, &history).await).unwrap();
    let second = serde_json::to_string(&analyzer.analyze(&input, &history).await).unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn originating_phase_from_history() {
    let analyzer = RootCauseAnalyzer::default();
    let history = vec![
        completed(PhaseStep::StackSelection, &["stack.json"]),
        completed(PhaseStep::SpecPm, &[]),
    ];
    let result = analyzer
        .analyze(&errors(&["stack.json references unknown dependency"]), &history)
        .await;
    assert_eq!(result.originating_phase, PhaseStep::StackSelection);
    assert!(result.explanation.contains("STACK_SELECTION"));
}

#[tokio::test]
async fn architect_hint_names_both_artifacts() {
    let analyzer = RootCauseAnalyzer::default();
    let history = vec![completed(
        PhaseStep::SpecArchitect,
        &["specs/acme/api-spec.json", "specs/acme/data-model.md"],
    )];
    let result = analyzer
        .analyze(&errors(&["api-spec.json: unexpected token at line 12"]), &history)
        .await;
    assert_eq!(result.originating_phase, PhaseStep::SpecArchitect);
    assert!(result.remediation_hint.contains("api-spec.json"));
    assert!(result.remediation_hint.contains("data-model"));
}

#[tokio::test]
async fn high_confidence_skips_llm() {
    let generator = ScriptedGenerator::replying(LLM_REPLY);
    let analyzer = RootCauseAnalyzer::new(Some(generator.clone()));
    let result = analyzer.analyze(&errors(&["Invalid JSON in stack.json"]), &[]).await;
    assert_eq!(result.error_type, ErrorType::Parsing);
    assert_eq!(result.source, AnalysisSource::Pattern);
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn low_confidence_uses_llm_answer() {
    let generator = ScriptedGenerator::replying(LLM_REPLY);
    let analyzer = RootCauseAnalyzer::new(Some(generator.clone()));
    assert!(analyzer.is_llm_available());

    let result = analyzer.analyze(&errors(&["Personas section too short"]), &[]).await;
    assert_eq!(generator.calls(), 1);
    assert_eq!(result.source, AnalysisSource::Llm);
    assert_eq!(result.originating_phase, PhaseStep::SpecPm);
    assert_eq!(result.explanation, "PRD personas are thin");
}

#[tokio::test]
async fn llm_failure_falls_back_to_patterns() {
    let generator = ScriptedGenerator::failing(LlmError::ProviderOutage("503".to_string()));
    let analyzer = RootCauseAnalyzer::new(Some(generator.clone()));
    let result = analyzer.analyze(&errors(&["Section too short"]), &[]).await;
    assert_eq!(generator.calls(), 1);
    assert_eq!(result.error_type, ErrorType::ContentQuality);
    assert_eq!(result.source, AnalysisSource::Pattern);
}

#[tokio::test]
async fn non_json_reply_falls_back_to_patterns() {
    let generator = ScriptedGenerator::replying("I think the PRD is probably fine?");
    let analyzer = RootCauseAnalyzer::new(Some(generator));
    let result = analyzer.analyze(&errors(&["mysterious failure"]), &[]).await;
    assert_eq!(result.error_type, ErrorType::Unknown);
    assert_eq!(result.source, AnalysisSource::Pattern);
}

#[tokio::test]
async fn slow_llm_is_timeout_bounded() {
    let generator = Arc::new(ScriptedGenerator {
        reply: Ok(LLM_REPLY.to_string()),
        delay: Duration::from_secs(5),
        calls: AtomicU32::new(0),
    });
    let analyzer =
        RootCauseAnalyzer::new(Some(generator)).with_llm_timeout(Duration::from_millis(20));
    let result = analyzer.analyze(&errors(&["Section too short"]), &[]).await;
    assert_eq!(result.source, AnalysisSource::Pattern);
}

#[tokio::test]
async fn batch_analyze_maps_inputs() {
    let analyzer = RootCauseAnalyzer::default();
    assert!(analyzer.batch_analyze(&[]).await.is_empty());

    let inputs = vec![
        AnalysisInput {
            errors: errors(&["Invalid JSON"]),
            history: Vec::new(),
        },
        AnalysisInput {
            errors: errors(&["ENOENT: stack.json"]),
            history: Vec::new(),
        },
    ];
    let results = analyzer.batch_analyze(&inputs).await;
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].error_type, ErrorType::Parsing);
    assert_eq!(results[1].error_type, ErrorType::MissingFile);
}

proptest! {
    #[test]
    fn prop_pattern_analysis_is_deterministic(msgs in proptest::collection::vec(".{0,60}", 0..4)) {
        let analyzer = RootCauseAnalyzer::default();
        let a = analyzer.analyze_patterns(&msgs, &[]);
        let b = analyzer.analyze_patterns(&msgs, &[]);
        prop_assert_eq!(&a, &b);
        prop_assert!((0.0..=1.0).contains(&a.confidence));
    }
}
