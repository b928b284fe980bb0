//! Root-cause analysis for validation failures
//!
//! Classifies an error set into an [`ErrorType`], infers the step that most
//! likely produced the failing output from phase history, and builds an
//! explanation and remediation hint. Low-confidence results can be escalated
//! to an injected [`TextGenerator`](specforge_llm::TextGenerator).

mod analyzer;
pub mod inference;
pub mod patterns;

pub use analyzer::{AnalysisInput, AnalysisSource, RootCauseAnalysis, RootCauseAnalyzer};
pub use patterns::{ErrorType, PatternMatch, classify_errors};
