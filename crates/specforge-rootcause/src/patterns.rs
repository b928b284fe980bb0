//! Error-kind pattern families

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Confidence reported when nothing matched.
pub const UNKNOWN_CONFIDENCE: f64 = 0.2;

/// Added per additional error corroborating the winning family.
pub const CORROBORATION_STEP: f64 = 0.04;

/// Ceiling for pattern-derived confidence.
pub const MAX_PATTERN_CONFIDENCE: f64 = 0.99;

/// Phase-agnostic error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    Parsing,
    MissingFile,
    ContentQuality,
    Constitutional,
    Unknown,
}

impl ErrorType {
    pub const ALL: [ErrorType; 5] = [
        ErrorType::Parsing,
        ErrorType::MissingFile,
        ErrorType::ContentQuality,
        ErrorType::Constitutional,
        ErrorType::Unknown,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Parsing => "parsing",
            Self::MissingFile => "missing_file",
            Self::ContentQuality => "content_quality",
            Self::Constitutional => "constitutional",
            Self::Unknown => "unknown",
        }
    }

    /// Label used at the start of explanations.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Parsing => "Parsing error",
            Self::MissingFile => "Missing file",
            Self::ContentQuality => "Content quality issue",
            Self::Constitutional => "Constitutional violation",
            Self::Unknown => "Unrecognized failure",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| format!("unknown error type '{s}'"))
    }
}

struct Family {
    error_type: ErrorType,
    confidence: f64,
    patterns: Vec<Regex>,
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| Regex::new(&format!("(?i){p}")).ok())
        .collect()
}

/// Each error is assigned to the first family it matches.
static FAMILIES: LazyLock<Vec<Family>> = LazyLock::new(|| {
    vec![
        Family {
            error_type: ErrorType::Parsing,
            confidence: 0.92,
            patterns: compile(&[
                r"parse\s+(error|failed|failure)",
                r"failed\s+to\s+parse",
                r"syntax\s*error",
                r"unexpected\s+token",
                r"unexpected\s+end\s+of\s+(input|file|json)",
                r"invalid\s+json",
                r"json\b.*\bat\s+position\s+\d+",
                r"(cannot|could\s+not)\s+find\s+module",
                r"module\s+not\s+found",
            ]),
        },
        Family {
            error_type: ErrorType::MissingFile,
            confidence: 0.90,
            patterns: compile(&[
                r"file\s+not\s+found",
                r"\benoent\b",
                r"no\s+such\s+file",
                r"required\s+file\b.*\bmissing",
                r"missing\s+(required\s+)?(file|artifact)",
                r"(file|artifact)\s+\S+\s+(does\s+not|doesn't)\s+exist",
            ]),
        },
        Family {
            error_type: ErrorType::ContentQuality,
            confidence: 0.75,
            patterns: compile(&[
                r"too\s+short",
                r"placeholder",
                r"\b(tbd|lorem\s+ipsum)\b",
                r"insufficient\s+(detail|content|depth)",
                r"lacks?\s+(detail|depth|specificity)",
                r"(incomplete|empty)\s+(section|content|artifact)",
            ]),
        },
        Family {
            error_type: ErrorType::Constitutional,
            confidence: 0.95,
            patterns: compile(&[
                r"constitution(al)?\s+(article|violation|principle|requirement)",
                r"\barticle\s+[ivx]+\b",
                r"\banti-?pattern\b",
            ]),
        },
    ]
});

/// Family that `error` belongs to, if any.
#[must_use]
pub fn match_family(error: &str) -> Option<ErrorType> {
    FAMILIES
        .iter()
        .find(|f| f.patterns.iter().any(|p| p.is_match(error)))
        .map(|f| f.error_type)
}

/// Outcome of classifying a whole error set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternMatch {
    pub error_type: ErrorType,
    pub confidence: f64,
    /// How many errors matched the winning family
    pub matched: usize,
}

/// Classify an error set: the family with the most matching errors wins,
/// ties going to the family listed first.
///
/// Confidence is the family's base value plus [`CORROBORATION_STEP`] for each
/// additional matching error, capped at [`MAX_PATTERN_CONFIDENCE`].
#[must_use]
pub fn classify_errors(errors: &[String]) -> PatternMatch {
    let mut counts = vec![0usize; FAMILIES.len()];
    for error in errors {
        if let Some(index) = FAMILIES
            .iter()
            .position(|f| f.patterns.iter().any(|p| p.is_match(error)))
        {
            counts[index] += 1;
        }
    }

    let mut best: Option<(usize, usize)> = None;
    for (index, &count) in counts.iter().enumerate() {
        if count > 0 && best.is_none_or(|(_, c)| count > c) {
            best = Some((index, count));
        }
    }

    match best {
        Some((index, count)) => {
            let family = &FAMILIES[index];
            let raw = family.confidence + CORROBORATION_STEP * (count - 1) as f64;
            PatternMatch {
                error_type: family.error_type,
                confidence: round2(raw.min(MAX_PATTERN_CONFIDENCE)),
                matched: count,
            }
        }
        None => PatternMatch {
            error_type: ErrorType::Unknown,
            confidence: UNKNOWN_CONFIDENCE,
            matched: 0,
        },
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn errs(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_all_patterns_compile() {
        let expected = [9, 6, 6, 3];
        for (family, count) in FAMILIES.iter().zip(expected) {
            assert_eq!(family.patterns.len(), count, "{}", family.error_type);
        }
    }

    #[test]
    fn test_family_matching() {
        assert_eq!(
            match_family("Parse failed: unexpected token } in JSON at position 42"),
            Some(ErrorType::Parsing)
        );
        assert_eq!(match_family("Error: Cannot find module 'zod'"), Some(ErrorType::Parsing));
        assert_eq!(
            match_family("Required file PRD.md is missing from output"),
            Some(ErrorType::MissingFile)
        );
        assert_eq!(
            match_family("ENOENT: no such file or directory, open 'stack.json'"),
            Some(ErrorType::MissingFile)
        );
        assert_eq!(
            match_family("Section 'Personas' is too short"),
            Some(ErrorType::ContentQuality)
        );
        assert_eq!(
            match_family("Violates Article VII: simplicity gate"),
            Some(ErrorType::Constitutional)
        );
        assert_eq!(match_family("everything is fine"), None);
    }

    #[test]
    fn test_corroboration_raises_confidence() {
        let one = classify_errors(&errs(&["Syntax error on line 3"]));
        let two = classify_errors(&errs(&["Syntax error on line 3", "Invalid JSON in stack.json"]));
        assert_eq!(one.error_type, ErrorType::Parsing);
        assert!(two.confidence > one.confidence);
        assert_eq!(two.matched, 2);
    }

    #[test]
    fn test_confidence_is_capped() {
        let many: Vec<String> = (0..20).map(|i| format!("Syntax error on line {i}")).collect();
        let result = classify_errors(&many);
        assert!((result.confidence - MAX_PATTERN_CONFIDENCE).abs() < f64::EPSILON);
    }

    #[test]
    fn test_majority_family_wins() {
        let result = classify_errors(&errs(&[
            "Syntax error on line 3",
            "Section too short",
            "Placeholder text found in PRD.md",
        ]));
        assert_eq!(result.error_type, ErrorType::ContentQuality);
        assert_eq!(result.matched, 2);
    }

    #[test]
    fn test_unmatched_and_empty_are_unknown() {
        assert_eq!(classify_errors(&[]).error_type, ErrorType::Unknown);
        let result = classify_errors(&errs(&["the build was sad"]));
        assert_eq!(result.error_type, ErrorType::Unknown);
        assert!(result.confidence < 0.5);
    }

    #[test]
    fn test_error_type_parsing() {
        assert_eq!("missing-file".parse::<ErrorType>().unwrap(), ErrorType::MissingFile);
        assert_eq!("Content Quality".parse::<ErrorType>().unwrap(), ErrorType::ContentQuality);
        assert!("weird".parse::<ErrorType>().is_err());
    }
}
