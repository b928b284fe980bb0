use std::fmt;
use std::time::Duration;
use thiserror::Error;
pub use specforge_lock::LockError;

use crate::exit_codes::ExitCode;
use crate::types::ErrorKind;

/// Library-level error type with rich context and user-friendly reporting.
///
/// `SpecforgeError` aggregates the per-domain errors raised by the
/// orchestration core. It provides:
/// - Detailed error information for programmatic handling
/// - User-friendly messages with context and suggestions
/// - Mapping to an [`ErrorKind`] (HTTP-class status) and a CLI [`ExitCode`]
///
/// # Error Categories
///
/// | Variant | Kind | Typical cause |
/// |---------|------|---------------|
/// | `Phase` | validation / conflict | Unknown phase, advancing past a blocked gate |
/// | `Gate` | validation | Invalid gate name, missing rejection reason |
/// | `Rollback` | validation / not found | Target not completed, no snapshot, depth exceeded |
/// | `Lock` | locked | Project lock contended beyond the retry budget |
/// | `Store` | not found / internal | Missing project, unreadable state |
/// | `Git`, `Llm` | dependency | Version control or text generation failure |
///
/// Library code returns `SpecforgeError` and never calls `std::process::exit()`.
#[derive(Error, Debug)]
pub enum SpecforgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Phase(#[from] PhaseError),

    #[error("{0}")]
    Gate(#[from] GateError),

    #[error("{0}")]
    Rollback(#[from] RollbackError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Git error: {0}")]
    Git(#[from] GitError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for providing user-friendly error reporting with context and suggestions
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get contextual information about the error
    fn context(&self) -> Option<String>;

    /// Get suggested actions to resolve the error
    fn suggestions(&self) -> Vec<String>;

    /// Get the error category for grouping similar errors
    fn category(&self) -> ErrorCategory;
}

/// Categories of errors for better organization and handling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    PhaseTransition,
    Approval,
    Rollback,
    Storage,
    VersionControl,
    TextGeneration,
    Concurrency,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::PhaseTransition => write!(f, "Phase Transition"),
            Self::Approval => write!(f, "Approval"),
            Self::Rollback => write!(f, "Rollback"),
            Self::Storage => write!(f, "Storage"),
            Self::VersionControl => write!(f, "Version Control"),
            Self::TextGeneration => write!(f, "Text Generation"),
            Self::Concurrency => write!(f, "Concurrency"),
        }
    }
}

/// Configuration-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found at {path}")]
    NotFound { path: String },

    #[error("Configuration validation failed: {error_count} errors")]
    ValidationFailed {
        errors: Vec<String>,
        error_count: usize,
    },
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidFile(reason) => {
                format!("Configuration file has invalid format: {reason}")
            }
            Self::InvalidValue { key, value } => {
                format!("Configuration '{key}' has invalid value: {value}")
            }
            Self::NotFound { path } => format!("Configuration file not found: {path}"),
            Self::ValidationFailed { errors, .. } => format!(
                "Configuration validation failed with {} errors: {}",
                errors.len(),
                errors.join(", ")
            ),
        }
    }

    fn context(&self) -> Option<String> {
        Some(
            "specforge searches for .specforge/config.toml starting from the current directory upward."
                .to_string(),
        )
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidFile(_) => vec![
                "Check the TOML syntax using a TOML validator".to_string(),
                "Compare with the example configuration in the README".to_string(),
            ],
            Self::InvalidValue { key, .. } => vec![
                format!("Fix or remove '{key}' to fall back to the default"),
            ],
            Self::NotFound { .. } => vec![
                "Pass --config with an existing file, or drop the flag to use discovery".to_string(),
            ],
            Self::ValidationFailed { .. } => vec![
                "Timeouts and retry counts must be greater than zero".to_string(),
                "Confidence thresholds must be within (0, 1]".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

/// Phase transition errors.
///
/// All of these are raised before any project state is mutated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PhaseError {
    #[error("Unknown phase '{name}'")]
    UnknownPhase { name: String },

    #[error("Project {project_id} has already reached DONE")]
    AlreadyComplete { project_id: String },

    #[error("Cannot advance past {phase}: blocking gate '{gate}' is {status}")]
    GateBlocked {
        phase: String,
        gate: String,
        status: String,
    },

    #[error("Invalid phase transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Project {project_id} has not reached {phase} (current phase is {current})")]
    NotReached {
        project_id: String,
        phase: String,
        current: String,
    },

    #[error("Project {project_id} changed while a transition from {expected} was in flight (now at {found})")]
    ConcurrentModification {
        project_id: String,
        expected: String,
        found: String,
    },
}

impl UserFriendlyError for PhaseError {
    fn user_message(&self) -> String {
        match self {
            Self::UnknownPhase { name } => format!("'{name}' is not a pipeline phase"),
            Self::AlreadyComplete { project_id } => {
                format!("Project {project_id} is already complete; nothing to advance")
            }
            Self::GateBlocked {
                phase,
                gate,
                status,
            } => format!("Phase {phase} cannot complete while gate '{gate}' is {status}"),
            Self::InvalidTransition { from, to } => {
                format!("Cannot move from {from} to {to}")
            }
            Self::NotReached { phase, current, .. } => {
                format!("Phase {phase} cannot be recorded while the project is at {current}")
            }
            Self::ConcurrentModification {
                project_id, found, ..
            } => format!("Project {project_id} was changed by another operation and is now at {found}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::UnknownPhase { .. } => Some(
                "Phases run in order: ANALYSIS, STACK_SELECTION, SPEC, DEPENDENCIES, SOLUTIONING, VALIDATE, DONE."
                    .to_string(),
            ),
            Self::GateBlocked { .. } => Some(
                "Blocking gates require explicit human approval before the pipeline continues."
                    .to_string(),
            ),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::UnknownPhase { .. } => {
                vec!["Use one of the canonical phase names (case-insensitive)".to_string()]
            }
            Self::AlreadyComplete { .. } => {
                vec!["Roll back to an earlier phase to regenerate artifacts".to_string()]
            }
            Self::GateBlocked { gate, .. } => vec![
                format!("Approve the '{gate}' gate: specforge approve <project> {gate} --by <name>"),
                "If the gate was rejected, remediate and approve again".to_string(),
            ],
            Self::InvalidTransition { .. } | Self::NotReached { .. } => {
                vec!["Check the project status for the current phase".to_string()]
            }
            Self::ConcurrentModification { .. } => vec![
                "Check the project status, then retry against the current phase".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::PhaseTransition
    }
}

/// Approval gate errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("Invalid gate name '{name}'")]
    InvalidGateName { name: String },

    #[error("Rejecting gate '{gate}' requires a reason")]
    MissingReason { gate: String },

    #[error("Gate '{gate}' requires a non-empty {field}")]
    MissingActor { gate: String, field: String },

    #[error("Gate '{gate}' is already approved; its decision cannot change")]
    AlreadyApproved { gate: String },
}

impl UserFriendlyError for GateError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::InvalidGateName { .. } => Some(
                "Valid gates: stack_approved, prd_approved, architecture_approved, handoff_acknowledged."
                    .to_string(),
            ),
            Self::AlreadyApproved { .. } => Some(
                "Approvals are one-way; only a rejected gate can change its decision.".to_string(),
            ),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidGateName { .. } => vec!["List gates with: specforge gates <project>".to_string()],
            Self::MissingReason { .. } => vec!["Pass --reason describing what must change".to_string()],
            Self::MissingActor { field, .. } => vec![format!("Pass a non-empty {field}")],
            Self::AlreadyApproved { .. } => {
                vec!["Roll back to the gated phase to reopen the decision".to_string()]
            }
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Approval
    }
}

/// Rollback errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RollbackError {
    #[error("Phase {phase} not found in completed phases")]
    PhaseNotCompleted { phase: String },

    #[error("No snapshot found for phase {phase}")]
    NoSnapshot { phase: String },

    #[error("Maximum rollback depth of {limit} exceeded")]
    DepthExceeded { limit: u32 },
}

impl UserFriendlyError for RollbackError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::PhaseNotCompleted { .. } => Some(
                "Rollback can only target a phase that has already completed.".to_string(),
            ),
            Self::NoSnapshot { .. } => Some(
                "Snapshots are captured when a phase completes; this phase has none on record."
                    .to_string(),
            ),
            Self::DepthExceeded { .. } => Some(
                "Repeated rollbacks are capped to stop runaway remediation loops.".to_string(),
            ),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::PhaseNotCompleted { .. } => {
                vec!["Check completed phases with: specforge status <project>".to_string()]
            }
            Self::NoSnapshot { .. } => {
                vec!["Roll back to an earlier phase that has a snapshot".to_string()]
            }
            Self::DepthExceeded { .. } => vec![
                "Review the project manually before rolling back again".to_string(),
                "Raise [orchestrator] max_rollback_depth if this is expected".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Rollback
    }
}

/// Persistence errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Project {project_id} not found")]
    ProjectNotFound { project_id: String },

    #[error("Project with slug '{slug}' already exists")]
    DuplicateProject { slug: String },

    #[error("Failed to access {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("State at {path} is corrupted: {reason}")]
    Corrupted { path: String, reason: String },
}

/// Version control errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GitError {
    #[error("{path} is not a git repository")]
    NotARepository { path: String },

    #[error("git {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("git {command} timed out after {duration:?}")]
    Timeout { command: String, duration: Duration },

    #[error("Failed to spawn git: {0}")]
    Spawn(String),
}

/// Errors that can occur during text generation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// Transport-level failure (HTTP connectivity)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Provider authentication failure (401, 403, missing API key)
    #[error("Provider authentication error: {0}")]
    ProviderAuth(String),

    /// Provider quota/rate limit exceeded (429)
    #[error("Provider quota exceeded: {0}")]
    ProviderQuota(String),

    /// Provider service outage (5xx errors)
    #[error("Provider outage: {0}")]
    ProviderOutage(String),

    /// Invocation timed out
    #[error("Timeout after {duration:?}")]
    Timeout { duration: Duration },

    /// Budget limit exceeded
    #[error("Budget exceeded: attempted {attempted} calls, limit is {limit}")]
    BudgetExceeded { limit: u32, attempted: u32 },

    /// Configuration error
    #[error("Misconfiguration: {0}")]
    Misconfiguration(String),
}

impl SpecforgeError {
    /// Boundary classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Validation,
            Self::Phase(err) => match err {
                PhaseError::UnknownPhase { .. }
                | PhaseError::InvalidTransition { .. }
                | PhaseError::NotReached { .. } => ErrorKind::Validation,
                PhaseError::AlreadyComplete { .. }
                | PhaseError::GateBlocked { .. }
                | PhaseError::ConcurrentModification { .. } => ErrorKind::Conflict,
            },
            Self::Gate(err) => match err {
                GateError::AlreadyApproved { .. } => ErrorKind::Conflict,
                _ => ErrorKind::Validation,
            },
            Self::Rollback(err) => match err {
                RollbackError::PhaseNotCompleted { .. } => ErrorKind::Validation,
                RollbackError::NoSnapshot { .. } => ErrorKind::NotFound,
                RollbackError::DepthExceeded { .. } => ErrorKind::Conflict,
            },
            Self::Store(err) => match err {
                StoreError::ProjectNotFound { .. } => ErrorKind::NotFound,
                StoreError::DuplicateProject { .. } => ErrorKind::Conflict,
                _ => ErrorKind::Internal,
            },
            Self::Git(_) | Self::Llm(_) => ErrorKind::Dependency,
            Self::Lock(_) => ErrorKind::Locked,
            Self::Io(_) => ErrorKind::Internal,
        }
    }

    /// True for caller mistakes (bad phase, gate name, missing reason).
    ///
    /// These are reported synchronously and never logged as system failures.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    /// Map this error to the CLI exit code.
    #[must_use]
    pub fn to_exit_code(&self) -> ExitCode {
        ExitCode::from_kind(self.kind())
    }

    /// Get a user-friendly error message with context and actionable suggestions.
    #[must_use]
    pub fn display_for_user(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Error: {}\n", self.user_message()));

        if let Some(ctx) = self.context() {
            output.push_str(&format!("\nContext: {ctx}\n"));
        }

        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for suggestion in suggestions {
                output.push_str(&format!("  • {suggestion}\n"));
            }
        }

        output
    }
}

impl UserFriendlyError for SpecforgeError {
    fn user_message(&self) -> String {
        match self {
            Self::Config(e) => e.user_message(),
            Self::Phase(e) => e.user_message(),
            Self::Gate(e) => e.user_message(),
            Self::Rollback(e) => e.user_message(),
            other => other.to_string(),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Config(e) => e.context(),
            Self::Phase(e) => e.context(),
            Self::Gate(e) => e.context(),
            Self::Rollback(e) => e.context(),
            Self::Lock(_) => {
                Some("Another request is changing this project right now.".to_string())
            }
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Config(e) => e.suggestions(),
            Self::Phase(e) => e.suggestions(),
            Self::Gate(e) => e.suggestions(),
            Self::Rollback(e) => e.suggestions(),
            Self::Lock(_) => vec!["Try again in a few seconds".to_string()],
            Self::Store(StoreError::ProjectNotFound { .. }) => {
                vec!["Create the project first with: specforge init <slug>".to_string()]
            }
            _ => Vec::new(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) => ErrorCategory::Configuration,
            Self::Phase(_) => ErrorCategory::PhaseTransition,
            Self::Gate(_) => ErrorCategory::Approval,
            Self::Rollback(_) => ErrorCategory::Rollback,
            Self::Store(_) | Self::Io(_) => ErrorCategory::Storage,
            Self::Git(_) => ErrorCategory::VersionControl,
            Self::Llm(_) => ErrorCategory::TextGeneration,
            Self::Lock(_) => ErrorCategory::Concurrency,
        }
    }
}
