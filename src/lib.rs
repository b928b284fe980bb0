//! specforge - phase orchestration for spec-driven planning pipelines
//!
//! A project moves through a fixed pipeline of planning phases:
//!
//! ```text
//! ANALYSIS → STACK_SELECTION → SPEC → DEPENDENCIES → SOLUTIONING → VALIDATE → DONE
//! ```
//!
//! Every completed phase is snapshotted and optionally committed to a
//! `spec/<slug>` git branch. Projects can be rolled back to any completed
//! phase, stakeholders approve or reject gates, and validation failures are
//! classified and traced back to the phase that introduced them.
//!
//! specforge can be used in two ways:
//! - **CLI**: the `specforge` binary drives a file-backed state directory
//! - **Library**: embed [`OrchestratorHandle`] in a service or job runner
//!
//! # Quick Start (CLI)
//!
//! ```bash
//! specforge init acme-portal --name "Acme Portal"
//! specforge advance acme-portal --artifact analysis.md=./analysis.md
//! specforge status acme-portal --json
//! ```
//!
//! # Quick Start (Library)
//!
//! ```rust,no_run
//! use specforge::{AdvanceRequest, Config, OrchestratorHandle};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::builder().state_dir("/var/lib/specforge").build()?;
//!     let handle = OrchestratorHandle::from_config(config)?;
//!
//!     handle.create_project("acme-portal", "Acme Portal").await;
//!     let result = handle
//!         .advance_phase(&AdvanceRequest::new("acme-portal").with_artifact("analysis.md", "# A"))
//!         .await;
//!     println!("advanced: {}", result.success);
//!     Ok(())
//! }
//! ```
//!
//! # JSON Contracts
//!
//! `--json` output is an [`OperationResult`] envelope emitted in JCS
//! (RFC 8785) canonical form. Use [`emit_jcs`] for your own integrations.
//!
//! # Stable Public API
//!
//! - [`OrchestratorHandle`] and [`OperationResult`] - the orchestration facade
//! - [`PhaseId`] and [`PhaseStep`] - pipeline phases and history steps
//! - [`Config`] and [`ConfigBuilder`] - configuration management
//! - [`SpecforgeError`] and [`ErrorKind`] - library error type and its boundary class
//! - [`ExitCode`] - CLI exit codes
//!
//! Everything else is reachable through the member crates and is not covered
//! by semver guarantees.

// ============================================================================
// Stable Public API - covered by semver guarantees for 1.x
// ============================================================================

/// The orchestration facade and its request/response types.
pub use specforge_orchestrator::{
    AdvanceOutcome, AdvanceRequest, OperationResult, OrchestratorHandle, ProjectStatus,
    RemediationPlan, RollbackPreview, RollbackResult, SnapshotSummary,
};

/// Pipeline phases and the finer-grained steps recorded in history.
pub use specforge_utils::types::{ErrorKind, PhaseHistoryEntry, PhaseId, PhaseStep};

/// Configuration with discovery and precedence:
/// CLI arguments > config file > built-in defaults.
pub use specforge_config::{CliArgs, Config, ConfigBuilder};

/// Library-level error type.
///
/// Library code returns `SpecforgeError` and does NOT call `std::process::exit()`.
pub use specforge_utils::error::SpecforgeError;

/// Exit codes matching the documented exit code table.
pub use specforge_utils::exit_codes::ExitCode;

/// Emit a value as JCS (RFC 8785) canonical JSON.
pub use specforge_utils::canonicalization::emit_jcs;

/// Gate and failure-analysis types surfaced by the facade.
pub use specforge_classifier::{FailureClassification, FailureType, RemediationStrategy};
pub use specforge_gate::{ApproveRequest, GateName, GateStatus, ProjectGate, RejectRequest};
pub use specforge_rootcause::RootCauseAnalysis;
pub use specforge_store::Project;

// ============================================================================
// CLI
// ============================================================================

pub mod cli;
