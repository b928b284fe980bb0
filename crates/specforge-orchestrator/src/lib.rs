//! Phase state machine for specforge projects
//!
//! This crate wires the store, approval gates, git integration, project
//! locks and failure analysis into the pipeline that moves a project from
//! ANALYSIS to DONE and back.
//!
//! # Architecture
//!
//! - **PhaseOrchestrator**: forward transitions, snapshot capture, handoff tagging
//! - **RollbackService**: destructive restore of an earlier snapshot, with preview
//! - **OrchestratorHandle**: stable facade returning [`OperationResult`]s
//!
//! # Module Organization
//!
//! - `handle.rs`: Stable facade API for external consumers
//! - `phase.rs`: Forward transitions and snapshots
//! - `rollback.rs`: Rollback and preview
//! - `remediation.rs`: Classification plus root cause for a failed validation
//! - `types.rs`: Request and result types
//!
//! # Integration Rule
//!
//! **Outside this crate, use `OrchestratorHandle` for all production scenarios.**
//! Direct `PhaseOrchestrator` usage is reserved for tests and orchestrator internals.
//!
//! # Example
//!
//! ```rust,no_run
//! use specforge_orchestrator::{AdvanceRequest, OrchestratorHandle};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let handle = OrchestratorHandle::new()?;
//!
//!     let request = AdvanceRequest::new("acme-portal")
//!         .with_artifact("stack.json", "{\"stack\":\"rust-axum\"}")
//!         .with_metadata("stack_choice", "rust-axum");
//!     let result = handle.advance_phase(&request).await;
//!     if let Some(error) = result.error {
//!         eprintln!("{error}");
//!     }
//!     Ok(())
//! }
//! ```

mod handle;
mod phase;
mod remediation;
mod rollback;
mod types;

pub use handle::{OperationResult, OrchestratorHandle};
pub use phase::{CLARIFICATION_KEY, PhaseOrchestrator, STACK_CHOICE_KEY, default_agent};
pub use remediation::plan_remediation;
pub use rollback::RollbackService;
pub use types::{
    AdvanceOutcome, AdvanceRequest, ProjectStatus, RemediationPlan, RollbackPreview,
    RollbackResult, SnapshotSummary,
};
