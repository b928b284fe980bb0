//! Orchestrator façade for external consumers.
//!
//! This module provides a clean, stable API for calling layers (CLI, HTTP
//! handlers, job runners) to drive the phase pipeline without knowing how
//! storage, locking, gates and git are wired together.
//!
//! **Integration rule**: outside this crate, use `OrchestratorHandle`.
//! Direct `PhaseOrchestrator` / `RollbackService` usage is reserved for tests
//! and orchestrator internals.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use specforge_orchestrator::{AdvanceRequest, OrchestratorHandle};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Using environment-based config discovery
//!     let handle = OrchestratorHandle::new()?;
//!     handle.create_project("acme-portal", "Acme Portal").await;
//!
//!     let request = AdvanceRequest::new("acme-portal").with_artifact("analysis.md", "# Analysis");
//!     let result = handle.advance_phase(&request).await;
//!     println!("advanced: {}", result.success);
//!     Ok(())
//! }
//! ```

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{Instrument, debug, warn};

use camino::Utf8PathBuf;
use specforge_classifier::{
    FailureClassification, FailureType, RemediationStrategy, classify_failure,
    get_remediation_strategy,
};
use specforge_config::{CliArgs, Config};
use specforge_gate::{ApprovalGateService, ApproveRequest, ProjectGate, RejectRequest};
use specforge_git::{CommitRequest, GitIntegration, GitMode, GitOutcome};
use specforge_lock::{LockManager, LockSettings};
use specforge_rootcause::{RootCauseAnalysis, RootCauseAnalyzer};
use specforge_store::{FileStore, Project, ProjectStore};
use specforge_utils::error::{ConfigError, SpecforgeError};
use specforge_utils::logging::project_span;
use specforge_utils::types::{ErrorKind, PhaseHistoryEntry, PhaseId};

use crate::phase::PhaseOrchestrator;
use crate::remediation::plan_remediation;
use crate::rollback::RollbackService;
use crate::types::{
    AdvanceOutcome, AdvanceRequest, ProjectStatus, RemediationPlan, RollbackPreview,
    RollbackResult, SnapshotSummary,
};

/// Structured result returned across the orchestrator boundary.
///
/// Exactly one of `data` and `error` is set, except for git and rollback
/// failures, which also carry the failed outcome as `data`. `status` is the
/// HTTP-class status of the outcome (200 on success).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub status: u16,
}

impl<T> OperationResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_kind: None,
            status: 200,
        }
    }

    /// Failure from a domain error. Validation failures are caller mistakes
    /// and are logged at debug level only.
    pub fn from_error(error: &SpecforgeError) -> Self {
        let kind = error.kind();
        if error.is_validation() {
            debug!(kind = kind.as_str(), %error, "Request refused");
        } else {
            warn!(kind = kind.as_str(), %error, "Operation failed");
        }
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            error_kind: Some(kind),
            status: kind.http_status(),
        }
    }

    pub fn from_result(result: Result<T, SpecforgeError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(error) => Self::from_error(&error),
        }
    }

    /// Convert back into a `Result`, keeping only the error message.
    pub fn into_result(self) -> Result<T, String> {
        match (self.success, self.data, self.error) {
            (true, Some(data), _) => Ok(data),
            (_, _, Some(error)) => Err(error),
            _ => Err("operation returned no data".to_string()),
        }
    }
}

impl OperationResult<GitOutcome> {
    /// Git never fails an operation outright; an unsuccessful outcome is a
    /// dependency failure that still carries the outcome.
    pub fn from_git(outcome: GitOutcome) -> Self {
        if outcome.success {
            return Self::ok(outcome);
        }
        Self {
            success: false,
            error: Some(outcome.message.clone()),
            error_kind: Some(ErrorKind::Dependency),
            status: ErrorKind::Dependency.http_status(),
            data: Some(outcome),
        }
    }
}

/// The primary public API for embedding specforge.
///
/// `OrchestratorHandle` owns the store, lock manager, git integration and
/// root-cause analyzer, and exposes every pipeline operation as an async
/// method returning an [`OperationResult`].
///
/// # Overview
///
/// Use `OrchestratorHandle` to:
/// - Create projects and advance them through the phases
/// - Approve or reject the human gates
/// - Classify validation failures and plan remediation
/// - Preview and perform rollbacks
///
/// # Construction
///
/// There are three ways to create an `OrchestratorHandle`:
///
/// - [`OrchestratorHandle::new`]: Uses environment-based config discovery (same as CLI)
/// - [`OrchestratorHandle::from_config`]: Uses explicit configuration (deterministic)
/// - [`OrchestratorHandle::with_parts`]: Injects the store, git integration and analyzer
///
/// When constructed inside a tokio runtime, the lock manager's expiry sweep
/// is started; [`OrchestratorHandle::shutdown`] stops it.
///
/// # Threading
///
/// The handle is `Send + Sync` and every method takes `&self`. Operations on
/// one project are serialized by the project lock; different projects
/// proceed independently.
///
/// # Example
///
/// ```rust,no_run
/// use specforge_orchestrator::OrchestratorHandle;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let handle = OrchestratorHandle::new()?;
///
///     let preview = handle.get_rollback_preview("acme-portal", "ANALYSIS").await;
///     if let Some(preview) = preview.data {
///         println!("Would discard: {:?}", preview.phases_to_discard);
///     }
///
///     let result = handle.rollback_to_phase("acme-portal", "ANALYSIS").await;
///     println!("status {}", result.status);
///     Ok(())
/// }
/// ```
///
/// # Using Explicit Configuration
///
/// ```rust,no_run
/// use specforge_config::Config;
/// use specforge_orchestrator::OrchestratorHandle;
///
/// let config = Config::minimal_for_testing("/tmp/specforge-state");
/// let handle = OrchestratorHandle::from_config(config)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
///
/// # Error Handling
///
/// Operations never return `Err` or panic across the boundary. Failures are
/// reported as `success: false` with the error message, its
/// [`ErrorKind`] and the HTTP-class status: 400 for invalid phases, gate
/// names and missing reasons, 404 for missing projects and snapshots, 409
/// for blocked gates and exhausted rollback depth, 423 for lock contention.
pub struct OrchestratorHandle {
    config: Config,
    store: Arc<dyn ProjectStore>,
    locks: LockManager,
    git: Arc<GitIntegration>,
    analyzer: RootCauseAnalyzer,
    phases: PhaseOrchestrator,
    rollback: RollbackService,
    gates: ApprovalGateService,
}

impl std::fmt::Debug for OrchestratorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestratorHandle")
            .field("state_dir", &self.config.orchestrator.state_dir)
            .field("max_rollback_depth", &self.config.orchestrator.max_rollback_depth)
            .finish_non_exhaustive()
    }
}

impl OrchestratorHandle {
    /// Create a handle using environment-based config discovery.
    ///
    /// This uses the same discovery logic as the CLI:
    /// - Upward search for `.specforge/config.toml`
    /// - Built-in defaults
    ///
    /// Git is bound to the configured repository or the working directory.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Configuration discovery or validation fails
    /// - The configured LLM provider cannot be built
    pub fn new() -> anyhow::Result<Self> {
        let config = Config::discover(&CliArgs::default())?;
        Ok(Self::from_config(config)?)
    }

    /// Create a handle from explicit configuration.
    ///
    /// Projects are stored as JSON documents under
    /// `orchestrator.state_dir`.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The configuration is invalid or its state dir is not UTF-8
    /// - The configured LLM provider cannot be built
    pub fn from_config(config: Config) -> Result<Self, SpecforgeError> {
        config.validate()?;
        let state_dir = Utf8PathBuf::from_path_buf(config.orchestrator.state_dir.clone())
            .map_err(|path| ConfigError::InvalidValue {
                key: "orchestrator.state_dir".to_string(),
                value: path.display().to_string(),
            })?;
        let store: Arc<dyn ProjectStore> = Arc::new(FileStore::new(state_dir));
        let git = specforge_git::from_config(&config.git, Path::new("."));
        let analyzer = RootCauseAnalyzer::from_config(&config)?;
        Ok(Self::with_parts(config, store, git, analyzer))
    }

    /// Create a handle around injected collaborators.
    #[must_use]
    pub fn with_parts(
        config: Config,
        store: Arc<dyn ProjectStore>,
        git: GitIntegration,
        analyzer: RootCauseAnalyzer,
    ) -> Self {
        let locks = LockManager::new(LockSettings {
            max_attempts: config.lock.max_attempts,
            backoff: config.lock.backoff(),
            ttl: config.lock.ttl(),
            sweep_interval: config.lock.sweep_interval(),
        });
        if tokio::runtime::Handle::try_current().is_ok() {
            locks.start_sweeper();
        }

        let git = Arc::new(git);
        let locker = Arc::new(locks.clone());
        Self {
            phases: PhaseOrchestrator::new(store.clone(), git.clone(), locker.clone()),
            rollback: RollbackService::new(
                store.clone(),
                git.clone(),
                locker,
                config.orchestrator.max_rollback_depth,
            ),
            gates: ApprovalGateService::new(store.clone()),
            config,
            store,
            locks,
            git,
            analyzer,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn is_llm_available(&self) -> bool {
        self.analyzer.is_llm_available()
    }

    pub async fn git_mode(&self) -> GitMode {
        self.git.mode().await
    }

    /// Stop the lock sweep. Later mutations fail with a lock error.
    pub fn shutdown(&self) {
        self.locks.shutdown();
    }

    pub async fn create_project(&self, slug: &str, name: &str) -> OperationResult<Project> {
        OperationResult::from_result(
            self.phases
                .create_project(slug, name)
                .instrument(project_span(slug, "create"))
                .await,
        )
    }

    /// Project record with its gates, history and snapshot listing.
    pub async fn status(&self, project_id: &str) -> OperationResult<ProjectStatus> {
        let result = async {
            let project = self.store.get_project(project_id).await?;
            let gates = self.gates.get_project_gates(project_id).await?;
            let history = self.store.history(project_id).await?;
            let snapshots = self
                .store
                .list_snapshots(project_id)
                .await?
                .iter()
                .map(SnapshotSummary::from)
                .collect();
            Ok::<_, SpecforgeError>(ProjectStatus {
                project,
                gates,
                history,
                snapshots,
            })
        };
        OperationResult::from_result(result.await)
    }

    pub async fn list_projects(&self) -> OperationResult<Vec<Project>> {
        OperationResult::from_result(self.store.list_projects().await.map_err(Into::into))
    }

    pub async fn advance_phase(&self, request: &AdvanceRequest) -> OperationResult<AdvanceOutcome> {
        OperationResult::from_result(
            self.phases
                .advance_phase(request)
                .instrument(project_span(&request.project_id, "advance"))
                .await,
        )
    }

    /// Snapshot `phase` from its currently stored artifacts.
    pub async fn record_phase_completion(
        &self,
        project_id: &str,
        phase: &str,
    ) -> OperationResult<SnapshotSummary> {
        let result = async {
            let phase: PhaseId = phase.parse()?;
            let snapshot = self
                .phases
                .record_phase_completion(project_id, phase, None)
                .await?;
            Ok::<_, SpecforgeError>(SnapshotSummary::from(&snapshot))
        };
        OperationResult::from_result(result.instrument(project_span(project_id, "record")).await)
    }

    /// Roll back to `target`. A refused rollback carries a failed
    /// [`RollbackResult`] as data.
    pub async fn rollback_to_phase(
        &self,
        project_id: &str,
        target: &str,
    ) -> OperationResult<RollbackResult> {
        let result = async {
            let target: PhaseId = target.parse()?;
            self.rollback.rollback_to_phase(project_id, target).await
        };
        let mut outcome =
            OperationResult::from_result(result.instrument(project_span(project_id, "rollback")).await);
        if !outcome.success {
            outcome.data = outcome.error.clone().map(RollbackResult::failed);
        }
        outcome
    }

    pub async fn get_rollback_preview(
        &self,
        project_id: &str,
        target: &str,
    ) -> OperationResult<RollbackPreview> {
        let result = async {
            let target: PhaseId = target.parse()?;
            self.rollback.get_rollback_preview(project_id, target).await
        };
        OperationResult::from_result(result.await)
    }

    pub async fn initialize_gates_for_project(
        &self,
        project_id: &str,
    ) -> OperationResult<Vec<ProjectGate>> {
        OperationResult::from_result(self.gates.initialize_gates_for_project(project_id).await)
    }

    pub async fn approve_gate(&self, request: &ApproveRequest) -> OperationResult<ProjectGate> {
        OperationResult::from_result(
            self.gates
                .approve_gate(request)
                .instrument(project_span(&request.project_id, "approve"))
                .await,
        )
    }

    pub async fn reject_gate(&self, request: &RejectRequest) -> OperationResult<ProjectGate> {
        OperationResult::from_result(
            self.gates
                .reject_gate(request)
                .instrument(project_span(&request.project_id, "reject"))
                .await,
        )
    }

    pub async fn get_project_gates(&self, project_id: &str) -> OperationResult<Vec<ProjectGate>> {
        OperationResult::from_result(self.gates.get_project_gates(project_id).await)
    }

    /// Pure classification; always succeeds.
    pub fn classify_failure(
        &self,
        phase: &str,
        error_message: &str,
    ) -> OperationResult<FailureClassification> {
        OperationResult::ok(classify_failure(phase, error_message))
    }

    pub fn remediation_strategy(
        &self,
        failure_type: FailureType,
        failed_phase: &str,
    ) -> OperationResult<RemediationStrategy> {
        OperationResult::ok(get_remediation_strategy(failure_type, failed_phase))
    }

    /// Root-cause analysis of an error set; always succeeds, falling back to
    /// pattern analysis when escalation fails.
    pub async fn analyze_failure(
        &self,
        errors: &[String],
        history: &[PhaseHistoryEntry],
    ) -> OperationResult<RootCauseAnalysis> {
        OperationResult::ok(self.analyzer.analyze(errors, history).await)
    }

    /// Classification, strategy and root cause for a failed validation of
    /// `project_id`, using the project's recorded history.
    pub async fn plan_remediation(
        &self,
        project_id: &str,
        failed_phase: &str,
        errors: &[String],
    ) -> OperationResult<RemediationPlan> {
        let result = async {
            let history = self.store.history(project_id).await?;
            Ok::<_, SpecforgeError>(plan_remediation(&self.analyzer, failed_phase, errors, &history).await)
        };
        OperationResult::from_result(result.instrument(project_span(project_id, "remediate")).await)
    }

    pub async fn commit_phase_artifacts(&self, request: &CommitRequest) -> OperationResult<GitOutcome> {
        OperationResult::from_git(self.git.commit_phase_artifacts(request).await)
    }

    pub async fn create_spec_branch(&self, slug: &str) -> OperationResult<GitOutcome> {
        OperationResult::from_git(self.git.create_spec_branch(slug).await)
    }

    pub async fn create_handoff_tag(&self, slug: &str, version: u64) -> OperationResult<GitOutcome> {
        OperationResult::from_git(self.git.create_handoff_tag(slug, version).await)
    }
}
