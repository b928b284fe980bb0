use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use specforge_utils::types::PhaseStep;

use crate::backend::{GitBackend, NoRepository};
use crate::message::render_commit_message;
use crate::mode::GitMode;

/// Paths that must never be committed alongside artifacts.
pub const NEVER_COMMIT_PATTERNS: &[&str] = &[
    ".env",
    ".env.*",
    "*.pem",
    "*.key",
    "node_modules/",
    ".specforge/locks/",
];

/// Directory (relative to the repository root) holding per-project artifacts.
pub const ARTIFACT_ROOT: &str = "specs";

/// Spec branch name for a project slug.
#[must_use]
pub fn spec_branch(slug: &str) -> String {
    format!("spec/{slug}")
}

/// Handoff tag name for a snapshot version.
#[must_use]
pub fn handoff_tag(version: u64) -> String {
    format!("handoff-v{version}")
}

/// Structured result of a git operation. Failures are values, never panics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitOutcome {
    pub success: bool,
    pub mode: GitMode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub pushed: bool,
}

impl GitOutcome {
    fn ok(mode: GitMode, message: impl Into<String>) -> Self {
        Self {
            success: true,
            mode,
            message: message.into(),
            branch: None,
            commit_hash: None,
            tag: None,
            pushed: false,
        }
    }

    fn failed(mode: GitMode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::ok(mode, message)
        }
    }

    fn disabled() -> Self {
        Self::failed(
            GitMode::Disabled,
            "Git integration is disabled: not a repository or git unavailable",
        )
    }
}

/// Input to [`GitIntegration::commit_phase_artifacts`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRequest {
    pub slug: String,
    pub project_name: String,
    pub phase: PhaseStep,
    /// Paths relative to the repository root
    pub artifacts: Vec<String>,
    /// Agent key (`pm`, `architect`, ...)
    pub agent: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone)]
struct Capability {
    mode: GitMode,
    remote: Option<String>,
}

/// Best-effort version control for the pipeline.
///
/// Capability is detected lazily on first use and cached for the lifetime of
/// the value. In [`GitMode::Disabled`] every operation returns an unsuccessful
/// [`GitOutcome`] without touching the backend.
pub struct GitIntegration {
    backend: Arc<dyn GitBackend>,
    preferred_remote: String,
    capability: OnceCell<Capability>,
}

impl std::fmt::Debug for GitIntegration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitIntegration")
            .field("preferred_remote", &self.preferred_remote)
            .field("mode", &self.capability.get().map(|c| c.mode))
            .finish()
    }
}

impl GitIntegration {
    pub fn new(backend: Arc<dyn GitBackend>, preferred_remote: impl Into<String>) -> Self {
        Self {
            backend,
            preferred_remote: preferred_remote.into(),
            capability: OnceCell::new(),
        }
    }

    /// Integration that is disabled without probing anything.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            backend: Arc::new(NoRepository),
            preferred_remote: String::new(),
            capability: OnceCell::new_with(Some(Capability {
                mode: GitMode::Disabled,
                remote: None,
            })),
        }
    }

    /// Resolved capability mode. Detection runs at most once.
    pub async fn mode(&self) -> GitMode {
        self.capability().await.mode
    }

    async fn capability(&self) -> &Capability {
        self.capability
            .get_or_init(|| async {
                let capability = self.detect().await;
                info!(mode = %capability.mode, remote = ?capability.remote, "Git capability detected");
                capability
            })
            .await
    }

    async fn detect(&self) -> Capability {
        let disabled = Capability {
            mode: GitMode::Disabled,
            remote: None,
        };

        match self.backend.is_repo().await {
            Ok(true) => {}
            Ok(false) => return disabled,
            Err(e) => {
                warn!(error = %e, "Repository check failed; disabling git integration");
                return disabled;
            }
        }

        let remotes = match self.backend.remotes().await {
            Ok(remotes) => remotes,
            Err(e) => {
                warn!(error = %e, "Listing remotes failed; disabling git integration");
                return disabled;
            }
        };

        let Some(remote) = remotes
            .iter()
            .find(|r| **r == self.preferred_remote)
            .or_else(|| remotes.first())
            .cloned()
        else {
            return Capability {
                mode: GitMode::LocalOnly,
                remote: None,
            };
        };

        match self.backend.ls_remote(&remote).await {
            Ok(()) => Capability {
                mode: GitMode::FullIntegration,
                remote: Some(remote),
            },
            Err(e) => {
                warn!(remote = %remote, error = %e, "Remote unreachable; using local-only mode");
                Capability {
                    mode: GitMode::LocalOnly,
                    remote: None,
                }
            }
        }
    }

    /// Create or check out `spec/{slug}` and make sure the ignore file exists.
    pub async fn create_spec_branch(&self, slug: &str) -> GitOutcome {
        let mode = self.mode().await;
        if !mode.can_commit() {
            return GitOutcome::disabled();
        }

        if let Err(e) = self.backend.ensure_ignore_file(NEVER_COMMIT_PATTERNS).await {
            warn!(slug, error = %e, "Could not update ignore file");
        }

        let branch = spec_branch(slug);
        let exists = match self.backend.branch_exists(&branch).await {
            Ok(exists) => exists,
            Err(e) => return GitOutcome::failed(mode, format!("Branch lookup failed: {e}")),
        };

        match self.backend.checkout_branch(&branch, !exists).await {
            Ok(()) => {
                debug!(slug, branch = %branch, created = !exists, "On spec branch");
                GitOutcome {
                    branch: Some(branch.clone()),
                    ..GitOutcome::ok(
                        mode,
                        if exists {
                            format!("Checked out {branch}")
                        } else {
                            format!("Created {branch}")
                        },
                    )
                }
            }
            Err(e) => GitOutcome::failed(mode, format!("Checkout of {branch} failed: {e}")),
        }
    }

    /// Write artifacts under `specs/{slug}/` in the working tree.
    ///
    /// Returns the repository-relative paths written. Disabled mode writes nothing.
    pub async fn write_artifacts(
        &self,
        slug: &str,
        artifacts: &BTreeMap<String, String>,
    ) -> Vec<String> {
        if !self.mode().await.can_commit() {
            return Vec::new();
        }

        let mut written = Vec::with_capacity(artifacts.len());
        for (name, content) in artifacts {
            let rel_path = format!("{ARTIFACT_ROOT}/{slug}/{name}");
            match self.backend.write_file(&rel_path, content).await {
                Ok(()) => written.push(rel_path),
                Err(e) => warn!(slug, artifact = %name, error = %e, "Could not write artifact"),
            }
        }
        written
    }

    /// Stage and commit phase artifacts on the spec branch; push in full mode.
    ///
    /// A push failure is logged and the commit still counts as success.
    pub async fn commit_phase_artifacts(&self, request: &CommitRequest) -> GitOutcome {
        let capability = self.capability().await.clone();
        let mode = capability.mode;
        if !mode.can_commit() {
            return GitOutcome::disabled();
        }

        let branch_outcome = self.create_spec_branch(&request.slug).await;
        if !branch_outcome.success {
            return branch_outcome;
        }
        let branch = spec_branch(&request.slug);

        if let Err(e) = self.backend.stage(&request.artifacts).await {
            return GitOutcome::failed(mode, format!("Staging artifacts failed: {e}"));
        }

        let message = render_commit_message(
            request.phase,
            &request.project_name,
            &request.artifacts,
            &request.agent,
            request.duration_ms,
        );
        let hash = match self.backend.commit(&message).await {
            Ok(hash) => hash,
            Err(e) => return GitOutcome::failed(mode, format!("Commit failed: {e}")),
        };
        info!(slug = %request.slug, phase = %request.phase, commit = %hash, "Committed phase artifacts");

        let mut outcome = GitOutcome {
            branch: Some(branch.clone()),
            commit_hash: Some(hash),
            ..GitOutcome::ok(mode, format!("Committed {} artifacts", request.artifacts.len()))
        };

        if let (true, Some(remote)) = (mode.can_push(), capability.remote.as_deref()) {
            match self.backend.push(remote, &branch).await {
                Ok(()) => outcome.pushed = true,
                Err(e) => {
                    warn!(slug = %request.slug, remote, error = %e, "Push failed; commit kept locally");
                    outcome.message.push_str(" (push failed)");
                }
            }
        }

        outcome
    }

    /// Tag `handoff-v{version}`; push tags in full mode.
    pub async fn create_handoff_tag(&self, slug: &str, version: u64) -> GitOutcome {
        let capability = self.capability().await.clone();
        let mode = capability.mode;
        if !mode.can_commit() {
            return GitOutcome::disabled();
        }

        let tag = handoff_tag(version);
        if let Err(e) = self
            .backend
            .tag(&tag, &format!("Handoff for {slug} (version {version})"))
            .await
        {
            return GitOutcome::failed(mode, format!("Tagging {tag} failed: {e}"));
        }

        let mut outcome = GitOutcome {
            tag: Some(tag.clone()),
            ..GitOutcome::ok(mode, format!("Created tag {tag}"))
        };

        if let (true, Some(remote)) = (mode.can_push(), capability.remote.as_deref()) {
            match self.backend.push_tags(remote).await {
                Ok(()) => outcome.pushed = true,
                Err(e) => warn!(slug, tag = %tag, error = %e, "Pushing tags failed"),
            }
        }

        outcome
    }

    /// Point `spec/{slug}` at `commit` and check it out.
    pub async fn reset_spec_branch(&self, slug: &str, commit: &str) -> GitOutcome {
        let mode = self.mode().await;
        if !mode.can_commit() {
            return GitOutcome::disabled();
        }

        let branch = spec_branch(slug);
        match self.backend.reset_branch_to(&branch, commit).await {
            Ok(()) => GitOutcome {
                branch: Some(branch.clone()),
                commit_hash: Some(commit.to_string()),
                ..GitOutcome::ok(mode, format!("Reset {branch} to {commit}"))
            },
            Err(e) => GitOutcome::failed(mode, format!("Reset of {branch} failed: {e}")),
        }
    }
}
