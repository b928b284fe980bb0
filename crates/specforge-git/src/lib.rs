//! Version-control integration
//!
//! Git is a best-effort collaborator: capability is detected once
//! ([`GitMode`]), every operation reports a [`GitOutcome`] instead of
//! failing, and the pipeline never blocks on a git problem.

mod backend;
mod integration;
mod message;
mod mode;

use std::path::Path;
use std::sync::Arc;

pub use backend::{CommandGitBackend, GitBackend, NoRepository};
pub use integration::{
    ARTIFACT_ROOT, CommitRequest, GitIntegration, GitOutcome, NEVER_COMMIT_PATTERNS, handoff_tag,
    spec_branch,
};
pub use message::{agent_role, render_commit_message};
pub use mode::GitMode;
pub use specforge_utils::error::GitError;

use specforge_config::GitConfig;

/// Build the integration described by `[git]`.
///
/// `enabled = false` yields [`GitIntegration::disabled`]; otherwise a
/// [`CommandGitBackend`] bound to `repo_path` (or `default_dir`).
#[must_use]
pub fn from_config(config: &GitConfig, default_dir: &Path) -> GitIntegration {
    if !config.enabled {
        return GitIntegration::disabled();
    }
    let backend = CommandGitBackend::new(
        config.repo_dir(default_dir),
        config.command_timeout(),
        config.push_timeout(),
    );
    GitIntegration::new(Arc::new(backend), config.remote.clone())
}
