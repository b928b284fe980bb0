#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use specforge_config::Config;
use specforge_gate::ApproveRequest;
use specforge_git::{GitBackend, GitError, GitIntegration};
use specforge_orchestrator::{AdvanceOutcome, AdvanceRequest, OrchestratorHandle};
use specforge_rootcause::RootCauseAnalyzer;
use specforge_store::{MemoryStore, Project, ProjectStore};

/// Local repository, without a remote unless one is set; records every call.
#[derive(Default)]
pub struct RecordingBackend {
    pub fail_commits: bool,
    pub remote: Option<String>,
    /// How long each branch push takes.
    pub push_delay: Duration,
    pub commits: AtomicU32,
    pub calls: Mutex<Vec<String>>,
}

impl RecordingBackend {
    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(prefix))
    }
}

#[async_trait]
impl GitBackend for RecordingBackend {
    async fn is_repo(&self) -> Result<bool, GitError> {
        Ok(true)
    }
    async fn remotes(&self) -> Result<Vec<String>, GitError> {
        Ok(self.remote.iter().cloned().collect())
    }
    async fn ls_remote(&self, _remote: &str) -> Result<(), GitError> {
        Ok(())
    }
    async fn branch_exists(&self, _branch: &str) -> Result<bool, GitError> {
        Ok(false)
    }
    async fn checkout_branch(&self, branch: &str, _create: bool) -> Result<(), GitError> {
        self.record(format!("checkout {branch}"));
        Ok(())
    }
    async fn ensure_ignore_file(&self, _patterns: &[&str]) -> Result<bool, GitError> {
        Ok(false)
    }
    async fn write_file(&self, rel_path: &str, _content: &str) -> Result<(), GitError> {
        self.record(format!("write {rel_path}"));
        Ok(())
    }
    async fn stage(&self, _paths: &[String]) -> Result<(), GitError> {
        Ok(())
    }
    async fn commit(&self, _message: &str) -> Result<String, GitError> {
        if self.fail_commits {
            return Err(GitError::CommandFailed {
                command: "commit".to_string(),
                stderr: "index.lock exists".to_string(),
            });
        }
        let n = self.commits.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("commit-{n}"))
    }
    async fn push(&self, remote: &str, branch: &str) -> Result<(), GitError> {
        if !self.push_delay.is_zero() {
            tokio::time::sleep(self.push_delay).await;
        }
        self.record(format!("push {remote} {branch}"));
        Ok(())
    }
    async fn tag(&self, name: &str, _message: &str) -> Result<(), GitError> {
        self.record(format!("tag {name}"));
        Ok(())
    }
    async fn push_tags(&self, remote: &str) -> Result<(), GitError> {
        self.record(format!("push_tags {remote}"));
        Ok(())
    }
    async fn reset_branch_to(&self, branch: &str, commit: &str) -> Result<(), GitError> {
        self.record(format!("reset {branch} {commit}"));
        Ok(())
    }
}

impl RecordingBackend {
    /// Repository with a reachable `origin` whose pushes take `delay`.
    pub fn slow_remote(delay: Duration) -> Self {
        Self {
            remote: Some("origin".to_string()),
            push_delay: delay,
            ..Self::default()
        }
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub backend: Arc<RecordingBackend>,
    pub handle: OrchestratorHandle,
}

pub fn harness_with(max_rollback_depth: u32, backend: RecordingBackend) -> Harness {
    let mut config = Config::minimal_for_testing("unused-state-dir");
    config.orchestrator.max_rollback_depth = max_rollback_depth;
    config.lock.backoff_ms = 20;

    let store = Arc::new(MemoryStore::new());
    let backend = Arc::new(backend);
    let git = GitIntegration::new(backend.clone(), "origin");
    let handle =
        OrchestratorHandle::with_parts(config, store.clone(), git, RootCauseAnalyzer::default());
    Harness {
        store,
        backend,
        handle,
    }
}

pub fn harness() -> Harness {
    harness_with(10, RecordingBackend::default())
}

impl Harness {
    pub async fn create(&self, slug: &str) -> Project {
        self.handle
            .create_project(slug, "Acme Portal")
            .await
            .into_result()
            .unwrap()
    }

    pub async fn project(&self, id: &str) -> Project {
        self.store.get_project(id).await.unwrap()
    }

    pub async fn approve_stack(&self, id: &str) {
        let request = ApproveRequest {
            project_id: id.to_string(),
            gate_name: "stack_approved".to_string(),
            approved_by: "cto@example.com".to_string(),
            ..ApproveRequest::default()
        };
        self.handle.approve_gate(&request).await.into_result().unwrap();
    }

    /// Complete the current phase with one artifact named after it.
    pub async fn advance(&self, id: &str) -> AdvanceOutcome {
        let project = self.project(id).await;
        let name = format!("{}.md", project.current_phase.as_str().to_lowercase());
        let mut request = AdvanceRequest::new(id).with_artifact(name, "content");
        if project.current_phase == specforge_utils::types::PhaseId::StackSelection {
            request = request.with_metadata("stack_choice", "rust-axum");
        }
        self.handle.advance_phase(&request).await.into_result().unwrap()
    }

    /// Advance until `current_phase` has moved `steps` times, approving the
    /// stack gate on the way.
    pub async fn advance_n(&self, id: &str, steps: usize) {
        for _ in 0..steps {
            if self.project(id).await.current_phase
                == specforge_utils::types::PhaseId::StackSelection
            {
                self.approve_stack(id).await;
            }
            self.advance(id).await;
        }
    }
}
