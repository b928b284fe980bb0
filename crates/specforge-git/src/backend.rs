//! Version-control contract and the `git` command implementation

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use specforge_utils::error::GitError;

/// Version-control operations the integration relies on.
///
/// Every method may fail; [`GitIntegration`](crate::GitIntegration) absorbs
/// failures into structured outcomes.
#[async_trait]
pub trait GitBackend: Send + Sync {
    async fn is_repo(&self) -> Result<bool, GitError>;

    /// Configured remote names.
    async fn remotes(&self) -> Result<Vec<String>, GitError>;

    /// Lightweight reachability check of `remote`.
    async fn ls_remote(&self, remote: &str) -> Result<(), GitError>;

    async fn branch_exists(&self, branch: &str) -> Result<bool, GitError>;

    /// Check out `branch`, creating it from HEAD when `create` is set.
    async fn checkout_branch(&self, branch: &str, create: bool) -> Result<(), GitError>;

    /// Append any missing `patterns` to the repository ignore file.
    ///
    /// Returns whether the file changed.
    async fn ensure_ignore_file(&self, patterns: &[&str]) -> Result<bool, GitError>;

    /// Write `content` to `rel_path` inside the working tree.
    async fn write_file(&self, rel_path: &str, content: &str) -> Result<(), GitError>;

    async fn stage(&self, paths: &[String]) -> Result<(), GitError>;

    /// Commit the index. Returns the new commit hash.
    async fn commit(&self, message: &str) -> Result<String, GitError>;

    async fn push(&self, remote: &str, branch: &str) -> Result<(), GitError>;

    async fn tag(&self, name: &str, message: &str) -> Result<(), GitError>;

    async fn push_tags(&self, remote: &str) -> Result<(), GitError>;

    /// Point `branch` at `commit` and check it out.
    async fn reset_branch_to(&self, branch: &str, commit: &str) -> Result<(), GitError>;
}

/// Backend that runs the `git` binary with discrete argv elements (no shell).
#[derive(Debug, Clone)]
pub struct CommandGitBackend {
    git: PathBuf,
    repo_dir: PathBuf,
    command_timeout: Duration,
    push_timeout: Duration,
}

impl CommandGitBackend {
    /// Resolve `git` on `PATH` (falling back to the bare name) and bind to `repo_dir`.
    #[must_use]
    pub fn new(repo_dir: impl Into<PathBuf>, command_timeout: Duration, push_timeout: Duration) -> Self {
        let git = which::which("git").unwrap_or_else(|_| PathBuf::from("git"));
        Self {
            git,
            repo_dir: repo_dir.into(),
            command_timeout,
            push_timeout,
        }
    }

    #[must_use]
    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    async fn run(&self, args: &[&str], timeout: Duration) -> Result<String, GitError> {
        let argv: Vec<OsString> = args.iter().map(OsString::from).collect();
        let label = args.first().copied().unwrap_or("").to_string();
        debug!(command = %args.join(" "), dir = %self.repo_dir.display(), "Running git");

        let mut cmd = Command::new(&self.git);
        cmd.args(&argv)
            .current_dir(&self.repo_dir)
            // Never block on credential prompts.
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true);

        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(result) => result.map_err(|e| GitError::Spawn(e.to_string()))?,
            Err(_) => {
                return Err(GitError::Timeout {
                    command: label,
                    duration: timeout,
                });
            }
        };

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(GitError::CommandFailed {
                command: label,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    fn resolve_in_tree(&self, rel_path: &str) -> Result<PathBuf, GitError> {
        let path = Path::new(rel_path);
        let escapes = path.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if rel_path.is_empty() || escapes {
            return Err(GitError::CommandFailed {
                command: "write".to_string(),
                stderr: format!("refusing to write outside the working tree: {rel_path}"),
            });
        }
        Ok(self.repo_dir.join(path))
    }
}

fn io_error(command: &str, e: &std::io::Error) -> GitError {
    GitError::CommandFailed {
        command: command.to_string(),
        stderr: e.to_string(),
    }
}

#[async_trait]
impl GitBackend for CommandGitBackend {
    async fn is_repo(&self) -> Result<bool, GitError> {
        match self
            .run(&["rev-parse", "--is-inside-work-tree"], self.command_timeout)
            .await
        {
            Ok(out) => Ok(out == "true"),
            Err(GitError::CommandFailed { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn remotes(&self) -> Result<Vec<String>, GitError> {
        let out = self.run(&["remote"], self.command_timeout).await?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    async fn ls_remote(&self, remote: &str) -> Result<(), GitError> {
        self.run(&["ls-remote", "--heads", remote], self.push_timeout)
            .await
            .map(|_| ())
    }

    async fn branch_exists(&self, branch: &str) -> Result<bool, GitError> {
        let reference = format!("refs/heads/{branch}");
        match self
            .run(
                &["rev-parse", "--verify", "--quiet", &reference],
                self.command_timeout,
            )
            .await
        {
            Ok(_) => Ok(true),
            Err(GitError::CommandFailed { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn checkout_branch(&self, branch: &str, create: bool) -> Result<(), GitError> {
        let args: &[&str] = if create {
            &["checkout", "-b", branch]
        } else {
            &["checkout", branch]
        };
        self.run(args, self.command_timeout).await.map(|_| ())
    }

    async fn ensure_ignore_file(&self, patterns: &[&str]) -> Result<bool, GitError> {
        let path = self.repo_dir.join(".gitignore");
        let existing = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(io_error("ignore", &e)),
        };

        let present: Vec<&str> = existing.lines().map(str::trim).collect();
        let missing: Vec<&str> = patterns
            .iter()
            .copied()
            .filter(|p| !present.contains(p))
            .collect();
        if missing.is_empty() {
            return Ok(false);
        }

        let mut updated = existing.clone();
        if !updated.is_empty() && !updated.ends_with('\n') {
            updated.push('\n');
        }
        for pattern in missing {
            updated.push_str(pattern);
            updated.push('\n');
        }
        tokio::fs::write(&path, updated)
            .await
            .map_err(|e| io_error("ignore", &e))?;
        Ok(true)
    }

    async fn write_file(&self, rel_path: &str, content: &str) -> Result<(), GitError> {
        let path = self.resolve_in_tree(rel_path)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error("write", &e))?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| io_error("write", &e))
    }

    async fn stage(&self, paths: &[String]) -> Result<(), GitError> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args: Vec<&str> = vec!["add", "--"];
        args.extend(paths.iter().map(String::as_str));
        self.run(&args, self.command_timeout).await.map(|_| ())
    }

    async fn commit(&self, message: &str) -> Result<String, GitError> {
        self.run(&["commit", "-m", message], self.command_timeout)
            .await?;
        self.run(&["rev-parse", "HEAD"], self.command_timeout).await
    }

    async fn push(&self, remote: &str, branch: &str) -> Result<(), GitError> {
        self.run(&["push", "-u", remote, branch], self.push_timeout)
            .await
            .map(|_| ())
    }

    async fn tag(&self, name: &str, message: &str) -> Result<(), GitError> {
        self.run(&["tag", "-a", name, "-m", message], self.command_timeout)
            .await
            .map(|_| ())
    }

    async fn push_tags(&self, remote: &str) -> Result<(), GitError> {
        self.run(&["push", remote, "--tags"], self.push_timeout)
            .await
            .map(|_| ())
    }

    async fn reset_branch_to(&self, branch: &str, commit: &str) -> Result<(), GitError> {
        self.run(&["checkout", "-B", branch, commit], self.command_timeout)
            .await
            .map(|_| ())
    }
}

/// Backend for configurations with git switched off. Reports "not a repository".
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRepository;

impl NoRepository {
    fn refuse<T>() -> Result<T, GitError> {
        Err(GitError::NotARepository {
            path: "<git disabled>".to_string(),
        })
    }
}

#[async_trait]
impl GitBackend for NoRepository {
    async fn is_repo(&self) -> Result<bool, GitError> {
        Ok(false)
    }
    async fn remotes(&self) -> Result<Vec<String>, GitError> {
        Self::refuse()
    }
    async fn ls_remote(&self, _remote: &str) -> Result<(), GitError> {
        Self::refuse()
    }
    async fn branch_exists(&self, _branch: &str) -> Result<bool, GitError> {
        Self::refuse()
    }
    async fn checkout_branch(&self, _branch: &str, _create: bool) -> Result<(), GitError> {
        Self::refuse()
    }
    async fn ensure_ignore_file(&self, _patterns: &[&str]) -> Result<bool, GitError> {
        Self::refuse()
    }
    async fn write_file(&self, _rel_path: &str, _content: &str) -> Result<(), GitError> {
        Self::refuse()
    }
    async fn stage(&self, _paths: &[String]) -> Result<(), GitError> {
        Self::refuse()
    }
    async fn commit(&self, _message: &str) -> Result<String, GitError> {
        Self::refuse()
    }
    async fn push(&self, _remote: &str, _branch: &str) -> Result<(), GitError> {
        Self::refuse()
    }
    async fn tag(&self, _name: &str, _message: &str) -> Result<(), GitError> {
        Self::refuse()
    }
    async fn push_tags(&self, _remote: &str) -> Result<(), GitError> {
        Self::refuse()
    }
    async fn reset_branch_to(&self, _branch: &str, _commit: &str) -> Result<(), GitError> {
        Self::refuse()
    }
}
