//! Local git collaborator.
//!
//! The orchestrator only needs a best-effort "refresh all remotes" after a
//! successful sync; the trait also carries the branch operations the CLI
//! layer uses so one fake covers both in tests.

use crate::error::GitError;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;

/// Abstract capability over a local working copy.
#[async_trait]
pub trait GitClient: Send + Sync {
    /// Name of the currently checked-out branch.
    async fn current_branch(&self) -> Result<String, GitError>;

    /// Check out the named branch.
    async fn checkout(&self, branch: &str) -> Result<(), GitError>;

    /// Fetch all remotes.
    async fn fetch_all(&self) -> Result<(), GitError>;
}

/// [`GitClient`] backed by the `git` binary in a working directory.
#[derive(Debug, Clone)]
pub struct CommandGit {
    workdir: PathBuf,
}

impl CommandGit {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String, GitError> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .await
            .map_err(|e| GitError::Spawn(e.to_string()))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(GitError::Command {
                command: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

#[async_trait]
impl GitClient for CommandGit {
    async fn current_branch(&self) -> Result<String, GitError> {
        self.run(&["rev-parse", "--abbrev-ref", "HEAD"]).await
    }

    async fn checkout(&self, branch: &str) -> Result<(), GitError> {
        self.run(&["checkout", branch]).await.map(|_| ())
    }

    async fn fetch_all(&self) -> Result<(), GitError> {
        self.run(&["fetch", "--all"]).await.map(|_| ())
    }
}
