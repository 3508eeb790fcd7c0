//! Version-control sync for the memory directory.
//!
//! Shells out to `git`; in-process gitoxide is not worth the surface for
//! stage/commit/push porcelain.

use std::path::{Path, PathBuf};

use {
    tokio::process::Command,
    tracing::{debug, info},
};

use prism_common::{Error, Result};

/// Working-tree status of the memory repository.
#[derive(Debug, Clone, Default)]
pub struct SyncStatus {
    /// Modified or untracked paths, `git status --porcelain` style.
    pub pending: Vec<String>,
}

impl SyncStatus {
    pub fn is_clean(&self) -> bool {
        self.pending.is_empty()
    }
}

pub struct MemorySync {
    root: PathBuf,
    remote: Option<String>,
}

impl MemorySync {
    /// `remote` empty or unset disables push/pull.
    pub fn new(root: impl Into<PathBuf>, remote: impl Into<String>) -> Self {
        let remote = remote.into();
        Self {
            root: root.into(),
            remote: (!remote.is_empty()).then_some(remote),
        }
    }

    /// Whether the memory root is a git work tree, initializing it if not.
    pub async fn ensure_repo(&self) -> Result<()> {
        let probe = run_git(&self.root, &["rev-parse", "--is-inside-work-tree"]).await;
        if probe.is_ok() {
            return Ok(());
        }
        run_git(&self.root, &["init"]).await?;
        info!(root = %self.root.display(), "initialized memory repository");
        Ok(())
    }

    /// Unstaged and untracked files under the memory root.
    pub async fn status(&self) -> Result<SyncStatus> {
        let out = run_git(&self.root, &["status", "--porcelain"]).await?;
        let pending = out
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        Ok(SyncStatus { pending })
    }

    /// Stage everything and commit. Returns false when there was nothing to
    /// commit. `message` overrides the templated default.
    pub async fn commit(&self, message: Option<&str>) -> Result<bool> {
        let status = self.status().await?;
        if status.is_clean() {
            debug!("memory tree clean, nothing to commit");
            return Ok(false);
        }
        run_git(&self.root, &["add", "."]).await?;
        let default = format!("prism: update memory ({} files)", status.pending.len());
        let message = message.unwrap_or(&default);
        run_git(&self.root, &["commit", "-m", message]).await?;
        info!(message = %message, "committed memory changes");
        Ok(true)
    }

    /// Push to the configured remote.
    pub async fn push(&self) -> Result<()> {
        self.require_remote()?;
        run_git(&self.root, &["push"]).await?;
        info!("pushed memory changes");
        Ok(())
    }

    /// Pull from the configured remote.
    pub async fn pull(&self) -> Result<()> {
        self.require_remote()?;
        run_git(&self.root, &["pull", "--ff-only"]).await?;
        info!("pulled memory changes");
        Ok(())
    }

    fn require_remote(&self) -> Result<()> {
        if self.remote.is_none() {
            return Err(Error::ConfigurationMissing(
                "memory.git_remote is not configured".into(),
            ));
        }
        Ok(())
    }
}

async fn run_git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .await
        .map_err(|e| Error::message(format!("failed to run git: {e}")))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::message(format!(
            "git {} failed: {}",
            args.first().unwrap_or(&""),
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
