//! The `.prism/` directory layout inside a project.

use std::path::{Path, PathBuf};

use tracing::info;

use prism_common::Result;

/// Paths under a project's `.prism/` directory.
#[derive(Debug, Clone)]
pub struct PrismDir {
    root: PathBuf,
}

impl PrismDir {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: project_dir.into().join(".prism"),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }

    /// Create the directory if needed.
    pub fn ensure(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// Free-form human-editable project briefing.
    pub fn briefing_md(&self) -> PathBuf {
        self.root.join("PRISM.md")
    }

    /// Per-project agent-role overrides.
    pub fn agents_md(&self) -> PathBuf {
        self.root.join("AGENTS.md")
    }

    pub fn project_yaml(&self) -> PathBuf {
        self.root.join("project.yaml")
    }

    /// Advisory lock guarding `project.yaml` read-modify-write cycles.
    pub fn project_yaml_lock(&self) -> PathBuf {
        self.root.join("project.yaml.lock")
    }

    /// Generated project-wide context artifact.
    pub fn injected_context(&self) -> PathBuf {
        self.root.join("injected-context.md")
    }

    /// Generated per-task briefing artifact.
    pub fn current_task(&self) -> PathBuf {
        self.root.join("current-task.md")
    }

    /// Destroying a project is removing its `.prism/` directory.
    pub fn destroy(&self) -> Result<()> {
        if self.root.exists() {
            std::fs::remove_dir_all(&self.root)?;
            info!(root = %self.root.display(), "removed project state");
        }
        Ok(())
    }
}
