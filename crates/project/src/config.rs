//! `project.yaml`: the project's identity, stack, and board task map.
//!
//! The task map is shared between the CLI and the event router; cross-process
//! access is coordinated by an advisory file lock, and the file itself is
//! replaced atomically.

use std::{collections::BTreeMap, path::Path};

use {
    fd_lock::RwLock,
    serde::{Deserialize, Serialize},
    tracing::debug,
};

use prism_common::{Error, Result};

use crate::layout::PrismDir;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub stack: Vec<String>,
    /// Id of this project on the external board.
    #[serde(default)]
    pub board_project_id: String,
    /// Internal task key → board task id. Serialized under the historical
    /// `flux_task_map` key for compatibility with existing project files.
    #[serde(default, rename = "flux_task_map")]
    pub board_task_map: BTreeMap<String, String>,
    /// Unknown keys round-trip untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl ProjectConfig {
    /// Reverse lookup: internal key for a board task id.
    pub fn key_for_board_id(&self, board_id: &str) -> Option<&str> {
        self.board_task_map
            .iter()
            .find(|(_, v)| v.as_str() == board_id)
            .map(|(k, _)| k.as_str())
    }
}

/// Load the project config, defaulting when the file does not exist.
pub fn load_project_config(project_dir: &Path) -> Result<ProjectConfig> {
    let path = PrismDir::new(project_dir).project_yaml();
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }
    let raw = std::fs::read_to_string(&path)?;
    serde_yaml::from_str(&raw)
        .map_err(|e| Error::invalid(format!("{}: {e}", path.display())))
}

/// Write the project config atomically (temp file + rename).
pub fn save_project_config(project_dir: &Path, config: &ProjectConfig) -> Result<()> {
    let prism = PrismDir::new(project_dir);
    prism.ensure()?;
    let path = prism.project_yaml();
    let yaml = serde_yaml::to_string(config).map_err(|e| Error::invalid(e.to_string()))?;
    let tmp = path.with_extension("yaml.tmp");
    std::fs::write(&tmp, yaml)?;
    std::fs::rename(&tmp, &path)?;
    debug!(path = %path.display(), "saved project config");
    Ok(())
}

/// Read-modify-write the board task map under the advisory lock.
///
/// The closure receives the current map and returns whether it changed;
/// the file is only rewritten when it did.
pub async fn update_task_map<F>(project_dir: &Path, mutate: F) -> Result<ProjectConfig>
where
    F: FnOnce(&mut BTreeMap<String, String>) -> bool + Send + 'static,
{
    let project_dir = project_dir.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let prism = PrismDir::new(&project_dir);
        prism.ensure()?;

        let lock_file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(prism.project_yaml_lock())?;
        let mut lock = RwLock::new(lock_file);
        let _guard = lock
            .write()
            .map_err(|e| Error::message(format!("task map lock failed: {e}")))?;

        let mut config = load_project_config(&project_dir)?;
        if mutate(&mut config.board_task_map) {
            save_project_config(&project_dir, &config)?;
        }
        Ok(config)
    })
    .await
    .map_err(|e| Error::message(format!("task map update task failed: {e}")))?
}
