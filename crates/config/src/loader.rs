use std::{
    path::PathBuf,
    sync::RwLock,
};

use tracing::{debug, warn};

use prism_common::{Error, Result};

use crate::schema::PrismConfig;

const CONFIG_FILENAME: &str = "prism.config.yaml";

/// Programmatic home-dir override, set once by the CLI before any command
/// resolves paths. Takes precedence over `PRISM_HOME`.
static HOME_OVERRIDE: RwLock<Option<PathBuf>> = RwLock::new(None);

/// Override the PRISM home directory for this process.
pub fn set_prism_home(dir: PathBuf) {
    if let Ok(mut guard) = HOME_OVERRIDE.write() {
        *guard = Some(dir);
    }
}

/// Clear a programmatic override (used by tests).
pub fn clear_prism_home() {
    if let Ok(mut guard) = HOME_OVERRIDE.write() {
        *guard = None;
    }
}

/// Returns the PRISM home directory.
///
/// Resolution order:
/// 1. programmatic override (`set_prism_home`)
/// 2. `PRISM_HOME`
/// 3. `~/.prism`
pub fn config_dir() -> PathBuf {
    if let Ok(guard) = HOME_OVERRIDE.read()
        && let Some(dir) = guard.as_ref()
    {
        return dir.clone();
    }
    if let Ok(dir) = std::env::var("PRISM_HOME") {
        return PathBuf::from(dir);
    }
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(".prism"))
        .unwrap_or_else(|| PathBuf::from(".prism"))
}

/// Resolve the memory root from the loaded config, expanding a leading `~`.
pub fn memory_dir(config: &PrismConfig) -> PathBuf {
    let raw = &config.memory.global_path;
    if raw == "~/.prism/memory" {
        // Default location follows the (possibly overridden) PRISM home.
        return config_dir().join("memory");
    }
    if let Some(rest) = raw.strip_prefix("~/")
        && let Some(dirs) = directories::BaseDirs::new()
    {
        return dirs.home_dir().join(rest);
    }
    PathBuf::from(raw)
}

/// Load the global config, falling back to defaults when the file is absent
/// or unreadable. A malformed file is reported but never fatal here; commands
/// that depend on specific settings surface `ConfigurationMissing` themselves.
pub fn load_global_config() -> PrismConfig {
    let path = config_dir().join(CONFIG_FILENAME);
    if !path.exists() {
        debug!(path = %path.display(), "no global config, using defaults");
        return PrismConfig::default();
    }
    match std::fs::read_to_string(&path) {
        Ok(raw) => match serde_yaml::from_str(&raw) {
            Ok(cfg) => {
                debug!(path = %path.display(), "loaded global config");
                cfg
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "malformed config, using defaults");
                PrismConfig::default()
            },
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable config, using defaults");
            PrismConfig::default()
        },
    }
}

/// Serialize the config to YAML and write it to the global path, creating
/// parent directories as needed.
pub fn save_global_config(config: &PrismConfig) -> Result<PathBuf> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(CONFIG_FILENAME);
    let yaml = serde_yaml::to_string(config).map_err(|e| Error::invalid(e.to_string()))?;
    std::fs::write(&path, yaml)?;
    debug!(path = %path.display(), "saved global config");
    Ok(path)
}
