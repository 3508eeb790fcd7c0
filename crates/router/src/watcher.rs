//! Filesystem watcher for the specs directory.
//!
//! Watches recursively for `tasks.md` create/modify events, coalescing
//! bursts with a 2 s trailing-edge debounce, and feeds the router queue.

use std::{path::PathBuf, time::Duration};

use {
    notify_debouncer_full::{
        DebounceEventResult, Debouncer, RecommendedCache, new_debouncer, notify::EventKind,
        notify::RecursiveMode,
    },
    tokio::sync::mpsc,
    tracing::{debug, info, warn},
};

use prism_common::{Error, Result};

use crate::event::RouterEvent;

/// File name a task list must have to trigger augmentation.
pub const TASK_FILE_NAME: &str = "tasks.md";

const DEBOUNCE: Duration = Duration::from_secs(2);

/// Watches a specs directory for task-file changes with debouncing.
///
/// The watcher must be kept alive (not dropped) for events to continue.
pub struct TaskWatcher {
    _debouncer: Debouncer<notify_debouncer_full::notify::RecommendedWatcher, RecommendedCache>,
}

impl std::fmt::Debug for TaskWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskWatcher").finish_non_exhaustive()
    }
}

impl TaskWatcher {
    pub fn start(specs_dir: PathBuf, tx: mpsc::Sender<RouterEvent>) -> Result<Self> {
        if !specs_dir.exists() {
            return Err(Error::not_found(format!(
                "specs directory {}",
                specs_dir.display()
            )));
        }

        let debouncer = new_debouncer(DEBOUNCE, None, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    for event in events {
                        if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                            continue;
                        }
                        for path in &event.paths {
                            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
                            if name != TASK_FILE_NAME {
                                continue;
                            }
                            debug!(path = %path.display(), "task file changed");
                            if tx
                                .try_send(RouterEvent::TaskFile(path.clone()))
                                .is_err()
                            {
                                warn!(path = %path.display(), "event queue full, dropping watcher event");
                            }
                        }
                    }
                },
                Err(errors) => {
                    for e in errors {
                        warn!(error = %e, "watcher error");
                    }
                },
            }
        })
        .map_err(|e| Error::message(format!("failed to start watcher: {e}")))?;

        let mut watcher = Self {
            _debouncer: debouncer,
        };
        watcher
            ._debouncer
            .watch(&specs_dir, RecursiveMode::Recursive)
            .map_err(|e| Error::message(format!("failed to watch {}: {e}", specs_dir.display())))?;
        info!(dir = %specs_dir.display(), "watching for task files");
        Ok(watcher)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, tempfile::TempDir};

    #[tokio::test]
    async fn test_missing_dir_is_not_found() {
        let (tx, _rx) = mpsc::channel(4);
        let err = TaskWatcher::start(PathBuf::from("/definitely/not/here"), tx).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_watcher_starts_on_existing_dir() {
        let tmp = TempDir::new().unwrap();
        let (tx, _rx) = mpsc::channel(4);
        let _watcher = TaskWatcher::start(tmp.path().to_path_buf(), tx).unwrap();
    }
}
