//! Idempotent sync of a parsed task list onto the board.
//!
//! Epics are ensured first, then tasks whose internal key is not yet in the
//! board task map are created. The map is persisted after every successful
//! create, so a crash mid-sync never re-creates what already exists.

use std::path::Path;

use tracing::{debug, info};

use prism_common::Result;

use {
    prism_project::{load_project_config, update_task_map},
    prism_tasks::parser::{parse_epics, parse_tasks},
};

use crate::client::BoardClient;

/// Map key tracking a synced epic, distinct from task keys.
fn epic_key(title: &str) -> String {
    format!("__epic__{title}")
}

#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub created: usize,
    pub skipped: usize,
    /// Keys that were (or, in a dry run, would be) created.
    pub planned: Vec<String>,
    pub dry_run: bool,
}

/// Sync the tasks in `content` to the board project.
///
/// `dry_run` reports the plan without touching the board or the map.
pub async fn sync_tasks(
    client: &dyn BoardClient,
    project_dir: &Path,
    board_project_id: &str,
    content: &str,
    dry_run: bool,
) -> Result<SyncReport> {
    let mut epics = parse_epics(content);
    let tasks = parse_tasks(content);
    // Tasks above the first epic heading live in the implicit epic; make
    // sure it has an entry to sync under.
    for task in &tasks {
        if !epics.iter().any(|e| e.title == task.epic) {
            epics.push(prism_tasks::parser::ParsedEpic {
                title: task.epic.clone(),
                description: String::new(),
            });
        }
    }
    let mut map = load_project_config(project_dir)?.board_task_map;
    let mut report = SyncReport {
        dry_run,
        ..Default::default()
    };

    for epic in &epics {
        let ekey = epic_key(&epic.title);
        let epic_board_id = if let Some(id) = map.get(&ekey) {
            id.clone()
        } else if dry_run {
            debug!(epic = %epic.title, "dry-run: would create epic");
            report.planned.push(ekey.clone());
            String::new()
        } else {
            let created = client
                .create_epic(board_project_id, &epic.title, &epic.description)
                .await?;
            persist(project_dir, &mut map, ekey.clone(), created.id.clone()).await?;
            report.planned.push(ekey);
            created.id
        };

        for task in tasks.iter().filter(|t| t.epic == epic.title) {
            let key = task.key();
            if map.contains_key(&key) {
                debug!(key = %key, "skip (already on board)");
                report.skipped += 1;
                continue;
            }
            report.planned.push(key.clone());
            if dry_run {
                debug!(key = %key, "dry-run: would create task");
                continue;
            }
            let epic_arg = (!epic_board_id.is_empty()).then_some(epic_board_id.as_str());
            let created = client
                .create_task(board_project_id, &task.title, task.body.trim(), epic_arg)
                .await?;
            persist(project_dir, &mut map, key, created.id).await?;
            report.created += 1;
        }
    }

    info!(
        created = report.created,
        skipped = report.skipped,
        dry_run,
        "task sync complete"
    );
    Ok(report)
}

async fn persist(
    project_dir: &Path,
    local: &mut std::collections::BTreeMap<String, String>,
    key: String,
    board_id: String,
) -> Result<()> {
    local.insert(key.clone(), board_id.clone());
    update_task_map(project_dir, move |map| {
        map.insert(key, board_id);
        true
    })
    .await?;
    Ok(())
}
