//! Board sync and the long-running listener.

use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};

use {
    clap::Subcommand,
    tokio::sync::mpsc,
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
};

use prism_common::{Error, Result};

use {
    prism_board::{
        client::{BoardClient, HttpBoardClient, RetryPolicy},
        sync::sync_tasks,
    },
    prism_project::load_project_config,
    prism_router::{EventRouter, RouterContext, TaskWatcher, build_listener_app, serve},
};

use crate::skill_commands::{find_latest_task_file, open_store};

#[derive(Subcommand)]
pub enum BoardAction {
    /// Sync the task list to the board backlog.
    Sync {
        /// Board project id (overrides project.yaml).
        #[arg(long, default_value = "")]
        project_id: String,
        /// Task file (defaults to the newest tasks.prism.md, then tasks.md).
        #[arg(long)]
        file: Option<PathBuf>,
        /// Preview the plan without creating anything.
        #[arg(long)]
        dry_run: bool,
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,
    },
}

fn board_client(config: &prism_config::PrismConfig) -> HttpBoardClient {
    HttpBoardClient::new(config.board.url.clone()).with_retry(RetryPolicy {
        deadline: std::time::Duration::from_secs(config.board.deadline_secs),
        ..Default::default()
    })
}

pub async fn run(action: BoardAction) -> Result<()> {
    match action {
        BoardAction::Sync {
            project_id,
            file,
            dry_run,
            project_dir,
        } => {
            let config = prism_config::load_global_config();
            let client = board_client(&config);
            if !dry_run && !client.healthy().await {
                return Err(Error::ExternalUnavailable(format!(
                    "board at {} is not reachable",
                    config.board.url
                )));
            }

            let project = load_project_config(&project_dir)?;
            let board_project_id = if !project_id.is_empty() {
                project_id
            } else if !project.board_project_id.is_empty() {
                project.board_project_id.clone()
            } else if dry_run {
                String::from("dry-run")
            } else {
                return Err(Error::ConfigurationMissing(
                    "board project id not set; pass --project-id or set it in .prism/project.yaml"
                        .into(),
                ));
            };

            let source = match file {
                Some(f) => f,
                None => resolve_sync_source(&project_dir)?,
            };
            let content = std::fs::read_to_string(&source)?;
            let report =
                sync_tasks(&client, &project_dir, &board_project_id, &content, dry_run).await?;
            if dry_run {
                for key in &report.planned {
                    println!("[dry-run] would create {key}");
                }
                println!("{} existing entries skipped", report.skipped);
            } else {
                println!(
                    "synced {} tasks to the board ({} skipped)",
                    report.created, report.skipped
                );
            }
            Ok(())
        },
    }
}

/// Prefer an augmented copy when one exists next to the newest task file.
fn resolve_sync_source(project_dir: &Path) -> Result<PathBuf> {
    let tasks = find_latest_task_file(project_dir).ok_or_else(|| {
        Error::not_found(format!(
            "no tasks.md under {}; run `prism augment` first",
            project_dir.display()
        ))
    })?;
    let augmented = prism_tasks::augment::output_path(&tasks);
    Ok(if augmented.exists() { augmented } else { tasks })
}

pub async fn listen(
    port: Option<u16>,
    specs_dir: Option<PathBuf>,
    project_dir: &Path,
) -> Result<()> {
    let config = prism_config::load_global_config();
    let store = Arc::new(open_store(&config).await?);
    let board: Arc<dyn BoardClient> = Arc::new(board_client(&config));

    let ctx = Arc::new(RouterContext {
        store,
        board,
        project_dir: project_dir.to_path_buf(),
        budgets: config.budgets.clone(),
        capture_tx: None,
    });

    let (tx, rx) = mpsc::channel(config.webhook.queue_capacity);
    let shutdown = CancellationToken::new();

    // File watcher is best-effort: a missing specs directory only disables it.
    let specs = specs_dir.unwrap_or_else(|| project_dir.join("specs"));
    let _watcher = match TaskWatcher::start(specs.clone(), tx.clone()) {
        Ok(w) => Some(w),
        Err(e) => {
            warn!(dir = %specs.display(), error = %e, "file watcher disabled");
            None
        },
    };

    let router = EventRouter::new(ctx);
    let dispatcher = tokio::spawn(router.run(rx, shutdown.clone()));

    let port = port.unwrap_or(config.webhook.port);
    let addr: SocketAddr = ([127, 0, 0, 1], port).into();
    let app = build_listener_app(tx, project_dir.to_path_buf());

    info!(%addr, "listener starting; Ctrl-C to stop");
    tokio::select! {
        result = serve(addr, app, shutdown.clone()) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            shutdown.cancel();
        },
    }
    shutdown.cancel();
    dispatcher.await.ok();
    Ok(())
}
