//! The dispatcher: consumes the bounded event queue, running handlers
//! concurrently across keys but serially per `(project_id, board_id)` key.
//! A newer event for a key cancels the in-flight older handler; the newest
//! handler's artifact always wins.

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use {
    tokio::sync::{Mutex, mpsc},
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info},
};

use prism_common::{Error, Result};

use {
    prism_board::client::BoardClient,
    prism_config::BudgetConfig,
    prism_memory::store::SkillStore,
    prism_project::load_project_config,
    prism_tasks::augment::{AugmentOptions, augment_file},
};

use crate::{
    briefing,
    event::{BoardEventPayload, EventType, RouterEvent},
};

/// Emitted when a task reaches the done column; downstream memory capture
/// is outside the router's contract.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub project_id: String,
    pub board_id: String,
}

/// Everything a handler needs, constructed once at startup and shared.
pub struct RouterContext {
    pub store: Arc<SkillStore>,
    pub board: Arc<dyn BoardClient>,
    pub project_dir: PathBuf,
    pub budgets: BudgetConfig,
    pub capture_tx: Option<mpsc::UnboundedSender<CaptureRequest>>,
}

/// Per-key bookkeeping: the serialization mutex and the newest sequence
/// number seen for the key.
struct KeyState {
    lock: Mutex<()>,
    latest: AtomicU64,
}

/// Keys kept in the map before the janitor sweeps idle entries.
const KEY_MAP_HIGH_WATER: usize = 1024;

pub struct EventRouter {
    ctx: Arc<RouterContext>,
}

impl EventRouter {
    pub fn new(ctx: Arc<RouterContext>) -> Arc<Self> {
        Arc::new(Self { ctx })
    }

    /// Consume events until the queue closes or shutdown fires. Handler
    /// failures are logged with the event key and never stop the loop.
    pub async fn run(
        self: Arc<Self>,
        mut rx: mpsc::Receiver<RouterEvent>,
        shutdown: CancellationToken,
    ) {
        let mut keys: HashMap<String, Arc<KeyState>> = HashMap::new();
        let mut cancel_tokens: HashMap<String, CancellationToken> = HashMap::new();
        let mut seq: u64 = 0;

        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                ev = rx.recv() => match ev {
                    Some(e) => e,
                    None => break,
                },
            };
            seq += 1;
            let key = event.key();

            let state = Arc::clone(keys.entry(key.clone()).or_insert_with(|| {
                Arc::new(KeyState {
                    lock: Mutex::new(()),
                    latest: AtomicU64::new(0),
                })
            }));
            state.latest.store(seq, Ordering::SeqCst);

            // Newest wins: cancel whatever is in flight for this key.
            if let Some(prev) = cancel_tokens.get(&key) {
                prev.cancel();
            }
            let token = shutdown.child_token();
            cancel_tokens.insert(key.clone(), token.clone());

            let ctx = Arc::clone(&self.ctx);
            tokio::spawn(async move {
                let _serial = state.lock.lock().await;
                if state.latest.load(Ordering::SeqCst) != seq {
                    debug!(key = %key, seq, "superseded before start, skipping");
                    return;
                }
                match handle_event(&ctx, &event, &token).await {
                    Ok(()) => {},
                    Err(e) if e.is_cancelled() => {
                        debug!(key = %key, seq, "handler cancelled");
                    },
                    Err(e) => {
                        error!(key = %key, seq, error = %e, "handler failed");
                    },
                }
            });

            // Janitor: drop idle key entries once the map grows large.
            if keys.len() > KEY_MAP_HIGH_WATER {
                keys.retain(|_, s| Arc::strong_count(s) > 1);
                cancel_tokens.retain(|k, _| keys.contains_key(k));
            }
        }
        info!("event router stopped");
    }
}

async fn handle_event(
    ctx: &RouterContext,
    event: &RouterEvent,
    cancel: &CancellationToken,
) -> Result<()> {
    match event {
        RouterEvent::Board(payload) => handle_board_event(ctx, payload, cancel).await,
        RouterEvent::TaskFile(path) => handle_task_file(ctx, path, cancel).await,
    }
}

fn is_in_progress(column: &str) -> bool {
    matches!(column, "in-progress" | "in_progress" | "doing")
}

async fn handle_board_event(
    ctx: &RouterContext,
    payload: &BoardEventPayload,
    cancel: &CancellationToken,
) -> Result<()> {
    match payload.event_type {
        EventType::TaskCreated | EventType::TaskDeleted => {
            debug!(board_id = %payload.board_id, event_type = ?payload.event_type, "no action for event");
            Ok(())
        },
        EventType::TaskMoved if is_in_progress(&payload.to_column) => {
            let project = load_project_config(&ctx.project_dir)?;
            match project.key_for_board_id(&payload.board_id) {
                Some(key) => debug!(board_id = %payload.board_id, key = %key, "task started"),
                None => debug!(board_id = %payload.board_id, "task started (not in task map)"),
            }

            let task = tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                task = ctx.board.get_task(&payload.board_id) => task?,
            };
            let path = briefing::generate_briefing(ctx, &task, cancel).await?;
            info!(board_id = %payload.board_id, path = %path.display(), "briefing written");
            Ok(())
        },
        EventType::TaskMoved if payload.to_column == "done" => {
            info!(board_id = %payload.board_id, "memory capture requested");
            if let Some(ref tx) = ctx.capture_tx {
                let _ = tx.send(CaptureRequest {
                    project_id: payload.project_id.clone(),
                    board_id: payload.board_id.clone(),
                });
            }
            Ok(())
        },
        EventType::TaskMoved => {
            debug!(
                board_id = %payload.board_id,
                from = %payload.from_column,
                to = %payload.to_column,
                "transition of no interest"
            );
            Ok(())
        },
    }
}

async fn handle_task_file(
    ctx: &RouterContext,
    path: &std::path::Path,
    cancel: &CancellationToken,
) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    let project = load_project_config(&ctx.project_dir)?;
    // A watcher event means the input changed, so regenerate even when an
    // augmented copy already exists.
    let options = AugmentOptions {
        per_task_budget: ctx.budgets.per_task,
        force: true,
        ..Default::default()
    };
    let outcome = augment_file(&ctx.store, path, &project.stack, &options).await?;
    info!(
        source = %path.display(),
        output = %outcome.output.display(),
        "task file re-augmented"
    );
    Ok(())
}
