//! Long-running event router: receives board webhooks and task-file change
//! events, and regenerates context artifacts for the affected project.

pub mod briefing;
pub mod dispatch;
pub mod event;
pub mod server;
pub mod watcher;

pub use {
    dispatch::{CaptureRequest, EventRouter, RouterContext},
    event::{BoardEventPayload, EventType, RouterEvent},
    server::{build_listener_app, serve},
    watcher::TaskWatcher,
};
