//! Thin client for the external Kanban board plus idempotent task sync.

pub mod client;
pub mod sync;
pub mod types;

pub use {
    client::{BoardClient, HttpBoardClient, RetryPolicy},
    sync::{SyncReport, sync_tasks},
    types::{BoardEpic, BoardTask},
};
