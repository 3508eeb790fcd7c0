//! Event types flowing through the router's bounded queue.

use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    TaskMoved,
    TaskCreated,
    TaskDeleted,
}

/// A board state-transition event as POSTed to `/webhook`.
#[derive(Debug, Clone, Deserialize)]
pub struct BoardEventPayload {
    pub event_type: EventType,
    pub board_id: String,
    pub project_id: String,
    #[serde(default)]
    pub from_column: String,
    #[serde(default)]
    pub to_column: String,
}

/// Everything the dispatcher consumes.
#[derive(Debug, Clone)]
pub enum RouterEvent {
    Board(BoardEventPayload),
    /// A task-list file was created or modified under the specs directory.
    TaskFile(PathBuf),
}

impl RouterEvent {
    /// Serialization key: handlers for the same key run one at a time.
    pub fn key(&self) -> String {
        match self {
            Self::Board(e) => format!("{}/{}", e.project_id, e.board_id),
            Self::TaskFile(path) => format!("file:{}", path.display()),
        }
    }
}
